//! Local governance node: sandbox chain plus engine, persisted under `data_dir`.

use anyhow::Context;
use merchant_governance::{ChainState, GovernanceState, Sandbox, SandboxEngine};
use merchant_storage::{GovernanceDb, SnapshotStore};
use tracing::{debug, info};

use crate::config::Config;

const CHAIN_SNAPSHOT: &str = "chain";

pub struct DaoNode {
    pub sandbox: Sandbox,
    pub engine: SandboxEngine,
    snapshots: SnapshotStore,
    db: GovernanceDb,
}

impl DaoNode {
    pub fn open(config: &Config) -> anyhow::Result<Self> {
        config
            .governance
            .validate()
            .context("invalid [governance] config")?;
        let snapshots = SnapshotStore::open(config.storage.snapshot_dir())
            .context("opening snapshot directory")?;
        let db = GovernanceDb::open(config.storage.db_path())
            .context("opening governance db")?;
        let account = config.governance.governance_account;

        let sandbox = if snapshots.exists(CHAIN_SNAPSHOT) {
            let chain: ChainState = snapshots
                .load(CHAIN_SNAPSHOT)
                .context("loading chain snapshot")?;
            if chain.governance_account != account {
                anyhow::bail!(
                    "configured governance account {} does not match chain snapshot account {}",
                    account,
                    chain.governance_account
                );
            }
            debug!(accounts = chain.shares.len(), "Chain snapshot loaded");
            Sandbox::from_state(chain)
        } else {
            info!(%account, "Starting fresh chain");
            Sandbox::new(account)
        };

        let state = match db.load_state().context("loading governance state")? {
            Some(state) => state,
            None => GovernanceState::new(&config.governance),
        };

        let engine = SandboxEngine::from_state(
            account,
            state,
            sandbox.ledger(),
            sandbox.registry(),
            sandbox.custody(),
        );

        Ok(Self {
            sandbox,
            engine,
            snapshots,
            db,
        })
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.snapshots
            .save(CHAIN_SNAPSHOT, &self.sandbox.snapshot())
            .context("saving chain snapshot")?;
        self.db
            .save_state(self.engine.state())
            .context("saving governance state")?;
        Ok(())
    }
}
