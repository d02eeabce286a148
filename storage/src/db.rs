//! Sled-based persistence for governance state
//!
//! Key layout:
//! - `proposal:{id}`          bincode `Proposal`
//! - `kind:{id}`              bincode `ProposalKind`
//! - `voted:{id}:{account}`   empty marker
//! - `global:{name}`          bincode scalar
//!
//! Identifiers are zero-padded so prefix scans return them in order.

use merchant_governance::{
    ActiveSlot, Address, GovernanceState, Proposal, ProposalKind, ProposalStore,
};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use tracing::debug;

use crate::{Result, StorageError};

const PROPOSAL_PREFIX: &str = "proposal:";
const KIND_PREFIX: &str = "kind:";
const VOTED_PREFIX: &str = "voted:";
const CURRENT_PROPOSAL_ID: &str = "global:current_proposal_id";
const MAJORITY_PERCENTAGE: &str = "global:majority_percentage";
const MINT_MULTIPLIER: &str = "global:mint_multiplier";
const ACTIVE_SLOT: &str = "global:active_slot";

fn proposal_key(id: u64) -> String {
    format!("{}{:020}", PROPOSAL_PREFIX, id)
}

fn kind_key(id: u64) -> String {
    format!("{}{:020}", KIND_PREFIX, id)
}

fn voted_key(id: u64, account: &Address) -> String {
    format!("{}{:020}:{}", VOTED_PREFIX, id, account)
}

#[derive(Debug, Clone)]
pub struct GovernanceDb {
    db: sled::Db,
    path: String,
}

impl GovernanceDb {
    /// Open or create the database
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let db = sled::open(&path)?;
        Ok(GovernanceDb { db, path: path_str })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Write the whole state in one atomic batch and flush it.
    pub fn save_state(&self, state: &GovernanceState) -> Result<()> {
        let mut batch = sled::Batch::default();

        for proposal in state.store.iter() {
            batch.insert(proposal_key(proposal.id).as_bytes(), encode(proposal)?);
            batch.insert(
                kind_key(proposal.id).as_bytes(),
                encode(&proposal.kind())?,
            );
        }
        for (id, account) in state.store.voted_pairs() {
            batch.insert(voted_key(*id, account).as_bytes(), &[] as &[u8]);
        }

        let slot = &state.slot;
        batch.insert(
            CURRENT_PROPOSAL_ID.as_bytes(),
            encode(&state.store.last_id())?,
        );
        batch.insert(
            MAJORITY_PERCENTAGE.as_bytes(),
            encode(&state.majority_percentage)?,
        );
        batch.insert(MINT_MULTIPLIER.as_bytes(), encode(&state.mint_multiplier)?);
        batch.insert(
            ACTIVE_SLOT.as_bytes(),
            encode(&(slot.proposal_id(), slot.kind(), slot.is_occupied()))?,
        );

        self.db.apply_batch(batch)?;
        self.db.flush()?;
        debug!(path = %self.path, proposals = state.store.len(), "Governance state saved");
        Ok(())
    }

    /// Load the state, or `None` if nothing was saved yet.
    pub fn load_state(&self) -> Result<Option<GovernanceState>> {
        let last_id: u64 = match self.get(CURRENT_PROPOSAL_ID)? {
            Some(id) => id,
            None => return Ok(None),
        };
        let majority_percentage: u8 = self.require(MAJORITY_PERCENTAGE)?;
        let mint_multiplier: u8 = self.require(MINT_MULTIPLIER)?;
        let (slot_id, slot_kind, slot_active): (u64, ProposalKind, bool) =
            self.require(ACTIVE_SLOT)?;

        let mut proposals = Vec::new();
        for entry in self.db.scan_prefix(PROPOSAL_PREFIX.as_bytes()) {
            let (key, value) = entry?;
            let proposal: Proposal = decode(&key, &value)?;
            let tag = self.proposal_kind(proposal.id)?;
            if tag != proposal.kind() {
                return Err(StorageError::Corrupt {
                    key: String::from_utf8_lossy(&key).to_string(),
                    reason: format!(
                        "kind tag {} does not match payload {}",
                        tag,
                        proposal.kind()
                    ),
                });
            }
            proposals.push(proposal);
        }

        let mut voted = Vec::new();
        for entry in self.db.scan_prefix(VOTED_PREFIX.as_bytes()) {
            let (key, _) = entry?;
            voted.push(parse_voted_key(&key)?);
        }

        Ok(Some(GovernanceState {
            store: ProposalStore::from_parts(last_id, proposals, voted),
            slot: ActiveSlot::from_parts(slot_id, slot_kind, slot_active),
            majority_percentage,
            mint_multiplier,
        }))
    }

    pub fn load_proposal(&self, id: u64) -> Result<Option<Proposal>> {
        self.get(&proposal_key(id))
    }

    /// Stored kind tag of `id`; `ProposalKind::None` if it does not exist.
    pub fn proposal_kind(&self, id: u64) -> Result<ProposalKind> {
        Ok(self.get(&kind_key(id))?.unwrap_or_default())
    }

    pub fn has_voted(&self, id: u64, account: &Address) -> Result<bool> {
        Ok(self.db.contains_key(voted_key(id, account).as_bytes())?)
    }

    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.db.get(key.as_bytes())? {
            Some(data) => Ok(Some(decode(key.as_bytes(), &data)?)),
            None => Ok(None),
        }
    }

    fn require<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.get(key)?.ok_or_else(|| StorageError::Corrupt {
            key: key.to_string(),
            reason: "missing".to_string(),
        })
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

fn decode<T: DeserializeOwned>(key: &[u8], data: &[u8]) -> Result<T> {
    bincode::deserialize(data).map_err(|e| StorageError::Corrupt {
        key: String::from_utf8_lossy(key).to_string(),
        reason: e.to_string(),
    })
}

fn parse_voted_key(key: &[u8]) -> Result<(u64, Address)> {
    let corrupt = |reason: &str| StorageError::Corrupt {
        key: String::from_utf8_lossy(key).to_string(),
        reason: reason.to_string(),
    };
    let text = std::str::from_utf8(key).map_err(|_| corrupt("not utf-8"))?;
    let rest = text
        .strip_prefix(VOTED_PREFIX)
        .ok_or_else(|| corrupt("bad prefix"))?;
    let (id, account) = rest
        .split_once(':')
        .ok_or_else(|| corrupt("missing account"))?;
    let id = id.parse().map_err(|_| corrupt("bad proposal id"))?;
    let account = account.parse().map_err(|_| corrupt("bad account"))?;
    Ok((id, account))
}

#[cfg(test)]
mod tests {
    use super::*;
    use merchant_governance::{AddPayload, GovernanceConfig, ProposalState, Sandbox, SandboxEngine};
    use tempfile::tempdir;

    const T0: u64 = 1_700_000_000;

    fn engine_with_history() -> (Sandbox, SandboxEngine) {
        let gov = Address::repeat_byte(0xd0);
        let sandbox = Sandbox::new(gov);
        sandbox.mint_shares(Address::repeat_byte(0xa1), 20).unwrap();
        sandbox.mint_shares(Address::repeat_byte(0xb0), 5).unwrap();
        sandbox.mint_shares(Address::repeat_byte(0xc0), 75).unwrap();
        let mut engine = SandboxEngine::with_sandbox(&GovernanceConfig::new(gov), &sandbox)
            .unwrap();

        // 1: executed immediately, 2: left open
        engine
            .initiate_add(
                Address::repeat_byte(0xa1),
                AddPayload {
                    print_quota: 0,
                    merchant: Address::repeat_byte(0x11),
                    merchant_name: "Bakery".to_string(),
                },
                T0,
            )
            .unwrap();
        engine
            .initiate_change(Address::repeat_byte(0xb0), 20, 5, T0 + 1)
            .unwrap();
        (sandbox, engine)
    }

    #[test]
    fn test_empty_db_has_no_state() {
        let dir = tempdir().unwrap();
        let db = GovernanceDb::open(dir.path()).unwrap();
        assert!(db.load_state().unwrap().is_none());
        assert_eq!(db.proposal_kind(1).unwrap(), ProposalKind::None);
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = tempdir().unwrap();
        let (sandbox, engine) = engine_with_history();
        {
            let db = GovernanceDb::open(dir.path()).unwrap();
            db.save_state(engine.state()).unwrap();
        }

        let db = GovernanceDb::open(dir.path()).unwrap();
        let loaded = db.load_state().unwrap().unwrap();
        assert_eq!(&loaded, engine.state());

        let resumed = SandboxEngine::from_state(
            engine.account(),
            loaded,
            sandbox.ledger(),
            sandbox.registry(),
            sandbox.custody(),
        );
        assert!(resumed.is_any_proposal_active(T0 + 1));
        assert_eq!(
            resumed.proposal_state(1, T0 + 1).unwrap(),
            ProposalState::Executed
        );
        assert_eq!(resumed.current_proposal_id(), 2);
    }

    #[test]
    fn test_logical_layout() {
        let dir = tempdir().unwrap();
        let (_sandbox, engine) = engine_with_history();
        let db = GovernanceDb::open(dir.path()).unwrap();
        db.save_state(engine.state()).unwrap();

        assert_eq!(db.proposal_kind(1).unwrap(), ProposalKind::Add);
        assert_eq!(db.proposal_kind(2).unwrap(), ProposalKind::Change);
        assert!(db.has_voted(2, &Address::repeat_byte(0xb0)).unwrap());
        assert!(!db.has_voted(2, &Address::repeat_byte(0xa1)).unwrap());

        let open = db.load_proposal(2).unwrap().unwrap();
        assert!(open.is_open);
        assert_eq!(open.voting_power, 5);
        assert!(db.load_proposal(3).unwrap().is_none());
    }

    #[test]
    fn test_mismatched_kind_tag_is_corrupt() {
        let dir = tempdir().unwrap();
        let (_sandbox, engine) = engine_with_history();
        let db = GovernanceDb::open(dir.path()).unwrap();
        db.save_state(engine.state()).unwrap();

        db.db
            .insert(
                kind_key(1).as_bytes(),
                encode(&ProposalKind::Withdraw).unwrap(),
            )
            .unwrap();
        assert!(matches!(db.load_state(), Err(StorageError::Corrupt { .. })));
    }

    #[test]
    fn test_parse_voted_key() {
        let account = Address::repeat_byte(0x42);
        let key = voted_key(17, &account);
        assert_eq!(parse_voted_key(key.as_bytes()).unwrap(), (17, account));
        assert!(parse_voted_key(b"voted:xx").is_err());
    }
}
