use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use merchant_governance::{
    AddPayload, Address, Amount, Asset, ModPayload, ProposalKind, Receipt, TallyOutcome,
};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod config;
mod node;

use config::{load_config, Config};
use node::DaoNode;

#[derive(Parser)]
#[command(name = "proposal-cli")]
#[command(about = "Merchant DAO Proposal Management CLI")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "dao.toml")]
    config: PathBuf,

    /// Unix timestamp to act at (defaults to the current time)
    #[arg(long)]
    now: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show governance parameters and the active proposal
    Status,

    /// Allocate share tokens outside governance
    Mint {
        #[arg(long)]
        to: Address,

        #[arg(long)]
        amount: Amount,
    },

    /// Set a share allowance (spender defaults to the governance account)
    Approve {
        #[arg(long)]
        owner: Address,

        #[arg(long)]
        spender: Option<Address>,

        #[arg(long)]
        amount: Amount,
    },

    /// Move share tokens (locked while a proposal is active)
    Transfer {
        #[arg(long)]
        from: Address,

        #[arg(long)]
        to: Address,

        #[arg(long)]
        amount: Amount,
    },

    /// Put funds into the registry treasury
    FundRegistry {
        /// `native` or a token address
        #[arg(long)]
        asset: Asset,

        #[arg(long)]
        amount: Amount,
    },

    /// Open a new proposal
    Initiate {
        #[command(subcommand)]
        proposal: InitiateCommand,
    },

    /// Vote for the active proposal of a kind
    Vote {
        #[arg(value_enum)]
        kind: KindArg,

        #[arg(long)]
        caller: Address,
    },

    /// Print a stored proposal
    Show { id: u64 },

    /// Re-evaluate a proposal against the threshold
    Tally { id: u64 },
}

#[derive(Subcommand)]
enum InitiateCommand {
    /// Register a new merchant
    Add {
        #[arg(long)]
        caller: Address,

        #[arg(long)]
        merchant: Address,

        #[arg(long)]
        name: String,

        #[arg(long, default_value_t = 0)]
        quota: Amount,
    },

    /// Update an existing merchant
    Mod {
        #[arg(long)]
        caller: Address,

        #[arg(long)]
        merchant: Address,

        #[arg(long, default_value_t = 0)]
        quota: Amount,

        #[arg(long, default_value_t = 0)]
        rebate: Amount,

        #[arg(long)]
        guardian: Address,

        #[arg(long)]
        freeze: bool,
    },

    /// Change the majority percentage and mint multiplier
    Change {
        #[arg(long)]
        caller: Address,

        #[arg(long)]
        percentage: u8,

        #[arg(long)]
        multiplier: u8,
    },

    /// Withdraw treasury funds of one asset to the caller
    Withdraw {
        #[arg(long)]
        caller: Address,

        #[arg(long)]
        asset: Asset,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Add,
    Mod,
    Change,
    Withdraw,
}

impl From<KindArg> for ProposalKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Add => ProposalKind::Add,
            KindArg::Mod => ProposalKind::Mod,
            KindArg::Change => ProposalKind::Change,
            KindArg::Withdraw => ProposalKind::Withdraw,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(error = %e, "Could not load config, using defaults");
            Config::default()
        }
    };

    let now = cli
        .now
        .unwrap_or_else(|| u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0));

    let mut node = DaoNode::open(&config)?;
    run(&mut node, cli.command, now)?;
    node.save()
}

fn run(node: &mut DaoNode, command: Commands, now: u64) -> anyhow::Result<()> {
    match command {
        Commands::Status => print_status(node, now)?,
        Commands::Mint { to, amount } => {
            node.sandbox.mint_shares(to, amount)?;
            println!("Minted {} shares to {}", amount.to_string().green(), to);
        }
        Commands::Approve {
            owner,
            spender,
            amount,
        } => {
            let spender = spender.unwrap_or_else(|| node.engine.account());
            node.engine.approve(owner, spender, amount)?;
            println!("{} may spend {} of {}'s shares", spender, amount, owner);
        }
        Commands::Transfer { from, to, amount } => {
            node.engine.transfer(from, to, amount, now)?;
            println!(
                "Transferred {} shares {} -> {}",
                amount.to_string().green(),
                from,
                to
            );
        }
        Commands::FundRegistry { asset, amount } => {
            node.sandbox.fund_registry(asset, amount)?;
            println!(
                "Registry treasury funded with {} {}",
                amount.to_string().green(),
                asset
            );
        }
        Commands::Initiate { proposal } => {
            let receipt = initiate(node, proposal, now)?;
            print_receipt(&receipt);
        }
        Commands::Vote { kind, caller } => {
            let receipt = node.engine.vote(kind.into(), caller, now)?;
            print_receipt(&receipt);
        }
        Commands::Show { id } => {
            let proposal = node
                .engine
                .state()
                .store
                .get(id)
                .with_context(|| format!("proposal {} not found", id))?;
            println!("{}", serde_json::to_string_pretty(proposal)?);
            println!("{}: {:?}", "State".yellow().bold(), proposal.state(now));
        }
        Commands::Tally { id } => {
            let outcome = node.engine.tally(id, now)?;
            print_outcome(id, &outcome);
        }
    }

    for event in node.engine.take_events() {
        println!("  {} {}", "event".bright_black(), serde_json::to_string(&event)?);
    }
    Ok(())
}

fn initiate(node: &mut DaoNode, command: InitiateCommand, now: u64) -> anyhow::Result<Receipt> {
    let receipt = match command {
        InitiateCommand::Add {
            caller,
            merchant,
            name,
            quota,
        } => node.engine.initiate_add(
            caller,
            AddPayload {
                print_quota: quota,
                merchant,
                merchant_name: name,
            },
            now,
        )?,
        InitiateCommand::Mod {
            caller,
            merchant,
            quota,
            rebate,
            guardian,
            freeze,
        } => node.engine.initiate_mod(
            caller,
            ModPayload {
                print_quota: quota,
                spending_rebate: rebate,
                merchant,
                new_guardian: guardian,
                freeze,
            },
            now,
        )?,
        InitiateCommand::Change {
            caller,
            percentage,
            multiplier,
        } => node
            .engine
            .initiate_change(caller, percentage, multiplier, now)?,
        InitiateCommand::Withdraw { caller, asset } => {
            node.engine.initiate_withdraw(caller, asset, now)?
        }
    };
    Ok(receipt)
}

fn print_status(node: &DaoNode, now: u64) -> anyhow::Result<()> {
    let engine = &node.engine;
    println!("{}", "Merchant DAO".cyan().bold());
    println!("{}: {}", "Governance account".yellow().bold(), engine.account());
    println!("{}: {}", "Total supply".yellow().bold(), node.sandbox.total_supply());
    println!("{}: {}%", "Majority".yellow().bold(), engine.majority_percentage());
    println!("{}: {}", "Threshold".yellow().bold(), engine.threshold()?);
    println!("{}: {}", "Mint multiplier".yellow().bold(), engine.mint_multiplier());
    println!("{}: {}", "Proposals".yellow().bold(), engine.current_proposal_id());

    let slot = engine.state().slot;
    if engine.is_any_proposal_active(now) {
        let id = slot.proposal_id();
        println!(
            "{}: #{} ({}) {}",
            "Active".yellow().bold(),
            id,
            slot.kind(),
            "open".green()
        );
        if let Some(proposal) = engine.state().store.get(id) {
            println!(
                "  voting power {} of {}, deadline {}",
                proposal.voting_power,
                engine.threshold()?,
                format_time(proposal.deadline)
            );
        }
    } else {
        println!("{}: {}", "Active".yellow().bold(), "none".bright_black());
    }
    Ok(())
}

fn print_receipt(receipt: &Receipt) {
    print_outcome(receipt.proposal_id, &receipt.outcome);
}

fn print_outcome(id: u64, outcome: &TallyOutcome) {
    match outcome {
        TallyOutcome::Executed => println!("Proposal #{} {}", id, "executed".green().bold()),
        TallyOutcome::Pending {
            voting_power,
            threshold,
        } => println!(
            "Proposal #{} pending: {} / {}",
            id,
            voting_power.to_string().yellow(),
            threshold
        ),
        TallyOutcome::Expired => println!("Proposal #{} {}", id, "expired".red()),
        TallyOutcome::Closed => println!("Proposal #{} already closed", id),
    }
}

fn format_time(timestamp: u64) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}
