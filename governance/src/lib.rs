//! Merchant Governance Module
//!
//! Token-weighted, single-slot proposal pipeline. Share holders propose and
//! approve one administrative action at a time against an external merchant
//! registry and treasury:
//! - Add: register a merchant and mint it a share allocation
//! - Mod: change a merchant's quota, rebate, guardian or freeze flag
//! - Change: adjust the approval threshold and merchant mint multiplier
//! - Withdraw: pull treasury funds and pay them to the initiator
//!
//! Share transfers are locked while a proposal is open.

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod ledger;
pub mod proposal;
pub mod sandbox;
pub mod shared;
pub mod slot;
pub mod store;
pub mod types;

pub use config::{
    GovernanceConfig, DEFAULT_MAJORITY_PERCENTAGE, DEFAULT_MINT_MULTIPLIER, MAX_MAJORITY_PERCENTAGE,
    MAX_MINT_MULTIPLIER, PROPOSAL_DURATION,
};
pub use engine::{
    approval_threshold, merchant_mint_amount, GovernanceEngine, GovernanceState, Receipt,
    TallyOutcome,
};
pub use error::{CollaboratorError, GovernanceError, Result};
pub use events::GovernanceEvent;
pub use ledger::{BalanceLedger, CallResult, Custody, MerchantRegistry, Transactional};
pub use proposal::{
    AddPayload, AddProposal, ChangePayload, ChangeProposal, ModPayload, ModProposal, Proposal,
    ProposalKind, ProposalPayload, ProposalState, ProposalView, WithdrawPayload, WithdrawProposal,
};
pub use sandbox::{
    ChainState, MerchantRecord, Sandbox, SandboxCall, SandboxCustody, SandboxLedger,
    SandboxRegistry,
};
pub use shared::SharedGovernance;
pub use slot::ActiveSlot;
pub use store::ProposalStore;
pub use types::{Address, Amount, Asset};

/// Engine wired to the in-memory sandbox collaborators.
pub type SandboxEngine = GovernanceEngine<SandboxLedger, SandboxRegistry, SandboxCustody>;

impl SandboxEngine {
    pub fn with_sandbox(config: &GovernanceConfig, sandbox: &Sandbox) -> Result<Self> {
        GovernanceEngine::new(
            config,
            sandbox.ledger(),
            sandbox.registry(),
            sandbox.custody(),
        )
    }
}
