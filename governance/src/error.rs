//! Governance error types

use thiserror::Error;

use crate::proposal::ProposalKind;

/// Failure reported by an external collaborator (ledger, registry, custody).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct CollaboratorError(pub String);

impl CollaboratorError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GovernanceError {
    #[error("Caller must hold share tokens")]
    MustHoldShareTokens,

    #[error("A proposal is already ongoing")]
    OngoingProposal,

    #[error("No ongoing {0} proposal")]
    NoOngoingProposal(ProposalKind),

    #[error("Proposal {0} has expired")]
    ProposalExpired(u64),

    #[error("Account already voted on proposal {0}")]
    AlreadyVoted(u64),

    #[error("Merchant {0} already exists")]
    MerchantAlreadyExists(String),

    #[error("Invalid majority percentage: {0}")]
    InvalidPercentage(u8),

    #[error("Invalid mint multiplier: {0} (allowed 0..=100)")]
    InvalidMintMultiplier(u8),

    #[error("Total supply is zero")]
    TotalSupplyZero,

    #[error("Transfers are locked while a proposal is active")]
    TransfersLocked,

    #[error("Proposal {id} is a {actual} proposal, not {expected}")]
    WrongProposalKind {
        id: u64,
        expected: ProposalKind,
        actual: ProposalKind,
    },

    #[error("Proposal not found: {0}")]
    ProposalNotFound(u64),

    #[error("Proposal id {0} is already taken")]
    ProposalIdInUse(u64),

    #[error("Re-entrant governance call rejected")]
    Reentrancy,

    #[error("Arithmetic overflow")]
    ArithmeticOverflow,

    #[error("External call failed: {0}")]
    External(String),
}

impl From<CollaboratorError> for GovernanceError {
    fn from(err: CollaboratorError) -> Self {
        GovernanceError::External(err.0)
    }
}

pub type Result<T> = std::result::Result<T, GovernanceError>;
