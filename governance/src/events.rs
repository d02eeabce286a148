//! Audit events emitted by the engine

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::proposal::ProposalKind;
use crate::types::{Address, Amount};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum GovernanceEvent {
    ProposalInitiated {
        id: u64,
        kind: ProposalKind,
        initiator: Address,
    },
    VoteCast {
        id: u64,
        kind: ProposalKind,
        voter: Address,
        weight: Amount,
    },
    ProposalExecuted {
        id: u64,
        kind: ProposalKind,
    },
    ProposalEnded {
        id: u64,
        kind: ProposalKind,
        executed: bool,
    },
}

impl GovernanceEvent {
    pub fn proposal_id(&self) -> u64 {
        match self {
            GovernanceEvent::ProposalInitiated { id, .. }
            | GovernanceEvent::VoteCast { id, .. }
            | GovernanceEvent::ProposalExecuted { id, .. }
            | GovernanceEvent::ProposalEnded { id, .. } => *id,
        }
    }

    /// Write the event to the tracing log.
    pub fn log(&self) {
        match self {
            GovernanceEvent::ProposalInitiated { id, kind, initiator } => {
                info!(proposal_id = id, %kind, %initiator, "Proposal initiated");
            }
            GovernanceEvent::VoteCast { id, kind, voter, weight } => {
                info!(proposal_id = id, %kind, %voter, weight = %weight, "Vote cast");
            }
            GovernanceEvent::ProposalExecuted { id, kind } => {
                info!(proposal_id = id, %kind, "Proposal executed");
            }
            GovernanceEvent::ProposalEnded { id, kind, executed } => {
                info!(proposal_id = id, %kind, executed, "Proposal ended");
            }
        }
    }
}
