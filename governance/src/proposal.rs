//! Proposal types
//!
//! Every proposal shares the same lifecycle fields; the kind-specific data
//! lives in [`ProposalPayload`], a tagged union with one variant per kind.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::PROPOSAL_DURATION;
use crate::types::{Address, Amount, Asset};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum ProposalKind {
    /// Sentinel for "no proposal". Never the kind of a stored proposal.
    #[default]
    None,
    Add,
    Mod,
    Change,
    Withdraw,
}

impl fmt::Display for ProposalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProposalKind::None => "none",
            ProposalKind::Add => "add",
            ProposalKind::Mod => "mod",
            ProposalKind::Change => "change",
            ProposalKind::Withdraw => "withdraw",
        };
        f.write_str(s)
    }
}

/// Register a new merchant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddPayload {
    pub print_quota: Amount,
    pub merchant: Address,
    pub merchant_name: String,
}

/// Modify an existing merchant's state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModPayload {
    pub print_quota: Amount,
    pub spending_rebate: Amount,
    pub merchant: Address,
    pub new_guardian: Address,
    pub freeze: bool,
}

/// Change the governance parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangePayload {
    pub new_majority_percentage: u8,
    pub new_mint_multiplier: u8,
}

/// Pull an asset out of the registry treasury and pay it to the initiator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WithdrawPayload {
    pub asset: Asset,
    pub initiator: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProposalPayload {
    Add(AddPayload),
    Mod(ModPayload),
    Change(ChangePayload),
    Withdraw(WithdrawPayload),
}

impl ProposalPayload {
    pub fn kind(&self) -> ProposalKind {
        match self {
            ProposalPayload::Add(_) => ProposalKind::Add,
            ProposalPayload::Mod(_) => ProposalKind::Mod,
            ProposalPayload::Change(_) => ProposalKind::Change,
            ProposalPayload::Withdraw(_) => ProposalKind::Withdraw,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Proposal {
    pub id: u64,
    pub is_open: bool,
    /// Accumulated weight of every distinct voter.
    pub voting_power: Amount,
    pub deadline: u64,
    pub payload: ProposalPayload,
}

impl Proposal {
    /// Create an open proposal whose deadline is `now + PROPOSAL_DURATION`.
    pub fn new(id: u64, payload: ProposalPayload, now: u64) -> Self {
        Self {
            id,
            is_open: true,
            voting_power: 0,
            deadline: now.saturating_add(PROPOSAL_DURATION),
            payload,
        }
    }

    pub fn kind(&self) -> ProposalKind {
        self.payload.kind()
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now > self.deadline
    }

    /// Open and within its voting window.
    pub fn is_live(&self, now: u64) -> bool {
        self.is_open && !self.is_expired(now)
    }

    pub fn state(&self, now: u64) -> ProposalState {
        if !self.is_open {
            ProposalState::Executed
        } else if self.is_expired(now) {
            ProposalState::Expired
        } else {
            ProposalState::Active
        }
    }
}

/// Lifecycle position of a stored proposal, as seen at a given time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProposalState {
    /// Accepting votes
    Active,
    /// Threshold reached and action performed
    Executed,
    /// Deadline passed without reaching the threshold
    Expired,
}

/// Typed access to one payload variant.
pub trait KindPayload: Clone + Sized {
    const KIND: ProposalKind;

    fn extract(payload: &ProposalPayload) -> Option<&Self>;
}

impl KindPayload for AddPayload {
    const KIND: ProposalKind = ProposalKind::Add;

    fn extract(payload: &ProposalPayload) -> Option<&Self> {
        match payload {
            ProposalPayload::Add(p) => Some(p),
            _ => None,
        }
    }
}

impl KindPayload for ModPayload {
    const KIND: ProposalKind = ProposalKind::Mod;

    fn extract(payload: &ProposalPayload) -> Option<&Self> {
        match payload {
            ProposalPayload::Mod(p) => Some(p),
            _ => None,
        }
    }
}

impl KindPayload for ChangePayload {
    const KIND: ProposalKind = ProposalKind::Change;

    fn extract(payload: &ProposalPayload) -> Option<&Self> {
        match payload {
            ProposalPayload::Change(p) => Some(p),
            _ => None,
        }
    }
}

impl KindPayload for WithdrawPayload {
    const KIND: ProposalKind = ProposalKind::Withdraw;

    fn extract(payload: &ProposalPayload) -> Option<&Self> {
        match payload {
            ProposalPayload::Withdraw(p) => Some(p),
            _ => None,
        }
    }
}

/// Read-only view of a proposal returned by the per-kind getters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProposalView<P> {
    pub id: u64,
    pub is_open: bool,
    pub voting_power: Amount,
    pub deadline: u64,
    pub details: P,
}

pub type AddProposal = ProposalView<AddPayload>;
pub type ModProposal = ProposalView<ModPayload>;
pub type ChangeProposal = ProposalView<ChangePayload>;
pub type WithdrawProposal = ProposalView<WithdrawPayload>;

impl Proposal {
    /// View this proposal as kind `P`, or `None` if it holds another kind.
    pub fn view<P: KindPayload>(&self) -> Option<ProposalView<P>> {
        P::extract(&self.payload).map(|details| ProposalView {
            id: self.id,
            is_open: self.is_open,
            voting_power: self.voting_power,
            deadline: self.deadline,
            details: details.clone(),
        })
    }
}
