//! Active-slot tracker: the single proposal that may be open at a time.

use serde::{Deserialize, Serialize};

use crate::proposal::ProposalKind;
use crate::store::ProposalStore;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActiveSlot {
    proposal_id: u64,
    kind: ProposalKind,
    active: bool,
}

impl ActiveSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a persisted slot.
    pub fn from_parts(proposal_id: u64, kind: ProposalKind, active: bool) -> Self {
        Self {
            proposal_id,
            kind,
            active,
        }
    }

    pub fn proposal_id(&self) -> u64 {
        self.proposal_id
    }

    pub fn kind(&self) -> ProposalKind {
        self.kind
    }

    /// Raw occupancy flag, independent of deadlines.
    pub fn is_occupied(&self) -> bool {
        self.active
    }

    pub fn occupy(&mut self, proposal_id: u64, kind: ProposalKind) {
        self.proposal_id = proposal_id;
        self.kind = kind;
        self.active = true;
    }

    /// Release the slot after execution. The identifier is kept for queries.
    pub fn release(&mut self) {
        self.kind = ProposalKind::None;
        self.active = false;
    }

    /// The occupying proposal id if its kind is `kind`.
    pub fn occupant_of(&self, kind: ProposalKind) -> Option<u64> {
        (self.active && kind != ProposalKind::None && self.kind == kind)
            .then_some(self.proposal_id)
    }

    /// True iff the occupying proposal is open and `now` is within its deadline.
    pub fn is_active(&self, store: &ProposalStore, now: u64) -> bool {
        self.active
            && store
                .get(self.proposal_id)
                .map_or(false, |proposal| proposal.is_live(now))
    }
}
