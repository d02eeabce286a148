//! Proposal store: the append-only log of proposals plus the voter registry.

use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{GovernanceError, Result};
use crate::proposal::{KindPayload, Proposal, ProposalKind, ProposalPayload, ProposalView};
use crate::types::Address;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProposalStore {
    /// Identifier of the most recently created proposal (0 = none yet)
    last_id: u64,
    proposals: BTreeMap<u64, Proposal>,
    /// (proposal id, account) pairs that have voted. Never cleared.
    voted: BTreeSet<(u64, Address)>,
}

impl ProposalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_id(&self) -> u64 {
        self.last_id
    }

    /// Allocate the next identifier and store an open proposal under it.
    pub fn create(&mut self, payload: ProposalPayload, now: u64) -> Result<&mut Proposal> {
        let id = self
            .last_id
            .checked_add(1)
            .ok_or(GovernanceError::ArithmeticOverflow)?;
        match self.proposals.entry(id) {
            Entry::Occupied(_) => Err(GovernanceError::ProposalIdInUse(id)),
            Entry::Vacant(slot) => {
                self.last_id = id;
                Ok(slot.insert(Proposal::new(id, payload, now)))
            }
        }
    }

    pub fn get(&self, id: u64) -> Option<&Proposal> {
        self.proposals.get(&id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut Proposal> {
        self.proposals.get_mut(&id)
    }

    pub fn require(&self, id: u64) -> Result<&Proposal> {
        self.get(id).ok_or(GovernanceError::ProposalNotFound(id))
    }

    pub fn require_mut(&mut self, id: u64) -> Result<&mut Proposal> {
        self.get_mut(id).ok_or(GovernanceError::ProposalNotFound(id))
    }

    /// Kind tag of `id`; `None` when the identifier was never allocated.
    pub fn kind_of(&self, id: u64) -> ProposalKind {
        self.get(id).map(Proposal::kind).unwrap_or_default()
    }

    /// Typed view of `id`, failing if it holds a different kind.
    pub fn view<P: KindPayload>(&self, id: u64) -> Result<ProposalView<P>> {
        let proposal = self.require(id)?;
        proposal.view::<P>().ok_or(GovernanceError::WrongProposalKind {
            id,
            expected: P::KIND,
            actual: proposal.kind(),
        })
    }

    pub fn has_voted(&self, id: u64, account: &Address) -> bool {
        self.voted.contains(&(id, *account))
    }

    /// Record `account` as a voter on `id`. Returns false if it already voted.
    pub fn mark_voted(&mut self, id: u64, account: Address) -> bool {
        self.voted.insert((id, account))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Proposal> {
        self.proposals.values()
    }

    pub fn voters(&self, id: u64) -> impl Iterator<Item = &Address> {
        self.voted
            .range((id, Address::ZERO)..)
            .take_while(move |(pid, _)| *pid == id)
            .map(|(_, account)| account)
    }

    pub fn len(&self) -> usize {
        self.proposals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }

    /// Rebuild a store from persisted parts.
    pub fn from_parts(
        last_id: u64,
        proposals: impl IntoIterator<Item = Proposal>,
        voted: impl IntoIterator<Item = (u64, Address)>,
    ) -> Self {
        Self {
            last_id,
            proposals: proposals.into_iter().map(|p| (p.id, p)).collect(),
            voted: voted.into_iter().collect(),
        }
    }

    pub fn voted_pairs(&self) -> impl Iterator<Item = &(u64, Address)> {
        self.voted.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposal::{AddPayload, ChangePayload, WithdrawPayload};
    use crate::types::Asset;

    fn add_payload() -> ProposalPayload {
        ProposalPayload::Add(AddPayload {
            print_quota: 0,
            merchant: Address::repeat_byte(0x11),
            merchant_name: "Corner Shop".to_string(),
        })
    }

    #[test]
    fn test_identifiers_start_at_one_and_increase() {
        let mut store = ProposalStore::new();
        assert_eq!(store.last_id(), 0);
        assert_eq!(store.kind_of(0), ProposalKind::None);

        let first = store.create(add_payload(), 100).unwrap().id;
        let second = store.create(add_payload(), 200).unwrap().id;
        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(store.last_id(), 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_wrong_kind_view_is_rejected() {
        let mut store = ProposalStore::new();
        store.create(add_payload(), 0).unwrap();

        assert!(store.view::<AddPayload>(1).is_ok());
        let err = store.view::<ChangePayload>(1).unwrap_err();
        assert_eq!(
            err,
            GovernanceError::WrongProposalKind {
                id: 1,
                expected: ProposalKind::Change,
                actual: ProposalKind::Add,
            }
        );
        assert_eq!(
            store.view::<WithdrawPayload>(9).unwrap_err(),
            GovernanceError::ProposalNotFound(9)
        );
    }

    #[test]
    fn test_vote_marks_are_per_proposal() {
        let mut store = ProposalStore::new();
        let alice = Address::repeat_byte(0xa1);
        let bob = Address::repeat_byte(0xb0);

        assert!(store.mark_voted(1, alice));
        assert!(!store.mark_voted(1, alice));
        assert!(store.mark_voted(2, alice));
        assert!(store.mark_voted(1, bob));

        assert!(store.has_voted(1, &alice));
        assert!(!store.has_voted(3, &alice));

        let voters: Vec<_> = store.voters(1).copied().collect();
        assert_eq!(voters, vec![alice, bob]);
    }

    #[test]
    fn test_from_parts_restores_log() {
        let mut store = ProposalStore::new();
        store
            .create(
                ProposalPayload::Withdraw(WithdrawPayload {
                    asset: Asset::Native,
                    initiator: Address::repeat_byte(3),
                }),
                10,
            )
            .unwrap();
        store.mark_voted(1, Address::repeat_byte(3));

        let rebuilt = ProposalStore::from_parts(
            store.last_id(),
            store.iter().cloned(),
            store.voted_pairs().copied(),
        );
        assert_eq!(rebuilt, store);
    }

    #[test]
    fn test_create_refuses_taken_identifier() {
        // Counter behind the stored log, as a hand-edited state could be
        let existing = Proposal::new(1, add_payload(), 10);
        let mut store = ProposalStore::from_parts(0, vec![existing.clone()], Vec::new());

        let change = ProposalPayload::Change(ChangePayload {
            new_majority_percentage: 20,
            new_mint_multiplier: 10,
        });
        assert_eq!(
            store.create(change, 20).unwrap_err(),
            GovernanceError::ProposalIdInUse(1)
        );
        assert_eq!(store.last_id(), 0);
        assert_eq!(store.get(1), Some(&existing));
    }
}
