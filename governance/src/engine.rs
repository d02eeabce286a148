//! Governance engine: proposal initiation, voting, tally and execution.
//!
//! Every state-changing entry point runs inside [`GovernanceEngine::transact`]:
//! the engine state is checkpointed and every collaborator is asked to begin a
//! transaction. If any step fails, collaborators roll back, the checkpoint is
//! restored and events emitted during the call are discarded.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{GovernanceConfig, MAX_MAJORITY_PERCENTAGE, MAX_MINT_MULTIPLIER};
use crate::error::{GovernanceError, Result};
use crate::events::GovernanceEvent;
use crate::ledger::{BalanceLedger, Custody, MerchantRegistry};
use crate::proposal::{
    AddPayload, AddProposal, ChangePayload, ChangeProposal, KindPayload, ModPayload,
    ModProposal, ProposalKind, ProposalPayload, ProposalState, ProposalView, WithdrawPayload,
    WithdrawProposal,
};
use crate::slot::ActiveSlot;
use crate::store::ProposalStore;
use crate::types::{Address, Amount, Asset};

/// Everything the engine owns. Cloned as the rollback checkpoint of each call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GovernanceState {
    pub store: ProposalStore,
    pub slot: ActiveSlot,
    pub majority_percentage: u8,
    pub mint_multiplier: u8,
}

impl GovernanceState {
    pub fn new(config: &GovernanceConfig) -> Self {
        Self {
            store: ProposalStore::new(),
            slot: ActiveSlot::new(),
            majority_percentage: config.majority_percentage,
            mint_multiplier: config.mint_multiplier,
        }
    }
}

/// Result of evaluating a proposal against the approval threshold.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TallyOutcome {
    /// Threshold reached; the action ran and the slot closed.
    Executed,
    /// Still open, waiting for more votes.
    Pending { voting_power: Amount, threshold: Amount },
    /// Deadline passed; the proposal can no longer execute.
    Expired,
    /// Already closed; nothing happened.
    Closed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Receipt {
    pub proposal_id: u64,
    pub outcome: TallyOutcome,
}

/// Votes needed to pass: `floor(total_supply * majority_percentage / 100)`.
pub fn approval_threshold(total_supply: Amount, majority_percentage: u8) -> Result<Amount> {
    total_supply
        .checked_mul(Amount::from(majority_percentage))
        .map(|scaled| scaled / 100)
        .ok_or(GovernanceError::ArithmeticOverflow)
}

/// Shares minted to a merchant on admission: `mint_multiplier` tenths of a
/// percent of the pre-mint supply.
pub fn merchant_mint_amount(total_supply: Amount, mint_multiplier: u8) -> Result<Amount> {
    (total_supply / 1000)
        .checked_mul(Amount::from(mint_multiplier))
        .ok_or(GovernanceError::ArithmeticOverflow)
}

pub struct GovernanceEngine<L, R, C> {
    account: Address,
    state: GovernanceState,
    ledger: L,
    registry: R,
    custody: C,
    events: Vec<GovernanceEvent>,
}

impl<L, R, C> GovernanceEngine<L, R, C>
where
    L: BalanceLedger,
    R: MerchantRegistry,
    C: Custody,
{
    /// Fails if `config` carries an out-of-range percentage or multiplier.
    pub fn new(config: &GovernanceConfig, ledger: L, registry: R, custody: C) -> Result<Self> {
        config.validate()?;
        let state = GovernanceState::new(config);
        Ok(Self::from_state(
            config.governance_account,
            state,
            ledger,
            registry,
            custody,
        ))
    }

    /// Resume from a persisted state.
    pub fn from_state(
        account: Address,
        state: GovernanceState,
        ledger: L,
        registry: R,
        custody: C,
    ) -> Self {
        Self {
            account,
            state,
            ledger,
            registry,
            custody,
            events: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Initiation
    // ------------------------------------------------------------------

    pub fn initiate_add(
        &mut self,
        caller: Address,
        request: AddPayload,
        now: u64,
    ) -> Result<Receipt> {
        self.transact(|engine| engine.initiate(caller, ProposalPayload::Add(request), now))
    }

    pub fn initiate_mod(
        &mut self,
        caller: Address,
        request: ModPayload,
        now: u64,
    ) -> Result<Receipt> {
        self.transact(|engine| engine.initiate(caller, ProposalPayload::Mod(request), now))
    }

    pub fn initiate_change(
        &mut self,
        caller: Address,
        new_majority_percentage: u8,
        new_mint_multiplier: u8,
        now: u64,
    ) -> Result<Receipt> {
        let payload = ProposalPayload::Change(ChangePayload {
            new_majority_percentage,
            new_mint_multiplier,
        });
        self.transact(|engine| engine.initiate(caller, payload, now))
    }

    pub fn initiate_withdraw(
        &mut self,
        caller: Address,
        asset: Asset,
        now: u64,
    ) -> Result<Receipt> {
        let payload = ProposalPayload::Withdraw(WithdrawPayload {
            asset,
            initiator: caller,
        });
        self.transact(|engine| engine.initiate(caller, payload, now))
    }

    fn initiate(&mut self, caller: Address, payload: ProposalPayload, now: u64) -> Result<Receipt> {
        if self.ledger.balance_of(&caller) == 0 {
            return Err(GovernanceError::MustHoldShareTokens);
        }
        if self.is_any_proposal_active(now) {
            return Err(GovernanceError::OngoingProposal);
        }

        let payload = self.prepare_payload(caller, payload)?;
        self.end_stale_proposal(now);

        let kind = payload.kind();
        let id = self.state.store.create(payload, now)?.id;
        self.state.slot.occupy(id, kind);
        self.emit(GovernanceEvent::ProposalInitiated {
            id,
            kind,
            initiator: caller,
        });

        // The initiator's own vote, weighted by what it holds after any deposit
        let weight = self.ledger.balance_of(&caller);
        let outcome = self.record_vote(id, caller, weight, now)?;
        Ok(Receipt {
            proposal_id: id,
            outcome,
        })
    }

    /// Kind-specific validation, plus the optional quota deposit for Add/Mod.
    fn prepare_payload(
        &mut self,
        caller: Address,
        payload: ProposalPayload,
    ) -> Result<ProposalPayload> {
        match payload {
            ProposalPayload::Add(mut add) => {
                if self.registry.is_merchant(&add.merchant)? {
                    return Err(GovernanceError::MerchantAlreadyExists(add.merchant.to_hex()));
                }
                add.print_quota = self.collect_deposit(caller, add.print_quota)?;
                Ok(ProposalPayload::Add(add))
            }
            ProposalPayload::Mod(mut modify) => {
                modify.print_quota = self.collect_deposit(caller, modify.print_quota)?;
                Ok(ProposalPayload::Mod(modify))
            }
            ProposalPayload::Change(change) => {
                let pct = change.new_majority_percentage;
                if pct == 0 || pct > MAX_MAJORITY_PERCENTAGE {
                    return Err(GovernanceError::InvalidPercentage(pct));
                }
                if change.new_mint_multiplier > MAX_MINT_MULTIPLIER {
                    return Err(GovernanceError::InvalidMintMultiplier(
                        change.new_mint_multiplier,
                    ));
                }
                Ok(ProposalPayload::Change(change))
            }
            ProposalPayload::Withdraw(withdraw) => Ok(ProposalPayload::Withdraw(withdraw)),
        }
    }

    /// Pull `quota` from `caller` into engine custody if it is approved and
    /// funded. Returns the amount actually held, which is zero on a shortfall.
    fn collect_deposit(&mut self, caller: Address, quota: Amount) -> Result<Amount> {
        if quota == 0 {
            return Ok(0);
        }
        let allowance = self.ledger.allowance(&caller, &self.account);
        let balance = self.ledger.balance_of(&caller);
        if allowance < quota || balance < quota {
            debug!(
                %caller,
                quota = %quota,
                allowance = %allowance,
                balance = %balance,
                "Deposit not funded, recording zero quota"
            );
            return Ok(0);
        }
        self.ledger
            .transfer_from(&self.account, &caller, &self.account, quota)?;
        Ok(quota)
    }

    /// A predecessor still flagged open but past its deadline is superseded.
    /// Its flag is left as stored; only the end event is recorded.
    fn end_stale_proposal(&mut self, now: u64) {
        let slot = self.state.slot;
        if !slot.is_occupied() {
            return;
        }
        if let Some(stale) = self.state.store.get(slot.proposal_id()) {
            if stale.is_open && stale.is_expired(now) {
                let event = GovernanceEvent::ProposalEnded {
                    id: stale.id,
                    kind: stale.kind(),
                    executed: false,
                };
                self.emit(event);
            }
        }
    }

    // ------------------------------------------------------------------
    // Voting
    // ------------------------------------------------------------------

    pub fn vote_add(&mut self, caller: Address, now: u64) -> Result<Receipt> {
        self.vote(ProposalKind::Add, caller, now)
    }

    pub fn vote_mod(&mut self, caller: Address, now: u64) -> Result<Receipt> {
        self.vote(ProposalKind::Mod, caller, now)
    }

    pub fn vote_change(&mut self, caller: Address, now: u64) -> Result<Receipt> {
        self.vote(ProposalKind::Change, caller, now)
    }

    pub fn vote_withdraw(&mut self, caller: Address, now: u64) -> Result<Receipt> {
        self.vote(ProposalKind::Withdraw, caller, now)
    }

    /// Vote on the open proposal of `kind` with the caller's live balance.
    pub fn vote(&mut self, kind: ProposalKind, caller: Address, now: u64) -> Result<Receipt> {
        self.transact(|engine| {
            let id = engine
                .state
                .slot
                .occupant_of(kind)
                .ok_or(GovernanceError::NoOngoingProposal(kind))?;
            let proposal = engine.state.store.require(id)?;
            if !proposal.is_open {
                return Err(GovernanceError::NoOngoingProposal(kind));
            }
            if proposal.is_expired(now) {
                return Err(GovernanceError::ProposalExpired(id));
            }

            let weight = engine.ledger.balance_of(&caller);
            if weight == 0 {
                return Err(GovernanceError::MustHoldShareTokens);
            }
            if engine.state.store.has_voted(id, &caller) {
                return Err(GovernanceError::AlreadyVoted(id));
            }

            let outcome = engine.record_vote(id, caller, weight, now)?;
            Ok(Receipt {
                proposal_id: id,
                outcome,
            })
        })
    }

    /// Shared by initiation and voting: count the vote, then tally.
    fn record_vote(
        &mut self,
        id: u64,
        voter: Address,
        weight: Amount,
        now: u64,
    ) -> Result<TallyOutcome> {
        if !self.state.store.mark_voted(id, voter) {
            return Err(GovernanceError::AlreadyVoted(id));
        }
        let proposal = self.state.store.require_mut(id)?;
        proposal.voting_power = proposal
            .voting_power
            .checked_add(weight)
            .ok_or(GovernanceError::ArithmeticOverflow)?;
        let kind = proposal.kind();

        self.emit(GovernanceEvent::VoteCast {
            id,
            kind,
            voter,
            weight,
        });
        self.tally_and_maybe_execute(id, now)
    }

    // ------------------------------------------------------------------
    // Tally and execution
    // ------------------------------------------------------------------

    /// Re-evaluate proposal `id`. A closed proposal is left untouched.
    pub fn tally(&mut self, id: u64, now: u64) -> Result<TallyOutcome> {
        self.transact(|engine| engine.tally_and_maybe_execute(id, now))
    }

    fn tally_and_maybe_execute(&mut self, id: u64, now: u64) -> Result<TallyOutcome> {
        let proposal = self.state.store.require(id)?.clone();
        if !proposal.is_open {
            return Ok(TallyOutcome::Closed);
        }

        let total_supply = self.ledger.total_supply();
        if total_supply == 0 {
            return Err(GovernanceError::TotalSupplyZero);
        }
        if proposal.is_expired(now) {
            return Ok(TallyOutcome::Expired);
        }

        let threshold = approval_threshold(total_supply, self.state.majority_percentage)?;
        if proposal.voting_power < threshold {
            debug!(
                proposal_id = id,
                voting_power = %proposal.voting_power,
                threshold = %threshold,
                "Threshold not reached"
            );
            return Ok(TallyOutcome::Pending {
                voting_power: proposal.voting_power,
                threshold,
            });
        }

        // External calls first; local closure only once they all succeeded
        self.execute_action(&proposal.payload, total_supply)?;

        self.state.store.require_mut(id)?.is_open = false;
        if self.state.slot.proposal_id() == id {
            self.state.slot.release();
        }
        let kind = proposal.kind();
        self.emit(GovernanceEvent::ProposalExecuted { id, kind });
        self.emit(GovernanceEvent::ProposalEnded {
            id,
            kind,
            executed: true,
        });
        Ok(TallyOutcome::Executed)
    }

    fn execute_action(&mut self, payload: &ProposalPayload, total_supply: Amount) -> Result<()> {
        match payload {
            ProposalPayload::Add(add) => {
                self.registry
                    .add_merchant(add.print_quota, &add.merchant, &add.merchant_name)?;
                let minted = merchant_mint_amount(total_supply, self.state.mint_multiplier)?;
                if minted > 0 {
                    self.ledger.mint(&add.merchant, minted)?;
                }
            }
            ProposalPayload::Mod(modify) => {
                self.registry.mod_merchant_state(
                    &modify.merchant,
                    &modify.new_guardian,
                    modify.freeze,
                    modify.print_quota,
                    modify.spending_rebate,
                )?;
            }
            ProposalPayload::Change(change) => {
                self.state.majority_percentage = change.new_majority_percentage;
                self.state.mint_multiplier = change.new_mint_multiplier;
            }
            ProposalPayload::Withdraw(withdraw) => {
                self.registry.withdraw_tokens_and_eth(withdraw.asset)?;
                let held = self.custody.balance(withdraw.asset, &self.account);
                if held > 0 {
                    self.custody
                        .send(withdraw.asset, &self.account, &withdraw.initiator, held)?;
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Transfer guard
    // ------------------------------------------------------------------

    pub fn transfer(&mut self, from: Address, to: Address, amount: Amount, now: u64) -> Result<()> {
        self.transact(|engine| {
            engine.check_transfer(&from, &to, now)?;
            engine.ledger.transfer(&from, &to, amount)?;
            Ok(())
        })
    }

    pub fn transfer_from(
        &mut self,
        spender: Address,
        owner: Address,
        to: Address,
        amount: Amount,
        now: u64,
    ) -> Result<()> {
        self.transact(|engine| {
            engine.check_transfer(&owner, &to, now)?;
            engine.ledger.transfer_from(&spender, &owner, &to, amount)?;
            Ok(())
        })
    }

    /// Allowances move no balance and are never locked.
    pub fn approve(&mut self, owner: Address, spender: Address, amount: Amount) -> Result<()> {
        self.transact(|engine| {
            engine.ledger.approve(&owner, &spender, amount)?;
            Ok(())
        })
    }

    fn check_transfer(&self, from: &Address, to: &Address, now: u64) -> Result<()> {
        if from.is_zero() || to.is_zero() {
            return Ok(());
        }
        if self.is_any_proposal_active(now) {
            return Err(GovernanceError::TransfersLocked);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn is_any_proposal_active(&self, now: u64) -> bool {
        self.state.slot.is_active(&self.state.store, now)
    }

    pub fn is_merchant(&self, merchant: &Address) -> Result<bool> {
        Ok(self.registry.is_merchant(merchant)?)
    }

    pub fn proposal_type(&self, id: u64) -> ProposalKind {
        self.state.store.kind_of(id)
    }

    pub fn proposal<P: KindPayload>(&self, id: u64) -> Result<ProposalView<P>> {
        self.state.store.view::<P>(id)
    }

    pub fn get_add_proposal(&self, id: u64) -> Result<AddProposal> {
        self.proposal(id)
    }

    pub fn get_mod_proposal(&self, id: u64) -> Result<ModProposal> {
        self.proposal(id)
    }

    pub fn get_change_proposal(&self, id: u64) -> Result<ChangeProposal> {
        self.proposal(id)
    }

    pub fn get_withdraw_proposal(&self, id: u64) -> Result<WithdrawProposal> {
        self.proposal(id)
    }

    pub fn proposal_state(&self, id: u64, now: u64) -> Result<ProposalState> {
        Ok(self.state.store.require(id)?.state(now))
    }

    pub fn has_voted(&self, id: u64, account: &Address) -> bool {
        self.state.store.has_voted(id, account)
    }

    pub fn current_proposal_id(&self) -> u64 {
        self.state.store.last_id()
    }

    pub fn majority_percentage(&self) -> u8 {
        self.state.majority_percentage
    }

    pub fn mint_multiplier(&self) -> u8 {
        self.state.mint_multiplier
    }

    /// Votes currently needed to pass a proposal.
    pub fn threshold(&self) -> Result<Amount> {
        approval_threshold(self.ledger.total_supply(), self.state.majority_percentage)
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn state(&self) -> &GovernanceState {
        &self.state
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn custody(&self) -> &C {
        &self.custody
    }

    /// Drain the events of every committed call so far.
    pub fn take_events(&mut self) -> Vec<GovernanceEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn into_parts(self) -> (GovernanceState, L, R, C) {
        (self.state, self.ledger, self.registry, self.custody)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn emit(&mut self, event: GovernanceEvent) {
        self.events.push(event);
    }

    /// Run `op` all-or-nothing across the engine and its collaborators.
    fn transact<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let checkpoint = self.state.clone();
        let event_mark = self.events.len();
        self.ledger.begin();
        self.registry.begin();
        self.custody.begin();

        match op(self) {
            Ok(value) => {
                self.custody.commit();
                self.registry.commit();
                self.ledger.commit();
                for event in &self.events[event_mark..] {
                    event.log();
                }
                Ok(value)
            }
            Err(err) => {
                self.custody.rollback();
                self.registry.rollback();
                self.ledger.rollback();
                self.state = checkpoint;
                self.events.truncate(event_mark);
                warn!(error = %err, "Governance call reverted");
                Err(err)
            }
        }
    }
}
