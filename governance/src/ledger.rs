//! Interfaces to the external collaborators the engine calls out to.
//!
//! All three are treated as untrusted: any call may fail, and a failure
//! aborts the governance operation that issued it. Implementations that can
//! journal their own state should override [`Transactional`] so the engine
//! can roll them back together with its own state.

use crate::error::CollaboratorError;
use crate::types::{Address, Amount, Asset};

pub type CallResult<T> = std::result::Result<T, CollaboratorError>;

/// Checkpoint hooks driven by the engine around every state-changing call.
pub trait Transactional {
    fn begin(&mut self) {}
    fn commit(&mut self) {}
    fn rollback(&mut self) {}
}

/// Fungible balance ledger of the voting (share) token.
pub trait BalanceLedger: Transactional {
    fn balance_of(&self, account: &Address) -> Amount;

    fn total_supply(&self) -> Amount;

    fn allowance(&self, owner: &Address, spender: &Address) -> Amount;

    fn approve(&mut self, owner: &Address, spender: &Address, amount: Amount) -> CallResult<()>;

    fn transfer(&mut self, from: &Address, to: &Address, amount: Amount) -> CallResult<()>;

    /// Move `amount` from `owner` to `to`, spending `spender`'s allowance.
    fn transfer_from(
        &mut self,
        spender: &Address,
        owner: &Address,
        to: &Address,
        amount: Amount,
    ) -> CallResult<()>;

    /// Only the governance engine mints.
    fn mint(&mut self, to: &Address, amount: Amount) -> CallResult<()>;
}

/// Merchant registry and treasury service.
pub trait MerchantRegistry: Transactional {
    fn add_merchant(
        &mut self,
        print_quota: Amount,
        merchant: &Address,
        name: &str,
    ) -> CallResult<()>;

    fn mod_merchant_state(
        &mut self,
        merchant: &Address,
        guardian: &Address,
        freeze: bool,
        print_quota: Amount,
        spending_rebate: Amount,
    ) -> CallResult<()>;

    fn is_merchant(&self, merchant: &Address) -> CallResult<bool>;

    /// Release the registry's whole holding of `asset` to its governance owner.
    fn withdraw_tokens_and_eth(&mut self, asset: Asset) -> CallResult<()>;
}

/// Custody of native currency and arbitrary tokens.
pub trait Custody: Transactional {
    fn balance(&self, asset: Asset, holder: &Address) -> Amount;

    fn send(&mut self, asset: Asset, from: &Address, to: &Address, amount: Amount)
        -> CallResult<()>;
}
