//! In-memory collaborators for tests and local tooling.
//!
//! A [`Sandbox`] models one chain: the share-token ledger, a merchant
//! registry holding a treasury, and custody of native currency and other
//! tokens. The ledger, registry and custody handles all point at the same
//! state and journal it, so an engine rollback undoes their effects too.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::error::CollaboratorError;
use crate::ledger::{BalanceLedger, CallResult, Custody, MerchantRegistry, Transactional};
use crate::types::{Address, Amount, Asset};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MerchantRecord {
    pub name: String,
    pub print_quota: Amount,
    pub spending_rebate: Amount,
    pub guardian: Address,
    pub frozen: bool,
}

/// Serializable chain state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChainState {
    pub voting_token: Address,
    pub registry_account: Address,
    pub governance_account: Address,
    pub total_supply: Amount,
    pub shares: BTreeMap<Address, Amount>,
    /// owner -> spender -> allowance
    pub allowances: BTreeMap<Address, BTreeMap<Address, Amount>>,
    /// asset (as rendered by `Asset::to_string`) -> holder -> balance
    pub holdings: BTreeMap<String, BTreeMap<Address, Amount>>,
    pub merchants: BTreeMap<Address, MerchantRecord>,
}

impl ChainState {
    pub fn new(governance_account: Address) -> Self {
        Self {
            voting_token: Address::repeat_byte(0x70),
            registry_account: Address::repeat_byte(0x7e),
            governance_account,
            total_supply: 0,
            shares: BTreeMap::new(),
            allowances: BTreeMap::new(),
            holdings: BTreeMap::new(),
            merchants: BTreeMap::new(),
        }
    }

    fn share_balance(&self, who: &Address) -> Amount {
        self.shares.get(who).copied().unwrap_or(0)
    }

    /// Issue new shares to `to`, growing the supply.
    fn issue_shares(&mut self, to: &Address, amount: Amount) -> CallResult<()> {
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or_else(|| CollaboratorError::new("supply overflow"))?;
        let credited = self
            .share_balance(to)
            .checked_add(amount)
            .ok_or_else(|| CollaboratorError::new("balance overflow"))?;
        self.total_supply = supply;
        self.shares.insert(*to, credited);
        Ok(())
    }

    fn credit_asset(&mut self, asset: Asset, holder: &Address, amount: Amount) -> CallResult<()> {
        if asset == Asset::Token(self.voting_token) {
            return self.issue_shares(holder, amount);
        }
        let credited = self
            .asset_balance(asset, holder)
            .checked_add(amount)
            .ok_or_else(|| {
                CollaboratorError::new(format!("{} balance overflow", asset))
            })?;
        self.holdings
            .entry(asset.to_string())
            .or_default()
            .insert(*holder, credited);
        Ok(())
    }

    fn move_shares(&mut self, from: &Address, to: &Address, amount: Amount) -> CallResult<()> {
        let available = self.share_balance(from);
        if available < amount {
            return Err(CollaboratorError::new(format!(
                "insufficient balance: {} has {}, needs {}",
                from, available, amount
            )));
        }
        self.shares.insert(*from, available - amount);
        if to.is_zero() {
            self.total_supply -= amount;
        } else {
            let credited = self
                .share_balance(to)
                .checked_add(amount)
                .ok_or_else(|| CollaboratorError::new("balance overflow"))?;
            self.shares.insert(*to, credited);
        }
        Ok(())
    }

    fn asset_balance(&self, asset: Asset, holder: &Address) -> Amount {
        if asset == Asset::Token(self.voting_token) {
            return self.share_balance(holder);
        }
        self.holdings
            .get(&asset.to_string())
            .and_then(|by_holder| by_holder.get(holder))
            .copied()
            .unwrap_or(0)
    }

    fn move_asset(
        &mut self,
        asset: Asset,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> CallResult<()> {
        if asset == Asset::Token(self.voting_token) {
            return self.move_shares(from, to, amount);
        }
        let available = self.asset_balance(asset, from);
        if available < amount {
            return Err(CollaboratorError::new(format!(
                "insufficient {} balance: {} has {}, needs {}",
                asset, from, available, amount
            )));
        }
        if from == to {
            return Ok(());
        }
        let credited = self
            .asset_balance(asset, to)
            .checked_add(amount)
            .ok_or_else(|| {
                CollaboratorError::new(format!("{} balance overflow", asset))
            })?;
        let by_holder = self.holdings.entry(asset.to_string()).or_default();
        by_holder.insert(*from, available - amount);
        by_holder.insert(*to, credited);
        Ok(())
    }
}

/// External calls the sandbox can log and be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SandboxCall {
    Approve,
    Transfer,
    TransferFrom,
    Mint,
    AddMerchant,
    ModMerchantState,
    IsMerchant,
    WithdrawTokensAndEth,
    Send,
}

/// Callback run inside `add_merchant`, before the registry applies it.
pub type RegistryHook = Box<dyn FnMut() -> CallResult<()> + Send>;

struct SandboxInner {
    state: ChainState,
    journal: Vec<ChainState>,
    failing: BTreeSet<SandboxCall>,
    call_log: Vec<SandboxCall>,
    add_merchant_hook: Option<RegistryHook>,
}

impl SandboxInner {
    fn enter(&mut self, call: SandboxCall) -> CallResult<()> {
        self.call_log.push(call);
        if self.failing.contains(&call) {
            return Err(CollaboratorError::new(format!("{:?} rejected", call)));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct Sandbox {
    inner: Arc<Mutex<SandboxInner>>,
}

impl Sandbox {
    pub fn new(governance_account: Address) -> Self {
        Self::from_state(ChainState::new(governance_account))
    }

    pub fn from_state(state: ChainState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SandboxInner {
                state,
                journal: Vec::new(),
                failing: BTreeSet::new(),
                call_log: Vec::new(),
                add_merchant_hook: None,
            })),
        }
    }

    pub fn ledger(&self) -> SandboxLedger {
        SandboxLedger(self.clone())
    }

    pub fn registry(&self) -> SandboxRegistry {
        SandboxRegistry(self.clone())
    }

    pub fn custody(&self) -> SandboxCustody {
        SandboxCustody(self.clone())
    }

    pub fn snapshot(&self) -> ChainState {
        self.inner.lock().state.clone()
    }

    pub fn voting_token(&self) -> Address {
        self.inner.lock().state.voting_token
    }

    pub fn registry_account(&self) -> Address {
        self.inner.lock().state.registry_account
    }

    /// Issue shares outside governance (genesis allocation).
    pub fn mint_shares(&self, to: Address, amount: Amount) -> CallResult<()> {
        self.inner.lock().state.issue_shares(&to, amount)
    }

    pub fn share_balance(&self, who: &Address) -> Amount {
        self.inner.lock().state.share_balance(who)
    }

    pub fn total_supply(&self) -> Amount {
        self.inner.lock().state.total_supply
    }

    /// Credit `holder` with `amount` of an asset.
    pub fn credit(&self, asset: Asset, holder: Address, amount: Amount) -> CallResult<()> {
        self.inner.lock().state.credit_asset(asset, &holder, amount)
    }

    /// Put funds into the registry treasury.
    pub fn fund_registry(&self, asset: Asset, amount: Amount) -> CallResult<()> {
        let registry = self.registry_account();
        self.credit(asset, registry, amount)
    }

    pub fn asset_balance(&self, asset: Asset, holder: &Address) -> Amount {
        self.inner.lock().state.asset_balance(asset, holder)
    }

    pub fn register_merchant(&self, merchant: Address, record: MerchantRecord) {
        self.inner.lock().state.merchants.insert(merchant, record);
    }

    pub fn merchant(&self, merchant: &Address) -> Option<MerchantRecord> {
        self.inner.lock().state.merchants.get(merchant).cloned()
    }

    /// Make every subsequent `call` fail.
    pub fn fail_on(&self, call: SandboxCall) {
        self.inner.lock().failing.insert(call);
    }

    pub fn clear_failures(&self) {
        self.inner.lock().failing.clear();
    }

    /// Every external call received so far, in order, including failed ones.
    pub fn call_log(&self) -> Vec<SandboxCall> {
        self.inner.lock().call_log.clone()
    }

    pub fn count_calls(&self, call: SandboxCall) -> usize {
        self.inner.lock().call_log.iter().filter(|c| **c == call).count()
    }

    pub fn set_add_merchant_hook(&self, hook: RegistryHook) {
        self.inner.lock().add_merchant_hook = Some(hook);
    }

    fn begin(&self) {
        let mut inner = self.inner.lock();
        let checkpoint = inner.state.clone();
        inner.journal.push(checkpoint);
    }

    fn commit(&self) {
        self.inner.lock().journal.pop();
    }

    fn rollback(&self) {
        let mut inner = self.inner.lock();
        if let Some(checkpoint) = inner.journal.pop() {
            inner.state = checkpoint;
        }
    }
}

macro_rules! journaled_handle {
    ($name:ident) => {
        #[derive(Clone)]
        pub struct $name(Sandbox);

        impl $name {
            pub fn sandbox(&self) -> &Sandbox {
                &self.0
            }
        }

        impl Transactional for $name {
            fn begin(&mut self) {
                self.0.begin();
            }

            fn commit(&mut self) {
                self.0.commit();
            }

            fn rollback(&mut self) {
                self.0.rollback();
            }
        }
    };
}

journaled_handle!(SandboxLedger);
journaled_handle!(SandboxRegistry);
journaled_handle!(SandboxCustody);

impl BalanceLedger for SandboxLedger {
    fn balance_of(&self, account: &Address) -> Amount {
        self.0.share_balance(account)
    }

    fn total_supply(&self) -> Amount {
        self.0.total_supply()
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        let inner = self.0.inner.lock();
        inner
            .state
            .allowances
            .get(owner)
            .and_then(|by_spender| by_spender.get(spender))
            .copied()
            .unwrap_or(0)
    }

    fn approve(&mut self, owner: &Address, spender: &Address, amount: Amount) -> CallResult<()> {
        let mut inner = self.0.inner.lock();
        inner.enter(SandboxCall::Approve)?;
        inner
            .state
            .allowances
            .entry(*owner)
            .or_default()
            .insert(*spender, amount);
        Ok(())
    }

    fn transfer(&mut self, from: &Address, to: &Address, amount: Amount) -> CallResult<()> {
        let mut inner = self.0.inner.lock();
        inner.enter(SandboxCall::Transfer)?;
        if from.is_zero() {
            return Err(CollaboratorError::new("transfer from the zero address"));
        }
        inner.state.move_shares(from, to, amount)
    }

    fn transfer_from(
        &mut self,
        spender: &Address,
        owner: &Address,
        to: &Address,
        amount: Amount,
    ) -> CallResult<()> {
        let mut inner = self.0.inner.lock();
        inner.enter(SandboxCall::TransferFrom)?;
        let allowed = inner
            .state
            .allowances
            .get(owner)
            .and_then(|by_spender| by_spender.get(spender))
            .copied()
            .unwrap_or(0);
        if allowed < amount {
            return Err(CollaboratorError::new(format!(
                "insufficient allowance: {} allows {} only {}",
                owner, spender, allowed
            )));
        }
        inner.state.move_shares(owner, to, amount)?;
        inner
            .state
            .allowances
            .entry(*owner)
            .or_default()
            .insert(*spender, allowed - amount);
        Ok(())
    }

    fn mint(&mut self, to: &Address, amount: Amount) -> CallResult<()> {
        let mut inner = self.0.inner.lock();
        inner.enter(SandboxCall::Mint)?;
        inner.state.issue_shares(to, amount)
    }
}

impl MerchantRegistry for SandboxRegistry {
    fn add_merchant(
        &mut self,
        print_quota: Amount,
        merchant: &Address,
        name: &str,
    ) -> CallResult<()> {
        // Run the hook without holding the lock; it may call back into governance
        let hook = {
            let mut inner = self.0.inner.lock();
            inner.enter(SandboxCall::AddMerchant)?;
            inner.add_merchant_hook.take()
        };
        if let Some(mut hook) = hook {
            let result = hook();
            self.0.inner.lock().add_merchant_hook = Some(hook);
            result?;
        }

        let mut inner = self.0.inner.lock();
        if inner.state.merchants.contains_key(merchant) {
            return Err(CollaboratorError::new(format!(
                "merchant {} already registered",
                merchant
            )));
        }
        inner.state.merchants.insert(
            *merchant,
            MerchantRecord {
                name: name.to_string(),
                print_quota,
                ..MerchantRecord::default()
            },
        );
        Ok(())
    }

    fn mod_merchant_state(
        &mut self,
        merchant: &Address,
        guardian: &Address,
        freeze: bool,
        print_quota: Amount,
        spending_rebate: Amount,
    ) -> CallResult<()> {
        let mut inner = self.0.inner.lock();
        inner.enter(SandboxCall::ModMerchantState)?;
        let record = inner
            .state
            .merchants
            .get_mut(merchant)
            .ok_or_else(|| {
                CollaboratorError::new(format!("unknown merchant {}", merchant))
            })?;
        record.guardian = *guardian;
        record.frozen = freeze;
        record.print_quota = print_quota;
        record.spending_rebate = spending_rebate;
        Ok(())
    }

    fn is_merchant(&self, merchant: &Address) -> CallResult<bool> {
        let mut inner = self.0.inner.lock();
        inner.enter(SandboxCall::IsMerchant)?;
        Ok(inner.state.merchants.contains_key(merchant))
    }

    fn withdraw_tokens_and_eth(&mut self, asset: Asset) -> CallResult<()> {
        let mut inner = self.0.inner.lock();
        inner.enter(SandboxCall::WithdrawTokensAndEth)?;
        let registry = inner.state.registry_account;
        let owner = inner.state.governance_account;
        let held = inner.state.asset_balance(asset, &registry);
        if held > 0 {
            inner.state.move_asset(asset, &registry, &owner, held)?;
        }
        Ok(())
    }
}

impl Custody for SandboxCustody {
    fn balance(&self, asset: Asset, holder: &Address) -> Amount {
        self.0.asset_balance(asset, holder)
    }

    fn send(
        &mut self,
        asset: Asset,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> CallResult<()> {
        let mut inner = self.0.inner.lock();
        inner.enter(SandboxCall::Send)?;
        inner.state.move_asset(asset, from, to, amount)
    }
}
