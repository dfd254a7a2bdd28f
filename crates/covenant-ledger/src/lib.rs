//! Covenant Ledger - Custodial token ledger
//!
//! The ledger is:
//! - Account-keyed by AccountId
//! - Supply-tracked (total supply always equals the sum of balances)
//! - Owner-gated for minting, with one optional authorized minter
//! - All-or-nothing (a failed operation mutates nothing)
//!
//! # Invariants
//!
//! 1. No negative balances
//! 2. Arithmetic never wraps; overflow fails the operation
//! 3. `mint` is the only path by which tokens enter circulation
//! 4. The ledger trusts only its stored principals, never a caller's role

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use covenant_types::{
    ensure_one_of, ensure_owner, AccountId, CovenantError, CovenantEvent, Credit, EventLog,
    EventRecord, Result, TokenAmount, TokenProvider,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

/// Point-in-time view of the account table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub ledger: AccountId,
    pub owner: AccountId,
    pub authorized_minter: Option<AccountId>,
    pub balances: BTreeMap<AccountId, TokenAmount>,
    pub total_supply: TokenAmount,
}

#[derive(Debug)]
struct LedgerState {
    owner: AccountId,
    authorized_minter: Option<AccountId>,
    balances: HashMap<AccountId, TokenAmount>,
    total_supply: TokenAmount,
    events: EventLog,
}

impl LedgerState {
    fn balance(&self, account: &AccountId) -> TokenAmount {
        self.balances.get(account).copied().unwrap_or_default()
    }

    /// Credit every account or none.
    ///
    /// All new balances and the new supply are computed before anything is
    /// written, so an overflow on any credit leaves the state untouched.
    fn apply_credits(&mut self, caller: &AccountId, credits: &[Credit]) -> Result<()> {
        ensure_one_of(caller, &self.owner, self.authorized_minter.as_ref())?;

        let mut staged: HashMap<AccountId, TokenAmount> = HashMap::new();
        let mut supply = self.total_supply;
        for credit in credits {
            let current = match staged.get(&credit.account) {
                Some(balance) => *balance,
                None => self.balance(&credit.account),
            };
            let balance = current.try_add(credit.amount)?;
            supply = supply.try_add(credit.amount)?;
            staged.insert(credit.account, balance);
        }

        self.balances.extend(staged);
        self.total_supply = supply;
        for credit in credits {
            self.events.emit(CovenantEvent::TokensMinted {
                account: credit.account,
                amount: credit.amount,
            });
        }
        Ok(())
    }
}

/// The Covenant token ledger
///
/// Cloning yields another handle to the same ledger.
#[derive(Debug, Clone)]
pub struct TokenLedger {
    address: AccountId,
    state: Arc<RwLock<LedgerState>>,
}

impl TokenLedger {
    /// Deploy a new ledger owned by `owner`, with zero supply and no minter
    pub fn new(owner: AccountId) -> Self {
        let address = AccountId::new();
        Self {
            address,
            state: Arc::new(RwLock::new(LedgerState {
                owner,
                authorized_minter: None,
                balances: HashMap::new(),
                total_supply: TokenAmount::zero(),
                events: EventLog::new(address),
            })),
        }
    }

    /// Account id this ledger is deployed under
    pub fn address(&self) -> AccountId {
        self.address
    }

    pub async fn owner(&self) -> AccountId {
        self.state.read().await.owner
    }

    pub async fn authorized_minter(&self) -> Option<AccountId> {
        self.state.read().await.authorized_minter
    }

    /// Designate the single account allowed to mint besides the owner.
    ///
    /// Overwrites any previous minter unconditionally.
    pub async fn set_authorized_minter(&self, caller: &AccountId, minter: AccountId) -> Result<()> {
        let mut state = self.state.write().await;
        if let Err(err) = ensure_owner(caller, &state.owner) {
            warn!("Rejected set_authorized_minter from {}", caller);
            return Err(err);
        }

        state.authorized_minter = Some(minter);
        state.events.emit(CovenantEvent::AuthorizedMinterSet { minter });
        info!("Ledger {} authorized minter set to {}", self.address, minter);
        Ok(())
    }

    /// Mint `amount` to `account`
    ///
    /// Returns the account's new balance.
    pub async fn mint(
        &self,
        caller: &AccountId,
        account: &AccountId,
        amount: TokenAmount,
    ) -> Result<TokenAmount> {
        let mut state = self.state.write().await;
        if let Err(err) = state.apply_credits(caller, &[Credit::new(*account, amount)]) {
            warn!("Mint of {} to {} by {} failed: {}", amount, account, caller, err);
            return Err(err);
        }

        let balance = state.balance(account);
        info!(
            "Minted {} to {} (balance {}, supply {})",
            amount, account, balance, state.total_supply
        );
        Ok(balance)
    }

    /// Move `amount` from the caller's balance to `to`
    pub async fn transfer(
        &self,
        caller: &AccountId,
        to: &AccountId,
        amount: TokenAmount,
    ) -> Result<()> {
        let mut state = self.state.write().await;

        let available = state.balance(caller);
        let remaining = match available.checked_sub(amount) {
            Some(remaining) => remaining,
            None => {
                warn!(
                    "Transfer of {} from {} rejected: balance {}",
                    amount, caller, available
                );
                return Err(CovenantError::InsufficientBalance {
                    account: caller.to_string(),
                    available: available.0,
                    required: amount.0,
                });
            }
        };

        if caller != to {
            // Bounded by total supply, so this only fails on a broken invariant.
            let credited = state.balance(to).try_add(amount)?;
            state.balances.insert(*caller, remaining);
            state.balances.insert(*to, credited);
        }

        state.events.emit(CovenantEvent::Transferred {
            from: *caller,
            to: *to,
            amount,
        });
        info!("Transferred {} from {} to {}", amount, caller, to);
        Ok(())
    }

    /// Balance of `account`, zero if never credited
    pub async fn balance_of(&self, account: &AccountId) -> TokenAmount {
        self.state.read().await.balance(account)
    }

    pub async fn total_supply(&self) -> TokenAmount {
        self.state.read().await.total_supply
    }

    /// All committed ledger events, oldest first
    pub async fn events(&self) -> Vec<EventRecord> {
        self.state.read().await.events.records().to_vec()
    }

    pub async fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.state.read().await.events.subscribe()
    }

    pub async fn snapshot(&self) -> LedgerSnapshot {
        let state = self.state.read().await;
        LedgerSnapshot {
            ledger: self.address,
            owner: state.owner,
            authorized_minter: state.authorized_minter,
            balances: state
                .balances
                .iter()
                .map(|(account, balance)| (*account, *balance))
                .collect(),
            total_supply: state.total_supply,
        }
    }
}

#[async_trait::async_trait]
impl TokenProvider for TokenLedger {
    fn provider_id(&self) -> AccountId {
        self.address
    }

    async fn mint_all(&self, caller: &AccountId, credits: &[Credit]) -> Result<()> {
        let mut state = self.state.write().await;
        if let Err(err) = state.apply_credits(caller, credits) {
            warn!("Settlement by {} rejected: {}", caller, err);
            return Err(err);
        }
        debug!(
            "Settled {} credits for {} (supply {})",
            credits.len(),
            caller,
            state.total_supply
        );
        Ok(())
    }
}
