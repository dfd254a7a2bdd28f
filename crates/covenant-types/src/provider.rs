//! Token provider capability
//!
//! The registry never touches balances directly. It holds an
//! `Arc<dyn TokenProvider>` handed to it by its owner and presents its own
//! account id as caller; the provider decides independently whether that
//! caller may mint.

use crate::{AccountId, Result, TokenAmount};
use serde::{Deserialize, Serialize};

/// A single settlement credit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credit {
    pub account: AccountId,
    pub amount: TokenAmount,
}

impl Credit {
    pub fn new(account: AccountId, amount: TokenAmount) -> Self {
        Self { account, amount }
    }
}

/// Privileged minting surface exposed to other components
#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync {
    /// Account id the provider is deployed under
    fn provider_id(&self) -> AccountId;

    /// Apply every credit or none of them.
    ///
    /// Fails with `UnauthorizedCaller` unless `caller` is the provider's
    /// owner or its authorized minter, and with `ArithmeticOverflow` if any
    /// credit would overflow a balance or the total supply.
    async fn mint_all(&self, caller: &AccountId, credits: &[Credit]) -> Result<()>;
}
