//! Token amounts
//!
//! Balances and supply are unsigned and never wrap: every credit goes
//! through `checked_add` and surfaces overflow as an error.

use crate::{CovenantError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of token units, in the smallest indivisible unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenAmount(pub u128);

impl TokenAmount {
    /// Largest representable balance or supply
    pub const MAX: TokenAmount = TokenAmount(u128::MAX);

    pub fn zero() -> Self {
        Self(0)
    }

    pub fn new(value: u128) -> Self {
        Self(value)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// Add, mapping overflow to [`CovenantError::ArithmeticOverflow`]
    pub fn try_add(self, other: Self) -> Result<Self> {
        self.checked_add(other)
            .ok_or(CovenantError::ArithmeticOverflow {
                current: self.0,
                added: other.0,
            })
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u128> for TokenAmount {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

impl From<u64> for TokenAmount {
    fn from(value: u64) -> Self {
        Self(value as u128)
    }
}
