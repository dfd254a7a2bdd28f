//! Agreement types for Covenant
//!
//! An agreement binds two participants and a punishment stake. It starts
//! `Open` and moves exactly once into one of five terminal states.

use crate::{AccountId, AgreementId, Credit, TokenAmount};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of an agreement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgreementStatus {
    /// Awaiting resolution or cancellation
    Open,
    /// Both participants fulfilled their obligation
    BothFulfilled,
    /// Only participant one failed
    FirstFailed,
    /// Only participant two failed
    SecondFailed,
    /// Neither participant fulfilled
    BothFailed,
    /// Withdrawn before resolution, no tokens moved
    Canceled,
}

impl AgreementStatus {
    /// Map the fulfillment flags recorded by the authority to a terminal status
    pub fn from_fulfillment(first_fulfilled: bool, second_fulfilled: bool) -> Self {
        match (first_fulfilled, second_fulfilled) {
            (true, true) => Self::BothFulfilled,
            (false, true) => Self::FirstFailed,
            (true, false) => Self::SecondFailed,
            (false, false) => Self::BothFailed,
        }
    }

    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Open)
    }
}

impl fmt::Display for AgreementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Open => "Open",
            Self::BothFulfilled => "BothFulfilled",
            Self::FirstFailed => "FirstFailed",
            Self::SecondFailed => "SecondFailed",
            Self::BothFailed => "BothFailed",
            Self::Canceled => "Canceled",
        };
        f.write_str(name)
    }
}

/// An agreement record as stored by the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agreement {
    pub id: AgreementId,
    pub participant1: AccountId,
    pub participant2: AccountId,
    /// Stake fixed at creation
    pub punishment: TokenAmount,
    pub status: AgreementStatus,
}

impl Agreement {
    pub fn new(
        id: AgreementId,
        participant1: AccountId,
        participant2: AccountId,
        punishment: TokenAmount,
    ) -> Self {
        Self {
            id,
            participant1,
            participant2,
            punishment,
            status: AgreementStatus::Open,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == AgreementStatus::Open
    }

    /// Credits owed when the agreement closes with `status`.
    ///
    /// The failing participant is the one credited with the punishment.
    /// Zero punishments produce no credits.
    pub fn settlement_credits(&self, status: AgreementStatus) -> Vec<Credit> {
        let (first, second) = match status {
            AgreementStatus::FirstFailed => (true, false),
            AgreementStatus::SecondFailed => (false, true),
            AgreementStatus::BothFailed => (true, true),
            AgreementStatus::Open
            | AgreementStatus::BothFulfilled
            | AgreementStatus::Canceled => (false, false),
        };

        if self.punishment.is_zero() {
            return Vec::new();
        }

        let mut credits = Vec::with_capacity(2);
        if first {
            credits.push(Credit::new(self.participant1, self.punishment));
        }
        if second {
            credits.push(Credit::new(self.participant2, self.punishment));
        }
        credits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agreement(punishment: u128) -> Agreement {
        Agreement::new(
            AgreementId::new(1),
            AccountId::new(),
            AccountId::new(),
            TokenAmount::new(punishment),
        )
    }

    #[test]
    fn test_status_from_fulfillment() {
        use AgreementStatus::*;
        assert_eq!(AgreementStatus::from_fulfillment(true, true), BothFulfilled);
        assert_eq!(AgreementStatus::from_fulfillment(false, true), FirstFailed);
        assert_eq!(AgreementStatus::from_fulfillment(true, false), SecondFailed);
        assert_eq!(AgreementStatus::from_fulfillment(false, false), BothFailed);
    }

    #[test]
    fn test_only_open_is_not_terminal() {
        assert!(!AgreementStatus::Open.is_terminal());
        assert!(AgreementStatus::Canceled.is_terminal());
        assert!(AgreementStatus::BothFulfilled.is_terminal());
    }

    #[test]
    fn test_settlement_credits_failing_participants() {
        let a = agreement(13031);

        assert!(a.settlement_credits(AgreementStatus::BothFulfilled).is_empty());
        assert!(a.settlement_credits(AgreementStatus::Canceled).is_empty());

        let first = a.settlement_credits(AgreementStatus::FirstFailed);
        assert_eq!(first, vec![Credit::new(a.participant1, a.punishment)]);

        let second = a.settlement_credits(AgreementStatus::SecondFailed);
        assert_eq!(second, vec![Credit::new(a.participant2, a.punishment)]);

        let both = a.settlement_credits(AgreementStatus::BothFailed);
        assert_eq!(both.len(), 2);
    }

    #[test]
    fn test_zero_punishment_has_no_credits() {
        let a = agreement(0);
        assert!(a.settlement_credits(AgreementStatus::BothFailed).is_empty());
    }
}
