//! Error types for Covenant
//!
//! Every failure is synchronous and local to the call that raised it. A
//! failed operation leaves no partial mutation behind, including mutation
//! attempted inside a nested call.

use thiserror::Error;

use crate::AgreementStatus;

/// Result type for Covenant operations
pub type Result<T> = std::result::Result<T, CovenantError>;

/// Covenant error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CovenantError {
    // ========================================================================
    // Authorization Errors
    // ========================================================================
    /// Caller lacks the required privilege
    #[error("Unauthorized caller: {caller}")]
    UnauthorizedCaller { caller: String },

    // ========================================================================
    // Agreement Errors
    // ========================================================================
    /// Both sides of an agreement are the same account
    #[error("Invalid agreement participants: {participant} appears on both sides")]
    InvalidParticipants { participant: String },

    /// Id was never allocated
    #[error("Invalid agreement id: {id}")]
    InvalidAgreementId { id: u64 },

    /// Resolve or cancel attempted on a terminal agreement
    #[error("Agreement {id} is not open (status {status})")]
    AgreementNotOpen { id: u64, status: AgreementStatus },

    /// Resolution must credit tokens but no token provider was configured
    #[error("Token provider not configured")]
    TokenProviderNotSet,

    // ========================================================================
    // Ledger Errors
    // ========================================================================
    /// Credit would exceed the largest representable balance or supply
    #[error("Arithmetic overflow: adding {added} to {current}")]
    ArithmeticOverflow { current: u128, added: u128 },

    /// Transfer exceeds the sender's balance
    #[error("Insufficient balance in {account}: have {available}, need {required}")]
    InsufficientBalance {
        account: String,
        available: u128,
        required: u128,
    },
}

impl CovenantError {
    /// Stable machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnauthorizedCaller { .. } => "UnauthorizedCaller",
            Self::InvalidParticipants { .. } => "InvalidParticipants",
            Self::InvalidAgreementId { .. } => "InvalidAgreementId",
            Self::AgreementNotOpen { .. } => "AgreementNotOpen",
            Self::TokenProviderNotSet => "TokenProviderNotSet",
            Self::ArithmeticOverflow { .. } => "ArithmeticOverflow",
            Self::InsufficientBalance { .. } => "InsufficientBalance",
        }
    }
}
