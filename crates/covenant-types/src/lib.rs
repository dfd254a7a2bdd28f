//! Covenant Types - Canonical domain types for escrowed agreements
//!
//! This crate contains all foundational types for Covenant with zero
//! dependencies on other covenant crates. It defines:
//!
//! - Identity types (AccountId, AgreementId)
//! - The token amount with overflow-checked arithmetic
//! - Agreement records and their status machine
//! - Events surfaced to external observers
//! - The shared error taxonomy
//! - The owner guard used by every privileged entry point
//! - The `TokenProvider` capability the registry settles through
//!
//! # Invariants
//!
//! 1. Every failure aborts all mutation attempted by the operation
//! 2. Authorization is always checked against a stored principal
//! 3. Agreement status leaves `Open` exactly once

pub mod access;
pub mod agreement;
pub mod amount;
pub mod error;
pub mod event;
pub mod identity;
pub mod provider;

pub use access::*;
pub use agreement::*;
pub use amount::*;
pub use error::*;
pub use event::*;
pub use identity::*;
pub use provider::*;
