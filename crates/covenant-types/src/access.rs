//! Owner guard shared by every privileged entry point
//!
//! Components store their principals explicitly and compare the caller
//! against them. There is no implicit trust between components.

use crate::{AccountId, CovenantError, Result};

/// Require `caller` to be `owner`
pub fn ensure_owner(caller: &AccountId, owner: &AccountId) -> Result<()> {
    ensure_one_of(caller, owner, None)
}

/// Require `caller` to be `owner` or, when set, `delegate`
pub fn ensure_one_of(
    caller: &AccountId,
    owner: &AccountId,
    delegate: Option<&AccountId>,
) -> Result<()> {
    if caller == owner || delegate == Some(caller) {
        return Ok(());
    }
    Err(CovenantError::UnauthorizedCaller {
        caller: caller.to_string(),
    })
}
