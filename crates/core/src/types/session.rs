//! Identity-provider session types.
//!
//! The identity provider authenticates customers and staff and hands the core
//! an already-verified `(account_id, role)` pair. The core never re-implements
//! credential checking; everything downstream trusts these values.

use serde::{Deserialize, Serialize};

use super::id::AccountId;

/// Role assigned to an account by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A café customer collecting stamps.
    Customer,
    /// A staff operator allowed to run a scanning terminal.
    Staff,
}

impl Role {
    /// Whether this role may operate a staff terminal.
    #[must_use]
    pub const fn is_staff(self) -> bool {
        matches!(self, Self::Staff)
    }
}

/// An authenticated session as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Stable account identifier.
    pub account_id: AccountId,
    /// Role the identity provider assigned to the account.
    pub role: Role,
}

impl Session {
    /// Create a session value.
    #[must_use]
    pub fn new(account_id: impl Into<AccountId>, role: Role) -> Self {
        Self {
            account_id: account_id.into(),
            role,
        }
    }
}
