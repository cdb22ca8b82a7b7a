//! Ledger engine error taxonomy.
//!
//! Four families, matching how callers should react:
//! - authorization (`TerminalInvalid`) - surfaced to the staff terminal, never
//!   retried automatically
//! - token (`TokenInvalid`, `TokenExpired`, `TokenReplayed`) - fatal to that
//!   token; the customer re-issues a new one
//! - business rule (`CardFull`, `InsufficientStamps`) - expected, user-facing,
//!   nothing was mutated
//! - transient (`StoreUnavailable`) - the whole operation is safe to retry
//!   with bounded backoff because the replay guard makes it idempotent
//!
//! Every rejected path guarantees zero state change.

use thiserror::Error;

use loyaltea_core::MAX_STAMPS;

use crate::store::StoreError;
use crate::terminal::TerminalAuthError;
use crate::token::TokenError;

/// Typed result of a ledger mutation attempt.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The terminal credential is forged, malformed, or expired.
    #[error("terminal credential invalid")]
    TerminalInvalid(#[source] TerminalAuthError),

    /// The transaction token is forged, malformed, or for another operation.
    #[error("transaction token invalid")]
    TokenInvalid(#[source] TokenError),

    /// The transaction token's validity window has passed.
    #[error("transaction token expired")]
    TokenExpired,

    /// The token id was already applied to the ledger once.
    #[error("transaction token already used")]
    TokenReplayed,

    /// The card already holds the maximum number of stamps.
    #[error("card already has {MAX_STAMPS} stamps")]
    CardFull,

    /// The card does not hold enough stamps to redeem.
    #[error("not enough stamps to redeem")]
    InsufficientStamps,

    /// No card exists for the token's account.
    #[error("account not found")]
    AccountNotFound,

    /// The ledger store could not complete the operation.
    #[error("ledger store unavailable")]
    StoreUnavailable(#[source] StoreError),
}

impl LedgerError {
    /// Whether retrying the whole operation (same token) is safe and useful.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AccountNotFound => Self::AccountNotFound,
            other => Self::StoreUnavailable(other),
        }
    }
}

impl From<TokenError> for LedgerError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => Self::TokenExpired,
            other => Self::TokenInvalid(other),
        }
    }
}
