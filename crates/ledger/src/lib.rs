//! LoyalTEA Ledger - the loyalty ledger and proof-of-presence transaction core.
//!
//! Converts an in-person café event (a purchase, or a reward pickup) into an
//! authorized, exactly-once mutation of a customer's stamp balance:
//!
//! 1. The customer's device asks the [`token::TransactionTokenService`] for a
//!    signed, short-lived, single-use token describing the intended transaction
//!    (stamp, or redeem reward R). The token is shown as a QR payload.
//! 2. The staff terminal holds a [`terminal::TerminalCredential`] from the
//!    [`terminal::TerminalAuthenticator`], proving the scanning party is staff.
//! 3. The terminal submits the scanned token plus its credential to the
//!    [`engine::LedgerEngine`], which verifies both independently and then
//!    applies the mutation atomically against the [`store::LedgerStore`].
//!
//! Both the customer's intent and the scanning party's authority must check
//! out before anything is written; neither side alone can move a stamp.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod config;
mod envelope;
pub mod engine;
pub mod error;
pub mod store;
pub mod terminal;
pub mod token;

pub use catalog::{CatalogError, Reward, RewardCatalog, StaticRewardCatalog};
pub use config::{ConfigError, LedgerConfig};
pub use engine::{LedgerEngine, RedemptionResult, StampResult};
pub use error::LedgerError;
pub use store::{
    CardCommit, CommitError, LedgerRecord, LedgerStore, MemoryLedgerStore, PgLedgerStore,
    StoreError, VersionedCard,
};
pub use terminal::{TerminalAuthError, TerminalAuthenticator, TerminalClaims, TerminalCredential};
pub use token::{
    IssueError, IssuedToken, TokenClaims, TokenError, TokenIntent, TokenVerifier,
    TransactionTokenService,
};
