//! Ledger store boundary.
//!
//! The store holds the only shared mutable resource in the system: one loyalty
//! card row per account, plus the append-only event logs and the consumed-token
//! record. The engine never read-then-writes across store calls; it loads a
//! versioned snapshot, computes the whole mutation, and submits it as a single
//! [`CardCommit`] that the store applies atomically or rejects. Version
//! mismatches surface as [`CommitError::Conflict`] (the engine re-reads and
//! retries), replayed tokens as [`CommitError::TokenConsumed`].

pub mod memory;
pub mod postgres;

pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;

use chrono::{DateTime, Utc};
use thiserror::Error;

use loyaltea_core::{AccountId, LoyaltyCard, RedemptionEvent, StampEvent, TokenId};

/// A card snapshot with the optimistic-concurrency version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedCard {
    pub card: LoyaltyCard,
    pub version: i64,
}

/// The event-log record a commit appends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerRecord {
    Stamp(StampEvent),
    Redemption(RedemptionEvent),
}

/// One atomic ledger mutation: new card state, the event to append, the stamp
/// rows to purge, and the token being consumed. Applied in full or not at all.
#[derive(Debug, Clone)]
pub struct CardCommit {
    pub account_id: AccountId,
    /// Version the card was read at; the commit fails if it has moved.
    pub expected_version: i64,
    /// Card state after the mutation.
    pub card: LoyaltyCard,
    /// Event-log record for this mutation.
    pub record: LedgerRecord,
    /// How many of the most recent stamp rows to purge (the redeemed block).
    pub purge_recent_stamps: u8,
    /// Token id to mark consumed within the same atomic unit.
    pub consume_token: TokenId,
    /// When the consumed-token record may be forgotten. Must be at least the
    /// token's expiry plus the replay retention window.
    pub token_retire_at: DateTime<Utc>,
}

/// Errors from store reads.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No card row exists for the account.
    #[error("account not found")]
    AccountNotFound,
    /// The database rejected or dropped the operation.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// A stored value violates the data model.
    #[error("data corruption: {0}")]
    DataCorruption(String),
    /// The store could not be reached or is in a bad state.
    #[error("ledger store unavailable: {0}")]
    Unavailable(String),
}

/// Errors from applying a [`CardCommit`].
#[derive(Debug, Error)]
pub enum CommitError {
    /// The card version moved since the snapshot was read.
    #[error("card version conflict")]
    Conflict,
    /// The token id was already consumed by an earlier commit.
    #[error("token already consumed")]
    TokenConsumed,
    /// Underlying store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Transactional ledger storage as required by the engine.
///
/// `load_card` + `commit` form the atomic read-modify-write cycle;
/// the history reads serve the customer-facing read side.
#[allow(async_fn_in_trait)]
pub trait LedgerStore {
    /// Load the card snapshot for an account.
    async fn load_card(&self, account_id: &AccountId) -> Result<VersionedCard, StoreError>;

    /// Apply one atomic mutation, or reject it without any state change.
    async fn commit(&self, commit: CardCommit) -> Result<(), CommitError>;

    /// Whether a token id is currently held in the consumed record.
    async fn is_token_consumed(&self, token_id: &TokenId) -> Result<bool, StoreError>;

    /// Stamp events for an account, most recent first.
    async fn stamp_history(&self, account_id: &AccountId) -> Result<Vec<StampEvent>, StoreError>;

    /// Redemption events for an account, most recent first.
    async fn redemption_history(
        &self,
        account_id: &AccountId,
    ) -> Result<Vec<RedemptionEvent>, StoreError>;
}

// Several engines (or one engine plus out-of-band readers) can share a store.
impl<S: LedgerStore + Sync> LedgerStore for std::sync::Arc<S> {
    async fn load_card(&self, account_id: &AccountId) -> Result<VersionedCard, StoreError> {
        (**self).load_card(account_id).await
    }

    async fn commit(&self, commit: CardCommit) -> Result<(), CommitError> {
        (**self).commit(commit).await
    }

    async fn is_token_consumed(&self, token_id: &TokenId) -> Result<bool, StoreError> {
        (**self).is_token_consumed(token_id).await
    }

    async fn stamp_history(&self, account_id: &AccountId) -> Result<Vec<StampEvent>, StoreError> {
        (**self).stamp_history(account_id).await
    }

    async fn redemption_history(
        &self,
        account_id: &AccountId,
    ) -> Result<Vec<RedemptionEvent>, StoreError> {
        (**self).redemption_history(account_id).await
    }
}
