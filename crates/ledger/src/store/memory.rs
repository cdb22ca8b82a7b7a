//! In-process ledger store for tests and demos.
//!
//! A mutex-guarded map with the same commit semantics as the Postgres store:
//! version compare-and-set, single-use token record with retention-based
//! pruning, all-or-nothing application.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use loyaltea_core::{AccountId, LoyaltyCard, RedemptionEvent, StampEvent, TokenId};

use super::{CardCommit, CommitError, LedgerRecord, LedgerStore, StoreError, VersionedCard};

#[derive(Debug, Default)]
struct AccountRow {
    card: LoyaltyCard,
    version: i64,
    stamps: Vec<StampEvent>,
    redemptions: Vec<RedemptionEvent>,
}

#[derive(Debug, Default)]
struct Inner {
    accounts: HashMap<AccountId, AccountRow>,
    consumed: HashMap<TokenId, DateTime<Utc>>,
}

/// Mutex-guarded in-memory implementation of [`LedgerStore`].
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    inner: Mutex<Inner>,
}

impl MemoryLedgerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the card row for an account, as account registration would.
    ///
    /// Idempotent; an existing row is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the store lock is poisoned.
    pub fn register_account(&self, account_id: &AccountId) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.accounts.entry(account_id.clone()).or_default();
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_owned()))
    }
}

impl LedgerStore for MemoryLedgerStore {
    async fn load_card(&self, account_id: &AccountId) -> Result<VersionedCard, StoreError> {
        let inner = self.lock()?;
        let row = inner
            .accounts
            .get(account_id)
            .ok_or(StoreError::AccountNotFound)?;
        Ok(VersionedCard {
            card: row.card,
            version: row.version,
        })
    }

    async fn commit(&self, commit: CardCommit) -> Result<(), CommitError> {
        let now = Utc::now();
        let mut inner = self.lock()?;

        // Retention-window pruning keeps the record bounded.
        inner.consumed.retain(|_, retire_at| *retire_at > now);

        if inner.consumed.contains_key(&commit.consume_token) {
            return Err(CommitError::TokenConsumed);
        }

        let row = inner
            .accounts
            .get_mut(&commit.account_id)
            .ok_or(StoreError::AccountNotFound)?;
        if row.version != commit.expected_version {
            return Err(CommitError::Conflict);
        }

        row.card = commit.card;
        row.version += 1;
        let purge = usize::from(commit.purge_recent_stamps).min(row.stamps.len());
        let keep = row.stamps.len() - purge;
        row.stamps.truncate(keep);
        match commit.record {
            LedgerRecord::Stamp(event) => row.stamps.push(event),
            LedgerRecord::Redemption(event) => row.redemptions.push(event),
        }
        inner
            .consumed
            .insert(commit.consume_token, commit.token_retire_at);
        Ok(())
    }

    async fn is_token_consumed(&self, token_id: &TokenId) -> Result<bool, StoreError> {
        let inner = self.lock()?;
        Ok(inner.consumed.contains_key(token_id))
    }

    async fn stamp_history(&self, account_id: &AccountId) -> Result<Vec<StampEvent>, StoreError> {
        let inner = self.lock()?;
        let row = inner
            .accounts
            .get(account_id)
            .ok_or(StoreError::AccountNotFound)?;
        let mut events = row.stamps.clone();
        events.reverse();
        Ok(events)
    }

    async fn redemption_history(
        &self,
        account_id: &AccountId,
    ) -> Result<Vec<RedemptionEvent>, StoreError> {
        let inner = self.lock()?;
        let row = inner
            .accounts
            .get(account_id)
            .ok_or(StoreError::AccountNotFound)?;
        let mut events = row.redemptions.clone();
        events.reverse();
        Ok(events)
    }
}
