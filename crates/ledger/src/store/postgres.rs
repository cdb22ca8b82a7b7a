//! `PostgreSQL` ledger store.
//!
//! Schema lives in `crates/ledger/migrations/`. Commits run inside one
//! database transaction: the consumed-token insert (primary key on the token
//! id turns replays into unique violations), a version compare-and-set on the
//! card row, the stamp-block purge, and the event append. If any step fails
//! the transaction rolls back and no state changes.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use loyaltea_core::{
    AccountId, CupKind, LoyaltyCard, RedemptionEvent, RewardId, StampEvent, TokenId,
};

use super::{CardCommit, CommitError, LedgerRecord, LedgerStore, StoreError, VersionedCard};

/// [`LedgerStore`] backed by `PostgreSQL` via sqlx.
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the card row for an account, as account registration would.
    ///
    /// Idempotent; an existing row is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the insert fails.
    pub async fn ensure_account(&self, account_id: &AccountId) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO loyalty_card (account_id) VALUES ($1)
             ON CONFLICT (account_id) DO NOTHING",
        )
        .bind(account_id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn account_exists(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        account_id: &AccountId,
    ) -> Result<bool, StoreError> {
        let row: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM loyalty_card WHERE account_id = $1")
                .bind(account_id.as_str())
                .fetch_optional(&mut **tx)
                .await?;
        Ok(row.is_some())
    }
}

fn card_from_row(
    stamp_count: i32,
    lifetime_stamps: i64,
    lifetime_co2: i64,
) -> Result<LoyaltyCard, StoreError> {
    Ok(LoyaltyCard {
        stamp_count: u8::try_from(stamp_count)
            .map_err(|_| StoreError::DataCorruption(format!("stamp_count {stamp_count}")))?,
        lifetime_stamps_collected: u64::try_from(lifetime_stamps).map_err(|_| {
            StoreError::DataCorruption(format!("lifetime_stamps_collected {lifetime_stamps}"))
        })?,
        lifetime_co2_saved_grams: u64::try_from(lifetime_co2).map_err(|_| {
            StoreError::DataCorruption(format!("lifetime_co2_saved_grams {lifetime_co2}"))
        })?,
    })
}

fn counter_to_db(value: u64, field: &str) -> Result<i64, StoreError> {
    i64::try_from(value)
        .map_err(|_| StoreError::DataCorruption(format!("{field} overflows bigint")))
}

impl LedgerStore for PgLedgerStore {
    async fn load_card(&self, account_id: &AccountId) -> Result<VersionedCard, StoreError> {
        let row: Option<(i32, i64, i64, i64)> = sqlx::query_as(
            "SELECT stamp_count, lifetime_stamps_collected, lifetime_co2_saved_grams, version
             FROM loyalty_card
             WHERE account_id = $1",
        )
        .bind(account_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let (stamp_count, lifetime_stamps, lifetime_co2, version) =
            row.ok_or(StoreError::AccountNotFound)?;
        Ok(VersionedCard {
            card: card_from_row(stamp_count, lifetime_stamps, lifetime_co2)?,
            version,
        })
    }

    async fn commit(&self, commit: CardCommit) -> Result<(), CommitError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        // Retention-window pruning keeps the consumed-token table bounded.
        sqlx::query("DELETE FROM consumed_token WHERE retire_at <= $1")
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from)?;

        let inserted = sqlx::query(
            "INSERT INTO consumed_token (token_id, retire_at) VALUES ($1, $2)",
        )
        .bind(commit.consume_token.as_str())
        .bind(commit.token_retire_at)
        .execute(&mut *tx)
        .await;
        if let Err(e) = inserted {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return Err(CommitError::TokenConsumed);
            }
            return Err(StoreError::from(e).into());
        }

        let updated = sqlx::query(
            "UPDATE loyalty_card
             SET stamp_count = $1,
                 lifetime_stamps_collected = $2,
                 lifetime_co2_saved_grams = $3,
                 version = version + 1,
                 updated_at = $4
             WHERE account_id = $5 AND version = $6",
        )
        .bind(i32::from(commit.card.stamp_count))
        .bind(counter_to_db(
            commit.card.lifetime_stamps_collected,
            "lifetime_stamps_collected",
        )?)
        .bind(counter_to_db(
            commit.card.lifetime_co2_saved_grams,
            "lifetime_co2_saved_grams",
        )?)
        .bind(Utc::now())
        .bind(commit.account_id.as_str())
        .bind(commit.expected_version)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from)?;

        if updated.rows_affected() == 0 {
            // Dropped transaction distinguishes "card moved" from "no card".
            if Self::account_exists(&mut tx, &commit.account_id).await? {
                return Err(CommitError::Conflict);
            }
            return Err(StoreError::AccountNotFound.into());
        }

        if commit.purge_recent_stamps > 0 {
            sqlx::query(
                "DELETE FROM stamp_event
                 WHERE event_id IN (
                     SELECT event_id FROM stamp_event
                     WHERE account_id = $1
                     ORDER BY created_at DESC, event_id DESC
                     LIMIT $2
                 )",
            )
            .bind(commit.account_id.as_str())
            .bind(i64::from(commit.purge_recent_stamps))
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from)?;
        }

        match &commit.record {
            LedgerRecord::Stamp(event) => {
                sqlx::query(
                    "INSERT INTO stamp_event (event_id, account_id, reusable, created_at)
                     VALUES ($1, $2, $3, $4)",
                )
                .bind(event.event_id.as_uuid())
                .bind(event.account_id.as_str())
                .bind(event.cup_kind == CupKind::Reusable)
                .bind(event.created_at)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::from)?;
            }
            LedgerRecord::Redemption(event) => {
                sqlx::query(
                    "INSERT INTO redemption_event (event_id, account_id, reward_id, reusable, created_at)
                     VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(event.event_id.as_uuid())
                .bind(event.account_id.as_str())
                .bind(event.reward_id.as_str())
                .bind(event.cup_kind == CupKind::Reusable)
                .bind(event.created_at)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::from)?;
            }
        }

        tx.commit().await.map_err(StoreError::from)?;
        Ok(())
    }

    async fn is_token_consumed(&self, token_id: &TokenId) -> Result<bool, StoreError> {
        let row: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM consumed_token WHERE token_id = $1")
                .bind(token_id.as_str())
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    async fn stamp_history(&self, account_id: &AccountId) -> Result<Vec<StampEvent>, StoreError> {
        let rows: Vec<(Uuid, bool, DateTime<Utc>)> = sqlx::query_as(
            "SELECT event_id, reusable, created_at
             FROM stamp_event
             WHERE account_id = $1
             ORDER BY created_at DESC, event_id DESC",
        )
        .bind(account_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(event_id, reusable, created_at)| StampEvent {
                event_id: event_id.into(),
                account_id: account_id.clone(),
                cup_kind: if reusable {
                    CupKind::Reusable
                } else {
                    CupKind::Disposable
                },
                created_at,
            })
            .collect())
    }

    async fn redemption_history(
        &self,
        account_id: &AccountId,
    ) -> Result<Vec<RedemptionEvent>, StoreError> {
        let rows: Vec<(Uuid, String, bool, DateTime<Utc>)> = sqlx::query_as(
            "SELECT event_id, reward_id, reusable, created_at
             FROM redemption_event
             WHERE account_id = $1
             ORDER BY created_at DESC, event_id DESC",
        )
        .bind(account_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(event_id, reward_id, reusable, created_at)| RedemptionEvent {
                event_id: event_id.into(),
                account_id: account_id.clone(),
                reward_id: RewardId::new(reward_id),
                cup_kind: if reusable {
                    CupKind::Reusable
                } else {
                    CupKind::Disposable
                },
                created_at,
            })
            .collect())
    }
}
