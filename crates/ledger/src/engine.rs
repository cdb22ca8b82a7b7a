//! The ledger engine: sole writer of card state and event logs.
//!
//! Both halves of the proof-of-presence exchange are checked independently
//! before anything is written: the staff terminal credential first, then the
//! customer's transaction token. The mutation itself is one atomic commit
//! against the store - replay check, balance guard, balance write, and event
//! append stand or fall together. Version conflicts from concurrent commits
//! on the same account are retried a bounded number of times with the
//! business rules re-checked each round, so the net effect of any set of
//! distinct tokens equals some serial ordering of their applications.

use chrono::{TimeDelta, Utc};
use tracing::{debug, info, instrument, warn};

use loyaltea_core::{
    AccountId, CardSummary, CupKind, EventId, LoyaltyCard, RedemptionEvent, StampEvent,
    STAMPS_PER_REWARD,
};

use crate::config::{LedgerConfig, REPLAY_RETENTION_SECS};
use crate::error::LedgerError;
use crate::store::{CardCommit, CommitError, LedgerRecord, LedgerStore, StoreError};
use crate::terminal::{TerminalAuthenticator, TerminalCredential};
use crate::token::{TokenClaims, TokenError, TokenIntent, TokenVerifier};

/// Rounds of conflict retry before giving up on a contended account.
const COMMIT_RETRY_LIMIT: u32 = 3;

/// Outcome of a successful stamp.
#[derive(Debug, Clone)]
pub struct StampResult {
    /// Card state after the stamp.
    pub card: LoyaltyCard,
    /// The appended event.
    pub event: StampEvent,
}

/// Outcome of a successful redemption.
#[derive(Debug, Clone)]
pub struct RedemptionResult {
    /// Card state after the deduction.
    pub card: LoyaltyCard,
    /// The appended event.
    pub event: RedemptionEvent,
}

/// Applies verified transaction tokens against account state.
pub struct LedgerEngine<S> {
    store: S,
    tokens: TokenVerifier,
    terminals: TerminalAuthenticator,
    replay_retention: TimeDelta,
}

impl<S: LedgerStore> LedgerEngine<S> {
    /// Create an engine with the default replay-record retention window.
    #[must_use]
    pub fn new(store: S, tokens: TokenVerifier, terminals: TerminalAuthenticator) -> Self {
        Self {
            store,
            tokens,
            terminals,
            replay_retention: TimeDelta::seconds(REPLAY_RETENTION_SECS),
        }
    }

    /// Create an engine wired to the configured signing secrets.
    #[must_use]
    pub fn from_config(config: &LedgerConfig, store: S) -> Self {
        Self::new(
            store,
            TokenVerifier::new(config.token_secret.clone()),
            TerminalAuthenticator::with_ttl(config.terminal_secret.clone(), config.terminal_ttl),
        )
    }

    /// Apply a stamp token submitted by a staff terminal.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::TerminalInvalid`], [`LedgerError::TokenInvalid`],
    /// [`LedgerError::TokenExpired`], [`LedgerError::TokenReplayed`],
    /// [`LedgerError::CardFull`], [`LedgerError::AccountNotFound`], or
    /// [`LedgerError::StoreUnavailable`]. No rejection mutates any state.
    #[instrument(skip(self, token, terminal), fields(cup = ?cup_kind))]
    pub async fn apply_stamp(
        &self,
        token: &str,
        terminal: &TerminalCredential,
        cup_kind: CupKind,
    ) -> Result<StampResult, LedgerError> {
        let claims = self.verify_request(token, terminal, TokenIntent::Stamp)?;

        for attempt in 0..=COMMIT_RETRY_LIMIT {
            let snapshot = self.store.load_card(&claims.account_id).await?;
            let Some(next) = snapshot.card.stamped(cup_kind) else {
                return Err(self.reject_unless_replayed(&claims, LedgerError::CardFull).await);
            };
            let event = StampEvent {
                event_id: EventId::generate(),
                account_id: claims.account_id.clone(),
                cup_kind,
                created_at: Utc::now(),
            };
            match self
                .store
                .commit(CardCommit {
                    account_id: claims.account_id.clone(),
                    expected_version: snapshot.version,
                    card: next,
                    record: LedgerRecord::Stamp(event.clone()),
                    purge_recent_stamps: 0,
                    consume_token: claims.token_id.clone(),
                    token_retire_at: claims.expires_at + self.replay_retention,
                })
                .await
            {
                Ok(()) => {
                    info!(
                        account = %claims.account_id,
                        stamp_count = next.stamp_count,
                        "stamp applied"
                    );
                    return Ok(StampResult { card: next, event });
                }
                Err(CommitError::Conflict) => {
                    debug!(attempt, account = %claims.account_id, "commit conflict, re-reading");
                }
                Err(CommitError::TokenConsumed) => return Err(LedgerError::TokenReplayed),
                Err(CommitError::Store(e)) => return Err(e.into()),
            }
        }

        warn!(account = %claims.account_id, "stamp commit retries exhausted");
        Err(contention_exhausted())
    }

    /// Apply a redemption token submitted by a staff terminal.
    ///
    /// Deducts nine stamps, purges the redeemed stamp block, and appends one
    /// redemption event. Lifetime counters are historical totals and are
    /// never reduced.
    ///
    /// # Errors
    ///
    /// As [`Self::apply_stamp`], with [`LedgerError::InsufficientStamps`] in
    /// place of [`LedgerError::CardFull`].
    #[instrument(skip(self, token, terminal), fields(cup = ?cup_kind))]
    pub async fn apply_redemption(
        &self,
        token: &str,
        terminal: &TerminalCredential,
        cup_kind: CupKind,
    ) -> Result<RedemptionResult, LedgerError> {
        let claims = self.verify_request(token, terminal, TokenIntent::Redeem)?;
        let Some(reward_id) = claims.reward_id.clone() else {
            return Err(LedgerError::TokenInvalid(TokenError::Malformed(
                "redeem token carries no reward".to_owned(),
            )));
        };

        for attempt in 0..=COMMIT_RETRY_LIMIT {
            let snapshot = self.store.load_card(&claims.account_id).await?;
            let Some(next) = snapshot.card.redeemed() else {
                return Err(
                    self.reject_unless_replayed(&claims, LedgerError::InsufficientStamps)
                        .await,
                );
            };
            let event = RedemptionEvent {
                event_id: EventId::generate(),
                account_id: claims.account_id.clone(),
                reward_id: reward_id.clone(),
                cup_kind,
                created_at: Utc::now(),
            };
            match self
                .store
                .commit(CardCommit {
                    account_id: claims.account_id.clone(),
                    expected_version: snapshot.version,
                    card: next,
                    record: LedgerRecord::Redemption(event.clone()),
                    purge_recent_stamps: STAMPS_PER_REWARD,
                    consume_token: claims.token_id.clone(),
                    token_retire_at: claims.expires_at + self.replay_retention,
                })
                .await
            {
                Ok(()) => {
                    info!(
                        account = %claims.account_id,
                        reward = %event.reward_id,
                        "reward redeemed"
                    );
                    return Ok(RedemptionResult { card: next, event });
                }
                Err(CommitError::Conflict) => {
                    debug!(attempt, account = %claims.account_id, "commit conflict, re-reading");
                }
                Err(CommitError::TokenConsumed) => return Err(LedgerError::TokenReplayed),
                Err(CommitError::Store(e)) => return Err(e.into()),
            }
        }

        warn!(account = %claims.account_id, "redemption commit retries exhausted");
        Err(contention_exhausted())
    }

    /// Current card and derived state for the customer home screen.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AccountNotFound`] or
    /// [`LedgerError::StoreUnavailable`].
    pub async fn card_summary(&self, account_id: &AccountId) -> Result<CardSummary, LedgerError> {
        let snapshot = self.store.load_card(account_id).await?;
        Ok(CardSummary::from(snapshot.card))
    }

    /// Stamp events on the current card, most recent first.
    ///
    /// Purged alongside the deduction when the block is redeemed, so the
    /// listing always matches the card's stamp count.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AccountNotFound`] or
    /// [`LedgerError::StoreUnavailable`].
    pub async fn stamp_history(
        &self,
        account_id: &AccountId,
    ) -> Result<Vec<StampEvent>, LedgerError> {
        Ok(self.store.stamp_history(account_id).await?)
    }

    /// Redemption history for an account, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AccountNotFound`] or
    /// [`LedgerError::StoreUnavailable`].
    pub async fn redemption_history(
        &self,
        account_id: &AccountId,
    ) -> Result<Vec<RedemptionEvent>, LedgerError> {
        Ok(self.store.redemption_history(account_id).await?)
    }

    /// Resolve a balance rejection for a token that failed the snapshot guard.
    ///
    /// The replay check comes before the balance guard: a token whose commit
    /// already landed reports [`LedgerError::TokenReplayed`], never a balance
    /// error. Otherwise a redemption whose response was lost in transit would
    /// resurface as `InsufficientStamps` on resubmission, telling the terminal
    /// the customer lacks stamps when the reward was in fact handed out.
    async fn reject_unless_replayed(
        &self,
        claims: &TokenClaims,
        rejection: LedgerError,
    ) -> LedgerError {
        match self.store.is_token_consumed(&claims.token_id).await {
            Ok(true) => LedgerError::TokenReplayed,
            Ok(false) => rejection,
            Err(e) => e.into(),
        }
    }

    /// Verify the terminal credential and the token, in that order; both must
    /// independently check out before any store access happens.
    fn verify_request(
        &self,
        token: &str,
        terminal: &TerminalCredential,
        intent: TokenIntent,
    ) -> Result<TokenClaims, LedgerError> {
        let staff = self
            .terminals
            .verify(terminal)
            .map_err(LedgerError::TerminalInvalid)?;
        let claims = self.tokens.verify(token)?;
        if claims.intent != intent {
            return Err(LedgerError::TokenInvalid(TokenError::IntentMismatch));
        }
        debug!(
            staff = %staff.staff_account_id,
            token_id = %claims.token_id,
            account = %claims.account_id,
            "proof-of-presence pair verified"
        );
        Ok(claims)
    }
}

fn contention_exhausted() -> LedgerError {
    LedgerError::StoreUnavailable(StoreError::Unavailable(
        "commit retry limit exhausted".to_owned(),
    ))
}
