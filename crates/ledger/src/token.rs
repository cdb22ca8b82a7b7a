//! Transaction token issuance and verification.
//!
//! A transaction token is the customer's half of a proof-of-presence exchange:
//! a signed, time-bound, single-use claim that a specific account wants to
//! perform a specific transaction. The account is always bound from the
//! authenticated session, never from client-supplied fields, and issuance has
//! no side effects on the ledger. Single-use enforcement lives in the ledger
//! engine's consumed-token record, not here.

use chrono::{DateTime, TimeDelta, Utc};
use rand::RngCore;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use loyaltea_core::{AccountId, RewardId, Session, TokenId};

use crate::catalog::{CatalogError, RewardCatalog};
use crate::config::DEFAULT_TOKEN_TTL_SECS;
use crate::envelope::{self, EnvelopeError};

/// Envelope prefix for transaction tokens.
const TOKEN_PREFIX: &str = "LT1";

/// What the customer wants a token to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenIntent {
    /// Earn one stamp for a purchase.
    Stamp,
    /// Redeem a full card for a reward.
    Redeem,
}

/// Signed claim set carried inside a transaction token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Fresh 128-bit nonce, hex-encoded. Keys the single-use record.
    pub token_id: TokenId,
    /// Account the transaction applies to.
    pub account_id: AccountId,
    /// Intended transaction.
    pub intent: TokenIntent,
    /// Selected reward; present iff `intent` is [`TokenIntent::Redeem`].
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reward_id: Option<RewardId>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A freshly minted token: the claims plus the optical-transfer string.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub claims: TokenClaims,
    /// Compact `LT1.<payload>.<signature>` string for the QR code.
    pub encoded: String,
}

/// Errors from token issuance.
#[derive(Debug, Error)]
pub enum IssueError {
    /// A redeem token needs a reward selection.
    #[error("redeem token requested without a reward")]
    MissingReward,
    /// A stamp token must not carry a reward selection.
    #[error("stamp token requested with a reward")]
    UnexpectedReward,
    /// The selected reward is not in the catalog.
    #[error("reward {0} is not currently offered")]
    InvalidReward(RewardId),
    /// The reward catalog could not be consulted.
    #[error("reward catalog error")]
    Catalog(#[from] CatalogError),
    /// The claim set could not be serialized and signed.
    #[error("could not encode token: {0}")]
    Encoding(String),
}

/// Errors from token verification.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Not a parseable token envelope.
    #[error("malformed token: {0}")]
    Malformed(String),
    /// Signature does not match the claims.
    #[error("token signature mismatch")]
    SignatureMismatch,
    /// The validity window has passed.
    #[error("token expired")]
    Expired,
    /// The token's intent does not match the attempted operation.
    #[error("token was issued for a different operation")]
    IntentMismatch,
}

impl From<EnvelopeError> for TokenError {
    fn from(err: EnvelopeError) -> Self {
        match err {
            EnvelopeError::Malformed(reason) => Self::Malformed(reason),
            EnvelopeError::SignatureMismatch => Self::SignatureMismatch,
        }
    }
}

/// Mints signed, short-lived transaction tokens.
pub struct TransactionTokenService<C> {
    secret: SecretString,
    ttl: TimeDelta,
    catalog: C,
}

impl<C> std::fmt::Debug for TransactionTokenService<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionTokenService")
            .field("secret", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl<C: RewardCatalog> TransactionTokenService<C> {
    /// Create a token service with the default 120-second validity window.
    #[must_use]
    pub fn new(secret: SecretString, catalog: C) -> Self {
        Self::with_ttl(secret, catalog, TimeDelta::seconds(DEFAULT_TOKEN_TTL_SECS))
    }

    /// Create a token service with an explicit validity window.
    #[must_use]
    pub const fn with_ttl(secret: SecretString, catalog: C, ttl: TimeDelta) -> Self {
        Self {
            secret,
            ttl,
            catalog,
        }
    }

    /// Mint a token for the session's own account.
    ///
    /// The bound account comes from the authenticated session; callers cannot
    /// request tokens for anyone else. For [`TokenIntent::Redeem`] the reward
    /// must be a currently offered catalog entry.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::MissingReward`] / [`IssueError::UnexpectedReward`]
    /// when the reward selection doesn't match the intent,
    /// [`IssueError::InvalidReward`] when the catalog doesn't offer it, and
    /// [`IssueError::Catalog`] when the catalog can't be consulted.
    #[instrument(skip(self, session), fields(account = %session.account_id, intent = ?intent))]
    pub async fn issue(
        &self,
        session: &Session,
        intent: TokenIntent,
        reward_id: Option<RewardId>,
    ) -> Result<IssuedToken, IssueError> {
        let reward_id = match (intent, reward_id) {
            (TokenIntent::Stamp, None) => None,
            (TokenIntent::Stamp, Some(_)) => return Err(IssueError::UnexpectedReward),
            (TokenIntent::Redeem, None) => return Err(IssueError::MissingReward),
            (TokenIntent::Redeem, Some(id)) => {
                if !self.catalog.lookup(&id).await? {
                    return Err(IssueError::InvalidReward(id));
                }
                Some(id)
            }
        };

        let now = Utc::now();
        let claims = TokenClaims {
            token_id: fresh_token_id(),
            account_id: session.account_id.clone(),
            intent,
            reward_id,
            issued_at: now,
            expires_at: now + self.ttl,
        };
        let encoded = envelope::encode(TOKEN_PREFIX, &claims, &self.secret)
            .map_err(|e| IssueError::Encoding(e.to_string()))?;

        debug!(token_id = %claims.token_id, expires_at = %claims.expires_at, "issued transaction token");
        Ok(IssuedToken { claims, encoded })
    }
}

/// Verifies token signatures and validity windows for the ledger engine.
pub struct TokenVerifier {
    secret: SecretString,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl TokenVerifier {
    #[must_use]
    pub const fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Verify an encoded token and return its claims.
    ///
    /// Checks structure and signature before anything in the payload is
    /// trusted, then the validity window. Replay is not checked here; the
    /// ledger engine's consumed-token record owns that.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Malformed`], [`TokenError::SignatureMismatch`],
    /// or [`TokenError::Expired`].
    pub fn verify(&self, encoded: &str) -> Result<TokenClaims, TokenError> {
        self.verify_at(encoded, Utc::now())
    }

    fn verify_at(&self, encoded: &str, now: DateTime<Utc>) -> Result<TokenClaims, TokenError> {
        let claims: TokenClaims = envelope::decode(TOKEN_PREFIX, encoded, &self.secret)?;
        if now >= claims.expires_at {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

fn fresh_token_id() -> TokenId {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    TokenId::new(hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticRewardCatalog;
    use loyaltea_core::Role;

    fn secret() -> SecretString {
        SecretString::from("a-token-test-secret-with-enough-length")
    }

    fn service() -> TransactionTokenService<StaticRewardCatalog> {
        TransactionTokenService::new(secret(), StaticRewardCatalog::cafe_menu())
    }

    fn customer() -> Session {
        Session::new("acct-1", Role::Customer)
    }

    #[tokio::test]
    async fn stamp_token_round_trips() {
        let issued = service()
            .issue(&customer(), TokenIntent::Stamp, None)
            .await
            .expect("issues");
        let claims = TokenVerifier::new(secret())
            .verify(&issued.encoded)
            .expect("verifies");
        assert_eq!(claims, issued.claims);
        assert_eq!(claims.intent, TokenIntent::Stamp);
        assert_eq!(claims.account_id, AccountId::new("acct-1"));
        assert!(claims.reward_id.is_none());
    }

    #[tokio::test]
    async fn redeem_token_carries_the_reward() {
        let issued = service()
            .issue(
                &customer(),
                TokenIntent::Redeem,
                Some(RewardId::new("flat-white")),
            )
            .await
            .expect("issues");
        let claims = TokenVerifier::new(secret())
            .verify(&issued.encoded)
            .expect("verifies");
        assert_eq!(claims.reward_id, Some(RewardId::new("flat-white")));
    }

    #[tokio::test]
    async fn token_ids_are_128_bit_and_unique() {
        let service = service();
        let a = service
            .issue(&customer(), TokenIntent::Stamp, None)
            .await
            .expect("issues");
        let b = service
            .issue(&customer(), TokenIntent::Stamp, None)
            .await
            .expect("issues");
        assert_eq!(a.claims.token_id.as_str().len(), 32);
        assert_ne!(a.claims.token_id, b.claims.token_id);
    }

    #[tokio::test]
    async fn redeem_without_reward_is_rejected() {
        let result = service().issue(&customer(), TokenIntent::Redeem, None).await;
        assert!(matches!(result, Err(IssueError::MissingReward)));
    }

    #[tokio::test]
    async fn stamp_with_reward_is_rejected() {
        let result = service()
            .issue(
                &customer(),
                TokenIntent::Stamp,
                Some(RewardId::new("flat-white")),
            )
            .await;
        assert!(matches!(result, Err(IssueError::UnexpectedReward)));
    }

    #[tokio::test]
    async fn unknown_reward_is_rejected() {
        let result = service()
            .issue(
                &customer(),
                TokenIntent::Redeem,
                Some(RewardId::new("pumpkin-spice")),
            )
            .await;
        assert!(matches!(result, Err(IssueError::InvalidReward(_))));
    }

    #[tokio::test]
    async fn expired_token_is_rejected_even_when_well_formed() {
        let service = TransactionTokenService::with_ttl(
            secret(),
            StaticRewardCatalog::cafe_menu(),
            TimeDelta::seconds(-5),
        );
        let issued = service
            .issue(&customer(), TokenIntent::Stamp, None)
            .await
            .expect("issues");
        let result = TokenVerifier::new(secret()).verify(&issued.encoded);
        assert!(matches!(result, Err(TokenError::Expired)));
    }

    #[tokio::test]
    async fn wrong_secret_is_rejected() {
        let issued = service()
            .issue(&customer(), TokenIntent::Stamp, None)
            .await
            .expect("issues");
        let verifier = TokenVerifier::new(SecretString::from(
            "a-completely-different-signing-secret!",
        ));
        let result = verifier.verify(&issued.encoded);
        assert!(matches!(result, Err(TokenError::SignatureMismatch)));
    }
}
