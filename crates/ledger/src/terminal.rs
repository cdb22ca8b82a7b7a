//! Staff terminal authentication.
//!
//! The terminal credential is the staff half of the proof-of-presence
//! exchange: independent evidence that whoever submits a scanned token is an
//! authorized terminal, no matter what the customer's token says. Credentials
//! are re-derived per scanning session (not per scan) and expire after a few
//! minutes, so a compromised terminal has a bounded window.

use chrono::{DateTime, TimeDelta, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use loyaltea_core::{AccountId, Session};

use crate::config::DEFAULT_TERMINAL_TTL_SECS;
use crate::envelope::{self, EnvelopeError};

/// Envelope prefix for terminal credentials. Distinct from the token prefix so
/// a customer token can never pass as a terminal credential.
const TERMINAL_PREFIX: &str = "LTS1";

/// Claim set inside a terminal credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalClaims {
    /// Staff operator running the terminal.
    pub staff_account_id: AccountId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Signed, short-lived credential carried by a scanning terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TerminalCredential(String);

impl TerminalCredential {
    /// The encoded credential string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Errors from terminal authentication and verification.
#[derive(Debug, Error)]
pub enum TerminalAuthError {
    /// Only staff sessions may operate a terminal.
    #[error("session role is not staff")]
    NotStaff,
    /// Not a parseable credential envelope.
    #[error("malformed terminal credential: {0}")]
    Malformed(String),
    /// Signature does not match the claims.
    #[error("terminal credential signature mismatch")]
    SignatureMismatch,
    /// The credential's validity window has passed.
    #[error("terminal credential expired")]
    Expired,
}

impl From<EnvelopeError> for TerminalAuthError {
    fn from(err: EnvelopeError) -> Self {
        match err {
            EnvelopeError::Malformed(reason) => Self::Malformed(reason),
            EnvelopeError::SignatureMismatch => Self::SignatureMismatch,
        }
    }
}

/// Issues and verifies terminal credentials.
pub struct TerminalAuthenticator {
    secret: SecretString,
    ttl: TimeDelta,
}

impl std::fmt::Debug for TerminalAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalAuthenticator")
            .field("secret", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TerminalAuthenticator {
    /// Create an authenticator with the default 5-minute credential window.
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self::with_ttl(secret, TimeDelta::seconds(DEFAULT_TERMINAL_TTL_SECS))
    }

    /// Create an authenticator with an explicit credential window.
    #[must_use]
    pub const fn with_ttl(secret: SecretString, ttl: TimeDelta) -> Self {
        Self { secret, ttl }
    }

    /// Issue a credential for a staff scanning session.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalAuthError::NotStaff`] unless the session's role is
    /// staff, and [`TerminalAuthError::Malformed`] if the claims cannot be
    /// encoded.
    pub fn authenticate_terminal(
        &self,
        session: &Session,
    ) -> Result<TerminalCredential, TerminalAuthError> {
        if !session.role.is_staff() {
            return Err(TerminalAuthError::NotStaff);
        }
        let now = Utc::now();
        let claims = TerminalClaims {
            staff_account_id: session.account_id.clone(),
            issued_at: now,
            expires_at: now + self.ttl,
        };
        let encoded = envelope::encode(TERMINAL_PREFIX, &claims, &self.secret)?;
        debug!(staff = %claims.staff_account_id, expires_at = %claims.expires_at, "issued terminal credential");
        Ok(TerminalCredential(encoded))
    }

    /// Verify a credential and return its claims.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalAuthError::Malformed`],
    /// [`TerminalAuthError::SignatureMismatch`], or
    /// [`TerminalAuthError::Expired`].
    pub fn verify(
        &self,
        credential: &TerminalCredential,
    ) -> Result<TerminalClaims, TerminalAuthError> {
        let claims: TerminalClaims =
            envelope::decode(TERMINAL_PREFIX, credential.as_str(), &self.secret)?;
        if Utc::now() >= claims.expires_at {
            return Err(TerminalAuthError::Expired);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loyaltea_core::Role;

    fn secret() -> SecretString {
        SecretString::from("a-terminal-test-secret-of-decent-length")
    }

    #[test]
    fn staff_session_gets_a_verifiable_credential() {
        let auth = TerminalAuthenticator::new(secret());
        let session = Session::new("staff-1", Role::Staff);
        let credential = auth.authenticate_terminal(&session).expect("issues");
        let claims = auth.verify(&credential).expect("verifies");
        assert_eq!(claims.staff_account_id, AccountId::new("staff-1"));
    }

    #[test]
    fn customer_session_is_refused() {
        let auth = TerminalAuthenticator::new(secret());
        let session = Session::new("acct-1", Role::Customer);
        let result = auth.authenticate_terminal(&session);
        assert!(matches!(result, Err(TerminalAuthError::NotStaff)));
    }

    #[test]
    fn expired_credential_is_rejected() {
        let auth = TerminalAuthenticator::with_ttl(secret(), TimeDelta::seconds(-1));
        let session = Session::new("staff-1", Role::Staff);
        let credential = auth.authenticate_terminal(&session).expect("issues");
        let result = auth.verify(&credential);
        assert!(matches!(result, Err(TerminalAuthError::Expired)));
    }

    #[test]
    fn credential_from_another_secret_is_rejected() {
        let auth = TerminalAuthenticator::new(secret());
        let forger = TerminalAuthenticator::new(SecretString::from(
            "a-completely-different-signing-secret!",
        ));
        let session = Session::new("staff-1", Role::Staff);
        let credential = forger.authenticate_terminal(&session).expect("issues");
        let result = auth.verify(&credential);
        assert!(matches!(result, Err(TerminalAuthError::SignatureMismatch)));
    }

    #[test]
    fn customer_token_shape_is_not_a_terminal_credential() {
        let auth = TerminalAuthenticator::new(secret());
        let result = auth.verify(&TerminalCredential("LT1.e30.00".to_owned()));
        assert!(matches!(result, Err(TerminalAuthError::Malformed(_))));
    }
}
