//! Integration tests for the LoyalTEA loyalty ledger.
//!
//! The scenarios run the full proof-of-presence exchange against the
//! in-memory ledger store: customer session → token issuance → staff terminal
//! credential → ledger engine application.
//!
//! # Test Categories
//!
//! - `loyalty_flow` - Stamp/redeem flows and card invariants
//! - `token_security` - Replay, expiry, forgery, and terminal authority
//! - `concurrency` - Concurrent submissions against one account

use std::sync::Arc;

use secrecy::SecretString;

use loyaltea_core::{AccountId, CupKind, RewardId, Role, Session};
use loyaltea_ledger::{
    IssueError, IssuedToken, LedgerEngine, LedgerError, MemoryLedgerStore, RedemptionResult,
    StampResult, StaticRewardCatalog, TerminalAuthenticator, TerminalCredential, TokenIntent,
    TokenVerifier, TransactionTokenService,
};

const TOKEN_SECRET: &str = "integration-token-signing-material!!42";
const TERMINAL_SECRET: &str = "integration-terminal-signing-material!";

/// Everything a scenario needs: a shared store, the engine, and both
/// credential issuers.
pub struct TestContext {
    pub store: Arc<MemoryLedgerStore>,
    pub engine: LedgerEngine<Arc<MemoryLedgerStore>>,
    pub tokens: TransactionTokenService<StaticRewardCatalog>,
    pub terminals: TerminalAuthenticator,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    #[must_use]
    pub fn new() -> Self {
        let store = Arc::new(MemoryLedgerStore::new());
        Self {
            engine: LedgerEngine::new(
                Arc::clone(&store),
                TokenVerifier::new(SecretString::from(TOKEN_SECRET)),
                TerminalAuthenticator::new(SecretString::from(TERMINAL_SECRET)),
            ),
            store,
            tokens: TransactionTokenService::new(
                SecretString::from(TOKEN_SECRET),
                StaticRewardCatalog::cafe_menu(),
            ),
            terminals: TerminalAuthenticator::new(SecretString::from(TERMINAL_SECRET)),
        }
    }

    /// A second engine over the same store, as after a service restart.
    #[must_use]
    pub fn restarted_engine(&self) -> LedgerEngine<Arc<MemoryLedgerStore>> {
        LedgerEngine::new(
            Arc::clone(&self.store),
            TokenVerifier::new(SecretString::from(TOKEN_SECRET)),
            TerminalAuthenticator::new(SecretString::from(TERMINAL_SECRET)),
        )
    }

    /// Register a customer account and return its session.
    ///
    /// # Panics
    ///
    /// Panics if the store rejects the registration.
    #[must_use]
    pub fn register_customer(&self, account: &str) -> Session {
        self.store
            .register_account(&AccountId::new(account))
            .expect("store registers account");
        Session::new(account, Role::Customer)
    }

    /// A terminal credential for a staff scanning session.
    ///
    /// # Panics
    ///
    /// Panics if the staff session fails to authenticate.
    #[must_use]
    pub fn staff_terminal(&self) -> TerminalCredential {
        self.terminals
            .authenticate_terminal(&Session::new("staff-1", Role::Staff))
            .expect("staff session authenticates")
    }

    /// Issue a stamp token for a customer session.
    ///
    /// # Errors
    ///
    /// Propagates [`IssueError`] from the token service.
    pub async fn issue_stamp_token(&self, session: &Session) -> Result<IssuedToken, IssueError> {
        self.tokens.issue(session, TokenIntent::Stamp, None).await
    }

    /// Issue a redeem token for a customer session.
    ///
    /// # Errors
    ///
    /// Propagates [`IssueError`] from the token service.
    pub async fn issue_redeem_token(
        &self,
        session: &Session,
        reward: &str,
    ) -> Result<IssuedToken, IssueError> {
        self.tokens
            .issue(session, TokenIntent::Redeem, Some(RewardId::new(reward)))
            .await
    }

    /// Full stamp round trip: issue a token and apply it at the terminal.
    ///
    /// # Errors
    ///
    /// Propagates [`LedgerError`] from the engine.
    ///
    /// # Panics
    ///
    /// Panics if token issuance itself fails.
    pub async fn stamp(
        &self,
        session: &Session,
        cup_kind: CupKind,
    ) -> Result<StampResult, LedgerError> {
        let issued = self
            .issue_stamp_token(session)
            .await
            .expect("token issuance succeeds");
        self.engine
            .apply_stamp(&issued.encoded, &self.staff_terminal(), cup_kind)
            .await
    }

    /// Full redemption round trip: issue a token and apply it at the terminal.
    ///
    /// # Errors
    ///
    /// Propagates [`LedgerError`] from the engine.
    ///
    /// # Panics
    ///
    /// Panics if token issuance itself fails.
    pub async fn redeem(
        &self,
        session: &Session,
        reward: &str,
        cup_kind: CupKind,
    ) -> Result<RedemptionResult, LedgerError> {
        let issued = self
            .issue_redeem_token(session, reward)
            .await
            .expect("token issuance succeeds");
        self.engine
            .apply_redemption(&issued.encoded, &self.staff_terminal(), cup_kind)
            .await
    }
}
