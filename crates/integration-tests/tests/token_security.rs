//! Replay, expiry, forgery, and terminal authority.
//!
//! The trust anchor is the pair of independent signed claims: a customer
//! token alone can't mutate the ledger, and a terminal credential alone can't
//! decide what mutation to apply.

use chrono::TimeDelta;
use secrecy::SecretString;

use loyaltea_core::{AccountId, CupKind, Role, Session};
use loyaltea_integration_tests::TestContext;
use loyaltea_ledger::{
    LedgerError, LedgerStore, StaticRewardCatalog, TerminalAuthError, TerminalAuthenticator,
    TokenIntent, TransactionTokenService,
};

#[tokio::test]
async fn a_replayed_token_is_rejected_even_after_a_restart() {
    let ctx = TestContext::new();
    let session = ctx.register_customer("acct-1");
    let issued = ctx
        .issue_stamp_token(&session)
        .await
        .expect("token issuance succeeds");
    let terminal = ctx.staff_terminal();

    ctx.engine
        .apply_stamp(&issued.encoded, &terminal, CupKind::Reusable)
        .await
        .expect("first application succeeds");

    // The replay guard lives in the store, so a fresh engine over the same
    // store still refuses the token.
    let restarted = ctx.restarted_engine();
    let result = restarted
        .apply_stamp(&issued.encoded, &terminal, CupKind::Reusable)
        .await;
    assert!(matches!(result, Err(LedgerError::TokenReplayed)));

    let summary = ctx
        .engine
        .card_summary(&AccountId::new("acct-1"))
        .await
        .expect("reads");
    assert_eq!(summary.card.stamp_count, 1);
}

#[tokio::test]
async fn a_lost_response_retry_reports_the_replay_not_a_balance_error() {
    let ctx = TestContext::new();
    let session = ctx.register_customer("acct-1");
    for _ in 0..9 {
        ctx.stamp(&session, CupKind::Disposable)
            .await
            .expect("stamp applies");
    }
    let issued = ctx
        .issue_redeem_token(&session, "flat-white")
        .await
        .expect("token issuance succeeds");
    let terminal = ctx.staff_terminal();

    ctx.engine
        .apply_redemption(&issued.encoded, &terminal, CupKind::Disposable)
        .await
        .expect("redemption succeeds");

    // The terminal never saw the response and submits the same token again.
    // The emptied card must not turn the retry into a balance complaint.
    let result = ctx
        .engine
        .apply_redemption(&issued.encoded, &terminal, CupKind::Disposable)
        .await;
    assert!(matches!(result, Err(LedgerError::TokenReplayed)));
}

#[tokio::test]
async fn expired_tokens_are_rejected_however_valid_otherwise() {
    let ctx = TestContext::new();
    let session = ctx.register_customer("acct-1");

    let short_lived = TransactionTokenService::with_ttl(
        SecretString::from("integration-token-signing-material!!42"),
        StaticRewardCatalog::cafe_menu(),
        TimeDelta::seconds(-1),
    );
    let issued = short_lived
        .issue(&session, TokenIntent::Stamp, None)
        .await
        .expect("token issuance succeeds");

    let result = ctx
        .engine
        .apply_stamp(&issued.encoded, &ctx.staff_terminal(), CupKind::Reusable)
        .await;
    assert!(matches!(result, Err(LedgerError::TokenExpired)));
}

#[tokio::test]
async fn an_unsigned_json_payload_is_not_a_token() {
    // The legacy scheme trusted a bare JSON description of the mutation.
    let ctx = TestContext::new();
    ctx.register_customer("acct-1");

    let bare = r#"{"mode":"stamp","userId":"acct-1"}"#;
    let result = ctx
        .engine
        .apply_stamp(bare, &ctx.staff_terminal(), CupKind::Reusable)
        .await;
    assert!(matches!(result, Err(LedgerError::TokenInvalid(_))));
}

#[tokio::test]
async fn a_token_signed_with_another_secret_is_rejected() {
    let ctx = TestContext::new();
    let session = ctx.register_customer("acct-1");

    let forger = TransactionTokenService::new(
        SecretString::from("attacker-controlled-signing-material!!"),
        StaticRewardCatalog::cafe_menu(),
    );
    let issued = forger
        .issue(&session, TokenIntent::Stamp, None)
        .await
        .expect("forger can sign whatever it likes");

    let result = ctx
        .engine
        .apply_stamp(&issued.encoded, &ctx.staff_terminal(), CupKind::Reusable)
        .await;
    assert!(matches!(result, Err(LedgerError::TokenInvalid(_))));
}

#[tokio::test]
async fn customers_cannot_obtain_terminal_credentials() {
    let ctx = TestContext::new();
    let result = ctx
        .terminals
        .authenticate_terminal(&Session::new("acct-1", Role::Customer));
    assert!(matches!(result, Err(TerminalAuthError::NotStaff)));
}

#[tokio::test]
async fn an_expired_terminal_credential_cannot_apply_anything() {
    let ctx = TestContext::new();
    let session = ctx.register_customer("acct-1");
    let issued = ctx
        .issue_stamp_token(&session)
        .await
        .expect("token issuance succeeds");

    let stale_issuer = TerminalAuthenticator::with_ttl(
        SecretString::from("integration-terminal-signing-material!"),
        TimeDelta::seconds(-1),
    );
    let stale = stale_issuer
        .authenticate_terminal(&Session::new("staff-1", Role::Staff))
        .expect("issues");

    let result = ctx
        .engine
        .apply_stamp(&issued.encoded, &stale, CupKind::Reusable)
        .await;
    assert!(matches!(result, Err(LedgerError::TerminalInvalid(_))));
    assert!(
        !ctx.store
            .is_token_consumed(&issued.claims.token_id)
            .await
            .expect("queries")
    );
}

#[tokio::test]
async fn a_redeem_token_cannot_stamp_and_vice_versa() {
    let ctx = TestContext::new();
    let session = ctx.register_customer("acct-1");

    let stamp_token = ctx
        .issue_stamp_token(&session)
        .await
        .expect("token issuance succeeds");
    let redeem_token = ctx
        .issue_redeem_token(&session, "flat-white")
        .await
        .expect("token issuance succeeds");
    let terminal = ctx.staff_terminal();

    let result = ctx
        .engine
        .apply_redemption(&stamp_token.encoded, &terminal, CupKind::Disposable)
        .await;
    assert!(matches!(result, Err(LedgerError::TokenInvalid(_))));

    let result = ctx
        .engine
        .apply_stamp(&redeem_token.encoded, &terminal, CupKind::Disposable)
        .await;
    assert!(matches!(result, Err(LedgerError::TokenInvalid(_))));
}
