//! Concurrent submissions against one account.
//!
//! The engine must serialize distinct tokens on the same card: no lost
//! updates, no overshooting the stamp cap, and never more than one winner for
//! the last free slot.

use std::sync::Arc;

use loyaltea_core::{AccountId, CupKind, MAX_STAMPS};
use loyaltea_integration_tests::TestContext;
use loyaltea_ledger::LedgerError;

#[tokio::test]
async fn two_stamps_racing_for_the_last_slot_produce_one_winner() {
    let ctx = Arc::new(TestContext::new());
    let session = ctx.register_customer("acct-1");

    for _ in 0..8 {
        ctx.stamp(&session, CupKind::Disposable)
            .await
            .expect("stamp applies");
    }

    let first = ctx
        .issue_stamp_token(&session)
        .await
        .expect("token issuance succeeds");
    let second = ctx
        .issue_stamp_token(&session)
        .await
        .expect("token issuance succeeds");

    let mut handles = Vec::new();
    for issued in [first, second] {
        let ctx = Arc::clone(&ctx);
        handles.push(tokio::spawn(async move {
            ctx.engine
                .apply_stamp(&issued.encoded, &ctx.staff_terminal(), CupKind::Disposable)
                .await
        }));
    }

    let mut successes = 0;
    let mut card_full = 0;
    for handle in handles {
        match handle.await.expect("task completes") {
            Ok(result) => {
                successes += 1;
                assert_eq!(result.card.stamp_count, MAX_STAMPS);
            }
            Err(LedgerError::CardFull) => card_full += 1,
            Err(other) => panic!("unexpected outcome: {other:?}"),
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(card_full, 1);

    let summary = ctx
        .engine
        .card_summary(&AccountId::new("acct-1"))
        .await
        .expect("reads");
    assert_eq!(summary.card.stamp_count, MAX_STAMPS);
    assert_eq!(summary.card.lifetime_stamps_collected, u64::from(MAX_STAMPS));
}

#[tokio::test]
async fn distinct_tokens_with_room_to_spare_all_land() {
    let ctx = Arc::new(TestContext::new());
    let session = ctx.register_customer("acct-1");

    let mut tokens = Vec::new();
    for _ in 0..5 {
        tokens.push(
            ctx.issue_stamp_token(&session)
                .await
                .expect("token issuance succeeds"),
        );
    }

    let mut handles = Vec::new();
    for issued in tokens {
        let ctx = Arc::clone(&ctx);
        handles.push(tokio::spawn(async move {
            ctx.engine
                .apply_stamp(&issued.encoded, &ctx.staff_terminal(), CupKind::Reusable)
                .await
        }));
    }

    for handle in handles {
        handle.await.expect("task completes").expect("stamp applies");
    }

    let summary = ctx
        .engine
        .card_summary(&AccountId::new("acct-1"))
        .await
        .expect("reads");
    assert_eq!(summary.card.stamp_count, 5);
    assert_eq!(summary.card.lifetime_stamps_collected, 5);
    assert_eq!(summary.card.lifetime_co2_saved_grams, 75);
}

#[tokio::test]
async fn the_same_token_submitted_twice_concurrently_lands_once() {
    let ctx = Arc::new(TestContext::new());
    let session = ctx.register_customer("acct-1");
    let issued = ctx
        .issue_stamp_token(&session)
        .await
        .expect("token issuance succeeds");

    let mut handles = Vec::new();
    for _ in 0..2 {
        let ctx = Arc::clone(&ctx);
        let encoded = issued.encoded.clone();
        handles.push(tokio::spawn(async move {
            ctx.engine
                .apply_stamp(&encoded, &ctx.staff_terminal(), CupKind::Reusable)
                .await
        }));
    }

    let mut successes = 0;
    let mut replayed = 0;
    for handle in handles {
        match handle.await.expect("task completes") {
            Ok(_) => successes += 1,
            Err(LedgerError::TokenReplayed) => replayed += 1,
            Err(other) => panic!("unexpected outcome: {other:?}"),
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(replayed, 1);

    let summary = ctx
        .engine
        .card_summary(&AccountId::new("acct-1"))
        .await
        .expect("reads");
    assert_eq!(summary.card.stamp_count, 1);
}
