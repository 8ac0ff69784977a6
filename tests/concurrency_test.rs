mod common;

use std::sync::Arc;

use anyhow::Result;
use common::{assert_ledger_clean, test_service};
use escrow_ledger::application::LedgerError;
use escrow_ledger::domain::HoldStatus;
use uuid::Uuid;

#[tokio::test(flavor = "multi_thread")]
async fn test_racing_holds_never_overdraw() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let user = Uuid::new_v4();
    service.top_up(user, 10_000).await?;

    // Two concurrent holds for the full balance: exactly one may win
    let (a, b) = tokio::join!(
        service.create_hold(user, 10_000, "Booking escrow", "booking-a"),
        service.create_hold(user, 10_000, "Booking escrow", "booking-b"),
    );

    let (winner, loser) = match (a, b) {
        (Ok(hold), Err(err)) | (Err(err), Ok(hold)) => (hold, err),
        (Ok(_), Ok(_)) => panic!("both holds succeeded against a single balance"),
        (Err(a), Err(b)) => panic!("both holds failed: {:?} / {:?}", a, b),
    };

    assert_eq!(winner.status, HoldStatus::Active);
    assert!(
        matches!(loser, LedgerError::InsufficientBalance { .. }),
        "{:?}",
        loser
    );

    // Balance is zero, never negative, never double-debited
    assert_eq!(service.get_balance(user).await?.amount_cents, 0);
    assert_ledger_clean(&service).await
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_top_ups_all_apply() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let service = Arc::new(service);
    let user = Uuid::new_v4();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service.top_up(user, 1_000).await
        }));
    }
    for handle in handles {
        handle.await??;
    }

    assert_eq!(service.get_balance(user).await?.amount_cents, 10_000);
    assert_ledger_clean(&service).await
}

#[tokio::test(flavor = "multi_thread")]
async fn test_racing_release_and_settle_one_wins() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let payer = Uuid::new_v4();
    let payee = Uuid::new_v4();

    service.top_up(payer, 20_000).await?;
    let hold = service
        .create_hold(payer, 20_000, "Booking escrow", "booking-race")
        .await?;

    let (released, settled) = tokio::join!(
        service.release_hold(hold.id),
        service.settle_hold(hold.id, payee),
    );

    assert!(
        released.is_ok() != settled.is_ok(),
        "exactly one transition must win: {:?} / {:?}",
        released.as_ref().map(|h| h.status),
        settled.as_ref().map(|h| h.status)
    );

    let hold = service.get_hold(hold.id).await?;
    let payer_cents = service.get_balance(payer).await?.amount_cents;
    match hold.status {
        HoldStatus::Released => assert_eq!(payer_cents, 20_000),
        HoldStatus::Settled => {
            assert_eq!(payer_cents, 0);
            assert_eq!(service.get_balance(payee).await?.amount_cents, 19_000);
        }
        other => panic!("unexpected terminal status: {}", other),
    }

    assert_ledger_clean(&service).await
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_settlements_into_shared_payee() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let service = Arc::new(service);
    let payee = Uuid::new_v4();

    // Several payers settle into the same payee concurrently; the fixed
    // wallet lock order must let all of them complete.
    let mut holds = Vec::new();
    for i in 0..4 {
        let payer = Uuid::new_v4();
        service.top_up(payer, 10_000).await?;
        let hold = service
            .create_hold(payer, 10_000, "Booking escrow", &format!("booking-{}", i))
            .await?;
        holds.push(hold.id);
    }

    let mut handles = Vec::new();
    for hold_id in holds {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service.settle_hold(hold_id, payee).await
        }));
    }
    for handle in handles {
        let hold = handle.await??;
        assert_eq!(hold.status, HoldStatus::Settled);
    }

    // 4 x 95.00 payouts
    assert_eq!(service.get_balance(payee).await?.amount_cents, 38_000);
    assert_ledger_clean(&service).await
}
