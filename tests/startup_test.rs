mod common;

use anyhow::Result;
use escrow_ledger::application::{LedgerConfig, LedgerError, WalletLedgerService};
use tempfile::TempDir;
use uuid::Uuid;

#[tokio::test]
async fn test_connect_after_init_succeeds() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("ledger.db");
    let path = db_path.to_str().unwrap();

    WalletLedgerService::init(path, LedgerConfig::default()).await?;

    let service = WalletLedgerService::connect(path, LedgerConfig::default()).await?;
    let balance = service.get_balance(Uuid::new_v4()).await?;
    assert_eq!(balance.amount_cents, 0);
    Ok(())
}

#[tokio::test]
async fn test_connect_fails_fast_on_unmigrated_database() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("empty.db");
    std::fs::File::create(&db_path)?;

    // No migrations were applied out-of-band; startup must refuse, not DDL
    let err = WalletLedgerService::connect(db_path.to_str().unwrap(), LedgerConfig::default())
        .await
        .err()
        .expect("connect should fail on missing relations");

    match err {
        LedgerError::Storage(err) => {
            assert!(err.to_string().contains("Missing relations"), "{}", err)
        }
        other => panic!("expected Storage error, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_reconciliation_detects_tampered_balance() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("ledger.db");
    let path = db_path.to_str().unwrap();

    let service = WalletLedgerService::init(path, LedgerConfig::default()).await?;
    let user = Uuid::new_v4();
    service.top_up(user, 10_000).await?;
    assert!(service.check_integrity().await?.is_clean());

    // Corrupt the stored balance behind the ledger's back
    let pool = sqlx::SqlitePool::connect(&format!("sqlite:{}", path)).await?;
    sqlx::query("UPDATE wallets SET balance_cents = balance_cents + 1")
        .execute(&pool)
        .await?;

    let report = service.check_integrity().await?;
    assert!(!report.is_clean());
    assert_eq!(report.mismatches.len(), 1);
    assert_eq!(report.mismatches[0].stored_cents, 10_001);
    assert_eq!(report.mismatches[0].ledger_cents, 10_000);
    Ok(())
}
