// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use escrow_ledger::application::{LedgerConfig, WalletLedgerService};
use tempfile::TempDir;
use uuid::Uuid;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(WalletLedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service =
        WalletLedgerService::init(db_path.to_str().unwrap(), LedgerConfig::default()).await?;
    Ok((service, temp_dir))
}

/// The platform (commission) wallet owner under the default config
pub fn platform_user() -> Uuid {
    LedgerConfig::default().platform_user_id
}

/// Assert that every wallet reconciles against the ledger
pub async fn assert_ledger_clean(service: &WalletLedgerService) -> Result<()> {
    let report = service.check_integrity().await?;
    assert!(
        report.is_clean(),
        "ledger does not reconcile: {:?}",
        report
    );
    Ok(())
}
