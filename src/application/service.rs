use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::domain::{
    Cents, Hold, HoldId, LedgerEntry, ReconciliationReport, UserId, find_mismatches,
    split_commission,
};
use crate::storage::Repository;

use super::{LedgerConfig, LedgerError};

/// Current spendable balance of a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Balance {
    pub amount_cents: Cents,
}

/// Business-rule layer over the ledger repository. This is the interface
/// calling collaborators (booking flow, top-up endpoint, admin tooling) use;
/// it validates amounts, computes commission splits, and leaves atomicity to
/// the repository's transactions.
///
/// Operations carry no idempotency key: a retried `top_up` or `create_hold`
/// with the same reference id is applied again. Deduplication is the caller's
/// concern.
pub struct WalletLedgerService {
    repo: Repository,
    config: LedgerConfig,
}

impl WalletLedgerService {
    /// Create a new service over an already-connected repository.
    pub fn new(repo: Repository, config: LedgerConfig) -> Self {
        Self { repo, config }
    }

    /// Initialize a new database at the given path (runs migrations).
    pub async fn init(database_path: &str, config: LedgerConfig) -> Result<Self, LedgerError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo, config))
    }

    /// Connect to an existing, already-migrated database. Fails fast if the
    /// required relations are absent.
    pub async fn connect(database_path: &str, config: LedgerConfig) -> Result<Self, LedgerError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo, config))
    }

    /// Current balance for a user, creating the wallet with zero balance on
    /// first touch.
    pub async fn get_balance(&self, user_id: UserId) -> Result<Balance, LedgerError> {
        let wallet = self.repo.ensure_wallet(user_id).await?;
        Ok(Balance {
            amount_cents: wallet.balance_cents,
        })
    }

    /// Credit a user's wallet and append a CREDIT ledger entry. Returns the
    /// new balance.
    pub async fn top_up(&self, user_id: UserId, amount_cents: Cents) -> Result<Balance, LedgerError> {
        require_positive(amount_cents)?;
        let balance = self.repo.top_up(user_id, amount_cents).await?;
        info!(%user_id, amount_cents, balance, "wallet topped up");
        Ok(Balance {
            amount_cents: balance,
        })
    }

    /// Escrow funds against a user's wallet for a pending booking. The amount
    /// leaves the spendable balance immediately; it is returned by
    /// `release_hold` or paid out by `settle_hold`.
    pub async fn create_hold(
        &self,
        user_id: UserId,
        amount_cents: Cents,
        reason: &str,
        reference_id: &str,
    ) -> Result<Hold, LedgerError> {
        require_positive(amount_cents)?;
        let hold = self
            .repo
            .create_hold(user_id, amount_cents, reason, reference_id)
            .await?;
        info!(%user_id, hold_id = %hold.id, amount_cents, reference_id, "hold created");
        Ok(hold)
    }

    /// Return an ACTIVE hold's funds to the payer's wallet.
    pub async fn release_hold(&self, hold_id: HoldId) -> Result<Hold, LedgerError> {
        let hold = self.repo.release_hold(hold_id).await?;
        info!(%hold_id, amount_cents = hold.amount_cents, "hold released");
        Ok(hold)
    }

    /// Settle an ACTIVE hold: pay the payee, retain the platform commission
    /// at the configured rate. The payer's wallet is untouched; its funds
    /// left at hold creation.
    pub async fn settle_hold(
        &self,
        hold_id: HoldId,
        payee_user_id: UserId,
    ) -> Result<Hold, LedgerError> {
        self.settle_hold_with_rate(hold_id, payee_user_id, self.config.commission_rate)
            .await
    }

    /// Settle an ACTIVE hold at an explicit commission rate.
    pub async fn settle_hold_with_rate(
        &self,
        hold_id: HoldId,
        payee_user_id: UserId,
        commission_rate: Decimal,
    ) -> Result<Hold, LedgerError> {
        let hold = self
            .repo
            .get_hold(hold_id)
            .await?
            .ok_or(LedgerError::HoldNotFound(hold_id))?;

        let split = split_commission(hold.amount_cents, commission_rate)?;
        debug!(
            %hold_id,
            amount_cents = hold.amount_cents,
            commission_cents = split.commission_cents,
            payout_cents = split.payout_cents,
            "computed settlement split"
        );

        let hold = self
            .repo
            .settle_hold(
                hold_id,
                payee_user_id,
                self.config.platform_user_id,
                split.commission_cents,
            )
            .await?;
        info!(
            %hold_id,
            %payee_user_id,
            payout_cents = split.payout_cents,
            commission_cents = split.commission_cents,
            "hold settled"
        );
        Ok(hold)
    }

    /// Get a hold by id.
    pub async fn get_hold(&self, hold_id: HoldId) -> Result<Hold, LedgerError> {
        self.repo
            .get_hold(hold_id)
            .await?
            .ok_or(LedgerError::HoldNotFound(hold_id))
    }

    /// A user's ledger entries, newest first. Users without a wallet have an
    /// empty history.
    pub async fn ledger_history(&self, user_id: UserId) -> Result<Vec<LedgerEntry>, LedgerError> {
        match self.repo.get_wallet_by_user(user_id).await? {
            Some(wallet) => self.repo.list_entries_for_wallet(wallet.id).await,
            None => Ok(Vec::new()),
        }
    }

    /// Reconcile every wallet's stored balance against the signed sum of its
    /// ledger entries and report structural defects.
    pub async fn check_integrity(&self) -> Result<ReconciliationReport, LedgerError> {
        let stats = self.repo.get_integrity_stats().await?;
        let wallets = self.repo.list_wallets().await?;
        let ledger_balances = self.repo.all_ledger_balances().await?;
        let mismatches = find_mismatches(&wallets, &ledger_balances);

        Ok(ReconciliationReport {
            wallet_count: stats.wallet_count,
            entry_count: stats.entry_count,
            hold_count: stats.hold_count,
            mismatches,
            negative_balances: stats.negative_balances,
            invalid_wallet_refs: stats.invalid_wallet_refs,
            invalid_amounts: stats.invalid_amounts,
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }
}

fn require_positive(amount_cents: Cents) -> Result<(), LedgerError> {
    if amount_cents <= 0 {
        return Err(LedgerError::InvalidAmount(
            "Amount must be positive".to_string(),
        ));
    }
    Ok(())
}
