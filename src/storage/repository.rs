use std::collections::HashMap;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::application::LedgerError;
use crate::domain::{
    Cents, EntryType, Hold, HoldId, HoldStatus, LedgerEntry, UserId, Wallet, WalletId,
};

use super::MIGRATION_001_INITIAL;

/// Statistics for ledger integrity verification.
#[derive(Debug, Clone)]
pub struct IntegrityStats {
    pub wallet_count: i64,
    pub entry_count: i64,
    pub hold_count: i64,
    pub negative_balances: i64,
    pub invalid_wallet_refs: i64,
    pub invalid_amounts: i64,
}

/// Repository for wallets, holds, and the append-only ledger. Owns every SQL
/// statement and every transaction boundary; storage errors never cross this
/// layer as anything other than `LedgerError::Storage`.
///
/// All mutating operations run in a single transaction whose first statement
/// is a write, so the store's write lock covers the whole unit of work.
/// Balance checks and hold-status transitions are guarded UPDATEs
/// (`... AND balance_cents >= ?` / `... AND status = 'active'`): the check and
/// the mutation are one atomic statement, so two racing transactions can never
/// both pass the check against the same row.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to an existing database and fail fast if the required
    /// relations are absent. Migrations are a deployment-time concern; this
    /// never attempts DDL.
    pub async fn connect(database_url: &str) -> Result<Self, LedgerError> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        let repo = Self::new(pool);
        repo.verify_schema().await?;
        Ok(repo)
    }

    /// Initialize a new database (connect + migrate). Intended for the `init`
    /// command and tests, not for service startup.
    pub async fn init(database_url: &str) -> Result<Self, LedgerError> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        let repo = Self::new(pool);
        repo.migrate().await?;
        Ok(repo)
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<(), LedgerError> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Verify that the wallets, ledger_entries, and holds relations exist.
    async fn verify_schema(&self) -> Result<(), LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT name FROM sqlite_master
            WHERE type = 'table' AND name IN ('wallets', 'ledger_entries', 'holds')
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to inspect schema")?;

        let present: Vec<String> = rows.iter().map(|row| row.get("name")).collect();
        let missing: Vec<&str> = ["wallets", "ledger_entries", "holds"]
            .into_iter()
            .filter(|name| !present.iter().any(|p| p == name))
            .collect();

        if !missing.is_empty() {
            return Err(LedgerError::Storage(anyhow!(
                "Missing relations: {} (run migrations before starting)",
                missing.join(", ")
            )));
        }
        Ok(())
    }

    // ========================
    // Wallet operations
    // ========================

    /// Get the wallet for a user, creating it with zero balance if absent.
    pub async fn ensure_wallet(&self, user_id: UserId) -> Result<Wallet, LedgerError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire connection")?;
        Self::ensure_wallet_conn(&mut conn, user_id).await
    }

    /// Get a wallet by owning user.
    pub async fn get_wallet_by_user(&self, user_id: UserId) -> Result<Option<Wallet>, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, balance_cents, created_at
            FROM wallets
            WHERE user_id = ?
            "#,
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch wallet")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_wallet(&row)?)),
            None => Ok(None),
        }
    }

    /// List all wallets.
    pub async fn list_wallets(&self) -> Result<Vec<Wallet>, LedgerError> {
        let rows = sqlx::query(
            "SELECT id, user_id, balance_cents, created_at FROM wallets ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list wallets")?;

        rows.iter()
            .map(|row| Self::row_to_wallet(row))
            .collect()
    }

    /// Credit a wallet and append the matching CREDIT ledger entry, in one
    /// transaction. Returns the new balance.
    pub async fn top_up(&self, user_id: UserId, amount_cents: Cents) -> Result<Cents, LedgerError> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let wallet = Self::ensure_wallet_conn(&mut tx, user_id).await?;
        Self::credit_wallet(&mut tx, wallet.id, amount_cents).await?;
        Self::insert_entry(
            &mut tx,
            &LedgerEntry::credit(wallet.id, amount_cents, "Wallet top up", None),
        )
        .await?;
        let balance = Self::fetch_balance(&mut tx, wallet.id).await?;

        tx.commit().await.context("Failed to commit top up")?;
        Ok(balance)
    }

    // ========================
    // Hold operations
    // ========================

    /// Atomically debit the payer's wallet and open an ACTIVE hold for the
    /// debited amount. The balance check and the decrement are one guarded
    /// UPDATE, so concurrent holds against the same wallet can never
    /// collectively overdraw it.
    pub async fn create_hold(
        &self,
        user_id: UserId,
        amount_cents: Cents,
        reason: &str,
        reference_id: &str,
    ) -> Result<Hold, LedgerError> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let wallet = Self::ensure_wallet_conn(&mut tx, user_id).await?;

        let debited = sqlx::query(
            r#"
            UPDATE wallets
            SET balance_cents = balance_cents - ?
            WHERE id = ? AND balance_cents >= ?
            "#,
        )
        .bind(amount_cents)
        .bind(wallet.id.to_string())
        .bind(amount_cents)
        .execute(&mut *tx)
        .await
        .context("Failed to debit wallet")?;

        if debited.rows_affected() == 0 {
            let balance = Self::fetch_balance(&mut tx, wallet.id).await?;
            // tx dropped here: rollback, no changes
            return Err(LedgerError::InsufficientBalance {
                user_id,
                balance_cents: balance,
                required_cents: amount_cents,
            });
        }

        Self::insert_entry(
            &mut tx,
            &LedgerEntry::debit(
                wallet.id,
                amount_cents,
                "Funds held",
                Some(reference_id.to_string()),
            ),
        )
        .await?;

        let hold = Hold::new(wallet.id, amount_cents, reason, reference_id);
        sqlx::query(
            r#"
            INSERT INTO holds (id, wallet_id, amount_cents, reason, reference_id, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(hold.id.to_string())
        .bind(hold.wallet_id.to_string())
        .bind(hold.amount_cents)
        .bind(&hold.reason)
        .bind(&hold.reference_id)
        .bind(hold.status.as_str())
        .bind(hold.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .context("Failed to insert hold")?;

        tx.commit().await.context("Failed to commit hold creation")?;
        Ok(hold)
    }

    /// Get a hold by ID.
    pub async fn get_hold(&self, hold_id: HoldId) -> Result<Option<Hold>, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT id, wallet_id, amount_cents, reason, reference_id, status, created_at
            FROM holds
            WHERE id = ?
            "#,
        )
        .bind(hold_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch hold")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_hold(&row)?)),
            None => Ok(None),
        }
    }

    /// Atomically transition an ACTIVE hold to RELEASED and credit the
    /// escrowed amount back to the payer's wallet.
    pub async fn release_hold(&self, hold_id: HoldId) -> Result<Hold, LedgerError> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let hold = Self::transition_hold(&mut tx, hold_id, HoldStatus::Released).await?;

        Self::credit_wallet(&mut tx, hold.wallet_id, hold.amount_cents).await?;
        Self::insert_entry(
            &mut tx,
            &LedgerEntry::credit(
                hold.wallet_id,
                hold.amount_cents,
                "Hold released",
                Some(hold.reference_id.clone()),
            ),
        )
        .await?;

        tx.commit().await.context("Failed to commit hold release")?;
        Ok(hold)
    }

    /// Atomically transition an ACTIVE hold to SETTLED and split the escrowed
    /// amount between the payee and the platform wallet. The payer's wallet is
    /// not touched: its funds left at hold creation.
    pub async fn settle_hold(
        &self,
        hold_id: HoldId,
        payee_user_id: UserId,
        platform_user_id: UserId,
        commission_cents: Cents,
    ) -> Result<Hold, LedgerError> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let hold = Self::transition_hold(&mut tx, hold_id, HoldStatus::Settled).await?;
        let payout_cents = hold.amount_cents - commission_cents;

        let payee = Self::ensure_wallet_conn(&mut tx, payee_user_id).await?;
        let platform = Self::ensure_wallet_conn(&mut tx, platform_user_id).await?;

        // Fixed lock order: touch wallets in ascending id order, never in
        // call-argument order, so concurrent settlements over overlapping
        // wallets cannot deadlock.
        let mut credits = [
            (
                payee.id,
                payout_cents,
                "Booking settlement payout",
            ),
            (platform.id, commission_cents, "Booking commission"),
        ];
        credits.sort_by(|a, b| a.0.cmp(&b.0));

        for (wallet_id, amount_cents, description) in credits {
            // A zero split (rate 0 or 1) is not a balance-affecting event
            if amount_cents == 0 {
                continue;
            }
            Self::credit_wallet(&mut tx, wallet_id, amount_cents).await?;
            Self::insert_entry(
                &mut tx,
                &LedgerEntry::credit(
                    wallet_id,
                    amount_cents,
                    description,
                    Some(hold.reference_id.clone()),
                ),
            )
            .await?;
        }

        tx.commit().await.context("Failed to commit settlement")?;
        Ok(hold)
    }

    // ========================
    // Ledger operations
    // ========================

    /// List a wallet's ledger entries, newest first.
    pub async fn list_entries_for_wallet(
        &self,
        wallet_id: WalletId,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT id, wallet_id, entry_type, amount_cents, description, reference_id, created_at
            FROM ledger_entries
            WHERE wallet_id = ?
            ORDER BY created_at DESC, id
            "#,
        )
        .bind(wallet_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list ledger entries")?;

        rows.iter().map(|row| Self::row_to_entry(row)).collect()
    }

    /// Compute a wallet's balance from its ledger entries using SQL
    /// aggregation: credits minus debits.
    pub async fn ledger_balance(&self, wallet_id: WalletId) -> Result<Cents, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(CASE WHEN entry_type = 'credit'
                                     THEN amount_cents ELSE -amount_cents END), 0) as balance
            FROM ledger_entries
            WHERE wallet_id = ?
            "#,
        )
        .bind(wallet_id.to_string())
        .fetch_one(&self.pool)
        .await
        .context("Failed to compute ledger balance")?;

        Ok(row.get("balance"))
    }

    /// Compute ledger balances for all wallets in a single query.
    /// Wallets with no entries won't be in the map (balance = 0).
    pub async fn all_ledger_balances(&self) -> Result<HashMap<WalletId, Cents>, LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT wallet_id,
                   SUM(CASE WHEN entry_type = 'credit'
                            THEN amount_cents ELSE -amount_cents END) as balance
            FROM ledger_entries
            GROUP BY wallet_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to compute ledger balances")?;

        let mut balances = HashMap::new();
        for row in rows {
            let wallet_id_str: String = row.get("wallet_id");
            let wallet_id = Uuid::parse_str(&wallet_id_str).context("Invalid wallet ID")?;
            balances.insert(wallet_id, row.get("balance"));
        }
        Ok(balances)
    }

    /// Get statistics for integrity checking.
    pub async fn get_integrity_stats(&self) -> Result<IntegrityStats, LedgerError> {
        let wallet_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM wallets")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count wallets")?
            .get("count");

        let entry_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM ledger_entries")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count ledger entries")?
            .get("count");

        let hold_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM holds")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count holds")?
            .get("count");

        let negative_balances: i64 =
            sqlx::query("SELECT COUNT(*) as count FROM wallets WHERE balance_cents < 0")
                .fetch_one(&self.pool)
                .await
                .context("Failed to count negative balances")?
                .get("count");

        let invalid_wallet_refs: i64 = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM ledger_entries e
                 WHERE NOT EXISTS (SELECT 1 FROM wallets w WHERE w.id = e.wallet_id)) +
                (SELECT COUNT(*) FROM holds h
                 WHERE NOT EXISTS (SELECT 1 FROM wallets w WHERE w.id = h.wallet_id)) as count
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to count invalid wallet references")?
        .get("count");

        let invalid_amounts: i64 = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM ledger_entries WHERE amount_cents <= 0) +
                (SELECT COUNT(*) FROM holds WHERE amount_cents <= 0) as count
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to count invalid amounts")?
        .get("count");

        Ok(IntegrityStats {
            wallet_count,
            entry_count,
            hold_count,
            negative_balances,
            invalid_wallet_refs,
            invalid_amounts,
        })
    }

    // ========================
    // Transaction-scoped helpers
    // ========================

    /// Upsert-then-read of a user's wallet. The upsert is a write, so inside
    /// a transaction it takes the write lock before anything else runs.
    async fn ensure_wallet_conn(
        conn: &mut SqliteConnection,
        user_id: UserId,
    ) -> Result<Wallet, LedgerError> {
        let fresh = Wallet::new(user_id);
        sqlx::query(
            r#"
            INSERT INTO wallets (id, user_id, balance_cents, created_at)
            VALUES (?, ?, 0, ?)
            ON CONFLICT(user_id) DO NOTHING
            "#,
        )
        .bind(fresh.id.to_string())
        .bind(fresh.user_id.to_string())
        .bind(fresh.created_at.to_rfc3339())
        .execute(&mut *conn)
        .await
        .context("Failed to ensure wallet")?;

        let row = sqlx::query(
            "SELECT id, user_id, balance_cents, created_at FROM wallets WHERE user_id = ?",
        )
        .bind(user_id.to_string())
        .fetch_one(&mut *conn)
        .await
        .context("Failed to fetch ensured wallet")?;

        Self::row_to_wallet(&row)
    }

    /// Guarded ACTIVE -> terminal transition. The status check and the update
    /// are one statement; a no-op means the hold is missing or already
    /// terminal, distinguished by a follow-up read.
    async fn transition_hold(
        conn: &mut SqliteConnection,
        hold_id: HoldId,
        next: HoldStatus,
    ) -> Result<Hold, LedgerError> {
        let transitioned = sqlx::query(
            r#"
            UPDATE holds SET status = ? WHERE id = ? AND status = 'active'
            "#,
        )
        .bind(next.as_str())
        .bind(hold_id.to_string())
        .execute(&mut *conn)
        .await
        .context("Failed to transition hold")?;

        let row = sqlx::query(
            r#"
            SELECT id, wallet_id, amount_cents, reason, reference_id, status, created_at
            FROM holds
            WHERE id = ?
            "#,
        )
        .bind(hold_id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to fetch hold")?;

        let hold = match row {
            Some(row) => Self::row_to_hold(&row)?,
            None => return Err(LedgerError::HoldNotFound(hold_id)),
        };

        if transitioned.rows_affected() == 0 {
            return Err(LedgerError::InvalidHoldStatus {
                id: hold_id,
                status: hold.status,
            });
        }
        Ok(hold)
    }

    async fn credit_wallet(
        conn: &mut SqliteConnection,
        wallet_id: WalletId,
        amount_cents: Cents,
    ) -> Result<(), LedgerError> {
        sqlx::query("UPDATE wallets SET balance_cents = balance_cents + ? WHERE id = ?")
            .bind(amount_cents)
            .bind(wallet_id.to_string())
            .execute(&mut *conn)
            .await
            .context("Failed to credit wallet")?;
        Ok(())
    }

    async fn fetch_balance(
        conn: &mut SqliteConnection,
        wallet_id: WalletId,
    ) -> Result<Cents, LedgerError> {
        let row = sqlx::query("SELECT balance_cents FROM wallets WHERE id = ?")
            .bind(wallet_id.to_string())
            .fetch_one(&mut *conn)
            .await
            .context("Failed to fetch balance")?;
        Ok(row.get("balance_cents"))
    }

    async fn insert_entry(
        conn: &mut SqliteConnection,
        entry: &LedgerEntry,
    ) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            INSERT INTO ledger_entries (id, wallet_id, entry_type, amount_cents, description, reference_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.wallet_id.to_string())
        .bind(entry.entry_type.as_str())
        .bind(entry.amount_cents)
        .bind(&entry.description)
        .bind(&entry.reference_id)
        .bind(entry.created_at.to_rfc3339())
        .execute(&mut *conn)
        .await
        .context("Failed to insert ledger entry")?;
        Ok(())
    }

    // ========================
    // Row mappers
    // ========================

    fn row_to_wallet(row: &sqlx::sqlite::SqliteRow) -> Result<Wallet, LedgerError> {
        let id_str: String = row.get("id");
        let user_id_str: String = row.get("user_id");
        let created_at_str: String = row.get("created_at");

        Ok(Wallet {
            id: Uuid::parse_str(&id_str).context("Invalid wallet ID")?,
            user_id: Uuid::parse_str(&user_id_str).context("Invalid user ID")?,
            balance_cents: row.get("balance_cents"),
            created_at: parse_timestamp(&created_at_str)?,
        })
    }

    fn row_to_hold(row: &sqlx::sqlite::SqliteRow) -> Result<Hold, LedgerError> {
        let id_str: String = row.get("id");
        let wallet_id_str: String = row.get("wallet_id");
        let status_str: String = row.get("status");
        let created_at_str: String = row.get("created_at");

        Ok(Hold {
            id: Uuid::parse_str(&id_str).context("Invalid hold ID")?,
            wallet_id: Uuid::parse_str(&wallet_id_str).context("Invalid wallet ID")?,
            amount_cents: row.get("amount_cents"),
            reason: row.get("reason"),
            reference_id: row.get("reference_id"),
            status: HoldStatus::from_str(&status_str)
                .ok_or_else(|| anyhow!("Invalid hold status: {}", status_str))?,
            created_at: parse_timestamp(&created_at_str)?,
        })
    }

    fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<LedgerEntry, LedgerError> {
        let id_str: String = row.get("id");
        let wallet_id_str: String = row.get("wallet_id");
        let entry_type_str: String = row.get("entry_type");
        let created_at_str: String = row.get("created_at");

        Ok(LedgerEntry {
            id: Uuid::parse_str(&id_str).context("Invalid entry ID")?,
            wallet_id: Uuid::parse_str(&wallet_id_str).context("Invalid wallet ID")?,
            entry_type: EntryType::from_str(&entry_type_str)
                .ok_or_else(|| anyhow!("Invalid entry type: {}", entry_type_str))?,
            amount_cents: row.get("amount_cents"),
            description: row.get("description"),
            reference_id: row.get("reference_id"),
            created_at: parse_timestamp(&created_at_str)?,
        })
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .context("Invalid timestamp")?
        .with_timezone(&Utc))
}
