use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::application::{LedgerConfig, WalletLedgerService};
use crate::domain::{format_cents, parse_cents};

/// Escrow Ledger - wallet balances, escrowed holds, commission settlement
#[derive(Parser)]
#[command(name = "escrow-ledger")]
#[command(about = "Wallet ledger with escrowed holds for a venue-booking marketplace")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "escrow-ledger.db")]
    pub database: String,

    /// User ID owning the platform (commission) wallet
    #[arg(long, default_value = "00000000-0000-0000-0000-000000000001")]
    pub platform_user: String,

    /// Commission rate retained by the platform on settlement (0..1)
    #[arg(long, default_value = "0.05")]
    pub commission_rate: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database (applies migrations)
    Init,

    /// Show a user's wallet balance (creates the wallet if absent)
    Balance {
        /// User ID
        user: String,
    },

    /// Credit a user's wallet
    TopUp {
        /// User ID
        user: String,

        /// Amount to credit (e.g., "50.00" or "50")
        amount: String,
    },

    /// Escrow hold management commands
    #[command(subcommand)]
    Hold(HoldCommands),

    /// Show a user's ledger entries (newest first)
    History {
        /// User ID
        user: String,
    },

    /// Verify ledger integrity (stored balances vs. ledger entries)
    Check,
}

#[derive(Subcommand)]
pub enum HoldCommands {
    /// Place a hold against a user's wallet
    Create {
        /// Payer user ID
        user: String,

        /// Amount to escrow (e.g., "100.00")
        amount: String,

        /// Reason for the hold
        #[arg(short, long, default_value = "Booking escrow")]
        reason: String,

        /// External reference ID (e.g., booking ID)
        #[arg(long)]
        reference: String,
    },

    /// Show a hold
    Show {
        /// Hold ID
        id: String,
    },

    /// Release a hold back to the payer
    Release {
        /// Hold ID
        id: String,
    },

    /// Settle a hold: pay the payee minus platform commission
    Settle {
        /// Hold ID
        id: String,

        /// Payee user ID
        #[arg(long)]
        payee: String,

        /// Override the configured commission rate for this settlement
        #[arg(long)]
        rate: Option<String>,
    },
}

impl Cli {
    fn config(&self) -> Result<LedgerConfig> {
        let platform_user = parse_user(&self.platform_user)?;
        let rate: Decimal = self
            .commission_rate
            .parse()
            .context("Invalid commission rate (expected a decimal like 0.05)")?;
        Ok(LedgerConfig::new(platform_user, rate)?)
    }

    pub async fn run(self) -> Result<()> {
        let config = self.config()?;

        match self.command {
            Commands::Init => {
                WalletLedgerService::init(&self.database, config).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Balance { user } => {
                let service = WalletLedgerService::connect(&self.database, config).await?;
                let balance = service.get_balance(parse_user(&user)?).await?;
                println!("{}", format_cents(balance.amount_cents));
            }

            Commands::TopUp { user, amount } => {
                let service = WalletLedgerService::connect(&self.database, config).await?;
                let amount_cents =
                    parse_cents(&amount).context("Invalid amount format. Use '50.00' or '50'")?;
                let balance = service.top_up(parse_user(&user)?, amount_cents).await?;
                println!(
                    "Topped up {} (new balance: {})",
                    format_cents(amount_cents),
                    format_cents(balance.amount_cents)
                );
            }

            Commands::Hold(hold_cmd) => {
                let service = WalletLedgerService::connect(&self.database, config).await?;
                run_hold_command(&service, hold_cmd).await?;
            }

            Commands::History { user } => {
                let service = WalletLedgerService::connect(&self.database, config).await?;
                let entries = service.ledger_history(parse_user(&user)?).await?;
                if entries.is_empty() {
                    println!("No ledger entries");
                }
                for entry in entries {
                    println!(
                        "{}  {:>6}  {:>12}  {}{}",
                        entry.created_at.to_rfc3339(),
                        entry.entry_type,
                        format_cents(entry.signed_amount()),
                        entry.description,
                        entry
                            .reference_id
                            .map(|r| format!(" [{}]", r))
                            .unwrap_or_default()
                    );
                }
            }

            Commands::Check => {
                let service = WalletLedgerService::connect(&self.database, config).await?;
                let report = service.check_integrity().await?;
                println!(
                    "Wallets: {}, ledger entries: {}, holds: {}",
                    report.wallet_count, report.entry_count, report.hold_count
                );
                if report.is_clean() {
                    println!("OK: all balances reconcile with the ledger");
                } else {
                    for m in &report.mismatches {
                        println!(
                            "MISMATCH wallet {}: stored {} vs ledger {}",
                            m.wallet_id,
                            format_cents(m.stored_cents),
                            format_cents(m.ledger_cents)
                        );
                    }
                    if report.negative_balances > 0 {
                        println!("Negative balances: {}", report.negative_balances);
                    }
                    if report.invalid_wallet_refs > 0 {
                        println!("Invalid wallet references: {}", report.invalid_wallet_refs);
                    }
                    if report.invalid_amounts > 0 {
                        println!("Non-positive amounts: {}", report.invalid_amounts);
                    }
                    anyhow::bail!("Integrity check failed");
                }
            }
        }

        Ok(())
    }
}

async fn run_hold_command(service: &WalletLedgerService, command: HoldCommands) -> Result<()> {
    match command {
        HoldCommands::Create {
            user,
            amount,
            reason,
            reference,
        } => {
            let amount_cents =
                parse_cents(&amount).context("Invalid amount format. Use '100.00' or '100'")?;
            let hold = service
                .create_hold(parse_user(&user)?, amount_cents, &reason, &reference)
                .await?;
            println!(
                "Created hold {} for {} ({})",
                hold.id,
                format_cents(hold.amount_cents),
                hold.status
            );
        }

        HoldCommands::Show { id } => {
            let hold = service.get_hold(parse_hold_id(&id)?).await?;
            println!("Hold:      {}", hold.id);
            println!("Wallet:    {}", hold.wallet_id);
            println!("Amount:    {}", format_cents(hold.amount_cents));
            println!("Status:    {}", hold.status);
            println!("Reason:    {}", hold.reason);
            println!("Reference: {}", hold.reference_id);
            println!("Created:   {}", hold.created_at.to_rfc3339());
        }

        HoldCommands::Release { id } => {
            let hold = service.release_hold(parse_hold_id(&id)?).await?;
            println!(
                "Released hold {} ({} returned to payer)",
                hold.id,
                format_cents(hold.amount_cents)
            );
        }

        HoldCommands::Settle { id, payee, rate } => {
            let hold_id = parse_hold_id(&id)?;
            let payee = parse_user(&payee)?;
            let hold = match rate {
                Some(rate) => {
                    let rate: Decimal = rate
                        .parse()
                        .context("Invalid commission rate (expected a decimal like 0.05)")?;
                    service.settle_hold_with_rate(hold_id, payee, rate).await?
                }
                None => service.settle_hold(hold_id, payee).await?,
            };
            println!(
                "Settled hold {} for {} to payee {}",
                hold.id,
                format_cents(hold.amount_cents),
                payee
            );
        }
    }

    Ok(())
}

fn parse_user(input: &str) -> Result<Uuid> {
    Uuid::parse_str(input).context("Invalid user ID format (expected UUID)")
}

fn parse_hold_id(input: &str) -> Result<Uuid> {
    Uuid::parse_str(input).context("Invalid hold ID format (expected UUID)")
}
