use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Cents;

pub type WalletId = Uuid;
pub type UserId = Uuid;

/// A per-user money account. Exactly one wallet exists per user, created
/// lazily on first touch and never deleted. The stored balance must equal the
/// signed sum of the wallet's ledger entries at all times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    pub user_id: UserId,
    pub balance_cents: Cents,
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    /// A fresh zero-balance wallet for the given user.
    pub fn new(user_id: UserId) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            balance_cents: 0,
            created_at: Utc::now(),
        }
    }

    pub fn can_cover(&self, amount_cents: Cents) -> bool {
        self.balance_cents >= amount_cents
    }
}
