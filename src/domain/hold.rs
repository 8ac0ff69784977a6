use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, WalletId};

pub type HoldId = Uuid;

/// Lifecycle of an escrow hold. A hold is created ACTIVE and moves exactly
/// once to a terminal state; terminal holds never reopen.
///
/// CANCELLED is a defined terminal state reserved for administrative
/// intervention; no operation in this crate produces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HoldStatus {
    Active,
    Released,
    Settled,
    Cancelled,
}

impl HoldStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HoldStatus::Active => "active",
            HoldStatus::Released => "released",
            HoldStatus::Settled => "settled",
            HoldStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(HoldStatus::Active),
            "released" => Some(HoldStatus::Released),
            "settled" => Some(HoldStatus::Settled),
            "cancelled" => Some(HoldStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, HoldStatus::Active)
    }

    /// Whether a hold in this status may transition to `next`.
    /// The only legal transitions are ACTIVE -> {RELEASED, SETTLED, CANCELLED}.
    pub fn can_transition_to(&self, next: HoldStatus) -> bool {
        matches!(self, HoldStatus::Active) && next.is_terminal()
    }
}

impl std::fmt::Display for HoldStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Funds earmarked against a payer's wallet for a pending booking. The
/// wallet's spendable balance is debited at hold-creation time; settlement or
/// release later decides where the escrowed amount goes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hold {
    pub id: HoldId,
    pub wallet_id: WalletId,
    pub amount_cents: Cents,
    pub reason: String,
    pub reference_id: String,
    pub status: HoldStatus,
    pub created_at: DateTime<Utc>,
}

impl Hold {
    /// A new ACTIVE hold against the given wallet.
    pub fn new(
        wallet_id: WalletId,
        amount_cents: Cents,
        reason: impl Into<String>,
        reference_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            wallet_id,
            amount_cents,
            reason: reason.into(),
            reference_id: reference_id.into(),
            status: HoldStatus::Active,
            created_at: Utc::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == HoldStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            HoldStatus::Active,
            HoldStatus::Released,
            HoldStatus::Settled,
            HoldStatus::Cancelled,
        ] {
            assert_eq!(HoldStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(HoldStatus::from_str("bogus"), None);
    }

    #[test]
    fn test_only_active_holds_transition() {
        assert!(HoldStatus::Active.can_transition_to(HoldStatus::Released));
        assert!(HoldStatus::Active.can_transition_to(HoldStatus::Settled));
        assert!(HoldStatus::Active.can_transition_to(HoldStatus::Cancelled));

        for terminal in [
            HoldStatus::Released,
            HoldStatus::Settled,
            HoldStatus::Cancelled,
        ] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_transition_to(HoldStatus::Released));
            assert!(!terminal.can_transition_to(HoldStatus::Settled));
        }

        // Reopening is never legal
        assert!(!HoldStatus::Active.can_transition_to(HoldStatus::Active));
        assert!(!HoldStatus::Released.can_transition_to(HoldStatus::Active));
    }

    #[test]
    fn test_new_hold_is_active() {
        let hold = Hold::new(Uuid::new_v4(), 5000, "Booking escrow", "booking-1");
        assert!(hold.is_active());
        assert_eq!(hold.amount_cents, 5000);
    }
}
