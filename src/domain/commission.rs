use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use super::Cents;

/// How a settled hold's escrowed amount is divided between the payee and the
/// platform. Invariant: `commission_cents + payout_cents` equals the hold
/// amount exactly, with no rounding leakage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommissionSplit {
    pub commission_cents: Cents,
    pub payout_cents: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommissionError {
    RateOutOfRange(String),
}

impl std::fmt::Display for CommissionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommissionError::RateOutOfRange(rate) => {
                write!(f, "commission rate out of range [0, 1]: {}", rate)
            }
        }
    }
}

impl std::error::Error for CommissionError {}

/// Split a hold amount at the given commission rate.
///
/// The commission is `amount * rate` rounded half-up to whole cents; the
/// payout is the remainder, so the two always sum back to the hold amount.
pub fn split_commission(amount_cents: Cents, rate: Decimal) -> Result<CommissionSplit, CommissionError> {
    if rate < Decimal::ZERO || rate > Decimal::ONE {
        return Err(CommissionError::RateOutOfRange(rate.to_string()));
    }

    let commission_cents = (Decimal::from(amount_cents) * rate)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| CommissionError::RateOutOfRange(rate.to_string()))?;

    Ok(CommissionSplit {
        commission_cents,
        payout_cents: amount_cents - commission_cents,
    })
}
