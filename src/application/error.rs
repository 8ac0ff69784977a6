use thiserror::Error;

use crate::domain::{Cents, CommissionError, HoldId, HoldStatus, UserId};

/// Error taxonomy exposed to calling collaborators (booking flow, top-up
/// endpoint, admin tooling). Business-rule violations are detected before any
/// write; `Storage` failures roll back the whole transaction, so every error
/// leaves no partial state and the caller may retry the operation as a whole.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error(
        "Insufficient balance for user {user_id}: balance {balance_cents}, required {required_cents}"
    )]
    InsufficientBalance {
        user_id: UserId,
        balance_cents: Cents,
        required_cents: Cents,
    },

    #[error("Hold not found: {0}")]
    HoldNotFound(HoldId),

    #[error("Hold {id} is not active: status is {status}")]
    InvalidHoldStatus { id: HoldId, status: HoldStatus },

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl From<CommissionError> for LedgerError {
    fn from(err: CommissionError) -> Self {
        LedgerError::InvalidAmount(err.to_string())
    }
}
