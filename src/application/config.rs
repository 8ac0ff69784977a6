use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::UserId;

use super::LedgerError;

/// Startup configuration for the wallet ledger. The platform wallet owner is
/// deployment-supplied, not a literal inside the service; deployments can
/// point commissions at any user id.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Owner of the wallet that accumulates commission revenue.
    pub platform_user_id: UserId,
    /// Fraction of a settled hold retained by the platform, in [0, 1].
    pub commission_rate: Decimal,
}

impl LedgerConfig {
    pub fn new(platform_user_id: UserId, commission_rate: Decimal) -> Result<Self, LedgerError> {
        if commission_rate < Decimal::ZERO || commission_rate > Decimal::ONE {
            return Err(LedgerError::InvalidAmount(format!(
                "Commission rate must be within [0, 1], got {}",
                commission_rate
            )));
        }
        Ok(Self {
            platform_user_id,
            commission_rate,
        })
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            // Well-known platform owner id used by existing deployments
            platform_user_id: Uuid::from_u128(1),
            // 5%
            commission_rate: Decimal::new(5, 2),
        }
    }
}
