//! Inputs and outputs of the pricing plane.
//!
//! A [`PricingContext`] is the read-only view of ledger state that a
//! pricing strategy is allowed to see. Strategies never hold state of
//! their own, so the same context always yields the same price.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::Amount;

/// Direction of a settlement request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeSide {
    /// Tokens leave the sale, reserve currency comes in.
    Buy,
    /// Tokens return to the sale, reserve currency goes out.
    Sell,
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Snapshot of the ledger fields a price may depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingContext {
    pub total_supply: Amount,
    pub sold_cumulative: Amount,
    pub reserve_balance: Amount,
    pub created_at: DateTime<Utc>,
    pub now: DateTime<Utc>,
}

impl PricingContext {
    /// Time since creation. A clock reading before creation counts as zero.
    #[must_use]
    pub fn elapsed(&self) -> TimeDelta {
        let elapsed = self.now.signed_duration_since(self.created_at);
        if elapsed < TimeDelta::zero() {
            TimeDelta::zero()
        } else {
            elapsed
        }
    }
}

/// Detailed decomposition of the current per-token price.
///
/// WAD fields are scaled by `10^18` (`1.0` = `10^18`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    /// Price of the next token, in reserve currency.
    pub current_price: Amount,
    /// Price before any growth is applied (active tier price for tiered sales).
    pub base_price: Amount,
    pub reserve_balance: Amount,
    pub elapsed_seconds: i64,
    /// Fractional days since creation (WAD).
    pub days_elapsed: Amount,
    /// Per-day growth rate (WAD); zero for tiered pricing.
    pub daily_rate: Amount,
    /// `(1 + daily_rate)^days_elapsed` (WAD); one for tiered pricing.
    pub compound_factor: Amount,
}

/// Result of `info(now)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleInfo {
    pub current_price: Amount,
    pub sale_token_balance: Amount,
    pub reserve_balance: Amount,
    pub time_since_creation_secs: i64,
    pub sale_ended: bool,
}

/// Outcome of a successful buy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyReceipt {
    pub quantity: Amount,
    pub cost: Amount,
    /// Overpayment returned to the buyer.
    pub refund: Amount,
}

/// Outcome of a successful sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellReceipt {
    pub quantity: Amount,
    pub proceeds: Amount,
}

/// Outcome of `end_sale`: everything swept to the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseReceipt {
    pub tokens_swept: Amount,
    pub reserve_swept: Amount,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_clamps_to_zero() {
        let created_at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let ctx = PricingContext {
            total_supply: Amount::whole(1),
            sold_cumulative: Amount::ZERO,
            reserve_balance: Amount::ZERO,
            created_at,
            now: created_at - TimeDelta::try_hours(1).unwrap(),
        };
        assert_eq!(ctx.elapsed(), TimeDelta::zero());
    }

    #[test]
    fn elapsed_counts_forward() {
        let created_at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let ctx = PricingContext {
            total_supply: Amount::whole(1),
            sold_cumulative: Amount::ZERO,
            reserve_balance: Amount::ZERO,
            created_at,
            now: created_at + TimeDelta::try_days(2).unwrap(),
        };
        assert_eq!(ctx.elapsed().num_seconds(), 2 * 86_400);
    }

    #[test]
    fn trade_side_display() {
        assert_eq!(TradeSide::Buy.to_string(), "BUY");
        assert_eq!(TradeSide::Sell.to_string(), "SELL");
    }
}
