//! The pricing seam between the settlement engine and concrete curves.

use std::fmt;

use tokensale_types::{
    Amount, PriceBreakdown, PricingContext, PricingParams, Result, TradeSide,
};

use crate::{CompoundGrowthPricing, TieredPricing};

/// A pure price function over observable ledger state.
///
/// Implementations must be deterministic and side-effect free: the same
/// [`PricingContext`] always yields the same result, and nothing is cached
/// between calls. The engine re-evaluates the strategy on every request.
pub trait PricingStrategy: fmt::Debug + Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &'static str;

    /// Reserve currency exchanged for `quantity` tokens.
    ///
    /// For [`TradeSide::Buy`] this is the cost charged to the buyer; for
    /// [`TradeSide::Sell`] it is the payout owed to the seller.
    fn quote(&self, ctx: &PricingContext, side: TradeSide, quantity: Amount) -> Result<Amount>;

    /// Price of the next whole token.
    fn spot_price(&self, ctx: &PricingContext) -> Result<Amount>;

    /// Maximum cumulative quantity this strategy allows to be sold, if any.
    fn sale_cap(&self, _total_supply: Amount) -> Option<Amount> {
        None
    }

    /// Decomposition of the spot price.
    fn breakdown(&self, ctx: &PricingContext) -> Result<PriceBreakdown>;
}

/// Build the strategy selected by validated sale parameters.
#[must_use]
pub fn build_strategy(params: &PricingParams) -> Box<dyn PricingStrategy> {
    match params {
        PricingParams::Tiered(tiers) => Box::new(TieredPricing::new(*tiers)),
        PricingParams::CompoundGrowth(growth) => Box::new(CompoundGrowthPricing::new(*growth)),
    }
}
