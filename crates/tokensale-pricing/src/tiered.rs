//! Two-band step pricing over cumulative sold quantity.
//!
//! ```text
//! 0 ─────── tier1 ─────── cutoff ─────── tier2 ─────── cap
//! ```
//!
//! A request that straddles the cutoff is priced unit-by-unit: the part
//! below the cutoff at `tier1_price`, the rest at `tier2_price`. Buys
//! consume the band `[sold, sold + q)`; sells give back `[sold - q, sold)`,
//! so a buy immediately followed by a sell of the same quantity nets zero.

use tokensale_types::{
    Amount, PriceBreakdown, PricingContext, Result, SaleError, TieredParams, TradeSide,
};

use crate::PricingStrategy;
use crate::fixed_point::{apply_bps, mul_wad, mul_wad_ceil};

/// Flat price below a supply threshold, higher flat price above it.
#[derive(Debug, Clone, Copy)]
pub struct TieredPricing {
    params: TieredParams,
}

impl TieredPricing {
    #[must_use]
    pub fn new(params: TieredParams) -> Self {
        Self { params }
    }

    /// Cumulative quantity at which the second tier starts.
    #[must_use]
    pub fn cutoff(&self, total_supply: Amount) -> Amount {
        Amount::from_base_units(apply_bps(total_supply.base_units(), self.params.tier_cutoff_bps))
    }

    fn cap(&self, total_supply: Amount) -> Amount {
        Amount::from_base_units(apply_bps(total_supply.base_units(), self.params.sale_cap_bps))
    }

    /// Cost of the cumulative band `[start, end)`. Buys round each tier's
    /// share up, sells round it down.
    fn band_cost(
        &self,
        start: u128,
        end: u128,
        cutoff: u128,
        side: TradeSide,
    ) -> Result<Amount> {
        let mul = match side {
            TradeSide::Buy => mul_wad_ceil,
            TradeSide::Sell => mul_wad,
        };
        let tier1_units = end.min(cutoff).saturating_sub(start.min(cutoff));
        let tier2_units = (end - start) - tier1_units;
        let tier1 = mul(tier1_units, self.params.tier1_price.base_units())
            .ok_or(SaleError::overflow("tier1 cost"))?;
        let tier2 = mul(tier2_units, self.params.tier2_price.base_units())
            .ok_or(SaleError::overflow("tier2 cost"))?;
        tier1
            .checked_add(tier2)
            .map(Amount::from_base_units)
            .ok_or(SaleError::overflow("tiered cost"))
    }
}

impl PricingStrategy for TieredPricing {
    fn name(&self) -> &'static str {
        "tiered"
    }

    fn quote(&self, ctx: &PricingContext, side: TradeSide, quantity: Amount) -> Result<Amount> {
        let sold = ctx.sold_cumulative.base_units();
        let qty = quantity.base_units();
        let cutoff = self.cutoff(ctx.total_supply).base_units();

        match side {
            TradeSide::Buy => {
                let cap = self.cap(ctx.total_supply);
                let end = sold.checked_add(qty).ok_or(SaleError::overflow("tiered band"))?;
                if end > cap.base_units() {
                    return Err(SaleError::ExceedsSaleLimit {
                        requested: quantity,
                        remaining: cap.saturating_sub(ctx.sold_cumulative),
                    });
                }
                self.band_cost(sold, end, cutoff, side)
            }
            TradeSide::Sell => {
                // Units beyond what this sale ever sold (e.g. the owner's
                // retained allocation) come back at the first-tier price.
                let covered = qty.min(sold);
                let band = self.band_cost(sold - covered, sold, cutoff, side)?;
                let excess = mul_wad(qty - covered, self.params.tier1_price.base_units())
                    .ok_or(SaleError::overflow("tiered excess"))?;
                band.checked_add(Amount::from_base_units(excess))
                    .ok_or(SaleError::overflow("tiered proceeds"))
            }
        }
    }

    fn spot_price(&self, ctx: &PricingContext) -> Result<Amount> {
        if ctx.sold_cumulative < self.cutoff(ctx.total_supply) {
            Ok(self.params.tier1_price)
        } else {
            Ok(self.params.tier2_price)
        }
    }

    fn sale_cap(&self, total_supply: Amount) -> Option<Amount> {
        Some(self.cap(total_supply))
    }

    fn breakdown(&self, ctx: &PricingContext) -> Result<PriceBreakdown> {
        let current_price = self.spot_price(ctx)?;
        let elapsed = ctx.elapsed();
        Ok(PriceBreakdown {
            current_price,
            base_price: current_price,
            reserve_balance: ctx.reserve_balance,
            elapsed_seconds: elapsed.num_seconds(),
            days_elapsed: crate::compound::days_elapsed_wad(elapsed),
            daily_rate: Amount::ZERO,
            compound_factor: Amount::ONE,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    const CENT: u128 = 10_000_000_000_000_000; // 0.01

    fn pricing() -> TieredPricing {
        TieredPricing::new(TieredParams {
            tier1_price: Amount::from_base_units(CENT),
            tier2_price: Amount::from_base_units(2 * CENT),
            tier_cutoff_bps: 2_500,
            sale_cap_bps: 5_000,
        })
    }

    fn ctx(sold: u64) -> PricingContext {
        let t: DateTime<Utc> = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        PricingContext {
            total_supply: Amount::whole(1000),
            sold_cumulative: Amount::whole(sold),
            reserve_balance: Amount::ZERO,
            created_at: t,
            now: t,
        }
    }

    #[test]
    fn first_tier_flat_price() {
        let p = pricing();
        let cost = p.quote(&ctx(0), TradeSide::Buy, Amount::ONE).unwrap();
        assert_eq!(cost, Amount::from_base_units(CENT));
        let cost = p.quote(&ctx(0), TradeSide::Buy, Amount::whole(250)).unwrap();
        assert_eq!(cost, Amount::from_base_units(250 * CENT)); // 2.5
    }

    #[test]
    fn token_250_then_251() {
        let p = pricing();
        // The 250th token is still tier 1.
        let c250 = p.quote(&ctx(249), TradeSide::Buy, Amount::ONE).unwrap();
        assert_eq!(c250, Amount::from_base_units(CENT));
        // The 251st token is tier 2.
        let c251 = p.quote(&ctx(250), TradeSide::Buy, Amount::ONE).unwrap();
        assert_eq!(c251, Amount::from_base_units(2 * CENT));
    }

    #[test]
    fn straddling_request_is_weighted() {
        let p = pricing();
        // 240 sold, buy 20: 10 at 0.01 + 10 at 0.02 = 0.30
        let cost = p.quote(&ctx(240), TradeSide::Buy, Amount::whole(20)).unwrap();
        assert_eq!(cost, Amount::from_base_units(30 * CENT));
    }

    #[test]
    fn marginal_cost_non_decreasing() {
        let p = pricing();
        let mut last = Amount::ZERO;
        for sold in 0..500 {
            let c = p.quote(&ctx(sold), TradeSide::Buy, Amount::ONE).unwrap();
            assert!(c >= last, "marginal cost fell at {sold}");
            last = c;
        }
    }

    #[test]
    fn cap_exactly_reached() {
        let p = pricing();
        let cost = p.quote(&ctx(0), TradeSide::Buy, Amount::whole(500)).unwrap();
        // 250 * 0.01 + 250 * 0.02 = 7.5
        assert_eq!(cost, Amount::from_base_units(750 * CENT));
    }

    #[test]
    fn beyond_cap_rejected_whole() {
        let p = pricing();
        let err = p.quote(&ctx(500), TradeSide::Buy, Amount::ONE).unwrap_err();
        assert_eq!(
            err,
            SaleError::ExceedsSaleLimit {
                requested: Amount::ONE,
                remaining: Amount::ZERO,
            }
        );
        let err = p.quote(&ctx(499), TradeSide::Buy, Amount::whole(2)).unwrap_err();
        assert!(matches!(err, SaleError::ExceedsSaleLimit { remaining, .. } if remaining == Amount::ONE));
    }

    #[test]
    fn sell_mirrors_buy_band() {
        let p = pricing();
        let buy = p.quote(&ctx(240), TradeSide::Buy, Amount::whole(20)).unwrap();
        let sell = p.quote(&ctx(260), TradeSide::Sell, Amount::whole(20)).unwrap();
        assert_eq!(buy, sell);
    }

    #[test]
    fn sell_beyond_sold_uses_first_tier() {
        let p = pricing();
        // 5 sold, 10 sold back: 5 from the band + 5 excess, all at 0.01.
        let proceeds = p.quote(&ctx(5), TradeSide::Sell, Amount::whole(10)).unwrap();
        assert_eq!(proceeds, Amount::from_base_units(10 * CENT));
    }

    #[test]
    fn spot_price_switches_at_cutoff() {
        let p = pricing();
        assert_eq!(p.spot_price(&ctx(249)).unwrap(), Amount::from_base_units(CENT));
        assert_eq!(p.spot_price(&ctx(250)).unwrap(), Amount::from_base_units(2 * CENT));
    }

    #[test]
    fn fractional_quantities() {
        let p = pricing();
        let half = Amount::from_base_units(500_000_000_000_000_000);
        let cost = p.quote(&ctx(0), TradeSide::Buy, half).unwrap();
        assert_eq!(cost, Amount::from_base_units(CENT / 2));
    }

    #[test]
    fn dust_buys_are_never_free() {
        let p = pricing();
        let dust = Amount::from_base_units(99);
        assert_eq!(p.quote(&ctx(0), TradeSide::Buy, dust).unwrap(), Amount::from_base_units(1));
        // Straddling dust rounds each tier's share up.
        let edge = PricingContext {
            sold_cumulative: Amount::from_base_units(Amount::whole(250).base_units() - 1),
            ..ctx(0)
        };
        let cost = p.quote(&edge, TradeSide::Buy, Amount::from_base_units(2)).unwrap();
        assert_eq!(cost, Amount::from_base_units(2));
        // Sells of the same dust round down to nothing.
        assert_eq!(p.quote(&ctx(5), TradeSide::Sell, dust).unwrap(), Amount::ZERO);
    }

    #[test]
    fn breakdown_has_unit_factor() {
        let b = pricing().breakdown(&ctx(300)).unwrap();
        assert_eq!(b.current_price, Amount::from_base_units(2 * CENT));
        assert_eq!(b.compound_factor, Amount::ONE);
        assert_eq!(b.daily_rate, Amount::ZERO);
    }
}
