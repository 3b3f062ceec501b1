//! Continuously compounding price driven by time and reserve liquidity.
//!
//! ```text
//! dailyRate    = reserve / liquidity_divisor        (reserve in whole units)
//! daysElapsed  = (now - createdAt) / 86400          (real, not truncated)
//! perUnitPrice = basePrice * (1 + dailyRate)^daysElapsed
//! cost(q)      = perUnitPrice * q
//! ```
//!
//! The reserve is read on every call: a buy raises the rate for every
//! later quote, a sell lowers it.

use chrono::TimeDelta;
use tokensale_types::constants::{MILLIS_PER_DAY, WAD};
use tokensale_types::{
    Amount, CompoundGrowthParams, PriceBreakdown, PricingContext, Result, SaleError, TradeSide,
};

use crate::PricingStrategy;
use crate::fixed_point::{growth_factor, mul_wad, mul_wad_ceil};

/// Fractional days in `elapsed`, as WAD, at millisecond resolution.
#[must_use]
pub fn days_elapsed_wad(elapsed: TimeDelta) -> Amount {
    let ms = u128::try_from(elapsed.num_milliseconds()).unwrap_or(0);
    let whole = (ms / MILLIS_PER_DAY) * WAD;
    let frac = (ms % MILLIS_PER_DAY) * WAD / MILLIS_PER_DAY;
    Amount::from_base_units(whole + frac)
}

/// `basePrice * (1 + reserve / divisor)^days`.
#[derive(Debug, Clone, Copy)]
pub struct CompoundGrowthPricing {
    params: CompoundGrowthParams,
}

impl CompoundGrowthPricing {
    #[must_use]
    pub fn new(params: CompoundGrowthParams) -> Self {
        Self { params }
    }

    /// Daily rate (WAD) implied by a reserve balance.
    #[must_use]
    pub fn daily_rate(&self, reserve: Amount) -> Amount {
        Amount::from_base_units(reserve.base_units() / self.params.liquidity_divisor)
    }

    fn factor(&self, ctx: &PricingContext) -> Result<(Amount, Amount, Amount)> {
        let rate = self.daily_rate(ctx.reserve_balance);
        let days = days_elapsed_wad(ctx.elapsed());
        let factor = growth_factor(rate.base_units(), days.base_units())
            .ok_or(SaleError::overflow("compound factor"))?;
        Ok((rate, days, Amount::from_base_units(factor)))
    }
}

impl PricingStrategy for CompoundGrowthPricing {
    fn name(&self) -> &'static str {
        "compound_growth"
    }

    fn quote(&self, ctx: &PricingContext, side: TradeSide, quantity: Amount) -> Result<Amount> {
        let price = self.spot_price(ctx)?;
        let mul = match side {
            TradeSide::Buy => mul_wad_ceil,
            TradeSide::Sell => mul_wad,
        };
        let total = mul(price.base_units(), quantity.base_units())
            .ok_or(SaleError::overflow("compound cost"))?;
        tracing::trace!(
            %side,
            %price,
            %quantity,
            total = %Amount::from_base_units(total),
            "compound quote"
        );
        Ok(Amount::from_base_units(total))
    }

    fn spot_price(&self, ctx: &PricingContext) -> Result<Amount> {
        let (_, _, factor) = self.factor(ctx)?;
        mul_wad(self.params.base_price.base_units(), factor.base_units())
            .map(Amount::from_base_units)
            .ok_or(SaleError::overflow("compound price"))
    }

    fn breakdown(&self, ctx: &PricingContext) -> Result<PriceBreakdown> {
        let (daily_rate, days_elapsed, compound_factor) = self.factor(ctx)?;
        let current_price = mul_wad(
            self.params.base_price.base_units(),
            compound_factor.base_units(),
        )
        .map(Amount::from_base_units)
        .ok_or(SaleError::overflow("compound price"))?;
        Ok(PriceBreakdown {
            current_price,
            base_price: self.params.base_price,
            reserve_balance: ctx.reserve_balance,
            elapsed_seconds: ctx.elapsed().num_seconds(),
            days_elapsed,
            daily_rate,
            compound_factor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn pricing() -> CompoundGrowthPricing {
        CompoundGrowthPricing::new(CompoundGrowthParams {
            base_price: Amount::whole(5),
            liquidity_divisor: 2_000_000_000,
        })
    }

    fn created() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn ctx(reserve_whole: u64, elapsed: TimeDelta) -> PricingContext {
        PricingContext {
            total_supply: Amount::whole(100_000),
            sold_cumulative: Amount::ZERO,
            reserve_balance: Amount::whole(reserve_whole),
            created_at: created(),
            now: created() + elapsed,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn whole_f64(a: Amount) -> f64 {
        a.base_units() as f64 / WAD as f64
    }

    #[test]
    fn base_price_at_creation() {
        let p = pricing();
        assert_eq!(p.spot_price(&ctx(100, TimeDelta::zero())).unwrap(), Amount::whole(5));
    }

    #[test]
    fn one_day_with_hundred_units() {
        // rate = 100 / 2e9 = 5e-8; price = 5 * 1.00000005 = 5.00000025
        let p = pricing();
        let price = p.spot_price(&ctx(100, TimeDelta::try_days(1).unwrap())).unwrap();
        assert_eq!(price, Amount::from_base_units(5_000_000_250_000_000_000));
    }

    #[test]
    fn fractional_days_move_price_continuously() {
        let p = pricing();
        let at_6h = p.spot_price(&ctx(100, TimeDelta::try_hours(6).unwrap())).unwrap();
        let at_12h = p.spot_price(&ctx(100, TimeDelta::try_hours(12).unwrap())).unwrap();
        assert!(at_6h > Amount::whole(5));
        assert!(at_12h > at_6h);
    }

    #[test]
    fn matches_float_reference_within_tolerance() {
        let p = pricing();
        let tolerance = 1e-6;
        for (reserve, hours) in [(100u64, 36i64), (10_000_000, 240), (200_000_000, 24 * 365)] {
            let c = ctx(reserve, TimeDelta::try_hours(hours).unwrap());
            let got = whole_f64(p.spot_price(&c).unwrap());
            #[allow(clippy::cast_precision_loss)]
            let rate = reserve as f64 / 2e9;
            #[allow(clippy::cast_precision_loss)]
            let want = 5.0 * (1.0 + rate).powf(hours as f64 / 24.0);
            assert!(
                (got - want).abs() <= tolerance * want.max(1.0),
                "reserve={reserve} hours={hours}: got {got}, want {want}"
            );
        }
    }

    #[test]
    fn monotonic_in_time() {
        let p = pricing();
        let mut last = Amount::ZERO;
        for minutes in (0..3 * 24 * 60).step_by(37) {
            let q = p
                .quote(&ctx(5_000_000, TimeDelta::try_minutes(minutes).unwrap()), TradeSide::Buy, Amount::ONE)
                .unwrap();
            assert!(q >= last, "price fell at minute {minutes}");
            last = q;
        }
    }

    #[test]
    fn monotonic_in_liquidity() {
        let p = pricing();
        let day = TimeDelta::try_days(3).unwrap();
        let before = p.quote(&ctx(100, day), TradeSide::Buy, Amount::whole(2)).unwrap();
        let after = p.quote(&ctx(1_100, day), TradeSide::Buy, Amount::whole(2)).unwrap();
        assert!(after > before);
    }

    #[test]
    fn cost_is_linear_in_quantity() {
        let p = pricing();
        let c = ctx(100, TimeDelta::try_days(1).unwrap());
        let one = p.quote(&c, TradeSide::Buy, Amount::ONE).unwrap();
        let ten = p.quote(&c, TradeSide::Buy, Amount::whole(10)).unwrap();
        assert_eq!(ten.base_units(), one.base_units() * 10);
        assert_eq!(p.quote(&c, TradeSide::Sell, Amount::ONE).unwrap(), one);
    }

    #[test]
    fn buys_round_up_sells_round_down() {
        let p = pricing();
        let c = ctx(100, TimeDelta::try_days(1).unwrap());
        // One base unit at 5.00000025 is 5.00000025 base units of reserve.
        let dust = Amount::from_base_units(1);
        assert_eq!(p.quote(&c, TradeSide::Buy, dust).unwrap(), Amount::from_base_units(6));
        assert_eq!(p.quote(&c, TradeSide::Sell, dust).unwrap(), Amount::from_base_units(5));
    }

    #[test]
    fn breakdown_fields() {
        let p = pricing();
        let b = p.breakdown(&ctx(100, TimeDelta::try_hours(12).unwrap())).unwrap();
        assert_eq!(b.base_price, Amount::whole(5));
        assert_eq!(b.elapsed_seconds, 43_200);
        assert_eq!(b.days_elapsed, Amount::from_base_units(WAD / 2));
        assert_eq!(b.daily_rate, Amount::from_base_units(50_000_000_000));
        assert!(b.compound_factor > Amount::ONE);
        assert_eq!(b.current_price, p.spot_price(&ctx(100, TimeDelta::try_hours(12).unwrap())).unwrap());
    }

    #[test]
    fn days_elapsed_resolution() {
        assert_eq!(days_elapsed_wad(TimeDelta::zero()), Amount::ZERO);
        assert_eq!(days_elapsed_wad(TimeDelta::try_days(2).unwrap()), Amount::whole(2));
        assert_eq!(
            days_elapsed_wad(TimeDelta::try_hours(6).unwrap()),
            Amount::from_base_units(WAD / 4)
        );
    }

    #[test]
    fn no_cap() {
        assert_eq!(pricing().sale_cap(Amount::whole(100_000)), None);
    }
}
