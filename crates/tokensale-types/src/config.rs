//! Configuration types for a sale instance.
//!
//! [`SaleConfig`] is the human-facing form (decimal strings, basis points,
//! seconds) that is loaded from JSON. [`SaleConfig::resolve`] validates it
//! and produces [`SaleParams`] in engine units.

use chrono::TimeDelta;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::constants::{self, BPS_DENOMINATOR};
use crate::{AccountId, Amount, Result, SaleError};

/// Who may add reserve liquidity to a running sale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositPolicy {
    /// Only the owner may seed liquidity.
    #[default]
    OwnerOnly,
    /// Anyone may deposit.
    Open,
}

/// Configuration for a single sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleConfig {
    /// Account with exclusive admin rights. Receives the full supply at genesis.
    pub owner: AccountId,
    /// Fixed token supply, in whole tokens.
    pub total_supply: Decimal,
    /// Tokens moved from the owner into the sale at construction.
    pub sale_allocation: Decimal,
    /// Reserve currency the owner seeds at construction.
    #[serde(default)]
    pub initial_reserve: Decimal,
    /// Optional sale window; requests after it are rejected.
    #[serde(default)]
    pub sale_duration_secs: Option<u64>,
    #[serde(default)]
    pub deposit_policy: DepositPolicy,
    /// Relative price move (bps) that makes a poll emit `PriceUpdated`.
    #[serde(default = "default_price_change_threshold_bps")]
    pub price_change_threshold_bps: u32,
    pub pricing: PricingConfig,
}

fn default_price_change_threshold_bps() -> u32 {
    constants::DEFAULT_PRICE_CHANGE_THRESHOLD_BPS
}

/// Pricing strategy selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum PricingConfig {
    Tiered(TieredConfig),
    CompoundGrowth(CompoundGrowthConfig),
}

/// Two flat price bands over cumulative sold quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TieredConfig {
    /// Price per token below the cutoff.
    pub tier1_price: Decimal,
    /// Price per token at or above the cutoff.
    pub tier2_price: Decimal,
    /// Cutoff as a fraction of total supply (bps).
    pub tier_cutoff_bps: u32,
    /// Maximum cumulative sold as a fraction of total supply (bps).
    pub sale_cap_bps: u32,
}

/// Time- and liquidity-driven compounding price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompoundGrowthConfig {
    /// Price per token at creation time.
    pub base_price: Decimal,
    /// `dailyRate = reserve (whole units) / liquidity_divisor`.
    #[serde(default = "default_liquidity_divisor")]
    pub liquidity_divisor: u64,
}

fn default_liquidity_divisor() -> u64 {
    constants::DEFAULT_LIQUIDITY_DIVISOR
}

impl SaleConfig {
    /// Tiered preset: 1000 tokens, half for sale, 0.01 then 0.02 per token
    /// with the step at 25% of supply, capped at 50%, open for 30 days.
    #[must_use]
    pub fn tiered_preset(owner: AccountId) -> Self {
        Self {
            owner,
            total_supply: Decimal::new(1000, 0),
            sale_allocation: Decimal::new(500, 0),
            initial_reserve: Decimal::ZERO,
            sale_duration_secs: Some(30 * constants::SECONDS_PER_DAY),
            deposit_policy: DepositPolicy::OwnerOnly,
            price_change_threshold_bps: constants::DEFAULT_PRICE_CHANGE_THRESHOLD_BPS,
            pricing: PricingConfig::Tiered(TieredConfig {
                tier1_price: Decimal::new(1, 2), // 0.01
                tier2_price: Decimal::new(2, 2), // 0.02
                tier_cutoff_bps: 2_500,
                sale_cap_bps: 5_000,
            }),
        }
    }

    /// Compound-growth preset: 100 000 tokens, half for sale, base price 5,
    /// 100 units of seeded liquidity, no time window.
    #[must_use]
    pub fn compound_preset(owner: AccountId) -> Self {
        Self {
            owner,
            total_supply: Decimal::new(100_000, 0),
            sale_allocation: Decimal::new(50_000, 0),
            initial_reserve: Decimal::new(100, 0),
            sale_duration_secs: None,
            deposit_policy: DepositPolicy::OwnerOnly,
            price_change_threshold_bps: constants::DEFAULT_PRICE_CHANGE_THRESHOLD_BPS,
            pricing: PricingConfig::CompoundGrowth(CompoundGrowthConfig {
                base_price: Decimal::new(5, 0),
                liquidity_divisor: default_liquidity_divisor(),
            }),
        }
    }

    /// Parse a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate and convert into engine units.
    ///
    /// # Errors
    /// [`SaleError::Configuration`] describing the first invalid field.
    pub fn resolve(&self) -> Result<SaleParams> {
        let total_supply = Amount::from_decimal(self.total_supply)?;
        let sale_allocation = Amount::from_decimal(self.sale_allocation)?;
        let initial_reserve = Amount::from_decimal(self.initial_reserve)?;

        if total_supply.is_zero() {
            return Err(SaleError::Configuration("total_supply must be positive".into()));
        }
        if sale_allocation > total_supply {
            return Err(SaleError::Configuration(format!(
                "sale_allocation {sale_allocation} exceeds total_supply {total_supply}"
            )));
        }

        let sale_duration = self
            .sale_duration_secs
            .map(|secs| {
                i64::try_from(secs)
                    .ok()
                    .and_then(TimeDelta::try_seconds)
                    .ok_or_else(|| {
                        SaleError::Configuration(format!("sale_duration_secs out of range: {secs}"))
                    })
            })
            .transpose()?;

        let pricing = match &self.pricing {
            PricingConfig::Tiered(cfg) => PricingParams::Tiered(cfg.resolve()?),
            PricingConfig::CompoundGrowth(cfg) => PricingParams::CompoundGrowth(cfg.resolve()?),
        };

        Ok(SaleParams {
            owner: self.owner,
            total_supply,
            sale_allocation,
            initial_reserve,
            sale_duration,
            deposit_policy: self.deposit_policy,
            price_change_threshold_bps: self.price_change_threshold_bps,
            pricing,
        })
    }
}

impl TieredConfig {
    fn resolve(&self) -> Result<TieredParams> {
        let tier1_price = Amount::from_decimal(self.tier1_price)?;
        let tier2_price = Amount::from_decimal(self.tier2_price)?;
        if tier2_price <= tier1_price {
            return Err(SaleError::Configuration(format!(
                "tier2_price {tier2_price} must exceed tier1_price {tier1_price}"
            )));
        }
        if self.sale_cap_bps > BPS_DENOMINATOR {
            return Err(SaleError::Configuration(format!(
                "sale_cap_bps {} exceeds 100%",
                self.sale_cap_bps
            )));
        }
        if self.tier_cutoff_bps > self.sale_cap_bps {
            return Err(SaleError::Configuration(format!(
                "tier_cutoff_bps {} exceeds sale_cap_bps {}",
                self.tier_cutoff_bps, self.sale_cap_bps
            )));
        }
        Ok(TieredParams {
            tier1_price,
            tier2_price,
            tier_cutoff_bps: self.tier_cutoff_bps,
            sale_cap_bps: self.sale_cap_bps,
        })
    }
}

impl CompoundGrowthConfig {
    fn resolve(&self) -> Result<CompoundGrowthParams> {
        let base_price = Amount::from_decimal(self.base_price)?;
        if base_price.is_zero() {
            return Err(SaleError::Configuration("base_price must be positive".into()));
        }
        if self.liquidity_divisor == 0 {
            return Err(SaleError::Configuration("liquidity_divisor must be positive".into()));
        }
        Ok(CompoundGrowthParams {
            base_price,
            liquidity_divisor: u128::from(self.liquidity_divisor),
        })
    }
}

/// Validated sale parameters in engine units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleParams {
    pub owner: AccountId,
    pub total_supply: Amount,
    pub sale_allocation: Amount,
    pub initial_reserve: Amount,
    pub sale_duration: Option<TimeDelta>,
    pub deposit_policy: DepositPolicy,
    pub price_change_threshold_bps: u32,
    pub pricing: PricingParams,
}

/// Validated pricing parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PricingParams {
    Tiered(TieredParams),
    CompoundGrowth(CompoundGrowthParams),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TieredParams {
    pub tier1_price: Amount,
    pub tier2_price: Amount,
    pub tier_cutoff_bps: u32,
    pub sale_cap_bps: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompoundGrowthParams {
    pub base_price: Amount,
    /// Whole reserve units per 100% daily rate.
    pub liquidity_divisor: u128,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> AccountId {
        AccountId::from_bytes([7; 16])
    }

    #[test]
    fn tiered_preset_resolves() {
        let params = SaleConfig::tiered_preset(owner()).resolve().unwrap();
        assert_eq!(params.total_supply, Amount::whole(1000));
        assert_eq!(params.sale_allocation, Amount::whole(500));
        assert_eq!(params.sale_duration, TimeDelta::try_days(30));
        let PricingParams::Tiered(tiers) = params.pricing else {
            panic!("expected tiered pricing");
        };
        assert_eq!(tiers.tier1_price.base_units(), 10_000_000_000_000_000);
        assert_eq!(tiers.tier2_price.base_units(), 20_000_000_000_000_000);
    }

    #[test]
    fn compound_preset_resolves() {
        let params = SaleConfig::compound_preset(owner()).resolve().unwrap();
        assert_eq!(params.initial_reserve, Amount::whole(100));
        assert_eq!(params.sale_duration, None);
        assert_eq!(
            params.pricing,
            PricingParams::CompoundGrowth(CompoundGrowthParams {
                base_price: Amount::whole(5),
                liquidity_divisor: 2_000_000_000,
            })
        );
    }

    #[test]
    fn rejects_allocation_above_supply() {
        let mut cfg = SaleConfig::tiered_preset(owner());
        cfg.sale_allocation = Decimal::new(1001, 0);
        assert!(matches!(cfg.resolve(), Err(SaleError::Configuration(_))));
    }

    #[test]
    fn rejects_inverted_tiers() {
        let mut cfg = SaleConfig::tiered_preset(owner());
        if let PricingConfig::Tiered(t) = &mut cfg.pricing {
            t.tier2_price = t.tier1_price;
        }
        assert!(cfg.resolve().is_err());
    }

    #[test]
    fn rejects_cutoff_above_cap() {
        let mut cfg = SaleConfig::tiered_preset(owner());
        if let PricingConfig::Tiered(t) = &mut cfg.pricing {
            t.tier_cutoff_bps = 6_000;
        }
        assert!(cfg.resolve().is_err());
    }

    #[test]
    fn rejects_zero_divisor() {
        let mut cfg = SaleConfig::compound_preset(owner());
        if let PricingConfig::CompoundGrowth(c) = &mut cfg.pricing {
            c.liquidity_divisor = 0;
        }
        assert!(cfg.resolve().is_err());
    }

    #[test]
    fn loads_from_json_with_defaults() {
        let json = r#"{
            "owner": "01890a5d-ac96-774b-bcce-b302099a8057",
            "total_supply": "1000",
            "sale_allocation": "500",
            "pricing": {
                "strategy": "compound_growth",
                "base_price": "5"
            }
        }"#;
        let cfg = SaleConfig::from_json(json).unwrap();
        assert_eq!(cfg.deposit_policy, DepositPolicy::OwnerOnly);
        assert_eq!(cfg.price_change_threshold_bps, 1);
        let params = cfg.resolve().unwrap();
        assert_eq!(params.initial_reserve, Amount::ZERO);
        assert!(matches!(
            params.pricing,
            PricingParams::CompoundGrowth(CompoundGrowthParams { liquidity_divisor: 2_000_000_000, .. })
        ));
    }

    #[test]
    fn json_roundtrip() {
        let cfg = SaleConfig::tiered_preset(owner());
        let json = cfg.to_json_pretty().unwrap();
        let back = SaleConfig::from_json(&json).unwrap();
        assert_eq!(back.resolve().unwrap(), cfg.resolve().unwrap());
    }

    #[test]
    fn malformed_json_is_serialization_error() {
        let err = SaleConfig::from_json("{").unwrap_err();
        assert!(matches!(err, SaleError::Serialization(_)));
    }
}
