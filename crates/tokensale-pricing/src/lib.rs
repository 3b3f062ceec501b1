//! # tokensale-pricing
//!
//! **Pure price functions for a token sale.**
//!
//! Each strategy maps a [`PricingContext`](tokensale_types::PricingContext)
//! snapshot to a cost or payout. Strategies hold no state of their own and
//! never touch the ledger:
//!
//! - **Tiered**: flat first-tier price up to a cutoff, flat second-tier
//!   price up to a sale cap
//! - **Compound growth**: base price compounded daily by a rate derived
//!   from the reserve balance, continuous in time
//!
//! All arithmetic is WAD fixed point on `u128` (see [`fixed_point`]).

pub mod compound;
pub mod fixed_point;
pub mod strategy;
pub mod tiered;

pub use compound::CompoundGrowthPricing;
pub use strategy::{PricingStrategy, build_strategy};
pub use tiered::TieredPricing;
