//! # tokensale-types
//!
//! Shared types, errors, and configuration for the **TokenSale** engine.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Quantities**: [`Amount`] (18-decimal fixed point)
//! - **Identifiers**: [`AccountId`], [`SaleId`]
//! - **Pricing I/O**: [`PricingContext`], [`TradeSide`], [`PriceBreakdown`]
//! - **Results**: [`BuyReceipt`], [`SellReceipt`], [`CloseReceipt`], [`SaleInfo`]
//! - **Events**: [`SaleEvent`], [`SaleEventRecord`]
//! - **Configuration**: [`SaleConfig`], [`PricingConfig`], [`SaleParams`]
//! - **Errors**: [`SaleError`] with `TS_ERR_` prefix codes
//! - **Constants**: scales and defaults

pub mod amount;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod ids;
pub mod pricing;

pub use amount::*;
pub use config::*;
pub use error::*;
pub use event::*;
pub use ids::*;
pub use pricing::*;

// Constants are accessed via `tokensale_types::constants::FOO`
// (not re-exported to avoid name collisions).
