//! # tokensale-settlement
//!
//! **Settlement plane**: the outward-facing dispatcher for one sale.
//!
//! ## Architecture
//!
//! [`SettlementEngine`] owns a `SaleLedger` and a pricing strategy and
//! executes each request as one atomic unit:
//! 1. Validates liveness, quantity and sale cap
//! 2. Prices the request
//! 3. Checks payment, balances and liquidity against the ledger
//! 4. Moves value out through [`ValueTransfer`] (refunds, payouts, sweeps)
//! 5. Commits the ledger change and emits an event to the [`EventSink`]
//!
//! [`SupplyConservation`] audits token and reserve totals, [`PriceWatch`]
//! turns price polls into `PriceUpdated` events, and [`spawn_sale`] runs
//! an engine as a single-writer tokio actor.

pub mod actor;
pub mod engine;
pub mod price_watch;
pub mod sink;
pub mod supply_conservation;
pub mod transfer;

pub use actor::{SaleHandle, spawn_sale};
pub use engine::SettlementEngine;
pub use price_watch::PriceWatch;
pub use sink::{ChannelSink, EventSink, TracingSink};
pub use supply_conservation::SupplyConservation;
pub use transfer::ValueTransfer;

#[cfg(any(test, feature = "test-helpers"))]
pub use sink::RecordingSink;
#[cfg(any(test, feature = "test-helpers"))]
pub use transfer::{FailingTransfer, RecordingTransfer};
