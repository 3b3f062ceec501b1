//! System-wide constants for the token-sale engine.

/// Number of implied fractional digits in an [`Amount`](crate::Amount).
pub const AMOUNT_DECIMALS: u32 = 18;

/// One whole unit expressed in base units (`10^18`). Also the scale of
/// every WAD fixed-point value.
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// Basis-point denominator: `10_000` bps = 100%.
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Seconds in one pricing day.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Milliseconds in one pricing day.
pub const MILLIS_PER_DAY: u128 = 86_400_000;

/// Default reserve divisor for compound growth: `dailyRate = reserve / 2e9`.
pub const DEFAULT_LIQUIDITY_DIVISOR: u64 = 2_000_000_000;

/// Default minimum relative price move (bps) that triggers a `PriceUpdated` event.
pub const DEFAULT_PRICE_CHANGE_THRESHOLD_BPS: u32 = 1;

/// Bounded command queue depth for a sale actor.
pub const SALE_ACTOR_QUEUE_DEPTH: usize = 1024;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "TokenSale";
