//! Detects material price moves between polls.
//!
//! The watch remembers the last price it reported and flags a new one
//! once it differs by at least `threshold_bps` of that value. It never
//! feeds back into pricing.

use tokensale_pricing::fixed_point::apply_bps;
use tokensale_types::Amount;

#[derive(Debug, Clone)]
pub struct PriceWatch {
    threshold_bps: u32,
    last_reported: Amount,
}

impl PriceWatch {
    /// Start watching from `initial`, the price at sale creation.
    #[must_use]
    pub fn new(threshold_bps: u32, initial: Amount) -> Self {
        Self {
            threshold_bps,
            last_reported: initial,
        }
    }

    /// Record a polled price. Returns the previously reported price if the
    /// move is material, and makes `current` the new reference.
    pub fn observe(&mut self, current: Amount) -> Option<Amount> {
        let moved = current.abs_diff(self.last_reported);
        if moved.is_zero() {
            return None;
        }
        let threshold = apply_bps(self.last_reported.base_units(), self.threshold_bps);
        if moved.base_units() < threshold {
            return None;
        }
        let previous = self.last_reported;
        self.last_reported = current;
        Some(previous)
    }

    #[must_use]
    pub fn last_reported(&self) -> Amount {
        self.last_reported
    }
}
