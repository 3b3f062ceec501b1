//! Supply conservation invariant checker.
//!
//! Invariants verified on demand after any sequence of requests:
//! ```text
//! Σ(holder balances) + saleTokenBalance == totalSupply
//! reserveBalance == Σ(inflows) - Σ(outflows)
//! ```
//!
//! Inflows are the seeded reserve, deposits and purchase costs. Outflows
//! are sell payouts and the closing sweep. Refunds never enter the pool,
//! so they appear on neither side.

use tokensale_ledger::SaleLedger;
use tokensale_types::{Amount, Result, SaleError};

/// Running reserve totals for one sale.
#[derive(Debug, Clone, Default)]
pub struct SupplyConservation {
    inflows: u128,
    outflows: u128,
}

impl SupplyConservation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve currency entering the pool.
    pub fn record_inflow(&mut self, amount: Amount) {
        self.inflows = self.inflows.saturating_add(amount.base_units());
    }

    /// Reserve currency leaving the pool.
    pub fn record_outflow(&mut self, amount: Amount) {
        self.outflows = self.outflows.saturating_add(amount.base_units());
    }

    #[must_use]
    pub fn total_inflows(&self) -> Amount {
        Amount::from_base_units(self.inflows)
    }

    #[must_use]
    pub fn total_outflows(&self) -> Amount {
        Amount::from_base_units(self.outflows)
    }

    /// Expected pool balance: inflows - outflows.
    ///
    /// # Errors
    /// `SupplyInvariantViolation` if more has left than ever entered.
    pub fn expected_reserve(&self) -> Result<Amount> {
        self.inflows
            .checked_sub(self.outflows)
            .map(Amount::from_base_units)
            .ok_or_else(|| SaleError::SupplyInvariantViolation {
                reason: format!(
                    "reserve outflows {} exceed inflows {}",
                    self.total_outflows(),
                    self.total_inflows()
                ),
            })
    }

    /// Verify both invariants against the ledger.
    ///
    /// # Errors
    /// Returns [`SaleError::SupplyInvariantViolation`] if either is broken.
    pub fn verify(&self, ledger: &SaleLedger) -> Result<()> {
        ledger.verify_conservation()?;
        let expected = self.expected_reserve()?;
        let actual = ledger.reserve_balance();
        if actual != expected {
            return Err(SaleError::SupplyInvariantViolation {
                reason: format!(
                    "{}: reserve {actual} != expected {expected} (inflows={}, outflows={})",
                    ledger.sale_id(),
                    self.total_inflows(),
                    self.total_outflows(),
                ),
            });
        }
        Ok(())
    }
}
