//! # tokensale-ledger
//!
//! **Accounting plane**: the single source of truth for one sale.
//!
//! [`SaleLedger`] owns the token inventory, holder balances, the reserve
//! pool and the sale-window flags. It never prices anything itself; the
//! settlement engine hands it a cost from the pricing strategy and the
//! ledger checks invariants and applies the move.
//!
//! ## Atomicity
//!
//! Mutations are two-phase (`prepare_*` then `commit_*`). Preparation is
//! read-only and does every check; commit only refuses a plan made
//! stale by an intervening mutation. A rejected
//! request therefore leaves the ledger byte-for-byte unchanged, which
//! [`LedgerSnapshot::digest`] makes observable.

pub mod balances;
pub mod ledger;
pub mod snapshot;

pub use balances::TokenBalances;
pub use ledger::{ClosePlan, PurchasePlan, SaleLedger, SalePlan};
pub use snapshot::{HolderBalance, LedgerSnapshot};
