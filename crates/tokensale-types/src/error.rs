//! Error types for the token-sale engine.
//!
//! All errors use the `TS_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Sale state / request shape
//! - 2xx: Balance and payment errors
//! - 3xx: Authorization errors
//! - 4xx: Value transfer errors
//! - 5xx: Arithmetic / pricing errors
//! - 8xx: Invariant violations
//! - 9xx: General / internal errors
//!
//! Every variant is a rejected request: the ledger is left exactly as it
//! was before the call.

use thiserror::Error;

use crate::{AccountId, Amount};

/// Central error enum for all sale operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaleError {
    // =================================================================
    // Sale State (1xx)
    // =================================================================
    /// The sale was closed by the owner or its time window lapsed.
    #[error("TS_ERR_100: Sale ended")]
    SaleEnded,

    /// The request would push cumulative sales past the sale cap.
    #[error("TS_ERR_101: Exceeds sale limit: requested {requested}, remaining {remaining}")]
    ExceedsSaleLimit { requested: Amount, remaining: Amount },

    /// The sale does not hold enough tokens to fill the request.
    #[error("TS_ERR_102: Insufficient sale inventory: requested {requested}, available {available}")]
    InsufficientInventory { requested: Amount, available: Amount },

    /// Zero-quantity requests are rejected.
    #[error("TS_ERR_103: Quantity must be greater than zero")]
    InvalidQuantity,

    // =================================================================
    // Balance / Payment (2xx)
    // =================================================================
    /// The caller offered less reserve currency than the computed cost.
    #[error("TS_ERR_200: Insufficient payment: required {required}, paid {paid}")]
    InsufficientPayment { required: Amount, paid: Amount },

    /// The seller holds fewer tokens than they are trying to sell.
    #[error("TS_ERR_201: Insufficient token balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Amount, available: Amount },

    /// The sale's reserve cannot cover a sell payout.
    #[error("TS_ERR_202: Insufficient liquidity: need {needed}, reserve {available}")]
    InsufficientLiquidity { needed: Amount, available: Amount },

    // =================================================================
    // Authorization (3xx)
    // =================================================================
    /// An owner-only operation was attempted by someone else.
    #[error("TS_ERR_300: Caller {caller} is not the sale owner")]
    NotOwner { caller: AccountId },

    // =================================================================
    // Value Transfer (4xx)
    // =================================================================
    /// A refund, payout or sweep could not be delivered.
    #[error("TS_ERR_400: Transfer of {amount} to {to} failed: {reason}")]
    TransferFailed {
        to: AccountId,
        amount: Amount,
        reason: String,
    },

    // =================================================================
    // Arithmetic / Pricing (5xx)
    // =================================================================
    /// Fixed-point headroom exhausted while computing a price or balance.
    #[error("TS_ERR_500: Arithmetic overflow in {context}")]
    ArithmeticOverflow { context: &'static str },

    // =================================================================
    // Invariants (8xx)
    // =================================================================
    /// Supply or reserve conservation broken; critical safety alert.
    #[error("TS_ERR_800: Supply invariant violation: {reason}")]
    SupplyInvariantViolation { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("TS_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("TS_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Invalid sale configuration.
    #[error("TS_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

impl SaleError {
    /// Shorthand for an overflow in a named computation.
    #[must_use]
    pub fn overflow(context: &'static str) -> Self {
        Self::ArithmeticOverflow { context }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, SaleError>;

impl From<serde_json::Error> for SaleError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Failure reported by the value-transfer collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct TransferError {
    pub reason: String,
}

impl TransferError {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
