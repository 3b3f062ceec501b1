//! Observable events emitted by the settlement engine.
//!
//! Events are purely observational: sinks receive them after a request
//! has committed (or, for `PriceUpdated`, after a poll), and nothing a
//! sink does can change ledger state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, Amount, SaleId};

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleEvent {
    TokensPurchased {
        buyer: AccountId,
        quantity: Amount,
        cost: Amount,
    },
    TokensSold {
        seller: AccountId,
        quantity: Amount,
        proceeds: Amount,
    },
    /// A poll observed a price that moved past the configured threshold.
    PriceUpdated {
        previous: Amount,
        current: Amount,
    },
    ReserveDeposited {
        from: AccountId,
        amount: Amount,
    },
    /// The owner closed the sale and swept its balances.
    SaleClosed {
        owner: AccountId,
        tokens_swept: Amount,
        reserve_swept: Amount,
    },
}

impl SaleEvent {
    /// Stable upper-case tag, used as a log field.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TokensPurchased { .. } => "TOKENS_PURCHASED",
            Self::TokensSold { .. } => "TOKENS_SOLD",
            Self::PriceUpdated { .. } => "PRICE_UPDATED",
            Self::ReserveDeposited { .. } => "RESERVE_DEPOSITED",
            Self::SaleClosed { .. } => "SALE_CLOSED",
        }
    }
}

/// An event stamped with its sale, per-sale sequence number and time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleEventRecord {
    pub sale_id: SaleId,
    /// Strictly increasing within one sale, starting at 0.
    pub sequence: u64,
    pub at: DateTime<Utc>,
    pub event: SaleEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_tags() {
        let ev = SaleEvent::TokensPurchased {
            buyer: AccountId::from_bytes([1; 16]),
            quantity: Amount::ONE,
            cost: Amount::ONE,
        };
        assert_eq!(ev.kind(), "TOKENS_PURCHASED");
        let ev = SaleEvent::PriceUpdated {
            previous: Amount::ONE,
            current: Amount::whole(2),
        };
        assert_eq!(ev.kind(), "PRICE_UPDATED");
    }

    #[test]
    fn record_serde_roundtrip() {
        let rec = SaleEventRecord {
            sale_id: SaleId::new(),
            sequence: 3,
            at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            event: SaleEvent::SaleClosed {
                owner: AccountId::from_bytes([9; 16]),
                tokens_swept: Amount::whole(10),
                reserve_swept: Amount::whole(1),
            },
        };
        let json = serde_json::to_string(&rec).unwrap();
        let back: SaleEventRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(rec, back);
    }
}
