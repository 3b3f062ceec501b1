//! Point-in-time ledger snapshots.
//!
//! A snapshot is a plain serde value with holders sorted by account, so
//! two ledgers in the same state always produce the same snapshot and the
//! same [`LedgerSnapshot::digest`]. Comparing digests before and after a
//! rejected request is how tests prove the ledger was left untouched.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokensale_types::{AccountId, Amount, DepositPolicy, Result, SaleError, SaleId};

use crate::{SaleLedger, TokenBalances};

/// One holder row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolderBalance {
    pub account: AccountId,
    pub balance: Amount,
}

/// Complete serializable state of a [`SaleLedger`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub sale_id: SaleId,
    pub owner: AccountId,
    pub total_supply: Amount,
    pub sale_token_balance: Amount,
    pub reserve_balance: Amount,
    pub sold_cumulative: Amount,
    pub created_at: DateTime<Utc>,
    pub sale_duration_ms: Option<i64>,
    pub sale_cap: Option<Amount>,
    pub deposit_policy: DepositPolicy,
    pub sale_ended: bool,
    pub revision: u64,
    /// Sorted by account, zero balances omitted.
    pub holders: Vec<HolderBalance>,
}

impl LedgerSnapshot {
    /// SHA-256 over every field in a fixed order.
    #[must_use]
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"tokensale:snapshot:v1:");
        hasher.update(self.sale_id.0.as_bytes());
        hasher.update(self.owner.0.as_bytes());
        hasher.update(self.total_supply.base_units().to_le_bytes());
        hasher.update(self.sale_token_balance.base_units().to_le_bytes());
        hasher.update(self.reserve_balance.base_units().to_le_bytes());
        hasher.update(self.sold_cumulative.base_units().to_le_bytes());
        hasher.update(self.created_at.timestamp_millis().to_le_bytes());
        match self.sale_duration_ms {
            Some(ms) => {
                hasher.update([1u8]);
                hasher.update(ms.to_le_bytes());
            }
            None => hasher.update([0u8]),
        }
        match self.sale_cap {
            Some(cap) => {
                hasher.update([1u8]);
                hasher.update(cap.base_units().to_le_bytes());
            }
            None => hasher.update([0u8]),
        }
        hasher.update([match self.deposit_policy {
            DepositPolicy::OwnerOnly => 0u8,
            DepositPolicy::Open => 1,
        }]);
        hasher.update([u8::from(self.sale_ended)]);
        hasher.update(self.revision.to_le_bytes());
        hasher.update((self.holders.len() as u64).to_le_bytes());
        for row in &self.holders {
            hasher.update(row.account.0.as_bytes());
            hasher.update(row.balance.base_units().to_le_bytes());
        }

        let result = hasher.finalize();
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&result);
        digest
    }

    #[must_use]
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl SaleLedger {
    /// Capture the full ledger state.
    #[must_use]
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            sale_id: self.sale_id,
            owner: self.owner,
            total_supply: self.total_supply,
            sale_token_balance: self.sale_token_balance,
            reserve_balance: self.reserve_balance,
            sold_cumulative: self.sold_cumulative,
            created_at: self.created_at,
            sale_duration_ms: self.sale_duration.map(|d| d.num_milliseconds()),
            sale_cap: self.sale_cap,
            deposit_policy: self.deposit_policy,
            sale_ended: self.sale_ended,
            revision: self.revision,
            holders: self
                .holders
                .holders()
                .into_iter()
                .map(|(account, balance)| HolderBalance { account, balance })
                .collect(),
        }
    }

    /// Rebuild a ledger from a snapshot.
    ///
    /// # Errors
    /// - `Serialization` for a malformed duration or a duplicated holder
    /// - `SupplyInvariantViolation` if balances do not sum to total supply
    pub fn restore(snapshot: &LedgerSnapshot) -> Result<Self> {
        let sale_duration = snapshot
            .sale_duration_ms
            .map(|ms| {
                TimeDelta::try_milliseconds(ms)
                    .filter(|d| *d >= TimeDelta::zero())
                    .ok_or_else(|| {
                        SaleError::Serialization(format!("invalid sale duration: {ms}ms"))
                    })
            })
            .transpose()?;

        let mut holders = TokenBalances::new();
        for row in &snapshot.holders {
            if !holders.balance(row.account).is_zero() {
                return Err(SaleError::Serialization(format!(
                    "duplicate holder {}",
                    row.account
                )));
            }
            holders.credit(row.account, row.balance)?;
        }

        let ledger = Self {
            sale_id: snapshot.sale_id,
            owner: snapshot.owner,
            total_supply: snapshot.total_supply,
            sale_token_balance: snapshot.sale_token_balance,
            reserve_balance: snapshot.reserve_balance,
            sold_cumulative: snapshot.sold_cumulative,
            created_at: snapshot.created_at,
            sale_duration,
            sale_cap: snapshot.sale_cap,
            deposit_policy: snapshot.deposit_policy,
            sale_ended: snapshot.sale_ended,
            holders,
            revision: snapshot.revision,
        };
        ledger.verify_conservation()?;
        tracing::debug!(
            sale_id = %ledger.sale_id,
            revision = ledger.revision,
            holders = ledger.holders.len(),
            "ledger restored from snapshot"
        );
        Ok(ledger)
    }
}

#[cfg(test)]
mod tests {
    use tokensale_types::SaleConfig;

    use super::*;

    fn owner() -> AccountId {
        AccountId::from_bytes([1; 16])
    }

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn ledger() -> SaleLedger {
        let params = SaleConfig::tiered_preset(owner()).resolve().unwrap();
        SaleLedger::open(SaleId::new(), &params, Some(Amount::whole(500)), t0()).unwrap()
    }

    fn buy(l: &mut SaleLedger, who: u8, qty: u64) {
        let plan = l
            .prepare_purchase(
                AccountId::from_bytes([who; 16]),
                Amount::whole(qty),
                Amount::whole(qty),
                t0(),
                |_| Ok(Amount::whole(qty)),
            )
            .unwrap();
        l.commit_purchase(plan).unwrap();
    }

    #[test]
    fn same_state_same_digest() {
        let mut a = ledger();
        let mut b = SaleLedger::restore(&a.snapshot()).unwrap();
        buy(&mut a, 3, 5);
        buy(&mut a, 2, 7);
        buy(&mut b, 3, 5);
        buy(&mut b, 2, 7);
        assert_eq!(a.snapshot().digest(), b.snapshot().digest());
    }

    #[test]
    fn any_change_moves_digest() {
        let mut l = ledger();
        let before = l.snapshot().digest();
        buy(&mut l, 2, 1);
        assert_ne!(before, l.snapshot().digest());
    }

    #[test]
    fn digest_hex_is_64_chars() {
        assert_eq!(ledger().snapshot().digest_hex().len(), 64);
    }

    #[test]
    fn holders_sorted_in_snapshot() {
        let mut l = ledger();
        buy(&mut l, 9, 1);
        buy(&mut l, 3, 1);
        let snap = l.snapshot();
        let accounts: Vec<_> = snap.holders.iter().map(|h| h.account).collect();
        let mut sorted = accounts.clone();
        sorted.sort();
        assert_eq!(accounts, sorted);
    }

    #[test]
    fn json_roundtrip_restores_identical_ledger() {
        let mut l = ledger();
        buy(&mut l, 2, 42);
        let snap = l.snapshot();
        let json = snap.to_json().unwrap();
        let back = LedgerSnapshot::from_json(&json).unwrap();
        assert_eq!(back, snap);
        let restored = SaleLedger::restore(&back).unwrap();
        assert_eq!(restored.snapshot().digest(), snap.digest());
        assert_eq!(restored.sale_duration(), l.sale_duration());
    }

    #[test]
    fn restore_rejects_broken_conservation() {
        let mut snap = ledger().snapshot();
        snap.sale_token_balance = Amount::whole(499);
        let err = SaleLedger::restore(&snap).unwrap_err();
        assert!(matches!(err, SaleError::SupplyInvariantViolation { .. }));
    }

    #[test]
    fn restore_rejects_duplicate_holder() {
        let mut snap = ledger().snapshot();
        let row = snap.holders[0];
        snap.holders.push(row);
        let err = SaleLedger::restore(&snap).unwrap_err();
        assert!(matches!(err, SaleError::Serialization(_)));
    }
}
