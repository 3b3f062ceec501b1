//! Token balance table.
//!
//! Tracks how many tokens each account holds outside the sale itself.
//! The sale's own inventory lives on [`SaleLedger`](crate::SaleLedger);
//! together they account for the whole supply.

use std::collections::HashMap;

use tokensale_types::{AccountId, Amount, Result, SaleError};

/// Per-account token balances. Accounts with a zero balance are not stored.
#[derive(Debug, Clone, Default)]
pub struct TokenBalances {
    balances: HashMap<AccountId, Amount>,
}

impl TokenBalances {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance held by `account` (zero if unknown).
    #[must_use]
    pub fn balance(&self, account: AccountId) -> Amount {
        self.balances.get(&account).copied().unwrap_or(Amount::ZERO)
    }

    /// Balance after crediting `amount`, without applying it.
    ///
    /// # Errors
    /// `ArithmeticOverflow` if the balance would not fit.
    pub fn credited(&self, account: AccountId, amount: Amount) -> Result<Amount> {
        self.balance(account)
            .checked_add(amount)
            .ok_or(SaleError::overflow("token credit"))
    }

    /// Balance after debiting `amount`, without applying it.
    ///
    /// # Errors
    /// `InsufficientBalance` if `account` holds less than `amount`.
    pub fn debited(&self, account: AccountId, amount: Amount) -> Result<Amount> {
        let available = self.balance(account);
        available
            .checked_sub(amount)
            .ok_or(SaleError::InsufficientBalance {
                needed: amount,
                available,
            })
    }

    /// Credit `amount` to `account`.
    ///
    /// # Errors
    /// `ArithmeticOverflow` if the balance would not fit.
    pub fn credit(&mut self, account: AccountId, amount: Amount) -> Result<()> {
        let next = self.credited(account, amount)?;
        self.set(account, next);
        Ok(())
    }

    /// Overwrite a balance with a value computed by `credited`/`debited`.
    pub(crate) fn set(&mut self, account: AccountId, amount: Amount) {
        if amount.is_zero() {
            self.balances.remove(&account);
        } else {
            self.balances.insert(account, amount);
        }
    }

    /// Sum of all balances.
    ///
    /// # Errors
    /// `ArithmeticOverflow` if the sum does not fit, which can only happen
    /// if conservation is already broken.
    pub fn total(&self) -> Result<Amount> {
        self.balances.values().try_fold(Amount::ZERO, |acc, b| {
            acc.checked_add(*b).ok_or(SaleError::overflow("token total"))
        })
    }

    /// Non-zero holders, ordered by account id.
    #[must_use]
    pub fn holders(&self) -> Vec<(AccountId, Amount)> {
        let mut out: Vec<_> = self.balances.iter().map(|(a, b)| (*a, *b)).collect();
        out.sort_unstable_by_key(|(account, _)| *account);
        out
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.balances.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acct(n: u8) -> AccountId {
        AccountId::from_bytes([n; 16])
    }

    #[test]
    fn credit_increases_balance() {
        let mut tb = TokenBalances::new();
        tb.credit(acct(1), Amount::whole(10)).unwrap();
        tb.credit(acct(1), Amount::whole(5)).unwrap();
        assert_eq!(tb.balance(acct(1)), Amount::whole(15));
    }

    #[test]
    fn debit_insufficient_fails() {
        let mut tb = TokenBalances::new();
        tb.credit(acct(1), Amount::whole(3)).unwrap();
        let err = tb.debited(acct(1), Amount::whole(4)).unwrap_err();
        assert_eq!(
            err,
            SaleError::InsufficientBalance {
                needed: Amount::whole(4),
                available: Amount::whole(3),
            }
        );
        // Balance unchanged
        assert_eq!(tb.balance(acct(1)), Amount::whole(3));
    }

    #[test]
    fn debit_to_zero_drops_holder() {
        let mut tb = TokenBalances::new();
        tb.credit(acct(1), Amount::whole(3)).unwrap();
        let next = tb.debited(acct(1), Amount::whole(3)).unwrap();
        tb.set(acct(1), next);
        assert!(tb.is_empty());
        assert_eq!(tb.balance(acct(1)), Amount::ZERO);
    }

    #[test]
    fn unknown_account_is_zero() {
        let tb = TokenBalances::new();
        assert_eq!(tb.balance(acct(9)), Amount::ZERO);
        assert!(tb.debited(acct(9), Amount::ONE).is_err());
    }

    #[test]
    fn total_sums_all_holders() {
        let mut tb = TokenBalances::new();
        tb.credit(acct(1), Amount::whole(10)).unwrap();
        tb.credit(acct(2), Amount::whole(7)).unwrap();
        assert_eq!(tb.total().unwrap(), Amount::whole(17));
    }

    #[test]
    fn holders_sorted_by_account() {
        let mut tb = TokenBalances::new();
        tb.credit(acct(3), Amount::ONE).unwrap();
        tb.credit(acct(1), Amount::ONE).unwrap();
        tb.credit(acct(2), Amount::ONE).unwrap();
        let order: Vec<_> = tb.holders().into_iter().map(|(a, _)| a).collect();
        assert_eq!(order, vec![acct(1), acct(2), acct(3)]);
    }
}
