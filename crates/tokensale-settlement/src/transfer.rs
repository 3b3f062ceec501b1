//! Outbound value movement.
//!
//! The engine never holds reserve currency itself; refunds, sell payouts
//! and the closing sweep go through a [`ValueTransfer`] supplied by the
//! host. A failed transfer aborts the request that needed it.

use tokensale_types::{AccountId, Amount, TransferError};

/// Moves reserve currency out of the sale to an account.
pub trait ValueTransfer: Send {
    /// # Errors
    /// [`TransferError`] if the value did not move. The engine treats this
    /// as "nothing happened" and rolls the whole request back.
    fn transfer(&mut self, to: AccountId, amount: Amount) -> Result<(), TransferError>;
}

impl<T: ValueTransfer + ?Sized> ValueTransfer for Box<T> {
    fn transfer(&mut self, to: AccountId, amount: Amount) -> Result<(), TransferError> {
        (**self).transfer(to, amount)
    }
}

/// Records every successful transfer. Can be switched into a failing mode.
/// **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
#[derive(Debug, Default)]
pub struct RecordingTransfer {
    pub transfers: Vec<(AccountId, Amount)>,
    failure: Option<String>,
}

#[cfg(any(test, feature = "test-helpers"))]
impl RecordingTransfer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every following transfer with `reason`.
    pub fn fail_with(&mut self, reason: impl Into<String>) {
        self.failure = Some(reason.into());
    }

    /// Accept transfers again.
    pub fn recover(&mut self) {
        self.failure = None;
    }

    /// Total value sent to `to`.
    #[must_use]
    pub fn total_to(&self, to: AccountId) -> Amount {
        self.transfers
            .iter()
            .filter(|(acct, _)| *acct == to)
            .map(|(_, amount)| *amount)
            .sum()
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl ValueTransfer for RecordingTransfer {
    fn transfer(&mut self, to: AccountId, amount: Amount) -> Result<(), TransferError> {
        if let Some(reason) = &self.failure {
            return Err(TransferError::new(reason.clone()));
        }
        self.transfers.push((to, amount));
        Ok(())
    }
}

/// Rejects every transfer.
#[cfg(any(test, feature = "test-helpers"))]
#[derive(Debug, Clone)]
pub struct FailingTransfer {
    pub reason: String,
}

#[cfg(any(test, feature = "test-helpers"))]
impl FailingTransfer {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl ValueTransfer for FailingTransfer {
    fn transfer(&mut self, _to: AccountId, _amount: Amount) -> Result<(), TransferError> {
        Err(TransferError::new(self.reason.clone()))
    }
}
