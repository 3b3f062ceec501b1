//! Fixed-point quantity type shared by tokens and the reserve currency.
//!
//! Every balance, price and cost in the engine is an [`Amount`]: a
//! non-negative count of base units with 18 implied fractional digits,
//! so `Amount::from_base_units(10^18)` is one whole token (or one whole
//! unit of reserve currency).

use std::fmt;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::constants::{AMOUNT_DECIMALS, WAD};
use crate::{Result, SaleError};

/// A non-negative fixed-point quantity (18 implied decimals).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(u128);

impl Amount {
    /// The zero amount.
    pub const ZERO: Self = Self(0);

    /// Exactly one whole unit.
    pub const ONE: Self = Self(WAD);

    /// Wrap a raw base-unit count.
    #[must_use]
    pub const fn from_base_units(units: u128) -> Self {
        Self(units)
    }

    /// `n` whole units.
    #[must_use]
    pub const fn whole(n: u64) -> Self {
        Self(n as u128 * WAD)
    }

    /// Convert a human-entered decimal (e.g. `"0.01"`) into base units.
    ///
    /// # Errors
    /// `Configuration` if the value is negative, has more than 18
    /// fractional digits, or does not fit in `u128` base units.
    pub fn from_decimal(value: Decimal) -> Result<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(SaleError::Configuration(format!(
                "amount must be non-negative, got {value}"
            )));
        }
        let whole = value
            .trunc()
            .to_u128()
            .ok_or_else(|| SaleError::Configuration(format!("amount out of range: {value}")))?;
        let scaled_fract = value
            .fract()
            .checked_mul(Decimal::from(10u64.pow(AMOUNT_DECIMALS)))
            .ok_or_else(|| SaleError::Configuration(format!("amount out of range: {value}")))?;
        if !scaled_fract.fract().is_zero() {
            return Err(SaleError::Configuration(format!(
                "amount {value} has more than {AMOUNT_DECIMALS} fractional digits"
            )));
        }
        let fract = scaled_fract
            .to_u128()
            .ok_or_else(|| SaleError::Configuration(format!("amount out of range: {value}")))?;
        whole
            .checked_mul(WAD)
            .and_then(|w| w.checked_add(fract))
            .map(Self)
            .ok_or_else(|| SaleError::Configuration(format!("amount out of range: {value}")))
    }

    /// Lossless conversion to a `Decimal`, if the value fits in its 96-bit mantissa.
    #[must_use]
    pub fn to_decimal(self) -> Option<Decimal> {
        let mantissa = i128::try_from(self.0).ok()?;
        Decimal::try_from_i128_with_scale(mantissa, AMOUNT_DECIMALS)
            .ok()
            .map(|d| d.normalize())
    }

    /// Raw base-unit count.
    #[must_use]
    pub const fn base_units(self) -> u128 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    #[must_use]
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    #[must_use]
    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Absolute difference between two amounts.
    #[must_use]
    pub fn abs_diff(self, other: Self) -> Self {
        Self(self.0.abs_diff(other.0))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / WAD;
        let fract = self.0 % WAD;
        if fract == 0 {
            return write!(f, "{whole}");
        }
        let digits = format!("{fract:018}");
        write!(f, "{whole}.{}", digits.trim_end_matches('0'))
    }
}

impl std::iter::Sum for Amount {
    /// Saturating sum; a saturated total always fails conservation checks.
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, a| Self(acc.0.saturating_add(a.0)))
    }
}
