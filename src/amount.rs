//! Fixed-Point Amounts
//!
//! All values on the ledger are integers of base units; one SAN is
//! `100_000_000` base units. Fee fractions are expressed in basis points
//! so that fee arithmetic stays exact and every encoding of an amount is
//! a decimal integer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

/// Base units per whole SAN.
pub const UNITS_PER_SAN: u64 = 100_000_000;

/// Basis points denominator for fee fractions.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// A non-negative ledger value in base units.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, Hash,
)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_units(units: u64) -> Self {
        Amount(units)
    }

    pub const fn from_san(san: u64) -> Self {
        Amount(san * UNITS_PER_SAN)
    }

    pub const fn units(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// The fee owed on this amount at `fee_bps` basis points, rounded down.
    pub fn fee(self, fee_bps: u64) -> Amount {
        let fee = self.0 as u128 * fee_bps as u128 / BPS_DENOMINATOR as u128;
        Amount(fee as u64)
    }

    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Amount)
    }

    pub fn saturating_sub(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_sub(rhs.0))
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        self.0 += rhs.0;
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0 - rhs.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, |acc, a| Amount(acc.0 + a.0))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / UNITS_PER_SAN;
        let frac = self.0 % UNITS_PER_SAN;
        if frac == 0 {
            write!(f, "{whole} SAN")
        } else {
            let frac = format!("{frac:08}");
            write!(f, "{}.{} SAN", whole, frac.trim_end_matches('0'))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_is_exact_for_basis_points() {
        // 1% of 10 SAN is 0.1 SAN.
        let amount = Amount::from_san(10);
        assert_eq!(amount.fee(100), Amount::from_units(10_000_000));
    }

    #[test]
    fn test_fee_rounds_down() {
        let amount = Amount::from_units(3);
        assert_eq!(amount.fee(100), Amount::ZERO);
    }

    #[test]
    fn test_display() {
        assert_eq!(Amount::from_san(100).to_string(), "100 SAN");
        assert_eq!(Amount::from_units(10_000_000).to_string(), "0.1 SAN");
    }

    #[test]
    fn test_sum() {
        let total: Amount = [Amount::from_san(1), Amount::from_san(2)].into_iter().sum();
        assert_eq!(total, Amount::from_san(3));
    }
}
