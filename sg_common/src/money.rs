use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

/// Number of minor units (cents, paise) in one major currency unit.
pub const MINOR_UNITS: i64 = 100;

//--------------------------------------        Money         ---------------------------------------------------------
/// An amount of fiat (or fiat-pegged) currency, held as an integer number of minor units.
///
/// All ledger arithmetic happens on this type, so there is no floating point anywhere between a request arriving and a
/// balance changing.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, AddAssign, add_assign);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Value cannot be represented as a currency amount: {0}")]
pub struct MoneyConversionError(pub String);

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Money {
    pub fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    pub fn from_major(major: i64) -> Self {
        Self(major * MINOR_UNITS)
    }

    /// The amount in minor units
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

/// Formats the amount in major units with exactly two decimal places, e.g. `1920.00`. This is also the canonical form
/// used when amounts take part in a signature.
impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let unit = MINOR_UNITS.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / unit, abs % unit)
    }
}

/// Parses a non-negative decimal string in major units with at most two decimal places.
///
/// `"2000"`, `"2000.5"` and `"2000.50"` are all accepted. Signs, exponents, thousands separators and sub-cent
/// precision are rejected.
impl FromStr for Money {
    type Err = MoneyConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        let err = || MoneyConversionError(value.to_string());
        let (whole, frac) = match value.split_once('.') {
            Some((w, f)) => (w, f),
            None => (value, ""),
        };
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        if frac.len() > 2 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        if value.ends_with('.') {
            return Err(err());
        }
        let whole = whole.parse::<i64>().map_err(|_| err())?;
        let cents = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| err())? * 10,
            _ => frac.parse::<i64>().map_err(|_| err())?,
        };
        whole.checked_mul(MINOR_UNITS).and_then(|w| w.checked_add(cents)).map(Self).ok_or_else(err)
    }
}

//--------------------------------------       FeeRate        ---------------------------------------------------------
/// A fee percentage, stored in basis points (1/100th of a percent) so that fee calculations are exact.
///
/// `FeeRate::from_bps(400)` is 4%.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, PartialEq, Eq, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct FeeRate(i64);

pub const MAX_FEE_BPS: i64 = 10_000;

impl FeeRate {
    pub fn from_bps(bps: i64) -> Result<Self, MoneyConversionError> {
        if (0..=MAX_FEE_BPS).contains(&bps) {
            Ok(Self(bps))
        } else {
            Err(MoneyConversionError(format!("Fee rate of {bps} bps is outside 0% to 100%")))
        }
    }

    pub fn bps(&self) -> i64 {
        self.0
    }
}

/// Parses a percentage such as `"4"` or `"2.75"` (at most two decimal places).
impl FromStr for FeeRate {
    type Err = MoneyConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // A percentage with two decimals has the same shape as a money amount, and "4.00" percent is 400 bps.
        let bps = s.parse::<Money>()?.value();
        Self::from_bps(bps)
    }
}

impl Display for FeeRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}
