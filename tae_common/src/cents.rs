use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

/// Number of basis points in 100%.
pub const BPS_DENOMINATOR: i64 = 10_000;

//--------------------------------------       Cents         ---------------------------------------------------------
/// An amount of money in the smallest unit of the platform currency.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Cents(i64);

op!(binary Cents, Add, add);
op!(binary Cents, Sub, sub);
op!(inplace Cents, AddAssign, add_assign);
op!(inplace Cents, SubAssign, sub_assign);
op!(unary Cents, Neg, neg);

impl Mul<i64> for Cents {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in cents: {0}")]
pub struct CentsConversionError(String);

impl From<i64> for Cents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for Cents {
    type Error = CentsConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(CentsConversionError(format!("Value {value} is too large to convert to Cents")))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Cents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Cents {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn zero() -> Self {
        Self(0)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// `self × bps / 10 000`, rounded half-up on the whole-cent boundary.
    ///
    /// Only defined for non-negative amounts; negative amounts are clamped to zero.
    pub fn apply_bps(&self, bps: BasisPoints) -> Self {
        let gross = self.0.max(0);
        Self((gross * i64::from(bps.0) + BPS_DENOMINATOR / 2) / BPS_DENOMINATOR)
    }

    /// `self × percent / 100`, rounded half-up on the whole-cent boundary.
    pub fn apply_percent(&self, percent: u32) -> Self {
        self.apply_bps(BasisPoints::from_percent(percent))
    }
}

//--------------------------------------    BasisPoints      ---------------------------------------------------------
/// A rate expressed in hundredths of a percent. 1 200 bps is 12%.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
#[serde(transparent)]
pub struct BasisPoints(u32);

impl BasisPoints {
    pub const fn new(bps: u32) -> Self {
        Self(bps)
    }

    pub const fn from_percent(percent: u32) -> Self {
        Self(percent * 100)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// The complement of this rate, i.e. `100% - self`, floored at zero.
    pub fn complement(&self) -> Self {
        Self((BPS_DENOMINATOR as u32).saturating_sub(self.0))
    }
}

impl Display for BasisPoints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}
