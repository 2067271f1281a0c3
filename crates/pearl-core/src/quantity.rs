//! # Quantity Module
//!
//! Fixed-point stock quantities.
//!
//! Material balances, low-stock thresholds, recipe amounts and stock-change
//! deltas are all `Quantity`. The value is stored as thousandths of a unit
//! so `0.125 kg` of tea leaves is exactly representable and sums never
//! drift. Line quantities on orders stay whole `i64` units.
//!
//! ```rust
//! use pearl_core::quantity::Quantity;
//!
//! let per_cup = Quantity::from_milli(12_500);      // 12.5 g of syrup
//! let used = per_cup.times(3);
//! assert_eq!(used.to_string(), "37.500");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use ts_rs::TS;

/// Thousandths per whole unit.
pub const MILLI_PER_UNIT: i64 = 1_000;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type), sqlx(transparent))]
#[serde(transparent)]
#[ts(export)]
pub struct Quantity(i64);

impl Quantity {
    #[inline]
    pub const fn zero() -> Self {
        Quantity(0)
    }

    /// Whole units (`from_units(30)` is 30.000).
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Quantity(units * MILLI_PER_UNIT)
    }

    /// Raw thousandths (`from_milli(1_500)` is 1.500).
    #[inline]
    pub const fn from_milli(milli: i64) -> Self {
        Quantity(milli)
    }

    #[inline]
    pub const fn milli(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Scales by a whole line quantity (recipe amount × cups sold).
    #[inline]
    pub const fn times(&self, count: i64) -> Self {
        Quantity(self.0 * count)
    }

    /// `None` on overflow.
    #[inline]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(sum) => Some(Quantity(sum)),
            None => None,
        }
    }

    /// Floors the value at zero.
    #[inline]
    pub fn clamp_to_zero(self) -> Self {
        Quantity(self.0.max(0))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let unit = MILLI_PER_UNIT as u64;
        write!(f, "{}{}.{:03}", sign, abs / unit, abs % unit)
    }
}

impl Add for Quantity {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Quantity(self.0 + other.0)
    }
}

impl AddAssign for Quantity {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Quantity {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Quantity(self.0 - other.0)
    }
}

impl SubAssign for Quantity {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Quantity {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Quantity(-self.0)
    }
}

impl Sum for Quantity {
    fn sum<I: Iterator<Item = Quantity>>(iter: I) -> Self {
        iter.fold(Quantity::zero(), |acc, q| acc + q)
    }
}
