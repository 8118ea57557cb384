use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Sub},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const KES_CURRENCY_CODE: &str = "KES";
pub const KES_CURRENCY_CODE_LOWER: &str = "kes";

/// Number of minor units (cents) in one shilling. Card gateways bill in minor units.
pub const MINOR_UNITS_PER_KES: i64 = 100;

//--------------------------------------        Kes         ---------------------------------------------------------
/// An amount of Kenyan shillings, in whole units.
///
/// Whole shillings are the smallest unit the mobile-money network accepts, so order totals are stored this way.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Kes(i64);

op!(binary Kes, Add, add);
op!(binary Kes, Sub, sub);
op!(inplace Kes, AddAssign, add_assign);

impl Kes {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// The amount in cents, as expected by card payment intents.
    pub fn to_minor_units(&self) -> i64 {
        self.0 * MINOR_UNITS_PER_KES
    }

    /// The absolute difference between two amounts. Never overflows, whatever the signs.
    pub fn abs_diff(&self, other: Kes) -> u64 {
        self.0.abs_diff(other.0)
    }
}

impl Mul<i64> for Kes {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Sum for Kes {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in KES: {0}")]
pub struct KesConversionError(String);

impl From<i64> for Kes {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<f64> for Kes {
    type Error = KesConversionError;

    /// Mobile-money callbacks report amounts as JSON numbers, which may carry a `.0` or a rounding error.
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() || value.abs() > i64::MAX as f64 {
            return Err(KesConversionError(format!("{value} is not a valid amount")));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self(value.round() as i64))
    }
}

impl FromStr for Kes {
    type Err = KesConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_start_matches("KES").trim();
        if let Ok(v) = s.parse::<i64>() {
            return Ok(Self(v));
        }
        let v = s.parse::<f64>().map_err(|e| KesConversionError(format!("{s}: {e}")))?;
        Self::try_from(v)
    }
}

impl Display for Kes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KES {}", self.0)
    }
}
