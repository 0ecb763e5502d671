use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

//--------------------------------------      Amount       -----------------------------------------------------------
/// A monetary amount in integer cents. Payment rows in the legacy store carry dollar amounts with two decimal
/// places; storing cents keeps comparisons exact.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Amount(i64);

op!(binary Amount, Add, add);
op!(binary Amount, Sub, sub);
op!(inplace Amount, SubAssign, sub_assign);
op!(unary Amount, Neg, neg);

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a payment amount: {0}")]
pub struct AmountConversionError(String);

impl From<i64> for Amount {
    fn from(cents: i64) -> Self {
        Self(cents)
    }
}

impl PartialEq for Amount {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Amount {}

impl TryFrom<f64> for Amount {
    type Error = AmountConversionError;

    fn try_from(dollars: f64) -> Result<Self, Self::Error> {
        if !dollars.is_finite() || dollars.abs() > (i64::MAX / 100) as f64 {
            return Err(AmountConversionError(format!("{dollars} is not a finite dollar value")));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self((dollars * 100.0).round() as i64))
    }
}

impl FromStr for Amount {
    type Err = AmountConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let dollars = s.trim().parse::<f64>().map_err(|e| AmountConversionError(format!("{s}: {e}")))?;
        Self::try_from(dollars)
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dollars = self.0 as f64 / 100.0;
        write!(f, "${dollars:0.2}")
    }
}

impl Amount {
    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn from_dollars(dollars: i64) -> Self {
        Self(dollars * 100)
    }

    pub fn as_dollars_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}
