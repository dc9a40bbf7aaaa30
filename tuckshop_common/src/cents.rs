use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const CURRENCY_CODE: &str = "USD";
pub const CURRENCY_SYMBOL: &str = "$";

//--------------------------------------       Cents         ---------------------------------------------------------

/// A monetary amount in integer cents. All prices, totals and tendered amounts in the system are stored and summed
/// in this type so that no floating-point rounding ever reaches the database.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Cents(i64);

op!(binary Cents, Add, add);
op!(binary Cents, Sub, sub);
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

impl PartialEq for Cents {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Cents {}

impl TryFrom<u64> for Cents {
    type Error = CentsConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(CentsConversionError(format!("Value {} is too large to convert to Cents", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

/// Parses a decimal currency string, e.g. `2`, `2.5`, `2.50` or `$2.50`, with at most two fractional digits.
impl FromStr for Cents {
    type Err = CentsConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (neg, s) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let s = s.strip_prefix(CURRENCY_SYMBOL).unwrap_or(s);
        let (dollars, frac) = match s.split_once('.') {
            Some((d, f)) => (d, f),
            None => (s, ""),
        };
        if dollars.is_empty() && frac.is_empty() {
            return Err(CentsConversionError(format!("'{s}' is not a currency amount")));
        }
        if frac.len() > 2 {
            return Err(CentsConversionError(format!("'{s}' has sub-cent precision")));
        }
        let dollars = if dollars.is_empty() { 0 } else { parse_digits(dollars)? };
        let mut cents = match frac.len() {
            0 => 0,
            1 => parse_digits(frac)? * 10,
            _ => parse_digits(frac)?,
        };
        cents = dollars
            .checked_mul(100)
            .and_then(|d| d.checked_add(cents))
            .ok_or_else(|| CentsConversionError(format!("'{s}' is too large to convert to Cents")))?;
        Ok(Self(if neg { -cents } else { cents }))
    }
}

fn parse_digits(s: &str) -> Result<i64, CentsConversionError> {
    if s.bytes().all(|b| b.is_ascii_digit()) {
        s.parse::<i64>().map_err(|e| CentsConversionError(format!("'{s}': {e}")))
    } else {
        Err(CentsConversionError(format!("'{s}' contains non-digit characters")))
    }
}

impl Display for Cents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.abs();
        write!(f, "{sign}{}{}.{:02}", CURRENCY_SYMBOL, cents / 100, cents % 100)
    }
}

impl Cents {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_dollars(dollars: i64) -> Self {
        Self(dollars * 100)
    }
}
