use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CURRENCY_CODE: &str = "BDT";

//--------------------------------------       Money        ----------------------------------------------------------
/// A fixed-point monetary amount, stored as a signed count of minor currency units (cents / paisa, 2 dp).
///
/// Gateway APIs exchange amounts as decimal strings ("500.00"). Parsing keeps two decimal places and rounds the
/// third digit half-up, so `"100.009"` becomes `100.01`. Arithmetic is plain integer arithmetic on minor units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// One minor currency unit (0.01). Also the amount-reconciliation tolerance.
    pub const CENT: Money = Money(1);
    pub const ZERO: Money = Money(0);

    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub fn from_major_units(units: i64) -> Self {
        Self(units * 100)
    }

    /// The amount in minor units.
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Absolute difference between two amounts.
    pub fn abs_diff(&self, other: Money) -> Money {
        Money((self.0 - other.0).abs())
    }

    /// True if the two amounts agree to within `tolerance` (inclusive).
    pub fn reconciles_with(&self, other: Money, tolerance: Money) -> bool {
        self.abs_diff(other) <= tolerance
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Not a valid monetary amount: {0}")]
pub struct MoneyParseError(String);

impl FromStr for Money {
    type Err = MoneyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(MoneyParseError("empty string".into()));
        }
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (int_part, frac_part) = match digits.split_once('.') {
            Some((i, f)) => (i, f),
            None => (digits, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(MoneyParseError(s.into()));
        }
        if !int_part.chars().all(|c| c.is_ascii_digit()) || !frac_part.chars().all(|c| c.is_ascii_digit()) {
            return Err(MoneyParseError(s.into()));
        }
        let units: i64 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| MoneyParseError(s.into()))?
        };
        let mut frac = frac_part.chars();
        let tens = frac.next().and_then(|c| c.to_digit(10)).unwrap_or(0) as i64;
        let ones = frac.next().and_then(|c| c.to_digit(10)).unwrap_or(0) as i64;
        // Round the third decimal digit half-up; anything beyond it is noise from the gateway.
        let round_up = frac.next().and_then(|c| c.to_digit(10)).map(|d| d >= 5).unwrap_or(false);
        let mut cents = units
            .checked_mul(100)
            .and_then(|v| v.checked_add(tens * 10 + ones))
            .ok_or_else(|| MoneyParseError(format!("{s} overflows the representable range")))?;
        if round_up {
            cents += 1;
        }
        Ok(Self(if negative { -cents } else { cents }))
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}
