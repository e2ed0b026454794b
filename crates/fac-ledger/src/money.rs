//! Exact two-decimal money type.
//!
//! # Representation
//!
//! Every monetary value in the console (amounts owed, installments,
//! withdrawals, repayments, balances) is a `Money`: a signed `i64` count of
//! cents.  1.00 currency unit = `Money::from_cents(100)`.  Binary floating
//! point never appears on the money path, so sums over thousands of
//! installments cannot drift by a cent.
//!
//! # Construction
//!
//! There is no `From<i64>` impl.  Use [`Money::from_cents`] or
//! [`Money::from_units`] when the integer is known to be money, or
//! [`Money::parse`] for decimal strings such as `"1234.56"`.
//!
//! # Wire format
//!
//! Serialized as a decimal string with exactly two fractional digits.
//! Deserialization accepts decimal strings and JSON integers (whole units);
//! JSON floats are rejected.

use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Cents per currency unit.
pub const CENTS_PER_UNIT: i64 = 100;

// ---------------------------------------------------------------------------
// Money newtype
// ---------------------------------------------------------------------------

/// A monetary amount with two fractional digits, stored as integer cents.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    /// Zero.
    pub const ZERO: Money = Money(0);

    /// Maximum representable value.
    pub const MAX: Money = Money(i64::MAX);

    /// Minimum representable value.
    pub const MIN: Money = Money(i64::MIN);

    /// Construct from a raw cent count.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Construct from whole currency units.
    ///
    /// Saturates at the representable range.
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Money(units.saturating_mul(CENTS_PER_UNIT))
    }

    /// Raw cent count, for crossing storage boundaries.
    #[inline]
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Clamp a wide accumulator into the representable range.
    #[inline]
    pub(crate) fn from_i128_saturating(v: i128) -> Self {
        if v > i64::MAX as i128 {
            Money::MAX
        } else if v < i64::MIN as i128 {
            Money::MIN
        } else {
            Money(v as i64)
        }
    }

    #[inline]
    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    #[inline]
    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }

    /// Saturating addition; clamps at [`Money::MAX`] / [`Money::MIN`].
    #[inline]
    pub fn saturating_add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }

    /// Saturating subtraction; clamps at [`Money::MAX`] / [`Money::MIN`].
    #[inline]
    pub fn saturating_sub(self, rhs: Money) -> Money {
        Money(self.0.saturating_sub(rhs.0))
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// `true` if strictly greater than zero.
    #[inline]
    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// `true` if strictly less than zero.
    #[inline]
    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Parse a decimal string (`"1234"`, `"1234.5"`, `"-0.05"`).
    ///
    /// At most two fractional digits are accepted; more precision than the
    /// currency carries is an error rather than a silent rounding.
    pub fn parse(s: &str) -> Result<Money, MoneyParseError> {
        let t = s.trim();
        if t.is_empty() {
            return Err(MoneyParseError::Empty);
        }

        let (negative, body) = match t.as_bytes()[0] {
            b'-' => (true, &t[1..]),
            b'+' => (false, &t[1..]),
            _ => (false, t),
        };

        let (int_part, frac_part) = match body.split_once('.') {
            Some((i, f)) => (i, Some(f)),
            None => (body, None),
        };

        if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MoneyParseError::Malformed(s.to_string()));
        }

        let frac_cents: i64 = match frac_part {
            None => 0,
            Some(f) => {
                if f.is_empty() || !f.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(MoneyParseError::Malformed(s.to_string()));
                }
                if f.len() > 2 {
                    return Err(MoneyParseError::TooPrecise(s.to_string()));
                }
                // "5" means 50 cents, "05" means 5 cents.
                let raw: i64 = f
                    .parse()
                    .map_err(|_| MoneyParseError::Malformed(s.to_string()))?;
                if f.len() == 1 {
                    raw * 10
                } else {
                    raw
                }
            }
        };

        let units: i64 = int_part
            .parse()
            .map_err(|_| MoneyParseError::OutOfRange(s.to_string()))?;

        let cents = units
            .checked_mul(CENTS_PER_UNIT)
            .and_then(|c| c.checked_add(frac_cents))
            .ok_or_else(|| MoneyParseError::OutOfRange(s.to_string()))?;

        Ok(Money(if negative { -cents } else { cents }))
    }
}

// ---------------------------------------------------------------------------
// Parse error
// ---------------------------------------------------------------------------

/// Reasons a decimal string cannot become [`Money`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoneyParseError {
    Empty,
    Malformed(String),
    /// More than two fractional digits.
    TooPrecise(String),
    OutOfRange(String),
}

impl fmt::Display for MoneyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "money amount is empty"),
            Self::Malformed(s) => write!(f, "malformed money amount: {s:?}"),
            Self::TooPrecise(s) => {
                write!(f, "money amount has more than two decimal places: {s:?}")
            }
            Self::OutOfRange(s) => write!(f, "money amount out of range: {s:?}"),
        }
    }
}

impl std::error::Error for MoneyParseError {}

impl FromStr for Money {
    type Err = MoneyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::parse(s)
    }
}

// ---------------------------------------------------------------------------
// Arithmetic operators (closed over Money)
// ---------------------------------------------------------------------------

impl Add for Money {
    type Output = Money;
    #[inline]
    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;
    #[inline]
    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Money;
    #[inline]
    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Widen first: i64::MIN has no positive i64 counterpart.
        let v = self.0 as i128;
        let abs = v.abs();
        let sign = if v < 0 { "-" } else { "" };
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

// ---------------------------------------------------------------------------
// Serde
// ---------------------------------------------------------------------------

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct MoneyVisitor;

impl<'de> Visitor<'de> for MoneyVisitor {
    type Value = Money;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal string with at most two fractional digits, or an integer")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
        Money::parse(v).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
        v.checked_mul(CENTS_PER_UNIT)
            .map(Money)
            .ok_or_else(|| E::custom(format!("money amount out of range: {v}")))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
        i64::try_from(v)
            .map_err(|_| E::custom(format!("money amount out of range: {v}")))
            .and_then(|v| self.visit_i64(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
        Err(E::custom(format!(
            "money amounts must be decimal strings, got float {v}"
        )))
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Money, D::Error> {
        deserializer.deserialize_any(MoneyVisitor)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
