// 💰 Money - decimal amounts rounded to cents
//
// Values are `rust_decimal::Decimal` held at two decimal places, so adding and
// then removing the same event returns ledger totals to exactly zero. Every
// value fits the INTEGER cents column it is stored in; arithmetic is checked
// and reports overflow instead of wrapping.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Serialize, Serializer};
use std::fmt;
use std::ops::Neg;
use std::str::FromStr;
use tracing::warn;

const CENTS_PER_UNIT: i64 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn from_cents(cents: i64) -> Self {
        Money(Decimal::new(cents, 2))
    }

    /// Whole currency units, e.g. `Money::from_units(1000)` is 1000.00
    pub fn from_units(units: i64) -> Self {
        Money(Decimal::from(units))
    }

    /// Round to cents; `None` when the value does not fit the storage column
    pub fn from_decimal(value: Decimal) -> Option<Money> {
        let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        rounded
            .checked_mul(Decimal::from(CENTS_PER_UNIT))?
            .to_i64()?;
        Some(Money(rounded))
    }

    pub fn as_decimal(self) -> Decimal {
        self.0
    }

    pub fn cents(self) -> Option<i64> {
        self.0.checked_mul(Decimal::from(CENTS_PER_UNIT))?.to_i64()
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        Money::from_decimal(self.0.checked_add(rhs.0)?)
    }

    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        Money::from_decimal(self.0.checked_sub(rhs.0)?)
    }

    /// Parse `"1000"`, `"12.345"` (→ 12.35), `"1e3"`, `"+40"`, `"5."` or `".5"`.
    ///
    /// Anything that is not a number, or too large to store, is `None`.
    pub fn parse(input: &str) -> Option<Money> {
        let s = input.trim();
        let s = s.strip_prefix('+').unwrap_or(s);
        let s = s.strip_suffix('.').unwrap_or(s);

        let normalized = if let Some(rest) = s.strip_prefix("-.") {
            format!("-0.{}", rest)
        } else if let Some(rest) = s.strip_prefix('.') {
            format!("0.{}", rest)
        } else {
            s.to_string()
        };

        if normalized.is_empty() || normalized.contains(',') {
            return None;
        }

        let value = if normalized.contains(|c| c == 'e' || c == 'E') {
            Decimal::from_scientific(&normalized).ok()?
        } else {
            Decimal::from_str(&normalized).ok()?
        };

        Money::from_decimal(value)
    }

    /// Form-field parsing: empty or unparsable input counts as zero
    pub fn parse_lenient(input: &str) -> Money {
        match Money::parse(input) {
            Some(amount) => amount,
            None => {
                if !input.trim().is_empty() {
                    warn!(input, "Unreadable amount, using 0");
                }
                Money::ZERO
            }
        }
    }

    /// `1234567.8` → `"1,234,567.80"`
    pub fn format_grouped(self) -> String {
        let text = self.to_string();
        let (sign, digits) = match text.strip_prefix('-') {
            Some(rest) => ("-", rest),
            None => ("", text.as_str()),
        };
        let (whole, frac) = digits.split_once('.').unwrap_or((digits, "00"));
        format!("{}{}.{}", sign, group_digits(whole), frac)
    }
}

/// Insert `,` between groups of three digits
pub fn group_thousands(value: u64) -> String {
    group_digits(&value.to_string())
}

fn group_digits(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut value = self.0;
        value.rescale(2);
        write!(f, "{}", value)
    }
}

impl Neg for Money {
    type Output = Money;
    fn neg(self) -> Money {
        Money(-self.0)
    }
}

// JSON consumers see plain decimal numbers
impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.0.to_f64().unwrap_or_default())
    }
}

impl ToSql for Money {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let cents = self.cents().ok_or_else(|| {
            rusqlite::Error::ToSqlConversionFailure(format!("amount {} out of range", self).into())
        })?;
        Ok(ToSqlOutput::from(cents))
    }
}

impl FromSql for Money {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let cents = i64::column_result(value)?;
        Money::from_decimal(Decimal::new(cents, 2)).ok_or(FromSqlError::OutOfRange(cents))
    }
}
