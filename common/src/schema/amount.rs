use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::ServiceError;

const CENTS_PER_UNIT: i64 = 100;

/// Currency amount with two-decimal semantics, held as integer cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(i64);

impl Amount {
    pub const fn from_cents(cents: i64) -> Self {
        Amount(cents)
    }

    pub const fn cents(&self) -> i64 {
        self.0
    }

    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    fn from_f64(value: f64) -> Result<Self, String> {
        if !value.is_finite() {
            return Err(format!("amount `{value}` is not a finite number"));
        }
        let scaled = value * CENTS_PER_UNIT as f64;
        let cents = scaled.round();
        if (scaled - cents).abs() > 1e-6 {
            return Err(format!("amount `{value}` has more than two decimal places"));
        }
        if cents.abs() > i64::MAX as f64 {
            return Err(format!("amount `{value}` is out of range"));
        }
        Ok(Amount(cents as i64))
    }
}

impl FromStr for Amount {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ServiceError::validation(format!("Invalid amount `{s}`"));
        let trimmed = s.trim();
        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (units, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));

        if units.is_empty() || !units.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if fraction.len() > 2 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let units: i64 = units.parse().map_err(|_| invalid())?;
        let fraction_cents = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => fraction.parse::<i64>().map_err(|_| invalid())?,
        };
        let cents = units
            .checked_mul(CENTS_PER_UNIT)
            .and_then(|c| c.checked_add(fraction_cents))
            .ok_or_else(invalid)?;

        Ok(Amount(if negative { -cents } else { cents }))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(
            f,
            "{sign}{}.{:02}",
            abs / CENTS_PER_UNIT as u64,
            abs % CENTS_PER_UNIT as u64
        )
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.0 as f64 / CENTS_PER_UNIT as f64)
    }
}

struct AmountVisitor;

impl Visitor<'_> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a number or a decimal string with at most two decimal places")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
        v.checked_mul(CENTS_PER_UNIT)
            .map(Amount)
            .ok_or_else(|| E::custom(format!("amount `{v}` is out of range")))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
        i64::try_from(v)
            .map_err(|_| E::custom(format!("amount `{v}` is out of range")))
            .and_then(|v| self.visit_i64(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Amount, E> {
        Amount::from_f64(v).map_err(E::custom)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
        v.parse().map_err(|e: ServiceError| E::custom(e))
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }
}
