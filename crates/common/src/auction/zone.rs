//! Zone identifiers.
//!
//! Publishers configure zones as either JSON numbers or strings, and the
//! response payload keys them as object keys, so every comparison goes
//! through the numeric value.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Numeric identifier of a JustPremium inventory zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZoneId(i64);

impl ZoneId {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Parse a zone id using integer-prefix rules.
    ///
    /// Leading whitespace and an optional sign are accepted and parsing stops
    /// at the first non-digit, so `"1163"`, `" 1163"` and `"1163abc"` all
    /// yield zone 1163. Returns `None` when no digits lead the value.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim_start();
        let (negative, digits) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };

        let end = digits
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(digits.len());
        if end == 0 {
            return None;
        }

        let value: i64 = digits[..end].parse().ok()?;
        Some(Self(if negative { -value } else { value }))
    }

    /// Convert a JSON number, truncating any fractional part.
    #[must_use]
    pub fn from_f64(raw: f64) -> Option<Self> {
        if raw.is_finite() {
            #[allow(clippy::cast_possible_truncation)]
            Some(Self(raw.trunc() as i64))
        } else {
            None
        }
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ZoneId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<i32> for ZoneId {
    fn from(id: i32) -> Self {
        Self(i64::from(id))
    }
}

impl Serialize for ZoneId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.0)
    }
}

/// Accepts both string and integer zone ids from config and payloads.
impl<'de> Deserialize<'de> for ZoneId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ZoneIdVisitor;

        impl Visitor<'_> for ZoneIdVisitor {
            type Value = ZoneId;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string or integer zone id")
            }

            fn visit_str<E>(self, value: &str) -> Result<ZoneId, E>
            where
                E: de::Error,
            {
                ZoneId::parse(value)
                    .ok_or_else(|| E::invalid_value(de::Unexpected::Str(value), &self))
            }

            fn visit_i64<E>(self, value: i64) -> Result<ZoneId, E>
            where
                E: de::Error,
            {
                Ok(ZoneId(value))
            }

            fn visit_u64<E>(self, value: u64) -> Result<ZoneId, E>
            where
                E: de::Error,
            {
                i64::try_from(value)
                    .map(ZoneId)
                    .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(value), &self))
            }

            fn visit_f64<E>(self, value: f64) -> Result<ZoneId, E>
            where
                E: de::Error,
            {
                ZoneId::from_f64(value)
                    .ok_or_else(|| E::invalid_value(de::Unexpected::Float(value), &self))
            }
        }

        deserializer.deserialize_any(ZoneIdVisitor)
    }
}
