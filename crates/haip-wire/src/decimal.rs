//! Decimal-string encoded unsigned 64-bit integers.
//!
//! The wire uses decimal strings (not JSON numbers) for `seq`, `ack`, `ts`,
//! and other 64-bit counters so that peers without native 64-bit integers
//! (e.g. JavaScript) don't lose precision. §9 requires implementations to
//! parse as unsigned 64-bit and to emit plain decimal: no leading zeros, no
//! sign, no exponent.

use std::fmt;

use serde::{de::Error as DeError, Deserialize, Deserializer, Serialize, Serializer};

/// Maximum digit count allowed on the wire (u64::MAX has 20 digits).
const MAX_DIGITS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DecimalU64(pub u64);

impl DecimalU64 {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// Parse a decimal-string, enforcing the wire's strict formatting rules.
    pub fn parse(s: &str) -> Result<Self, DecimalParseError> {
        if s.is_empty() || s.len() > MAX_DIGITS {
            return Err(DecimalParseError::BadLength);
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DecimalParseError::NotDigits);
        }
        if s.len() > 1 && s.as_bytes()[0] == b'0' {
            return Err(DecimalParseError::LeadingZero);
        }
        s.parse::<u64>()
            .map(DecimalU64)
            .map_err(|_| DecimalParseError::Overflow)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecimalParseError {
    BadLength,
    NotDigits,
    LeadingZero,
    Overflow,
}

impl fmt::Display for DecimalParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadLength => write!(f, "decimal string must be 1-20 digits"),
            Self::NotDigits => write!(f, "decimal string must contain only ASCII digits"),
            Self::LeadingZero => write!(f, "decimal string must not have a leading zero"),
            Self::Overflow => write!(f, "decimal string overflows u64"),
        }
    }
}

impl fmt::Display for DecimalU64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for DecimalU64 {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl Serialize for DecimalU64 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for DecimalU64 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DecimalU64::parse(&raw).map_err(|e| DeError::custom(format!("{e}: {raw:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_plain_decimal() {
        let value = DecimalU64::new(42);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, "\"42\"");
        let parsed: DecimalU64 = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, value);
    }

    #[test]
    fn rejects_leading_zero() {
        assert!(DecimalU64::parse("007").is_err());
        assert!(DecimalU64::parse("0").is_ok());
    }

    #[test]
    fn rejects_sign_and_non_digits() {
        assert!(DecimalU64::parse("-1").is_err());
        assert!(DecimalU64::parse("1.5").is_err());
        assert!(DecimalU64::parse("").is_err());
    }

    #[test]
    fn rejects_overlong_strings() {
        let too_long = "1".repeat(21);
        assert!(DecimalU64::parse(&too_long).is_err());
    }

    #[test]
    fn accepts_max_u64() {
        let max = u64::MAX.to_string();
        assert_eq!(DecimalU64::parse(&max).unwrap().get(), u64::MAX);
    }
}
