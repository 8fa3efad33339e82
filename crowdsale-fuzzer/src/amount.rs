//! Atomic amounts and their text encoding
//!
//! Wei and mini-token amounts routinely exceed `u64` (one ether at rate 10 000
//! is 10^22 token units), so every amount is a `u128`. In YAML and JSON they
//! are written as decimal strings; plain numbers are accepted on input.
//!
//! ```yaml
//! funding_goal_ether: 10
//! crowdsale_allowance: "650_000_000_000_000_000_000_000_000"
//! ```

use serde::{de, Deserializer, Serializer};
use std::fmt;

/// One ether, in wei
pub const ETHER: u128 = 1_000_000_000_000_000_000;

/// Upper bound used for out-of-range draws (`rateAbove`, `exceedAllowance`)
pub const BILLION: u128 = 1_000_000_000;

/// Parse a decimal amount, ignoring `_` separators
///
/// # Examples
///
/// ```rust
/// use crowdsale_fuzzer::amount::parse_amount;
///
/// assert_eq!(parse_amount("1_000").ok(), Some(1000));
/// assert!(parse_amount("-5").is_err());
/// ```
pub fn parse_amount(raw: &str) -> Result<u128, String> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != '_').collect();
    if cleaned.is_empty() {
        return Err("empty amount".to_string());
    }
    cleaned
        .parse::<u128>()
        .map_err(|e| format!("invalid amount `{}`: {}", raw, e))
}

struct AmountVisitor;

impl<'de> de::Visitor<'de> for AmountVisitor {
    type Value = u128;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a non-negative amount as number or string")
    }

    fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(value as u128)
    }

    fn visit_u128<E>(self, value: u128) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(value)
    }

    fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        if value < 0 {
            return Err(de::Error::custom(format!(
                "negative value not allowed: {}",
                value
            )));
        }
        Ok(value as u128)
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        parse_amount(value).map_err(de::Error::custom)
    }
}

/// `#[serde(with = "amount::string")]`: u128 written as a decimal string
pub mod string {
    use super::*;

    /// Serialize as a decimal string
    pub fn serialize<S>(value: &u128, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(value)
    }

    /// Deserialize from a string or a number
    pub fn deserialize<'de, D>(deserializer: D) -> Result<u128, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(AmountVisitor)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Holder {
        #[serde(with = "string")]
        value: u128,
    }

    #[test]
    fn test_parse_amount_strips_underscores() {
        assert_eq!(parse_amount("650_000_000").unwrap(), 650_000_000);
        assert_eq!(
            parse_amount("1000000000000000000000000000").unwrap(),
            1_000_000_000 * ETHER
        );
    }

    #[test]
    fn test_parse_amount_rejects_garbage() {
        assert!(parse_amount("").is_err());
        assert!(parse_amount("_").is_err());
        assert!(parse_amount("12ab").is_err());
    }

    #[test]
    fn test_string_or_number_in_yaml() {
        let from_number: Holder = serde_yaml::from_str("value: 42").unwrap();
        assert_eq!(from_number.value, 42);

        let from_string: Holder =
            serde_yaml::from_str("value: \"350_000_000_000_000_000_000_000_000\"").unwrap();
        assert_eq!(from_string.value, 350_000_000 * ETHER);

        assert!(serde_yaml::from_str::<Holder>("value: -1").is_err());
    }

    #[test]
    fn test_serializes_as_string_in_json() {
        let json = serde_json::to_string(&Holder { value: 10 * ETHER }).unwrap();
        assert_eq!(json, r#"{"value":"10000000000000000000"}"#);
    }
}
