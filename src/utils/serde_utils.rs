//! Serde helpers for quantities emitted by the script tool
//!
//! Numeric fields such as block numbers and gas appear either as JSON
//! numbers or as `0x`-prefixed hex strings depending on the tool version.
//! Use with `#[serde(deserialize_with = "...")]`.

use serde::{de::Error, Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    String(String),
}

/// Parses a decimal or `0x`-prefixed hex quantity
///
/// # Example
/// ```
/// use deploy_registry::utils::serde_utils::parse_quantity;
/// assert_eq!(parse_quantity("0x2a"), Ok(42));
/// assert_eq!(parse_quantity("42"), Ok(42));
/// ```
pub fn parse_quantity(s: &str) -> Result<u64, String> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some("") => Ok(0),
        Some(hex) => u64::from_str_radix(hex, 16).map_err(|e| format!("invalid hex quantity {s}: {e}")),
        None => s.parse::<u64>().map_err(|e| format!("invalid quantity {s}: {e}")),
    }
}

/// Deserializes a required quantity
pub fn quantity<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => parse_quantity(&s).map_err(D::Error::custom),
    }
}

/// Deserializes an optional quantity; `null` and a missing field map to `None`
pub fn option_quantity<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Number(n)) => Ok(Some(n)),
        Some(NumberOrString::String(s)) => parse_quantity(&s).map(Some).map_err(D::Error::custom),
    }
}
