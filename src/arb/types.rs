use std::fmt;
use std::str::FromStr;

use alloy::primitives::{I256, U256};
use derive_more::Display;
use eyre::{bail, eyre, Result};
use serde::de;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;

/// Type alias for a pool address, represented as a string.
pub type PoolAddress = String;

/// Type alias for a participant (sender or recipient) address, represented as a string.
pub type AccountAddress = String;

/// An opaque token identifier (usually a contract address).
///
/// Nothing in the detection core looks inside it; tokens are only compared.
#[derive(Clone, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    /// Creates a token from its address
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// The address of the token
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Token {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

/// A quantity of a single token: what a swap consumed or produced.
///
/// Serialized as a two element array `[quantity, token]`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenAmount(#[serde(with = "quantity")] pub U256, pub Token);

impl TokenAmount {
    /// Creates a new amount of `token`
    pub fn new(quantity: U256, token: impl Into<Token>) -> Self {
        Self(quantity, token.into())
    }

    /// The quantity
    #[must_use]
    pub const fn quantity(&self) -> U256 {
        self.0
    }

    /// The token
    #[must_use]
    pub const fn token(&self) -> &Token {
        &self.1
    }
}

impl fmt::Debug for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, self.1)
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, self.1)
    }
}

/// Bounds on the backtracking searches run for a single block.
///
/// A search that expands more than `max_nodes` nodes gives up and the block is
/// reported as failed. `None` means unbounded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SearchLimits {
    /// Maximum number of search nodes expanded per search
    pub max_nodes: Option<u64>,
}

impl SearchLimits {
    /// No limit at all
    pub const UNBOUNDED: Self = Self { max_nodes: None };

    /// Limits the search to `max_nodes` expanded nodes
    #[must_use]
    pub const fn with_max_nodes(max_nodes: u64) -> Self {
        Self {
            max_nodes: Some(max_nodes),
        }
    }

    /// Whether `nodes` expanded nodes is over the budget
    #[must_use]
    pub fn exceeded(&self, nodes: u64) -> bool {
        self.max_nodes.is_some_and(|max| nodes > max)
    }
}

/// A search ran out of its node budget before finishing.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
#[display("search budget exceeded after {nodes} nodes")]
pub struct SearchBudgetExceeded {
    /// Nodes expanded when the search gave up
    pub nodes: u64,
}

impl std::error::Error for SearchBudgetExceeded {}

/// Strips the quotes around a JSON string, leaving numbers untouched
fn unquote(text: &str) -> &str {
    let text = text.trim();
    text.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text)
}

/// Parses a non-negative quantity written as a JSON integer, a decimal string or a `0x` hex string.
///
/// # Errors
/// If the text is negative or not an integer
pub fn parse_quantity(text: &str) -> Result<U256> {
    let digits = unquote(text);
    if digits.starts_with('-') {
        bail!("negative quantity {digits}");
    }
    U256::from_str(digits).map_err(|e| eyre!("invalid quantity {digits:?}: {e}"))
}

/// Parses a signed quantity written as a JSON integer or a decimal string.
///
/// # Errors
/// If the text is not an integer or overflows 256 bits
pub fn parse_signed_quantity(text: &str) -> Result<I256> {
    let digits = unquote(text);
    I256::from_dec_str(digits).map_err(|e| eyre!("invalid signed quantity {digits:?}: {e}"))
}

/// serde adapter for `U256` quantities.
///
/// Quantities are read from the raw JSON text so integers wider than 64 bits keep
/// their exact value. They are written as JSON integers when they fit in 128 bits
/// and as decimal strings otherwise.
pub mod quantity {
    use super::{de, parse_quantity, Deserialize, Deserializer, RawValue, Serializer, U256};

    /// Serializes a quantity
    ///
    /// # Errors
    /// If the serializer fails
    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        match u128::try_from(*value) {
            Ok(small) => serializer.serialize_u128(small),
            Err(_) => serializer.serialize_str(&value.to_string()),
        }
    }

    /// Deserializes a quantity
    ///
    /// # Errors
    /// If the value is negative or not an integer
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        parse_quantity(raw.get()).map_err(de::Error::custom)
    }
}

/// serde adapter for signed `I256` net quantities, written like [`quantity`].
pub mod signed_quantity {
    use super::{de, parse_signed_quantity, Deserialize, Deserializer, RawValue, Serializer, I256};

    /// Serializes a signed quantity
    ///
    /// # Errors
    /// If the serializer fails
    pub fn serialize<S: Serializer>(value: &I256, serializer: S) -> Result<S::Ok, S::Error> {
        match i128::try_from(*value) {
            Ok(small) => serializer.serialize_i128(small),
            Err(_) => serializer.serialize_str(&value.to_string()),
        }
    }

    /// Deserializes a signed quantity
    ///
    /// # Errors
    /// If the value is not an integer
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<I256, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        parse_signed_quantity(raw.get()).map_err(de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("42").unwrap(), U256::from(42));
        assert_eq!(parse_quantity("\"42\"").unwrap(), U256::from(42));
        assert_eq!(parse_quantity("\"0x2a\"").unwrap(), U256::from(42));
        assert_eq!(
            parse_quantity("-1").err().unwrap().to_string(),
            "negative quantity -1"
        );
        assert!(parse_quantity("\"abc\"").is_err());
    }

    #[test]
    fn test_wide_quantity_keeps_precision() {
        // 10^24 does not fit in a u64 and would lose precision as a float
        let amount: TokenAmount =
            serde_json::from_str(r#"[1000000000000000000000000, "0xweth"]"#).unwrap();
        assert_eq!(
            amount.quantity(),
            U256::from(1_000_000_000_000_000_000_000_000_u128)
        );
        assert_eq!(amount.token(), &Token::from("0xweth"));
        assert_eq!(
            serde_json::to_string(&amount).unwrap(),
            r#"[1000000000000000000000000,"0xweth"]"#
        );
    }

    #[test]
    fn test_token_amount_new() {
        let amount = TokenAmount::new(U256::from(42_u64), "0xweth");
        assert_eq!(amount.quantity(), U256::from(42));
        assert_eq!(amount.token(), &Token::from("0xweth"));
        assert_eq!(serde_json::to_string(&amount).unwrap(), r#"[42,"0xweth"]"#);
    }

    #[test]
    fn test_parse_signed_quantity() {
        assert_eq!(parse_signed_quantity("-5").unwrap(), I256::try_from(-5).unwrap());
        assert_eq!(parse_signed_quantity("\"7\"").unwrap(), I256::try_from(7).unwrap());
        assert!(parse_signed_quantity("1.5").is_err());
    }

    #[test]
    fn test_search_limits() {
        assert!(!SearchLimits::UNBOUNDED.exceeded(u64::MAX));
        let limits = SearchLimits::with_max_nodes(10);
        assert!(!limits.exceeded(10));
        assert!(limits.exceeded(11));
    }
}
