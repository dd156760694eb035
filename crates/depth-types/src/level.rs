//! Price level types with decimal precision
//!
//! On the wire a level is a two-element array of decimal strings,
//! `["price", "quantity"]`. Values are parsed straight into [`Decimal`] so
//! the original scale survives a parse/serialize round trip.

use rust_decimal::Decimal;
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

/// A single price level in the orderbook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Level {
    /// Price of this level
    pub price: Decimal,
    /// Quantity at this price level
    pub qty: Decimal,
}

impl Level {
    /// Create a new price level
    pub fn new(price: Decimal, qty: Decimal) -> Self {
        Self { price, qty }
    }

    /// Parse a level from its decimal string pair
    pub fn parse(price: &str, qty: &str) -> Result<Self, rust_decimal::Error> {
        Ok(Self {
            price: Decimal::from_str(price)?,
            qty: Decimal::from_str(qty)?,
        })
    }

    /// Check if this level has zero quantity (should be removed)
    pub fn is_zero(&self) -> bool {
        self.qty.is_zero()
    }
}

impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&self.price.to_string())?;
        tuple.serialize_element(&self.qty.to_string())?;
        tuple.end()
    }
}

#[derive(Deserialize)]
struct WireLevel(
    #[serde(deserialize_with = "deserialize_decimal")] Decimal,
    #[serde(deserialize_with = "deserialize_decimal")] Decimal,
);

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let WireLevel(price, qty) = WireLevel::deserialize(deserializer)?;
        Ok(Self { price, qty })
    }
}

/// CRITICAL: decimals must never pass through `f64`
///
/// Accepts decimal strings and JSON integers. JSON floats are rejected since
/// serde_json has already rounded them to binary floating point.
pub fn deserialize_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(serde_json::Number),
    }

    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => Decimal::from_str(s.trim())
            .or_else(|_| Decimal::from_scientific(s.trim()))
            .map_err(|e| D::Error::custom(format!("invalid decimal {s:?}: {e}"))),
        StringOrNumber::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Decimal::from(i))
            } else if let Some(u) = n.as_u64() {
                Ok(Decimal::from(u))
            } else {
                Err(D::Error::custom(format!(
                    "decimal {n} sent as a JSON float, expected a string"
                )))
            }
        }
    }
}

/// Serialize a decimal as its exact string form
pub fn serialize_decimal<S>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_level_from_string_pair() {
        let level: Level = serde_json::from_str(r#"["41948.01000000", "0.00120000"]"#).unwrap();

        assert_eq!(level.price, dec!(41948.01));
        assert_eq!(level.qty, dec!(0.0012));
        // scale is kept, not just the value
        assert_eq!(level.price.to_string(), "41948.01000000");
        assert_eq!(level.qty.to_string(), "0.00120000");
    }

    #[test]
    fn test_level_serializes_as_string_pair() {
        let level = Level::parse("100.50", "2.000").unwrap();
        assert_eq!(serde_json::to_string(&level).unwrap(), r#"["100.50","2.000"]"#);
    }

    #[test]
    fn test_level_accepts_integers() {
        let level: Level = serde_json::from_str(r#"[100, 0]"#).unwrap();
        assert_eq!(level.price, dec!(100));
        assert!(level.is_zero());
    }

    #[test]
    fn test_level_rejects_float() {
        let result: Result<Level, _> = serde_json::from_str(r#"[100.1, "1"]"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_level_rejects_non_numeric() {
        let result: Result<Level, _> = serde_json::from_str(r#"["abc", "1"]"#);
        assert!(result.is_err());

        let result: Result<Level, _> = serde_json::from_str(r#"["1"]"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_level_is_zero() {
        let zero = Level::new(Decimal::new(100, 0), Decimal::ZERO);
        assert!(zero.is_zero());

        // "0.00000000" is still zero
        let zero_scaled = Level::parse("100", "0.00000000").unwrap();
        assert!(zero_scaled.is_zero());

        let non_zero = Level::new(Decimal::new(100, 0), Decimal::ONE);
        assert!(!non_zero.is_zero());
    }
}
