//! Conversion between items and JSON text

use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bigdecimal::BigDecimal;
use serde::ser::{Serialize, Serializer};
use serde_json::{Map, Number, Value};

use super::item::Item;
use crate::errors::{EngineError, EngineResult};

impl Item {
    /// Converts a parsed JSON value. Numbers that fit an integer become
    /// integers, numbers in exponent notation become doubles and every other
    /// number is an exact decimal.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Item::Null,
            Value::Bool(b) => Item::Boolean(*b),
            Value::Number(n) => number(n),
            Value::String(s) => Item::string(s),
            Value::Array(members) => Item::array(members.iter().map(Item::from_json).collect()),
            Value::Object(map) => Item::object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Item::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Renders the item as JSON. Non-JSON atomics serialize as their
    /// lexical string form.
    pub fn to_json(&self) -> Value {
        match self {
            Item::Null => Value::Null,
            Item::Boolean(b) => Value::Bool(*b),
            Item::Integer(i) => Value::Number(Number::from(*i)),
            Item::Decimal(d) => serde_json::from_str::<Number>(&d.normalized().to_string())
                .map(Value::Number)
                .unwrap_or_else(|_| Value::String(d.to_string())),
            Item::Double(d) => Number::from_f64(*d)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(format_special_double(*d))),
            Item::String(s) => Value::String(s.to_string()),
            Item::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            Item::DateTime(dt) => Value::String(dt.to_rfc3339()),
            Item::Time(t, zone) => Value::String(match zone {
                Some(zone) => format!("{}{}", t.format("%H:%M:%S%.f"), zone),
                None => t.format("%H:%M:%S%.f").to_string(),
            }),
            Item::Duration(d) => Value::String(d.to_string()),
            Item::Binary(bytes) => Value::String(STANDARD.encode(bytes)),
            Item::Object(pairs) => {
                let mut map = Map::new();
                for (key, value) in pairs.iter() {
                    map.entry(key.clone()).or_insert_with(|| value.to_json());
                }
                Value::Object(map)
            }
            Item::Array(members) => Value::Array(members.iter().map(Item::to_json).collect()),
            Item::Function(f) => Value::String(f.identifier().to_string()),
        }
    }
}

fn number(n: &Number) -> Item {
    if let Some(i) = n.as_i64() {
        return Item::Integer(i);
    }
    let text = n.to_string();
    if !text.contains(['e', 'E']) {
        if let Ok(d) = BigDecimal::from_str(&text) {
            return Item::Decimal(d);
        }
    }
    Item::Double(n.as_f64().unwrap_or(f64::NAN))
}

fn format_special_double(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value > 0.0 {
        "INF".to_string()
    } else {
        "-INF".to_string()
    }
}

impl Serialize for Item {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Parses one line of a JSON-lines source
pub fn parse_json_line(line: &str) -> EngineResult<Item> {
    let value: Value = serde_json::from_str(line).map_err(|e| {
        EngineError::resource(format!("Malformed JSON record '{}': {}", truncate(line), e))
    })?;
    Ok(Item::from_json(&value))
}

fn truncate(line: &str) -> String {
    const MAX: usize = 64;
    if line.chars().count() <= MAX {
        line.to_string()
    } else {
        let prefix: String = line.chars().take(MAX).collect();
        format!("{}...", prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_conversion_preserves_key_order() {
        let item = Item::from_json(&json!({"z": 1, "a": [true, null, 2.5]}));
        assert_eq!(item.keys(), vec!["z", "a"]);
        assert_eq!(item.to_json(), json!({"z": 1, "a": [true, null, 2.5]}));
    }

    #[test]
    fn test_number_literal_types() {
        assert!(Item::from_json(&json!(42)).is_integer());
        assert_eq!(Item::from_json(&json!(1.5)).type_name(), "decimal");
        assert_eq!(Item::from_json(&json!(u64::MAX)).type_name(), "decimal");

        let exponent: Value = serde_json::from_str("1.5e300").unwrap();
        assert_eq!(Item::from_json(&exponent).type_name(), "double");
    }

    #[test]
    fn test_decimal_renders_as_number() {
        let item = Item::from_json(&json!(0.1));
        assert_eq!(item.to_json(), json!(0.1));
        assert_eq!(Item::Decimal(BigDecimal::from(3)).to_json(), json!(3));
    }

    #[test]
    fn test_parse_json_line_rejects_garbage() {
        let err = parse_json_line("{not json").unwrap_err();
        assert_eq!(err.code().code(), "TQ_RESOURCE_UNAVAILABLE");
        assert!(parse_json_line(r#"{"a": 1}"#).unwrap().is_object());
    }

    #[test]
    fn test_binary_renders_as_base64() {
        assert_eq!(Item::binary(vec![1, 2, 3]).to_json(), json!("AQID"));
    }
}
