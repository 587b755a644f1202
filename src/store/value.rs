//! Dynamic configuration values
//!
//! Settings are stored as JSON text, so a value can be any JSON shape. Instead
//! of passing `serde_json::Value` around, the store exposes a closed enum that
//! callers match on exhaustively.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Number;

/// JSON-shaped configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum ConfigValue {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<ConfigValue>),
    Map(BTreeMap<String, ConfigValue>),
}

impl ConfigValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    /// Integer view; floats with no fractional part are accepted since values
    /// written by other tools are often plain JSON numbers like `2.0`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Number(n) => n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| f as i64)
            }),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ConfigValue]> {
        match self {
            ConfigValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, ConfigValue>> {
        match self {
            ConfigValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ConfigValue::Null)
    }

    /// Encode as the JSON text stored in the `config` relation.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Decode JSON text read from the `config` relation.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => Err(fmt::Error),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Number(value.into())
    }
}

impl From<f64> for ConfigValue {
    /// Non-finite floats have no JSON form and become `Null`.
    fn from(value: f64) -> Self {
        Number::from_f64(value)
            .map(ConfigValue::Number)
            .unwrap_or(ConfigValue::Null)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::String(value)
    }
}

impl From<Vec<ConfigValue>> for ConfigValue {
    fn from(value: Vec<ConfigValue>) -> Self {
        ConfigValue::List(value)
    }
}

impl From<BTreeMap<String, ConfigValue>> for ConfigValue {
    fn from(value: BTreeMap<String, ConfigValue>) -> Self {
        ConfigValue::Map(value)
    }
}

impl<T: Into<ConfigValue>> From<Option<T>> for ConfigValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(ConfigValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_each_json_shape() {
        assert_eq!(ConfigValue::from_json("null").unwrap(), ConfigValue::Null);
        assert_eq!(ConfigValue::from_json("true").unwrap(), ConfigValue::Bool(true));
        assert_eq!(ConfigValue::from_json("\"hi\"").unwrap(), ConfigValue::from("hi"));
        assert_eq!(ConfigValue::from_json("3").unwrap().as_i64(), Some(3));
        assert_eq!(ConfigValue::from_json("2.5").unwrap().as_f64(), Some(2.5));

        let list = ConfigValue::from_json("[1, \"a\", null]").unwrap();
        assert_eq!(list.as_list().map(<[_]>::len), Some(3));

        let map = ConfigValue::from_json("{\"b\": {\"c\": [false]}}").unwrap();
        let inner = map.as_map().and_then(|m| m.get("b")).and_then(ConfigValue::as_map);
        assert_eq!(
            inner.and_then(|m| m.get("c")),
            Some(&ConfigValue::List(vec![ConfigValue::Bool(false)]))
        );
    }

    #[test]
    fn test_nested_value_survives_encode_decode() {
        let mut uploader = BTreeMap::new();
        uploader.insert("endpoint".to_string(), ConfigValue::from("https://i.example"));
        uploader.insert("retries".to_string(), ConfigValue::from(3_i64));
        uploader.insert("ratio".to_string(), ConfigValue::from(0.75));
        uploader.insert(
            "tags".to_string(),
            ConfigValue::from(vec![ConfigValue::from("a"), ConfigValue::Null]),
        );
        let value = ConfigValue::Map(uploader);

        let decoded = ConfigValue::from_json(&value.to_json().unwrap()).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_large_integers_keep_precision() {
        let ts = 1_700_000_000_123_456_789_i64;
        let decoded = ConfigValue::from_json(&ConfigValue::from(ts).to_json().unwrap()).unwrap();
        assert_eq!(decoded.as_i64(), Some(ts));
    }

    #[test]
    fn test_as_i64_accepts_whole_floats() {
        assert_eq!(ConfigValue::from(2.0).as_i64(), Some(2));
        assert_eq!(ConfigValue::from(2.5).as_i64(), None);
        assert_eq!(ConfigValue::from(f64::NAN), ConfigValue::Null);
    }

    #[test]
    fn test_accessors_reject_other_shapes() {
        let value = ConfigValue::from("true");
        assert_eq!(value.as_bool(), None);
        assert_eq!(value.as_f64(), None);
        assert!(!value.is_null());
        assert_eq!(value.to_string(), "\"true\"");
    }
}
