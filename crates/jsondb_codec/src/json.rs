//! JSON text interop and serde bridging.

use crate::error::CodecResult;
use crate::number::Number;
use crate::value::Value;
use serde::de::DeserializeOwned;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

impl Value {
    /// Parses JSON text, keeping object member order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CodecError::Json`] for malformed text.
    pub fn from_json_str(text: &str) -> CodecResult<Self> {
        let json: serde_json::Value = serde_json::from_str(text)?;
        Ok(json.into())
    }

    /// Renders compact JSON text. Non-finite floats render as `null`.
    #[must_use]
    pub fn to_json_string(&self) -> String {
        serde_json::Value::from(self).to_string()
    }
}

/// Converts any serializable type into a document tree.
///
/// # Errors
///
/// Returns [`crate::CodecError::Json`] if `value` fails to serialize.
pub fn to_value<T: Serialize + ?Sized>(value: &T) -> CodecResult<Value> {
    Ok(serde_json::to_value(value)?.into())
}

/// Builds a deserializable type from a document tree.
///
/// # Errors
///
/// Returns [`crate::CodecError::Json`] if the tree does not match `T`.
pub fn from_value<T: DeserializeOwned>(value: &Value) -> CodecResult<T> {
    Ok(serde_json::from_value(serde_json::Value::from(value))?)
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Number(Number::Integer(i)),
                None => n.as_f64().map_or(Self::Null, |f| Self::Number(Number::Float(f))),
            },
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(members) => {
                Self::Object(members.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(Number::Integer(i)) => Self::from(*i),
            Value::Number(Number::Float(f)) => {
                serde_json::Number::from_f64(*f).map_or(Self::Null, Self::Number)
            }
            Value::String(s) => Self::String(s.clone()),
            Value::Array(items) => Self::Array(items.iter().map(Self::from).collect()),
            Value::Object(members) => {
                Self::Object(members.iter().map(|(k, v)| (k.clone(), Self::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        Self::from(&value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json_string())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(Number::Integer(i)) => serializer.serialize_i64(*i),
            Self::Number(Number::Float(f)) => serializer.serialize_f64(*f),
            Self::String(s) => serializer.serialize_str(s),
            Self::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Object(members) => {
                let mut map = serializer.serialize_map(Some(members.len()))?;
                for (k, v) in members {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CodecError;
    use serde_json::json;

    #[test]
    fn parse_keeps_member_order_and_number_kinds() {
        let doc = Value::from_json_str(r#"{"z": 1, "a": 2.5, "m": [true, null]}"#).unwrap();
        let keys: Vec<&String> = doc.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["z", "a", "m"]);
        assert!(matches!(
            doc.get("z"),
            Some(Value::Number(Number::Integer(1)))
        ));
        assert!(matches!(
            doc.get("a"),
            Some(Value::Number(Number::Float(_)))
        ));
    }

    #[test]
    fn parse_error_maps_to_json_error() {
        assert!(matches!(
            Value::from_json_str("{not json"),
            Err(CodecError::Json { .. })
        ));
    }

    #[test]
    fn render_compact_text() {
        let doc = Value::from(json!({"name": "Ann", "score": 10, "tags": []}));
        assert_eq!(
            doc.to_json_string(),
            r#"{"name":"Ann","score":10,"tags":[]}"#
        );
        assert_eq!(doc.to_string(), doc.to_json_string());
    }

    #[test]
    fn non_finite_renders_null() {
        assert_eq!(Value::from(f64::NAN).to_json_string(), "null");
    }

    #[test]
    fn serde_bridge() {
        #[derive(Serialize, Deserialize, PartialEq, Debug)]
        struct Player {
            name: String,
            score: i64,
        }

        let ann = Player {
            name: "Ann".to_string(),
            score: 10,
        };
        let value = to_value(&ann).unwrap();
        assert_eq!(value.get("score"), Some(&Value::from(10)));
        let back: Player = from_value(&value).unwrap();
        assert_eq!(back, ann);
        assert!(from_value::<Player>(&Value::from(1)).is_err());
    }

    #[test]
    fn value_serializes_through_serde_json() {
        let doc = Value::from(json!({"a": [1, 2.5, "x"]}));
        let text = serde_json::to_string(&doc).unwrap();
        let back: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back, doc);
    }
}
