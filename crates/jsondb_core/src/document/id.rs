//! Document identifier.

use crate::error::{CoreError, CoreResult};
use jsondb_codec::{Number, Value};
use std::fmt;

const TAG_INTEGER: u8 = 0;
const TAG_TEXT: u8 = 1;

/// Identifier of a document within its collection.
///
/// Identifiers are either integers or strings. They are totally ordered with
/// every integer before every string, which gives the tie-break order of
/// sorted queries.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DocumentId {
    /// Integer identifier.
    Integer(i64),
    /// String identifier, the form produced by the default factory.
    Text(String),
}

impl DocumentId {
    /// Creates an identifier from a document value.
    ///
    /// Accepts strings and integral numbers.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidIdentifier`] for any other value.
    pub fn from_value(value: &Value) -> CoreResult<Self> {
        match value {
            Value::String(s) => Ok(Self::Text(s.clone())),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Self::Integer(i)),
                None => Err(CoreError::invalid_identifier(format!(
                    "number {n} is not an integer"
                ))),
            },
            other => Err(CoreError::invalid_identifier(format!(
                "{} cannot identify a document",
                other.type_name()
            ))),
        }
    }

    /// Returns the identifier as a document value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Integer(i) => Value::Number(Number::Integer(*i)),
            Self::Text(s) => Value::String(s.clone()),
        }
    }

    /// Returns the string form, if this is a text identifier.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Integer(_) => None,
        }
    }

    /// Appends the binary form used by the WAL and snapshot files.
    pub(crate) fn write_to(&self, buf: &mut Vec<u8>) {
        match self {
            Self::Integer(i) => {
                buf.push(TAG_INTEGER);
                buf.extend_from_slice(&i.to_le_bytes());
            }
            Self::Text(s) => {
                buf.push(TAG_TEXT);
                // Identifiers are bounded by the u32 length prefix.
                #[allow(clippy::cast_possible_truncation)]
                buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
                buf.extend_from_slice(s.as_bytes());
            }
        }
    }

    /// Reads the binary form written by [`Self::write_to`].
    ///
    /// Returns `None` if the bytes are truncated or malformed.
    pub(crate) fn read_from(data: &[u8], cursor: &mut usize) -> Option<Self> {
        let tag = *data.get(*cursor)?;
        *cursor += 1;
        match tag {
            TAG_INTEGER => {
                let bytes: [u8; 8] = data.get(*cursor..*cursor + 8)?.try_into().ok()?;
                *cursor += 8;
                Some(Self::Integer(i64::from_le_bytes(bytes)))
            }
            TAG_TEXT => {
                let len_bytes: [u8; 4] = data.get(*cursor..*cursor + 4)?.try_into().ok()?;
                *cursor += 4;
                let len = u32::from_le_bytes(len_bytes) as usize;
                let end = cursor.checked_add(len)?;
                let text = std::str::from_utf8(data.get(*cursor..end)?).ok()?;
                *cursor += len;
                Some(Self::Text(text.to_string()))
            }
            _ => None,
        }
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{i}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for DocumentId {
    fn from(id: i64) -> Self {
        Self::Integer(id)
    }
}

impl From<i32> for DocumentId {
    fn from(id: i32) -> Self {
        Self::Integer(i64::from(id))
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self::Text(id)
    }
}

impl From<&DocumentId> for DocumentId {
    fn from(id: &DocumentId) -> Self {
        id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_order_before_text() {
        let mut ids = vec![
            DocumentId::from("b"),
            DocumentId::from(10),
            DocumentId::from("a"),
            DocumentId::from(-3),
        ];
        ids.sort();
        assert_eq!(
            ids,
            vec![
                DocumentId::from(-3),
                DocumentId::from(10),
                DocumentId::from("a"),
                DocumentId::from("b"),
            ]
        );
    }

    #[test]
    fn from_value_accepts_strings_and_integral_numbers() {
        assert_eq!(
            DocumentId::from_value(&Value::from("ann")).unwrap(),
            DocumentId::from("ann")
        );
        assert_eq!(
            DocumentId::from_value(&Value::from(4.0)).unwrap(),
            DocumentId::from(4)
        );
        assert!(DocumentId::from_value(&Value::from(4.5)).is_err());
        assert!(DocumentId::from_value(&Value::Null).is_err());
        assert!(DocumentId::from_value(&Value::object()).is_err());
    }

    #[test]
    fn binary_form() {
        for id in [DocumentId::from(i64::MIN), DocumentId::from("ünïcode")] {
            let mut buf = Vec::new();
            id.write_to(&mut buf);
            let mut cursor = 0;
            assert_eq!(DocumentId::read_from(&buf, &mut cursor), Some(id));
            assert_eq!(cursor, buf.len());
        }
    }

    #[test]
    fn truncated_binary_form_is_rejected() {
        let mut buf = Vec::new();
        DocumentId::from("abcdef").write_to(&mut buf);
        buf.truncate(buf.len() - 1);
        assert_eq!(DocumentId::read_from(&buf, &mut 0), None);
        assert_eq!(DocumentId::read_from(&[7], &mut 0), None);
    }

    #[test]
    fn display() {
        assert_eq!(DocumentId::from(12).to_string(), "12");
        assert_eq!(DocumentId::from("x-1").to_string(), "x-1");
    }
}
