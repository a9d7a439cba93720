//! # JsonDB Codec
//!
//! The document tree stored by JsonDB and its two external forms.
//!
//! - [`Value`]: a tagged tree of null, booleans, [`Number`]s, strings,
//!   arrays and insertion-ordered objects.
//! - Binary form: a CBOR subset written by [`encode_document`] and read by
//!   [`decode_document`]. Objects keep member order and floats are stored
//!   as doubles. NaN and infinities are rejected.
//! - JSON text: [`Value::from_json_str`], [`Value::to_json_string`] and
//!   conversions to and from `serde_json::Value`.
//!
//! ## Usage
//!
//! ```
//! use jsondb_codec::{decode_document, encode_document, Value};
//!
//! let doc = Value::from_json_str(r#"{"name": "Ann", "score": 10}"#).unwrap();
//! let bytes = encode_document(&doc).unwrap();
//! assert_eq!(decode_document(&bytes).unwrap(), doc);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod json;
mod number;
mod value;

pub use decoder::{decode_document, DocumentDecoder};
pub use encoder::{encode_document, DocumentEncoder};
pub use error::{CodecError, CodecResult};
pub use json::{from_value, to_value};
pub use number::Number;
pub use value::{Object, Value};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            (-1.0e12..1.0e12f64).prop_map(Value::from),
            "[a-z]{0,8}".prop_map(Value::from),
        ]
    }

    fn tree() -> impl Strategy<Value = Value> {
        leaf().prop_recursive(4, 32, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                prop::collection::vec(("[a-z]{1,4}", inner), 0..6)
                    .prop_map(|members| members.into_iter().collect::<Value>()),
            ]
        })
    }

    proptest! {
        #[test]
        fn binary_form_round_trips(doc in tree()) {
            let bytes = encode_document(&doc).unwrap();
            prop_assert_eq!(decode_document(&bytes).unwrap(), doc);
        }

        #[test]
        fn json_text_round_trips(doc in tree()) {
            prop_assert_eq!(Value::from_json_str(&doc.to_json_string()).unwrap(), doc);
        }
    }
}
