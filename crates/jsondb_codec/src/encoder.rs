//! Binary document encoder.

use crate::error::{CodecError, CodecResult};
use crate::number::Number;
use crate::value::{Object, Value};

/// Encodes a document tree to its stored binary form.
///
/// The format is a CBOR subset:
/// - integers use the shortest header encoding
/// - floats are always IEEE-754 doubles (`0xfb`)
/// - objects are maps with text keys, written in document order
/// - no byte strings, tags or indefinite-length items
///
/// # Errors
///
/// Returns [`CodecError::NonFiniteNumber`] if the tree holds NaN or an
/// infinity.
pub fn encode_document(value: &Value) -> CodecResult<Vec<u8>> {
    let mut encoder = DocumentEncoder::new();
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}

/// Streaming encoder behind [`encode_document`].
pub struct DocumentEncoder {
    buffer: Vec<u8>,
}

impl DocumentEncoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Create a new encoder with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Appends one value.
    pub fn encode(&mut self, value: &Value) -> CodecResult<()> {
        match value {
            Value::Null => self.buffer.push(0xf6),
            Value::Bool(b) => self.buffer.push(if *b { 0xf5 } else { 0xf4 }),
            Value::Number(n) => self.encode_number(*n)?,
            Value::String(s) => self.encode_text(s),
            Value::Array(items) => {
                self.encode_header(4, items.len() as u64);
                for item in items {
                    self.encode(item)?;
                }
            }
            Value::Object(members) => self.encode_object(members)?,
        }
        Ok(())
    }

    /// Consume this encoder and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    #[allow(clippy::cast_sign_loss)]
    fn encode_number(&mut self, n: Number) -> CodecResult<()> {
        match n {
            Number::Integer(i) if i >= 0 => self.encode_header(0, i as u64),
            // CBOR negative integers carry -(n+1).
            Number::Integer(i) => self.encode_header(1, (-(i + 1)) as u64),
            Number::Float(f) if !f.is_finite() => return Err(CodecError::NonFiniteNumber),
            Number::Float(f) => {
                self.buffer.push(0xfb);
                self.buffer.extend_from_slice(&f.to_bits().to_be_bytes());
            }
        }
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn encode_header(&mut self, major_type: u8, value: u64) {
        let mt = major_type << 5;

        if value < 24 {
            self.buffer.push(mt | (value as u8));
        } else if u8::try_from(value).is_ok() {
            self.buffer.push(mt | 24);
            self.buffer.push(value as u8);
        } else if u16::try_from(value).is_ok() {
            self.buffer.push(mt | 25);
            self.buffer.extend_from_slice(&(value as u16).to_be_bytes());
        } else if u32::try_from(value).is_ok() {
            self.buffer.push(mt | 26);
            self.buffer.extend_from_slice(&(value as u32).to_be_bytes());
        } else {
            self.buffer.push(mt | 27);
            self.buffer.extend_from_slice(&value.to_be_bytes());
        }
    }

    fn encode_text(&mut self, text: &str) {
        self.encode_header(3, text.len() as u64);
        self.buffer.extend_from_slice(text.as_bytes());
    }

    fn encode_object(&mut self, members: &Object) -> CodecResult<()> {
        self.encode_header(5, members.len() as u64);
        for (key, value) in members {
            self.encode_text(key);
            self.encode(value)?;
        }
        Ok(())
    }
}

impl Default for DocumentEncoder {
    fn default() -> Self {
        Self::new()
    }
}
