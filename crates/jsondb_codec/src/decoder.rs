//! Binary document decoder.

use crate::error::{CodecError, CodecResult};
use crate::number::Number;
use crate::value::{Object, Value};

/// Decodes one stored document.
///
/// The whole input must be consumed.
///
/// # Errors
///
/// Returns an error for truncated input, unsupported items, duplicate
/// object keys, non-finite floats or trailing bytes.
pub fn decode_document(bytes: &[u8]) -> CodecResult<Value> {
    let mut decoder = DocumentDecoder::new(bytes);
    let value = decoder.decode()?;
    if !decoder.is_empty() {
        return Err(CodecError::TrailingBytes {
            count: decoder.remaining().len(),
        });
    }
    Ok(value)
}

/// Streaming decoder behind [`decode_document`].
pub struct DocumentDecoder<'a> {
    data: &'a [u8],
    pos: usize,
    depth: usize,
}

/// Maximum element count for arrays and objects.
const MAX_CONTAINER_ELEMENTS: u64 = 16 * 1024 * 1024;

/// Maximum text length.
const MAX_TEXT_LENGTH: u64 = 256 * 1024 * 1024;

/// Maximum container nesting.
const MAX_DEPTH: usize = 512;

impl<'a> DocumentDecoder<'a> {
    /// Create a new decoder for the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            depth: 0,
        }
    }

    /// Decode the next value.
    #[allow(clippy::cast_possible_wrap)]
    pub fn decode(&mut self) -> CodecResult<Value> {
        let initial_byte = self.read_byte()?;
        let major_type = initial_byte >> 5;
        let additional_info = initial_byte & 0x1f;

        match major_type {
            0 => {
                let n = self.decode_argument(additional_info)?;
                i64::try_from(n)
                    .map(Value::from)
                    .map_err(|_| CodecError::decoding_failed(format!("integer {n} out of range")))
            }
            1 => {
                let n = self.decode_argument(additional_info)?;
                i64::try_from(n)
                    .map(|n| Value::from(-n - 1))
                    .map_err(|_| {
                        CodecError::decoding_failed(format!("integer -{n}-1 out of range"))
                    })
            }
            2 => Err(CodecError::unsupported_type("byte string")),
            3 => self.decode_text(additional_info).map(Value::String),
            4 => self.nested(|d| d.decode_array(additional_info)),
            5 => self.nested(|d| d.decode_object(additional_info)),
            6 => Err(CodecError::unsupported_type("tag")),
            7 => self.decode_simple(additional_info),
            _ => Err(CodecError::invalid_structure("invalid major type")),
        }
    }

    /// Check if all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Get remaining bytes.
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.pos.min(self.data.len())..]
    }

    fn nested(&mut self, f: impl FnOnce(&mut Self) -> CodecResult<Value>) -> CodecResult<Value> {
        if self.depth >= MAX_DEPTH {
            return Err(CodecError::invalid_structure("nesting too deep"));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    #[inline]
    fn read_byte(&mut self) -> CodecResult<u8> {
        let byte = *self.data.get(self.pos).ok_or(CodecError::UnexpectedEof)?;
        self.pos += 1;
        Ok(byte)
    }

    #[inline]
    fn read_array<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    #[inline]
    fn read_bytes(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(CodecError::UnexpectedEof)?;
        let bytes = self
            .data
            .get(self.pos..end)
            .ok_or(CodecError::UnexpectedEof)?;
        self.pos = end;
        Ok(bytes)
    }

    fn decode_argument(&mut self, additional_info: u8) -> CodecResult<u64> {
        match additional_info {
            0..=23 => Ok(u64::from(additional_info)),
            24 => Ok(u64::from(self.read_byte()?)),
            25 => Ok(u64::from(u16::from_be_bytes(self.read_array()?))),
            26 => Ok(u64::from(u32::from_be_bytes(self.read_array()?))),
            27 => Ok(u64::from_be_bytes(self.read_array()?)),
            31 => Err(CodecError::IndefiniteLengthForbidden),
            _ => Err(CodecError::invalid_structure("reserved additional info")),
        }
    }

    fn decode_length(&mut self, additional_info: u8, max: u64) -> CodecResult<usize> {
        let claimed = self.decode_argument(additional_info)?;
        if claimed > max {
            return Err(CodecError::SizeLimitExceeded {
                claimed,
                max_allowed: max,
            });
        }
        usize::try_from(claimed).map_err(|_| CodecError::SizeLimitExceeded {
            claimed,
            max_allowed: max,
        })
    }

    fn decode_text(&mut self, additional_info: u8) -> CodecResult<String> {
        let len = self.decode_length(additional_info, MAX_TEXT_LENGTH)?;
        let bytes = self.read_bytes(len)?;
        let text = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
        Ok(text.to_string())
    }

    fn decode_array(&mut self, additional_info: u8) -> CodecResult<Value> {
        let len = self.decode_length(additional_info, MAX_CONTAINER_ELEMENTS)?;
        // Each item takes at least one byte; cap the preallocation by what is left.
        let mut items = Vec::with_capacity(len.min(self.remaining().len()));
        for _ in 0..len {
            items.push(self.decode()?);
        }
        Ok(Value::Array(items))
    }

    fn decode_object(&mut self, additional_info: u8) -> CodecResult<Value> {
        let len = self.decode_length(additional_info, MAX_CONTAINER_ELEMENTS)?;
        let mut members = Object::with_capacity(len.min(self.remaining().len() / 2));
        for _ in 0..len {
            let key_byte = self.read_byte()?;
            if key_byte >> 5 != 3 {
                return Err(CodecError::invalid_structure("object key is not text"));
            }
            let key = self.decode_text(key_byte & 0x1f)?;
            let value = self.decode()?;
            if members.contains_key(&key) {
                return Err(CodecError::DuplicateKey { key });
            }
            members.insert(key, value);
        }
        Ok(Value::Object(members))
    }

    fn decode_simple(&mut self, additional_info: u8) -> CodecResult<Value> {
        match additional_info {
            20 => Ok(Value::Bool(false)),
            21 => Ok(Value::Bool(true)),
            22 => Ok(Value::Null),
            27 => {
                let f = f64::from_bits(u64::from_be_bytes(self.read_array()?));
                if f.is_finite() {
                    Ok(Value::Number(Number::Float(f)))
                } else {
                    Err(CodecError::NonFiniteNumber)
                }
            }
            25 | 26 => Err(CodecError::unsupported_type("short float")),
            31 => Err(CodecError::invalid_structure("break without indefinite")),
            other => Err(CodecError::unsupported_type(format!("simple value {other}"))),
        }
    }
}
