//! Encoding values into BSER bytes.
//!
//! Encoding is infallible: it writes into a growable buffer, and every
//! [`Value`] has a valid encoding. I/O errors belong to whoever writes
//! the buffer to a stream.

use crate::types::PDU_HEADER;
use crate::types::Tag;
use crate::value::Value;

/// Encodes one value, without the PDU envelope.
pub fn encode(value: &Value) -> Vec<u8> {
    let mut enc = Encoder::new();
    enc.value(value);
    enc.into_bytes()
}

/// Encodes one value wrapped in the PDU envelope the daemon expects:
/// the two magic bytes, the payload length as an integer value, then
/// the payload.
pub fn encode_pdu(value: &Value) -> Vec<u8> {
    let payload = encode(value);
    let mut enc = Encoder::new();
    enc.buf.extend_from_slice(&PDU_HEADER);
    enc.int(payload.len() as i64);
    enc.buf.extend_from_slice(&payload);
    enc.into_bytes()
}

/// A growable buffer that encodes values into the BSER format.
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    #[inline(always)]
    fn tag(&mut self, tag: Tag) {
        self.buf.push(tag as u8);
    }

    /// Writes an integer in the smallest tagged width that holds it.
    pub fn int(&mut self, v: i64) {
        if let Ok(v) = i8::try_from(v) {
            self.tag(Tag::Int8);
            self.buf.push(v as u8);
        } else if let Ok(v) = i16::try_from(v) {
            self.tag(Tag::Int16);
            self.buf.extend_from_slice(&v.to_le_bytes());
        } else if let Ok(v) = i32::try_from(v) {
            self.tag(Tag::Int32);
            self.buf.extend_from_slice(&v.to_le_bytes());
        } else {
            self.tag(Tag::Int64);
            self.buf.extend_from_slice(&v.to_le_bytes());
        }
    }

    pub fn real(&mut self, v: f64) {
        self.tag(Tag::Real);
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn bool(&mut self, v: bool) {
        self.tag(if v { Tag::True } else { Tag::False });
    }

    pub fn null(&mut self) {
        self.tag(Tag::Null);
    }

    /// Length-prefixed raw bytes, no terminator, no escaping.
    pub fn str(&mut self, v: &str) {
        self.tag(Tag::String);
        self.int(v.len() as i64);
        self.buf.extend_from_slice(v.as_bytes());
    }

    pub fn value(&mut self, value: &Value) {
        match value {
            Value::Null => self.null(),
            Value::Bool(b) => self.bool(*b),
            Value::Int(n) => self.int(*n),
            Value::Real(x) => self.real(*x),
            Value::Str(s) => self.str(s),
            Value::Array(items) => {
                self.tag(Tag::Array);
                self.int(items.len() as i64);
                for item in items {
                    self.value(item);
                }
            }
            Value::Object(entries) => {
                self.tag(Tag::Object);
                self.int(entries.len() as i64);
                for (key, val) in entries {
                    self.str(key);
                    self.value(val);
                }
            }
        }
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}
