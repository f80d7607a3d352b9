//! Decoding BSER bytes back into values.

use std::collections::BTreeMap;

use crate::types::Error;
use crate::types::PDU_HEADER;
use crate::types::Result;
use crate::types::Tag;
use crate::value::Value;

/// Decodes exactly one value and requires the input to end there.
pub fn decode(buf: &[u8]) -> Result<Value> {
    let mut dec = Decoder::new(buf);
    let value = dec.value()?;
    if dec.remaining() > 0 {
        return Err(Error::TrailingBytes(dec.remaining()));
    }
    Ok(value)
}

/// Decodes a complete PDU: magic bytes, payload length, payload value.
///
/// The length is validated against the bytes actually present, so a
/// truncated PDU fails with [`Error::Truncated`] rather than a partial
/// value.
pub fn decode_pdu(buf: &[u8]) -> Result<Value> {
    let mut dec = Decoder::new(buf);
    let header = dec.read_bytes(2)?;
    if header != PDU_HEADER {
        return Err(Error::BadPduHeader([header[0], header[1]]));
    }
    let len = dec.len_prefix()?;
    let payload = dec.read_bytes(len)?;
    if dec.remaining() > 0 {
        return Err(Error::TrailingBytes(dec.remaining()));
    }
    decode(payload)
}

/// A cursor over a borrowed buffer that reads one tagged value at a
/// time.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    #[inline]
    fn need(&self, n: usize) -> Result<()> {
        if self.remaining() < n {
            return Err(Error::Truncated);
        }
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8> {
        self.need(1)?;
        let byte = self.buf[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    fn peek_byte(&self) -> Result<u8> {
        self.need(1)?;
        Ok(self.buf[self.pos])
    }

    pub(crate) fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.need(len)?;
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn read_tag(&mut self) -> Result<Tag> {
        let byte = self.read_byte()?;
        Tag::from_u8(byte).ok_or(Error::InvalidTag(byte))
    }

    /// Reads an integer value of any width, widened to `i64`.
    pub fn int(&mut self) -> Result<i64> {
        let byte = self.read_byte()?;
        let tag = Tag::from_u8(byte).ok_or(Error::InvalidTag(byte))?;
        let width = tag.int_width().ok_or(Error::ExpectedInt(byte))?;
        let bytes = self.read_bytes(width)?;
        Ok(match width {
            1 => bytes[0] as i8 as i64,
            2 => i16::from_le_bytes([bytes[0], bytes[1]]) as i64,
            4 => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as i64,
            _ => i64::from_le_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            ]),
        })
    }

    /// Reads an integer used as a length or count, rejecting values
    /// that cannot index memory.
    pub(crate) fn len_prefix(&mut self) -> Result<usize> {
        let n = self.int()?;
        usize::try_from(n).map_err(|_| Error::BadLength(n))
    }

    fn str(&mut self) -> Result<String> {
        let tag = self.read_tag()?;
        if tag != Tag::String {
            return Err(Error::ExpectedString(tag as u8));
        }
        self.str_body()
    }

    fn str_body(&mut self) -> Result<String> {
        let len = self.len_prefix()?;
        let bytes = self.read_bytes(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| Error::InvalidUtf8)
    }

    /// Consumes exactly one complete value.
    pub fn value(&mut self) -> Result<Value> {
        let tag = self.read_tag()?;
        match tag {
            Tag::Null => Ok(Value::Null),
            Tag::True => Ok(Value::Bool(true)),
            Tag::False => Ok(Value::Bool(false)),
            Tag::Int8 | Tag::Int16 | Tag::Int32 | Tag::Int64 => {
                // Re-read from the tag so int() sees the width.
                self.pos -= 1;
                Ok(Value::Int(self.int()?))
            }
            Tag::Real => {
                let bytes = self.read_bytes(8)?;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(bytes);
                Ok(Value::Real(f64::from_le_bytes(raw)))
            }
            Tag::String => Ok(Value::Str(self.str_body()?)),
            Tag::Array => {
                let count = self.len_prefix()?;
                let mut items = Vec::with_capacity(count.min(4096));
                for _ in 0..count {
                    items.push(self.value()?);
                }
                Ok(Value::Array(items))
            }
            Tag::Object => {
                let count = self.len_prefix()?;
                let mut entries = BTreeMap::new();
                for _ in 0..count {
                    let key = self.str()?;
                    let val = self.value()?;
                    entries.insert(key, val);
                }
                Ok(Value::Object(entries))
            }
            Tag::Template => self.template(),
            // Skip is only meaningful inside a template row.
            Tag::Skip => Err(Error::InvalidTag(Tag::Skip as u8)),
        }
    }

    /// Expands a template: a shared key list followed by rows that
    /// supply only values. Each row materializes into an independent
    /// object; a skip marker means the key is absent from that row.
    fn template(&mut self) -> Result<Value> {
        let keys = match self.value()? {
            Value::Array(keys) => keys
                .into_iter()
                .map(|key| match key {
                    Value::Str(s) => Ok(s),
                    _ => Err(Error::BadTemplateKeys),
                })
                .collect::<Result<Vec<_>>>()?,
            _ => return Err(Error::BadTemplateKeys),
        };
        let rows = self.len_prefix()?;
        let mut items = Vec::with_capacity(rows.min(4096));
        for _ in 0..rows {
            let mut entries = BTreeMap::new();
            for key in &keys {
                if self.peek_byte()? == Tag::Skip as u8 {
                    self.pos += 1;
                    continue;
                }
                entries.insert(key.clone(), self.value()?);
            }
            items.push(Value::Object(entries));
        }
        Ok(Value::Array(items))
    }
}
