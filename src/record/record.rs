use serde::{Deserialize, Serialize};

use super::error::CodecError;
use super::value::{TAG_BOOL, TAG_FLOAT, TAG_INT, TAG_NULL, TAG_STRING, Value};

/// Slot identifier within a page
pub type SlotId = usize;

/// A single record (row) of typed values, positionally aligned to a schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    values: Vec<Value>,
}

impl Record {
    /// Create a new record
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Get the number of values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if record is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a value by index
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Get all values
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Exact size of [`Record::encode`] output
    pub fn encoded_len(&self) -> usize {
        4 + self.values.iter().map(Value::encoded_len).sum::<usize>()
    }

    /// Serialize record to bytes
    /// Format: [count: u32] then per value [tag: u8][payload]
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut out)?;
        Ok(out)
    }

    /// Append the encoding to `out`
    pub fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), CodecError> {
        let count =
            u32::try_from(self.values.len()).map_err(|_| CodecError::ValueTooLong(self.values.len()))?;
        out.extend_from_slice(&count.to_be_bytes());

        for value in &self.values {
            out.push(value.type_tag());
            match value {
                Value::Null => {}
                Value::Int(i) => out.extend_from_slice(&i.to_be_bytes()),
                Value::Float(f) => out.extend_from_slice(&f.to_bits().to_be_bytes()),
                Value::String(s) => {
                    let len = u32::try_from(s.len()).map_err(|_| CodecError::ValueTooLong(s.len()))?;
                    out.extend_from_slice(&len.to_be_bytes());
                    out.extend_from_slice(s.as_bytes());
                }
                Value::Bool(b) => out.push(u8::from(*b)),
            }
        }

        Ok(())
    }

    /// Deserialize the record starting at `offset`; returns it with its encoded length
    pub fn decode(data: &[u8], offset: usize) -> Result<(Self, usize), CodecError> {
        let mut reader = Reader::new(data, offset);
        let count = reader.read_u32()? as usize;

        // Each value takes at least its tag byte; cap the preallocation accordingly
        let mut values = Vec::with_capacity(count.min(data.len().saturating_sub(offset)));
        for _ in 0..count {
            let value = match reader.read_u8()? {
                TAG_NULL => Value::Null,
                TAG_INT => Value::Int(reader.read_u32()? as i32),
                TAG_FLOAT => Value::Float(f64::from_bits(reader.read_u64()?)),
                TAG_STRING => {
                    let len = reader.read_u32()? as usize;
                    let bytes = reader.read_bytes(len)?;
                    Value::String(String::from_utf8(bytes.to_vec())?)
                }
                TAG_BOOL => match reader.read_u8()? {
                    0 => Value::Bool(false),
                    1 => Value::Bool(true),
                    other => return Err(CodecError::InvalidBool(other)),
                },
                tag => return Err(CodecError::UnknownTypeTag(tag)),
            };
            values.push(value);
        }

        Ok((Self { values }, reader.position() - offset))
    }
}

impl From<Vec<Value>> for Record {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

/// Bounds-checked big-endian cursor over a byte slice
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let available = self.data.len().saturating_sub(self.pos);
        if n > available {
            return Err(CodecError::Truncated {
                offset: self.pos,
                needed: n,
                available,
            });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, CodecError> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64, CodecError> {
        let b = self.read_bytes(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(u64::from_be_bytes(buf))
    }
}
