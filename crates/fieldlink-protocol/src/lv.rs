//! Length-value framing.
//!
//! Every value travels as `[u32 big-endian length][raw bytes]`. Records can be
//! concatenated and the concatenation wrapped as one outer record, which is how
//! multi-value payloads, data blocks and envelopes are all built.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;

const LENGTH_PREFIX: usize = 4;

/// A single length-value record.
///
/// The length is always derived from the value, so the two cannot disagree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lv {
    value: Bytes,
}

impl Lv {
    pub fn new(value: impl Into<Bytes>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn into_value(self) -> Bytes {
        self.value
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// The value as UTF-8 text.
    pub fn value_as_string(&self) -> Result<String, ProtocolError> {
        String::from_utf8(self.value.to_vec())
            .map_err(|e| ProtocolError::Decode(format!("LV value is not UTF-8: {e}")))
    }

    /// Serialized size in bytes, prefix included.
    pub fn encoded_len(&self) -> usize {
        LENGTH_PREFIX + self.value.len()
    }

    /// Append the serialized record to `buf`.
    pub fn write_to(&self, buf: &mut impl BufMut) -> Result<(), ProtocolError> {
        let len = u32::try_from(self.value.len()).map_err(|_| {
            ProtocolError::Encode(format!(
                "LV value of {} bytes exceeds the u32 length prefix",
                self.value.len()
            ))
        })?;
        buf.put_u32(len);
        buf.put_slice(&self.value);
        Ok(())
    }

    pub fn marshal_binary(&self) -> Result<Bytes, ProtocolError> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.write_to(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Read one record from the front of `buf`, leaving anything after it.
    ///
    /// A length prefix announcing more bytes than remain is a hard error; no
    /// partial value is ever produced.
    pub fn unmarshal_from_reader(buf: &mut impl Buf) -> Result<Self, ProtocolError> {
        if buf.remaining() < LENGTH_PREFIX {
            return Err(ProtocolError::Decode(format!(
                "truncated LV length prefix: {} of {LENGTH_PREFIX} bytes",
                buf.remaining()
            )));
        }
        let declared = buf.get_u32();
        let len = usize::try_from(declared)
            .map_err(|_| ProtocolError::Decode("LV length does not fit in memory".into()))?;
        if buf.remaining() < len {
            return Err(ProtocolError::Decode(format!(
                "truncated LV value: declared {len} bytes, {} available",
                buf.remaining()
            )));
        }
        Ok(Self {
            value: buf.copy_to_bytes(len),
        })
    }

    /// Parse a buffer holding exactly one record.
    pub fn unmarshal_binary(data: &[u8]) -> Result<Self, ProtocolError> {
        let mut buf = data;
        let lv = Self::unmarshal_from_reader(&mut buf)?;
        if buf.has_remaining() {
            return Err(ProtocolError::Decode(format!(
                "{} trailing bytes after LV record",
                buf.remaining()
            )));
        }
        Ok(lv)
    }

    /// Serialize every input and wrap the concatenation as one outer record.
    pub fn combine<'a>(parts: impl IntoIterator<Item = &'a Lv>) -> Result<Self, ProtocolError> {
        let mut buf = BytesMut::new();
        for part in parts {
            buf.reserve(part.encoded_len());
            part.write_to(&mut buf)?;
        }
        Ok(Self {
            value: buf.freeze(),
        })
    }

    /// Split the value back into the records it was combined from.
    pub fn expand(&self) -> Result<Vec<Lv>, ProtocolError> {
        let mut buf = self.value.clone();
        let mut parts = Vec::new();
        while buf.has_remaining() {
            parts.push(Self::unmarshal_from_reader(&mut buf)?);
        }
        Ok(parts)
    }

    pub fn as_hex_string(&self) -> Result<String, ProtocolError> {
        Ok(hex::encode(self.marshal_binary()?))
    }

    pub fn from_hex_string(hex_str: &str) -> Result<Self, ProtocolError> {
        let data = hex::decode(hex_str)
            .map_err(|e| ProtocolError::Decode(format!("invalid hex: {e}")))?;
        Self::unmarshal_binary(&data)
    }
}

impl From<&str> for Lv {
    fn from(s: &str) -> Self {
        Self::new(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Lv {
    fn from(s: String) -> Self {
        Self::new(s.into_bytes())
    }
}

impl From<Vec<u8>> for Lv {
    fn from(v: Vec<u8>) -> Self {
        Self::new(v)
    }
}

impl From<&[u8]> for Lv {
    fn from(v: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(v))
    }
}
