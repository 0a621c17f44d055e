//! Protocol-buffer wire primitives.
//!
//! [`WireReader`] walks a byte slice key by key; [`WireWriter`] appends
//! keys and values to a growable buffer. Neither knows about schemas: the
//! catalog-driven codec in `dynamic.rs` and the fixed envelopes in
//! `frame.rs` are built on top of them.

use crate::ProtocolError;

/// Protobuf wire types that the liqi schema uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    Varint,
    Fixed64,
    LengthDelimited,
    Fixed32,
}

impl WireType {
    /// Decodes the low three bits of a field key. Group markers (3, 4) and
    /// reserved values are rejected.
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::Varint),
            1 => Some(Self::Fixed64),
            2 => Some(Self::LengthDelimited),
            5 => Some(Self::Fixed32),
            _ => None,
        }
    }

    /// The value stored in the low three bits of a key.
    pub fn bits(self) -> u8 {
        match self {
            Self::Varint => 0,
            Self::Fixed64 => 1,
            Self::LengthDelimited => 2,
            Self::Fixed32 => 5,
        }
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Cursor over an encoded protobuf message.
pub struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn read_bytes(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], ProtocolError> {
        if self.remaining() < n {
            return Err(ProtocolError::Truncated(what));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Reads a base-128 varint.
    pub fn read_varint(&mut self) -> Result<u64, ProtocolError> {
        let mut value = 0u64;
        for shift in (0..70).step_by(7) {
            let byte = *self
                .data
                .get(self.pos)
                .ok_or(ProtocolError::Truncated("varint"))?;
            self.pos += 1;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(ProtocolError::MalformedVarint)
    }

    /// Reads a field key, returning the field number and the raw wire-type bits.
    pub fn read_key(&mut self) -> Result<(u32, u8), ProtocolError> {
        let key = self.read_varint()?;
        Ok(((key >> 3) as u32, (key & 0x7) as u8))
    }

    pub fn read_fixed32(&mut self) -> Result<u32, ProtocolError> {
        let b = self.read_bytes(4, "fixed32")?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_fixed64(&mut self) -> Result<u64, ProtocolError> {
        let b = self.read_bytes(8, "fixed64")?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    /// Reads a length prefix and returns the slice it covers.
    pub fn read_len_delimited(&mut self) -> Result<&'a [u8], ProtocolError> {
        let len = self.read_varint()? as usize;
        self.read_bytes(len, "length-delimited field")
    }

    /// Skips over one value of the given wire type.
    pub fn skip(&mut self, wire_type: WireType) -> Result<(), ProtocolError> {
        match wire_type {
            WireType::Varint => self.read_varint().map(drop),
            WireType::Fixed64 => self.read_bytes(8, "fixed64").map(drop),
            WireType::LengthDelimited => self.read_len_delimited().map(drop),
            WireType::Fixed32 => self.read_bytes(4, "fixed32").map(drop),
        }
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Append-only protobuf encoder.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_varint(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.buf.push((value as u8 & 0x7f) | 0x80);
            value >>= 7;
        }
        self.buf.push(value as u8);
    }

    pub fn write_key(&mut self, field: u32, wire_type: WireType) {
        self.write_varint((u64::from(field) << 3) | u64::from(wire_type.bits()));
    }

    pub fn write_fixed32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_fixed64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a length prefix followed by `data`, without a key.
    pub fn write_len_prefixed(&mut self, data: &[u8]) {
        self.write_varint(data.len() as u64);
        self.buf.extend_from_slice(data);
    }

    /// Writes a complete length-delimited field.
    pub fn write_bytes_field(&mut self, field: u32, data: &[u8]) {
        self.write_key(field, WireType::LengthDelimited);
        self.write_len_prefixed(data);
    }

    /// Writes a complete varint field.
    pub fn write_varint_field(&mut self, field: u32, value: u64) {
        self.write_key(field, WireType::Varint);
        self.write_varint(value);
    }
}

pub fn zigzag_encode(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

pub fn zigzag_decode(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_varint_multi_byte_matches_protobuf_layout() {
        let mut w = WireWriter::new();
        w.write_varint(300);
        assert_eq!(w.as_slice(), &[0xac, 0x02]);
    }

    #[test]
    fn test_read_varint_truncated_returns_error() {
        let mut r = WireReader::new(&[0x80]);
        assert!(matches!(r.read_varint(), Err(ProtocolError::Truncated(_))));
    }

    #[test]
    fn test_read_varint_eleven_bytes_is_malformed() {
        let data = [0xff; 11];
        let mut r = WireReader::new(&data);
        assert!(matches!(r.read_varint(), Err(ProtocolError::MalformedVarint)));
    }

    #[test]
    fn test_read_key_splits_field_and_wire_type() {
        let mut w = WireWriter::new();
        w.write_key(17, WireType::LengthDelimited);
        let bytes = w.into_inner();
        let mut r = WireReader::new(&bytes);
        assert_eq!(r.read_key().unwrap(), (17, 2));
    }

    #[test]
    fn test_skip_length_delimited_moves_past_payload() {
        let mut w = WireWriter::new();
        w.write_bytes_field(1, b"abc");
        w.write_varint_field(2, 9);
        let bytes = w.into_inner();

        let mut r = WireReader::new(&bytes);
        r.read_key().unwrap();
        r.skip(WireType::LengthDelimited).unwrap();
        assert_eq!(r.read_key().unwrap(), (2, 0));
        assert_eq!(r.read_varint().unwrap(), 9);
        assert!(r.is_empty());
    }

    #[test]
    fn test_zigzag_negative_values() {
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
        assert_eq!(zigzag_decode(3), -2);
    }

    #[test]
    fn test_wire_type_rejects_groups() {
        assert_eq!(WireType::from_bits(3), None);
        assert_eq!(WireType::from_bits(4), None);
        assert_eq!(WireType::from_bits(5), Some(WireType::Fixed32));
    }
}
