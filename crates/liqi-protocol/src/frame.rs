//! Byte-level framing: message tag, correlation index, outer envelope, and
//! the action cipher.
//!
//! Every frame on the socket has the same shape:
//!
//! ```text
//! ┌──────┬───────────────────────┬──────────────────────────────┐
//! │ tag  │ index (u16 LE)        │ Wrapper { name, data }       │
//! │ 1 B  │ Request/Response only │ protobuf, fixed schema       │
//! └──────┴───────────────────────┴──────────────────────────────┘
//! ```
//!
//! Live `ActionPrototype` notifications carry one more layer: their `data`
//! field is XOR-obfuscated with [`apply_action_cipher`].

use crate::ProtocolError;
use crate::wire::{WireReader, WireType, WireWriter};

/// Length of the namespace prefix (`.lq.`) on notification names.
pub const NOTIFICATION_PREFIX_LEN: usize = 4;

/// Local name of the obfuscated action carrier.
pub const ACTION_PROTOTYPE: &str = "ActionPrototype";

/// Key table of the action cipher.
const CIPHER_TABLE: [u8; 9] = [132, 94, 78, 66, 57, 162, 31, 96, 28];

// ---------------------------------------------------------------------------
// Message tag and index
// ---------------------------------------------------------------------------

/// The first byte of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Notification,
    Request,
    Response,
}

impl MessageKind {
    /// Parses a tag byte.
    ///
    /// # Errors
    /// `ProtocolError::UnknownMessageType` for anything but 1, 2 or 3.
    pub fn from_u8(tag: u8) -> Result<Self, ProtocolError> {
        match tag {
            1 => Ok(Self::Notification),
            2 => Ok(Self::Request),
            3 => Ok(Self::Response),
            other => Err(ProtocolError::UnknownMessageType(other)),
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            Self::Notification => 1,
            Self::Request => 2,
            Self::Response => 3,
        }
    }

    /// Whether frames of this kind carry a correlation index.
    pub fn is_indexed(self) -> bool {
        !matches!(self, Self::Notification)
    }
}

/// Splits the tag byte off a frame.
pub fn strip_message_type(bytes: &[u8]) -> Result<(MessageKind, &[u8]), ProtocolError> {
    let (&tag, rest) = bytes
        .split_first()
        .ok_or(ProtocolError::Truncated("message type"))?;
    Ok((MessageKind::from_u8(tag)?, rest))
}

/// Splits the little-endian correlation index off a request/response body.
pub fn strip_index(bytes: &[u8]) -> Result<(u16, &[u8]), ProtocolError> {
    if bytes.len() < 2 {
        return Err(ProtocolError::Truncated("correlation index"));
    }
    let index = u16::from_le_bytes([bytes[0], bytes[1]]);
    Ok((index, &bytes[2..]))
}

/// Prefixes an envelope with its tag and, for indexed kinds, the index.
pub fn frame(kind: MessageKind, index: u16, envelope: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(envelope.len() + 3);
    out.push(kind.tag());
    if kind.is_indexed() {
        out.extend_from_slice(&index.to_le_bytes());
    }
    out.extend_from_slice(envelope);
    out
}

/// Strips the `.lq.` prefix from a notification type name.
pub fn local_event_name(name: &str) -> Result<&str, ProtocolError> {
    name.get(NOTIFICATION_PREFIX_LEN..)
        .filter(|local| !local.is_empty())
        .ok_or_else(|| ProtocolError::InvalidName(name.to_string()))
}

// ---------------------------------------------------------------------------
// Wrapper
// ---------------------------------------------------------------------------

/// The outer envelope: a type or method name and an embedded payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Wrapper {
    pub name: String,
    pub data: Vec<u8>,
}

impl Wrapper {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = WireWriter::new();
        if !self.name.is_empty() {
            w.write_bytes_field(1, self.name.as_bytes());
        }
        if !self.data.is_empty() {
            w.write_bytes_field(2, &self.data);
        }
        w.into_inner()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let mut out = Self::default();
        let mut r = WireReader::new(bytes);
        while !r.is_empty() {
            let (number, bits) = r.read_key()?;
            let wire_type = envelope_wire_type("Wrapper", number, bits)?;
            match (number, wire_type) {
                (1, WireType::LengthDelimited) => {
                    out.name = utf8("Wrapper", "name", r.read_len_delimited()?)?
                }
                (2, WireType::LengthDelimited) => out.data = r.read_len_delimited()?.to_vec(),
                (_, wire_type) => r.skip(wire_type)?,
            }
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// ActionPrototype
// ---------------------------------------------------------------------------

/// The action carrier: a step counter, the inner type name, and the
/// (obfuscated, when live) inner payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActionPrototype {
    pub step: u32,
    pub name: String,
    pub data: Vec<u8>,
}

impl ActionPrototype {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = WireWriter::new();
        if self.step != 0 {
            w.write_varint_field(1, u64::from(self.step));
        }
        if !self.name.is_empty() {
            w.write_bytes_field(2, self.name.as_bytes());
        }
        if !self.data.is_empty() {
            w.write_bytes_field(3, &self.data);
        }
        w.into_inner()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let mut out = Self::default();
        let mut r = WireReader::new(bytes);
        while !r.is_empty() {
            let (number, bits) = r.read_key()?;
            let wire_type = envelope_wire_type(ACTION_PROTOTYPE, number, bits)?;
            match (number, wire_type) {
                (1, WireType::Varint) => out.step = r.read_varint()? as u32,
                (2, WireType::LengthDelimited) => {
                    out.name = utf8(ACTION_PROTOTYPE, "name", r.read_len_delimited()?)?;
                }
                (3, WireType::LengthDelimited) => out.data = r.read_len_delimited()?.to_vec(),
                (_, wire_type) => r.skip(wire_type)?,
            }
        }
        Ok(out)
    }
}

fn envelope_wire_type(message: &str, number: u32, bits: u8) -> Result<WireType, ProtocolError> {
    WireType::from_bits(bits).ok_or_else(|| ProtocolError::InvalidWireType {
        message: message.to_string(),
        field: number.to_string(),
        wire_type: bits,
    })
}

fn utf8(message: &str, field: &str, bytes: &[u8]) -> Result<String, ProtocolError> {
    String::from_utf8(bytes.to_vec()).map_err(|e| ProtocolError::InvalidValue {
        message: message.to_string(),
        field: field.to_string(),
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Cipher
// ---------------------------------------------------------------------------

/// XORs `data` in place with the action key stream.
///
/// Key byte `t` is `((23 ^ len) + 5 * t + TABLE[t % 9]) & 0xff` where `len`
/// is `data.len()`. The operation is its own inverse.
pub fn apply_action_cipher(data: &mut [u8]) {
    let len = data.len();
    for (t, byte) in data.iter_mut().enumerate() {
        let key = (23 ^ len)
            .wrapping_add(5usize.wrapping_mul(t))
            .wrapping_add(usize::from(CIPHER_TABLE[t % 9]));
        *byte ^= (key & 0xff) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_message_type_known_tags() {
        assert_eq!(strip_message_type(&[1, 9]).unwrap(), (MessageKind::Notification, &[9u8][..]));
        assert_eq!(strip_message_type(&[2]).unwrap().0, MessageKind::Request);
        assert_eq!(strip_message_type(&[3]).unwrap().0, MessageKind::Response);
    }

    #[test]
    fn test_strip_message_type_unknown_tag_is_fatal() {
        assert!(matches!(
            strip_message_type(&[7, 0]),
            Err(ProtocolError::UnknownMessageType(7))
        ));
        assert!(matches!(strip_message_type(&[]), Err(ProtocolError::Truncated(_))));
    }

    #[test]
    fn test_strip_index_reads_little_endian() {
        let (index, rest) = strip_index(&[0x67, 0xea, 0xaa]).unwrap();
        assert_eq!(index, 60007);
        assert_eq!(rest, &[0xaa]);
    }

    #[test]
    fn test_strip_index_short_input_returns_error() {
        assert!(strip_index(&[1]).is_err());
    }

    #[test]
    fn test_frame_notification_has_no_index() {
        assert_eq!(frame(MessageKind::Notification, 500, &[9]), vec![1, 9]);
        assert_eq!(frame(MessageKind::Request, 258, &[9]), vec![2, 2, 1, 9]);
    }

    #[test]
    fn test_local_event_name_strips_namespace() {
        assert_eq!(local_event_name(".lq.ActionDiscardTile").unwrap(), "ActionDiscardTile");
        assert!(local_event_name(".lq.").is_err());
        assert!(local_event_name("ab").is_err());
    }

    #[test]
    fn test_wrapper_encode_matches_protobuf_layout() {
        let wrapper = Wrapper::new(".lq.X", vec![0xaa]);
        assert_eq!(
            wrapper.encode(),
            vec![0x0a, 5, b'.', b'l', b'q', b'.', b'X', 0x12, 1, 0xaa]
        );
        assert_eq!(Wrapper::decode(&wrapper.encode()).unwrap(), wrapper);
    }

    #[test]
    fn test_action_prototype_decode_skips_unknown_fields() {
        let mut w = WireWriter::new();
        w.write_varint_field(1, 12);
        w.write_varint_field(9, 1);
        w.write_bytes_field(2, b"ActionDealTile");
        let proto = ActionPrototype::decode(w.as_slice()).unwrap();
        assert_eq!(proto.step, 12);
        assert_eq!(proto.name, "ActionDealTile");
        assert!(proto.data.is_empty());
    }

    #[test]
    fn test_apply_action_cipher_is_an_involution() {
        for len in [0usize, 1, 8, 9, 10, 255, 256, 1000] {
            let original: Vec<u8> = (0..len).map(|i| (i * 31 % 251) as u8).collect();
            let mut data = original.clone();
            apply_action_cipher(&mut data);
            if len > 0 {
                assert_ne!(data, original, "cipher should change a {len}-byte input");
            }
            apply_action_cipher(&mut data);
            assert_eq!(data, original);
        }
    }

    #[test]
    fn test_apply_action_cipher_first_key_bytes() {
        // len = 1: key = (23 ^ 1) + 0 + 132 = 22 + 132 = 154
        let mut data = [0u8];
        apply_action_cipher(&mut data);
        assert_eq!(data, [154]);

        // len = 2: key0 = 21 + 132 = 153, key1 = 21 + 5 + 94 = 120
        let mut data = [0u8, 0];
        apply_action_cipher(&mut data);
        assert_eq!(data, [153, 120]);
    }
}
