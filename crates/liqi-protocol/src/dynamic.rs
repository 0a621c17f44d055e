//! Catalog-driven payload codec.
//!
//! Payloads are decoded into `serde_json::Value` objects keyed by the
//! schema's field names, and encoded from the same shape. Downstream crates
//! deserialize the values they care about into typed structs with serde.
//!
//! Value mapping:
//!
//! | protobuf            | JSON                                   |
//! |---------------------|----------------------------------------|
//! | integer types, enum | number                                 |
//! | float, double       | number                                 |
//! | bool                | bool                                   |
//! | string              | string                                 |
//! | bytes               | array of byte values                   |
//! | message             | object                                 |
//! | repeated            | array                                  |
//! | map                 | object keyed by the stringified key    |
//!
//! Absent fields are absent from the object (proto3 defaults apply on the
//! reading side). Unknown field numbers are skipped.

use serde_json::{Map, Value};

use crate::ProtocolError;
use crate::schema::{FieldDef, FieldKind, Label, MessageDef, Scalar, SchemaCatalog};
use crate::wire::{WireReader, WireType, WireWriter, zigzag_decode, zigzag_encode};

impl SchemaCatalog {
    /// Decodes `data` as the message named `type_name`.
    pub fn decode(&self, type_name: &str, data: &[u8]) -> Result<Value, ProtocolError> {
        let msg = self.message(type_name)?;
        self.decode_message(msg, data).map(Value::Object)
    }

    /// Encodes `value` (a JSON object) as the message named `type_name`.
    ///
    /// # Errors
    /// `UnknownField` if the object names a field the message lacks,
    /// `InvalidValue` if a value does not fit its field's type.
    pub fn encode(&self, type_name: &str, value: &Value) -> Result<Vec<u8>, ProtocolError> {
        let msg = self.message(type_name)?;
        let mut w = WireWriter::new();
        self.encode_message(msg, value, &mut w)?;
        Ok(w.into_inner())
    }

    // -----------------------------------------------------------------------
    // Decoding
    // -----------------------------------------------------------------------

    fn decode_message(
        &self,
        msg: &MessageDef,
        data: &[u8],
    ) -> Result<Map<String, Value>, ProtocolError> {
        let mut out = Map::new();
        let mut r = WireReader::new(data);
        while !r.is_empty() {
            let (number, bits) = r.read_key()?;
            let wire_type = WireType::from_bits(bits).ok_or_else(|| ProtocolError::InvalidWireType {
                message: msg.full_name().to_string(),
                field: number.to_string(),
                wire_type: bits,
            })?;
            let Some(field) = msg.field_by_number(number) else {
                r.skip(wire_type)?;
                continue;
            };

            match &field.label {
                Label::Singular => {
                    let value = self.decode_value(msg, field, wire_type, &mut r)?;
                    out.insert(field.name.clone(), value);
                }
                Label::Repeated => {
                    let slot = out
                        .entry(field.name.clone())
                        .or_insert_with(|| Value::Array(Vec::new()));
                    let mut items = Vec::new();
                    if wire_type == WireType::LengthDelimited && field.kind.is_packable() {
                        let packed = r.read_len_delimited()?;
                        let mut inner = WireReader::new(packed);
                        let element_type = scalar_wire_type(&field.kind);
                        while !inner.is_empty() {
                            items.push(self.decode_value(msg, field, element_type, &mut inner)?);
                        }
                    } else {
                        items.push(self.decode_value(msg, field, wire_type, &mut r)?);
                    }
                    if let Value::Array(arr) = slot {
                        arr.extend(items);
                    }
                }
                Label::Map { key } => {
                    let entry = r.read_len_delimited()?;
                    let (k, v) = self.decode_map_entry(msg, field, *key, entry)?;
                    let slot = out
                        .entry(field.name.clone())
                        .or_insert_with(|| Value::Object(Map::new()));
                    if let Value::Object(map) = slot {
                        map.insert(k, v);
                    }
                }
            }
        }
        Ok(out)
    }

    fn decode_map_entry(
        &self,
        msg: &MessageDef,
        field: &FieldDef,
        key_type: Scalar,
        data: &[u8],
    ) -> Result<(String, Value), ProtocolError> {
        let mut r = WireReader::new(data);
        let mut key = Value::Null;
        let mut value = Value::Null;
        while !r.is_empty() {
            let (number, bits) = r.read_key()?;
            let wire_type = WireType::from_bits(bits).ok_or_else(|| ProtocolError::InvalidWireType {
                message: msg.full_name().to_string(),
                field: field.name.clone(),
                wire_type: bits,
            })?;
            match number {
                1 => {
                    key = self.decode_kind(
                        msg,
                        field,
                        &FieldKind::Scalar(key_type),
                        wire_type,
                        &mut r,
                    )?
                }
                2 => value = self.decode_kind(msg, field, &field.kind, wire_type, &mut r)?,
                _ => r.skip(wire_type)?,
            }
        }
        let key = match key {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        };
        Ok((key, value))
    }

    fn decode_value(
        &self,
        msg: &MessageDef,
        field: &FieldDef,
        wire_type: WireType,
        r: &mut WireReader<'_>,
    ) -> Result<Value, ProtocolError> {
        self.decode_kind(msg, field, &field.kind, wire_type, r)
    }

    fn decode_kind(
        &self,
        msg: &MessageDef,
        field: &FieldDef,
        kind: &FieldKind,
        wire_type: WireType,
        r: &mut WireReader<'_>,
    ) -> Result<Value, ProtocolError> {
        let expected = scalar_wire_type(kind);
        if wire_type != expected {
            return Err(ProtocolError::InvalidWireType {
                message: msg.full_name().to_string(),
                field: field.name.clone(),
                wire_type: wire_type.bits(),
            });
        }

        let value = match kind {
            FieldKind::Message(name) => {
                let nested = self.message(name)?;
                Value::Object(self.decode_message(nested, r.read_len_delimited()?)?)
            }
            FieldKind::Enum(_) => Value::from(r.read_varint()? as i32),
            FieldKind::Scalar(scalar) => match scalar {
                Scalar::Int32 => Value::from(r.read_varint()? as i32),
                Scalar::Int64 => Value::from(r.read_varint()? as i64),
                Scalar::UInt32 => Value::from(r.read_varint()? as u32),
                Scalar::UInt64 => Value::from(r.read_varint()?),
                Scalar::SInt32 => Value::from(zigzag_decode(r.read_varint()?) as i32),
                Scalar::SInt64 => Value::from(zigzag_decode(r.read_varint()?)),
                Scalar::Bool => Value::from(r.read_varint()? != 0),
                Scalar::Fixed32 => Value::from(r.read_fixed32()?),
                Scalar::SFixed32 => Value::from(r.read_fixed32()? as i32),
                Scalar::Float => Value::from(f64::from(f32::from_bits(r.read_fixed32()?))),
                Scalar::Fixed64 => Value::from(r.read_fixed64()?),
                Scalar::SFixed64 => Value::from(r.read_fixed64()? as i64),
                Scalar::Double => Value::from(f64::from_bits(r.read_fixed64()?)),
                Scalar::String => {
                    let bytes = r.read_len_delimited()?;
                    let s = std::str::from_utf8(bytes).map_err(|e| ProtocolError::InvalidValue {
                        message: msg.full_name().to_string(),
                        field: field.name.clone(),
                        reason: e.to_string(),
                    })?;
                    Value::from(s)
                }
                Scalar::Bytes => Value::from(r.read_len_delimited()?.to_vec()),
            },
        };
        Ok(value)
    }

    // -----------------------------------------------------------------------
    // Encoding
    // -----------------------------------------------------------------------

    fn encode_message(
        &self,
        msg: &MessageDef,
        value: &Value,
        w: &mut WireWriter,
    ) -> Result<(), ProtocolError> {
        let obj = value.as_object().ok_or_else(|| ProtocolError::InvalidValue {
            message: msg.full_name().to_string(),
            field: String::new(),
            reason: format!("expected an object, got {value}"),
        })?;
        if let Some(unknown) = obj.keys().find(|k| msg.field_by_name(k).is_none()) {
            return Err(ProtocolError::UnknownField {
                message: msg.full_name().to_string(),
                field: unknown.clone(),
            });
        }

        for field in msg.fields() {
            let Some(v) = obj.get(&field.name) else { continue };
            if v.is_null() {
                continue;
            }
            match &field.label {
                Label::Singular => {
                    w.write_key(field.number, scalar_wire_type(&field.kind));
                    self.encode_raw(msg, field, &field.kind, v, w)?;
                }
                Label::Repeated => {
                    let items = v
                        .as_array()
                        .ok_or_else(|| invalid(msg, field, "expected an array"))?;
                    if field.kind.is_packable() && field.packed != Some(false) {
                        if items.is_empty() {
                            continue;
                        }
                        let mut packed = WireWriter::new();
                        for item in items {
                            self.encode_raw(msg, field, &field.kind, item, &mut packed)?;
                        }
                        w.write_bytes_field(field.number, packed.as_slice());
                    } else {
                        for item in items {
                            w.write_key(field.number, scalar_wire_type(&field.kind));
                            self.encode_raw(msg, field, &field.kind, item, w)?;
                        }
                    }
                }
                Label::Map { key } => {
                    let entries = v
                        .as_object()
                        .ok_or_else(|| invalid(msg, field, "expected an object"))?;
                    for (k, item) in entries {
                        let key_kind = FieldKind::Scalar(*key);
                        let key_value = map_key_value(*key, k)
                            .ok_or_else(|| invalid(msg, field, "bad map key"))?;
                        let mut entry = WireWriter::new();
                        entry.write_key(1, scalar_wire_type(&key_kind));
                        self.encode_raw(msg, field, &key_kind, &key_value, &mut entry)?;
                        entry.write_key(2, scalar_wire_type(&field.kind));
                        self.encode_raw(msg, field, &field.kind, item, &mut entry)?;
                        w.write_bytes_field(field.number, entry.as_slice());
                    }
                }
            }
        }
        Ok(())
    }

    /// Writes one value without its key.
    fn encode_raw(
        &self,
        msg: &MessageDef,
        field: &FieldDef,
        kind: &FieldKind,
        v: &Value,
        w: &mut WireWriter,
    ) -> Result<(), ProtocolError> {
        match kind {
            FieldKind::Message(name) => {
                let nested = self.message(name)?;
                let mut inner = WireWriter::new();
                self.encode_message(nested, v, &mut inner)?;
                w.write_len_prefixed(inner.as_slice());
            }
            FieldKind::Enum(name) => {
                let number = match v {
                    Value::String(label) => *self
                        .enumeration(name)?
                        .values
                        .get(label)
                        .ok_or_else(|| invalid(msg, field, "unknown enum label"))?,
                    _ => as_i64(msg, field, v)? as i32,
                };
                w.write_varint(i64::from(number) as u64);
            }
            FieldKind::Scalar(scalar) => match scalar {
                Scalar::Int32 | Scalar::Int64 => w.write_varint(as_i64(msg, field, v)? as u64),
                Scalar::UInt32 | Scalar::UInt64 => w.write_varint(as_u64(msg, field, v)?),
                Scalar::SInt32 | Scalar::SInt64 => {
                    w.write_varint(zigzag_encode(as_i64(msg, field, v)?))
                }
                Scalar::Bool => {
                    let b = match v {
                        Value::Bool(b) => *b,
                        other => as_u64(msg, field, other)? != 0,
                    };
                    w.write_varint(u64::from(b));
                }
                Scalar::Fixed32 => w.write_fixed32(as_u64(msg, field, v)? as u32),
                Scalar::SFixed32 => w.write_fixed32(as_i64(msg, field, v)? as i32 as u32),
                Scalar::Float => w.write_fixed32((as_f64(msg, field, v)? as f32).to_bits()),
                Scalar::Fixed64 => w.write_fixed64(as_u64(msg, field, v)?),
                Scalar::SFixed64 => w.write_fixed64(as_i64(msg, field, v)? as u64),
                Scalar::Double => w.write_fixed64(as_f64(msg, field, v)?.to_bits()),
                Scalar::String => {
                    let s = v.as_str().ok_or_else(|| invalid(msg, field, "expected a string"))?;
                    w.write_len_prefixed(s.as_bytes());
                }
                Scalar::Bytes => {
                    let bytes = match v {
                        Value::String(s) => s.as_bytes().to_vec(),
                        other => bytes_from_value(other)
                            .ok_or_else(|| invalid(msg, field, "expected a byte array"))?,
                    };
                    w.write_len_prefixed(&bytes);
                }
            },
        }
        Ok(())
    }
}

/// Converts a decoded `bytes` value (an array of byte numbers) back into bytes.
///
/// Returns `None` if the value is not an array of integers in `0..=255`.
pub fn bytes_from_value(value: &Value) -> Option<Vec<u8>> {
    value
        .as_array()?
        .iter()
        .map(|b| b.as_u64().and_then(|b| u8::try_from(b).ok()))
        .collect()
}

/// The wire type a single (unpacked) value of `kind` is written with.
fn scalar_wire_type(kind: &FieldKind) -> WireType {
    match kind {
        FieldKind::Message(_) => WireType::LengthDelimited,
        FieldKind::Enum(_) => WireType::Varint,
        FieldKind::Scalar(s) => match s {
            Scalar::Double | Scalar::Fixed64 | Scalar::SFixed64 => WireType::Fixed64,
            Scalar::Float | Scalar::Fixed32 | Scalar::SFixed32 => WireType::Fixed32,
            Scalar::String | Scalar::Bytes => WireType::LengthDelimited,
            _ => WireType::Varint,
        },
    }
}

fn map_key_value(key: Scalar, raw: &str) -> Option<Value> {
    match key {
        Scalar::String => Some(Value::from(raw)),
        Scalar::Bool => raw.parse::<bool>().ok().map(Value::from),
        Scalar::UInt32 | Scalar::UInt64 | Scalar::Fixed32 | Scalar::Fixed64 => {
            raw.parse::<u64>().ok().map(Value::from)
        }
        _ => raw.parse::<i64>().ok().map(Value::from),
    }
}

fn invalid(msg: &MessageDef, field: &FieldDef, reason: &str) -> ProtocolError {
    ProtocolError::InvalidValue {
        message: msg.full_name().to_string(),
        field: field.name.clone(),
        reason: reason.to_string(),
    }
}

fn as_i64(msg: &MessageDef, field: &FieldDef, v: &Value) -> Result<i64, ProtocolError> {
    v.as_i64()
        .or_else(|| v.as_u64().map(|u| u as i64))
        .ok_or_else(|| invalid(msg, field, "expected an integer"))
}

fn as_u64(msg: &MessageDef, field: &FieldDef, v: &Value) -> Result<u64, ProtocolError> {
    v.as_u64()
        .or_else(|| v.as_i64().map(|i| i as u64))
        .ok_or_else(|| invalid(msg, field, "expected an integer"))
}

fn as_f64(msg: &MessageDef, field: &FieldDef, v: &Value) -> Result<f64, ProtocolError> {
    v.as_f64().ok_or_else(|| invalid(msg, field, "expected a number"))
}
