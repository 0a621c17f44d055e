//! Schema catalog loaded from a protobufjs JSON description.
//!
//! The game ships its message and service definitions as a protobufjs
//! "JSON module": a tree of `nested` namespaces whose leaves are messages
//! (`fields`), enums (`values`) and services (`methods`). The catalog
//! flattens that tree into lookup tables keyed by fully qualified name and
//! resolves every field type up front, so a catalog that loads is a
//! catalog in which every referenced name exists.
//!
//! ```text
//! { "nested": { "lq": { "nested": {
//!     "Wrapper":  { "fields": { "name": { "type": "string", "id": 1 }, ... } },
//!     "FastTest": { "methods": { "authGame": { "requestType": "ReqAuthGame", ... } } }
//! } } } }
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;

use crate::ProtocolError;

/// Namespace that bare names resolve against.
pub const DEFAULT_PACKAGE: &str = "lq";

// ---------------------------------------------------------------------------
// Raw protobufjs JSON
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawNode {
    #[serde(default)]
    nested: BTreeMap<String, RawNode>,
    fields: Option<BTreeMap<String, RawField>>,
    values: Option<BTreeMap<String, i64>>,
    methods: Option<BTreeMap<String, RawMethod>>,
}

#[derive(Debug, Deserialize)]
struct RawField {
    #[serde(rename = "type")]
    ty: String,
    id: u32,
    rule: Option<String>,
    #[serde(rename = "keyType")]
    key_type: Option<String>,
    options: Option<RawFieldOptions>,
}

#[derive(Debug, Deserialize)]
struct RawFieldOptions {
    packed: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawMethod {
    #[serde(rename = "requestType")]
    request_type: String,
    #[serde(rename = "responseType")]
    response_type: String,
}

// ---------------------------------------------------------------------------
// Resolved definitions
// ---------------------------------------------------------------------------

/// Protobuf scalar value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    Double,
    Float,
    Int32,
    Int64,
    UInt32,
    UInt64,
    SInt32,
    SInt64,
    Fixed32,
    Fixed64,
    SFixed32,
    SFixed64,
    Bool,
    String,
    Bytes,
}

impl Scalar {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "double" => Self::Double,
            "float" => Self::Float,
            "int32" => Self::Int32,
            "int64" => Self::Int64,
            "uint32" => Self::UInt32,
            "uint64" => Self::UInt64,
            "sint32" => Self::SInt32,
            "sint64" => Self::SInt64,
            "fixed32" => Self::Fixed32,
            "fixed64" => Self::Fixed64,
            "sfixed32" => Self::SFixed32,
            "sfixed64" => Self::SFixed64,
            "bool" => Self::Bool,
            "string" => Self::String,
            "bytes" => Self::Bytes,
            _ => return None,
        })
    }
}

/// What a field holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Scalar(Scalar),
    /// Fully qualified message name, without a leading dot.
    Message(String),
    /// Fully qualified enum name, without a leading dot.
    Enum(String),
}

impl FieldKind {
    /// Numeric scalars and enums may be packed when repeated.
    pub fn is_packable(&self) -> bool {
        match self {
            Self::Scalar(Scalar::String | Scalar::Bytes) | Self::Message(_) => false,
            Self::Scalar(_) | Self::Enum(_) => true,
        }
    }
}

/// Cardinality of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Label {
    Singular,
    Repeated,
    Map { key: Scalar },
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub number: u32,
    pub kind: FieldKind,
    pub label: Label,
    /// Explicit `options.packed`; `None` means the proto3 default (packed).
    pub packed: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct MessageDef {
    full_name: String,
    fields: Vec<FieldDef>,
    by_number: HashMap<u32, usize>,
    by_name: HashMap<String, usize>,
}

impl MessageDef {
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Fields ordered by field number.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field_by_number(&self, number: u32) -> Option<&FieldDef> {
        self.by_number.get(&number).map(|&i| &self.fields[i])
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldDef> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }
}

#[derive(Debug, Clone)]
pub struct EnumDef {
    pub full_name: String,
    pub values: BTreeMap<String, i32>,
}

/// Request and response types of one RPC method, fully qualified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDef {
    pub request_type: String,
    pub response_type: String,
}

#[derive(Debug, Clone)]
pub struct ServiceDef {
    pub full_name: String,
    pub methods: HashMap<String, MethodDef>,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Every message, enum and service the client can name, resolved.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    messages: HashMap<String, MessageDef>,
    enums: HashMap<String, EnumDef>,
    services: HashMap<String, ServiceDef>,
}

/// Collected before field types are resolved.
#[derive(Default)]
struct Pending {
    messages: Vec<(String, BTreeMap<String, RawField>)>,
    enums: Vec<(String, BTreeMap<String, i64>)>,
    services: Vec<(String, BTreeMap<String, RawMethod>)>,
}

impl SchemaCatalog {
    /// Parses a protobufjs JSON description.
    ///
    /// # Errors
    /// `ProtocolError::Catalog` for malformed JSON, `ProtocolError::UnknownType`
    /// when a field or method references a name the description lacks.
    pub fn from_json_str(json: &str) -> Result<Self, ProtocolError> {
        let root: RawNode = serde_json::from_str(json)?;
        let mut pending = Pending::default();
        collect(root, "", &mut pending);

        let mut catalog = SchemaCatalog::default();
        for (name, values) in pending.enums {
            let values = values.into_iter().map(|(k, v)| (k, v as i32)).collect();
            catalog.enums.insert(
                name.clone(),
                EnumDef {
                    full_name: name,
                    values,
                },
            );
        }
        let message_names: HashSet<String> =
            pending.messages.iter().map(|(n, _)| n.clone()).collect();
        let enum_names: HashSet<String> = catalog.enums.keys().cloned().collect();

        for (name, raw_fields) in pending.messages {
            let mut fields = Vec::with_capacity(raw_fields.len());
            for (field_name, raw) in raw_fields {
                fields.push(resolve_field(&name, field_name, raw, &message_names, &enum_names)?);
            }
            fields.sort_by_key(|f| f.number);
            let by_number = fields.iter().enumerate().map(|(i, f)| (f.number, i)).collect();
            let by_name = fields.iter().enumerate().map(|(i, f)| (f.name.clone(), i)).collect();
            catalog.messages.insert(
                name.clone(),
                MessageDef {
                    full_name: name,
                    fields,
                    by_number,
                    by_name,
                },
            );
        }

        for (name, raw_methods) in pending.services {
            let mut methods = HashMap::new();
            for (method, raw) in raw_methods {
                let request_type = resolve_name(&name, &raw.request_type, &message_names)
                    .ok_or_else(|| ProtocolError::UnknownType(raw.request_type.clone()))?;
                let response_type = resolve_name(&name, &raw.response_type, &message_names)
                    .ok_or_else(|| ProtocolError::UnknownType(raw.response_type.clone()))?;
                methods.insert(
                    method,
                    MethodDef {
                        request_type,
                        response_type,
                    },
                );
            }
            catalog.services.insert(
                name.clone(),
                ServiceDef {
                    full_name: name,
                    methods,
                },
            );
        }

        tracing::debug!(
            messages = catalog.messages.len(),
            enums = catalog.enums.len(),
            services = catalog.services.len(),
            "schema catalog loaded"
        );
        Ok(catalog)
    }

    /// Reads and parses a protobufjs JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ProtocolError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Looks up a message by `.lq.Name`, `lq.Name` or bare `Name`.
    pub fn message(&self, name: &str) -> Result<&MessageDef, ProtocolError> {
        lookup(&self.messages, name).ok_or_else(|| ProtocolError::UnknownType(name.to_string()))
    }

    /// Looks up an enum the same way as [`message`](Self::message).
    pub fn enumeration(&self, name: &str) -> Result<&EnumDef, ProtocolError> {
        lookup(&self.enums, name).ok_or_else(|| ProtocolError::UnknownType(name.to_string()))
    }

    /// Looks up a service the same way as [`message`](Self::message).
    pub fn service(&self, name: &str) -> Result<&ServiceDef, ProtocolError> {
        lookup(&self.services, name).ok_or_else(|| ProtocolError::UnknownType(name.to_string()))
    }

    /// Looks up one method of a service.
    pub fn method(&self, service: &str, method: &str) -> Result<&MethodDef, ProtocolError> {
        self.service(service)?
            .methods
            .get(method)
            .ok_or_else(|| ProtocolError::UnknownMethod {
                service: service.to_string(),
                method: method.to_string(),
            })
    }

    /// The wire name of a method: `.lq.FastTest.authGame`.
    pub fn method_path(&self, service: &str, method: &str) -> Result<String, ProtocolError> {
        self.method(service, method)?;
        let service = self.service(service)?;
        Ok(format!(".{}.{method}", service.full_name))
    }
}

fn collect(node: RawNode, prefix: &str, out: &mut Pending) {
    for (name, mut child) in node.nested {
        let full = if prefix.is_empty() {
            name
        } else {
            format!("{prefix}.{name}")
        };
        if let Some(fields) = child.fields.take() {
            out.messages.push((full.clone(), fields));
        }
        if let Some(values) = child.values.take() {
            out.enums.push((full.clone(), values));
        }
        if let Some(methods) = child.methods.take() {
            out.services.push((full.clone(), methods));
        }
        collect(child, &full, out);
    }
}

fn resolve_field(
    scope: &str,
    name: String,
    raw: RawField,
    message_names: &HashSet<String>,
    enum_names: &HashSet<String>,
) -> Result<FieldDef, ProtocolError> {
    let kind = if let Some(scalar) = Scalar::parse(&raw.ty) {
        FieldKind::Scalar(scalar)
    } else if let Some(full) = resolve_name(scope, &raw.ty, message_names) {
        FieldKind::Message(full)
    } else if let Some(full) = resolve_name(scope, &raw.ty, enum_names) {
        FieldKind::Enum(full)
    } else {
        return Err(ProtocolError::UnknownType(format!("{scope}.{name}: {}", raw.ty)));
    };

    let label = match (raw.key_type.as_deref(), raw.rule.as_deref()) {
        (Some(key), _) => Label::Map {
            key: Scalar::parse(key).ok_or_else(|| ProtocolError::UnknownType(key.to_string()))?,
        },
        (None, Some("repeated")) => Label::Repeated,
        _ => Label::Singular,
    };

    Ok(FieldDef {
        name,
        number: raw.id,
        kind,
        label,
        packed: raw.options.and_then(|o| o.packed),
    })
}

/// Resolves `reference` the way protobuf does: innermost scope first,
/// walking outwards to the root. A leading dot means fully qualified.
fn resolve_name(scope: &str, reference: &str, known: &HashSet<String>) -> Option<String> {
    if let Some(absolute) = reference.strip_prefix('.') {
        return known.get(absolute).cloned();
    }
    let mut scope = scope;
    loop {
        let candidate = if scope.is_empty() {
            reference.to_string()
        } else {
            format!("{scope}.{reference}")
        };
        if known.contains(&candidate) {
            return Some(candidate);
        }
        if scope.is_empty() {
            return None;
        }
        scope = scope.rsplit_once('.').map_or("", |(parent, _)| parent);
    }
}

fn lookup<'a, T>(table: &'a HashMap<String, T>, name: &str) -> Option<&'a T> {
    let name = name.strip_prefix('.').unwrap_or(name);
    table
        .get(name)
        .or_else(|| table.get(&format!("{DEFAULT_PACKAGE}.{name}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
        "nested": { "lq": { "nested": {
            "Outer": {
                "fields": {
                    "inner": { "type": "Inner", "id": 1 },
                    "kinds": { "rule": "repeated", "type": "Kind", "id": 2 },
                    "tags": { "keyType": "string", "type": "uint32", "id": 3 }
                },
                "nested": {
                    "Inner": { "fields": { "v": { "type": "int32", "id": 1 } } }
                }
            },
            "Kind": { "values": { "NONE": 0, "SOME": 1 } },
            "Svc": { "methods": { "call": { "requestType": "Outer", "responseType": "Outer.Inner" } } }
        } } }
    }"#;

    #[test]
    fn test_from_json_str_resolves_nested_message_relative_to_scope() {
        let catalog = SchemaCatalog::from_json_str(CATALOG).unwrap();
        let outer = catalog.message("Outer").unwrap();
        let inner = outer.field_by_name("inner").unwrap();
        assert_eq!(inner.kind, FieldKind::Message("lq.Outer.Inner".into()));
    }

    #[test]
    fn test_from_json_str_resolves_enum_and_map_fields() {
        let catalog = SchemaCatalog::from_json_str(CATALOG).unwrap();
        let outer = catalog.message(".lq.Outer").unwrap();
        let kinds = outer.field_by_number(2).unwrap();
        assert_eq!(kinds.kind, FieldKind::Enum("lq.Kind".into()));
        assert_eq!(kinds.label, Label::Repeated);
        let tags = outer.field_by_name("tags").unwrap();
        assert_eq!(tags.label, Label::Map { key: Scalar::String });
    }

    #[test]
    fn test_message_lookup_accepts_all_name_forms() {
        let catalog = SchemaCatalog::from_json_str(CATALOG).unwrap();
        assert!(catalog.message("Outer").is_ok());
        assert!(catalog.message("lq.Outer").is_ok());
        assert!(catalog.message(".lq.Outer").is_ok());
    }

    #[test]
    fn test_message_lookup_absent_name_fails_closed() {
        let catalog = SchemaCatalog::from_json_str(CATALOG).unwrap();
        assert!(matches!(
            catalog.message("Missing"),
            Err(ProtocolError::UnknownType(name)) if name == "Missing"
        ));
    }

    #[test]
    fn test_method_path_uses_dotted_service_name() {
        let catalog = SchemaCatalog::from_json_str(CATALOG).unwrap();
        assert_eq!(catalog.method_path("Svc", "call").unwrap(), ".lq.Svc.call");
        let method = catalog.method("Svc", "call").unwrap();
        assert_eq!(method.response_type, "lq.Outer.Inner");
    }

    #[test]
    fn test_method_unknown_method_returns_error() {
        let catalog = SchemaCatalog::from_json_str(CATALOG).unwrap();
        assert!(matches!(
            catalog.method("Svc", "nope"),
            Err(ProtocolError::UnknownMethod { .. })
        ));
    }

    #[test]
    fn test_from_json_str_dangling_reference_fails() {
        let json = r#"{ "nested": { "lq": { "nested": {
            "A": { "fields": { "b": { "type": "Nowhere", "id": 1 } } }
        } } } }"#;
        assert!(matches!(
            SchemaCatalog::from_json_str(json),
            Err(ProtocolError::UnknownType(_))
        ));
    }
}
