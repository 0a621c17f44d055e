//! Error types for the protocol layer.
//!
//! Every variant here is a decode or encode failure. The agent treats
//! them as fatal: a frame that does not match the catalog means the
//! client and server no longer agree on the protocol.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The first byte of a frame is not a known message tag.
    #[error("unknown message type tag {0}")]
    UnknownMessageType(u8),

    /// The input ended before a complete value could be read.
    #[error("truncated input while reading {0}")]
    Truncated(&'static str),

    /// A varint ran past ten bytes.
    #[error("malformed varint")]
    MalformedVarint,

    /// A field carried a wire type the decoder cannot handle.
    #[error("field {field} of {message}: unexpected wire type {wire_type}")]
    InvalidWireType {
        message: String,
        field: String,
        wire_type: u8,
    },

    /// A referenced message, enum or service is absent from the catalog.
    #[error("unknown schema type {0}")]
    UnknownType(String),

    /// A service exists but does not declare the method.
    #[error("unknown method {service}.{method}")]
    UnknownMethod { service: String, method: String },

    /// An object key passed for encoding is not a field of the message.
    #[error("{message} has no field named {field}")]
    UnknownField { message: String, field: String },

    /// A value does not fit the field's declared type.
    #[error("field {field} of {message}: {reason}")]
    InvalidValue {
        message: String,
        field: String,
        reason: String,
    },

    /// A notification name is too short to carry the namespace prefix.
    #[error("malformed notification name {0:?}")]
    InvalidName(String),

    /// The schema catalog JSON could not be parsed.
    #[error("schema catalog parse failed: {0}")]
    Catalog(#[from] serde_json::Error),

    /// The schema catalog file could not be read.
    #[error("schema catalog read failed: {0}")]
    CatalogIo(#[from] std::io::Error),
}
