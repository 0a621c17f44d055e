//! Wire protocol for the liqi game gateway.
//!
//! This crate is pure: no sockets, no tasks, no state beyond the schema
//! catalog. It covers three layers:
//!
//! - **Framing** ([`frame`]): message tag, little-endian correlation index,
//!   the fixed `Wrapper` envelope, the `ActionPrototype` carrier and its
//!   XOR cipher.
//! - **Schemas** ([`SchemaCatalog`]): message/service definitions loaded from
//!   the protobufjs JSON description, and a dynamic codec between protobuf
//!   bytes and `serde_json::Value`.
//! - **Codec** ([`FrameCodec`]): the two combined, the way the agent uses them.
//!
//! ```text
//! socket bytes → FrameCodec::decode_frame → InboundFrame
//!              → FrameCodec::decode_notification → [Notification, (inner action)]
//! ```

mod codec;
mod dynamic;
mod error;
pub mod frame;
pub mod schema;
pub mod wire;

pub use codec::{EncodedRequest, FrameCodec, InboundFrame, Notification};
pub use dynamic::bytes_from_value;
pub use error::ProtocolError;
pub use frame::{
    ActionPrototype, MessageKind, Wrapper, apply_action_cipher, local_event_name, strip_index,
    strip_message_type,
};
pub use schema::SchemaCatalog;

/// Size of the correlation index space.
pub const CORRELATION_SLOTS: u16 = 60007;
