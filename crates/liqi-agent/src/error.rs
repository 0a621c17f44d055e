//! Error types for the agent layer.

use liqi_protocol::ProtocolError;
use serde_json::Value;

/// Errors returned by [`Agent`](crate::Agent) calls.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The connection is closing or closed, or never opened.
    #[error("agent connection is closed")]
    Closed,

    /// A frame or payload did not match the schema catalog.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The server sent a request-tagged frame. Servers only respond and
    /// notify, so this is a protocol violation.
    #[error("unexpected request frame from server (index {index}, {name})")]
    UnexpectedRequest { index: u16, name: String },

    /// The response carried a non-zero `error.code` and the call used
    /// [`ErrorPolicy::Raise`](crate::ErrorPolicy::Raise).
    #[error("server returned error code {code}")]
    Application { code: u32, payload: Value },
}
