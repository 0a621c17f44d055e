//! Unified error type for the liqi client.

use liqi_agent::{AgentError, CloseReason};
use liqi_protocol::ProtocolError;
use liqi_table::TableError;
use liqi_transport::TransportError;

/// Top-level error that wraps every crate-specific error.
///
/// Only [`Disconnected`](Self::Disconnected) with a recoverable reason is
/// retried by the supervisor; everything else ends the run.
#[derive(Debug, thiserror::Error)]
pub enum LiqiError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Agent(#[from] AgentError),

    /// The reconstructed table no longer agrees with the server.
    #[error(transparent)]
    Table(#[from] TableError),

    /// The server refused the session credential.
    #[error("authentication rejected with code {code}")]
    AuthRejected { code: u32 },

    /// A response was missing a field the session needs.
    #[error("{method} response: {reason}")]
    MalformedResponse { method: &'static str, reason: String },

    /// The socket closed before the match ended.
    #[error("connection lost: {0}")]
    Disconnected(CloseReason),

    /// The reconnect policy ran out of attempts.
    #[error("gave up after {attempts} connection attempts, last: {last}")]
    ReconnectExhausted { attempts: u32, last: CloseReason },

    /// The match task was cancelled through its handle.
    #[error("match cancelled")]
    Cancelled,

    /// The match task panicked.
    #[error("match task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl LiqiError {
    /// Whether a fresh connection might succeed where this one failed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Disconnected(reason) if reason.is_recoverable())
    }
}
