//! Connection lifecycle.

use std::fmt;

/// Where the agent's socket is in its life.
///
/// ```text
///   Connecting ──→ Open ──→ Closing ──→ Closed
///        │                                ↑
///        └──────────(dial failed)─────────┘
/// ```
///
/// Requests are only written in `Open`. A call made while `Connecting`
/// waits for the transition; a call made in `Closing` or `Closed` fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl ConnectionState {
    /// Returns the next state in the normal progression, or `None` from
    /// `Closed`.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Connecting => Some(Self::Open),
            Self::Open => Some(Self::Closing),
            Self::Closing => Some(Self::Closed),
            Self::Closed => None,
        }
    }

    /// Whether moving from `self` to `target` is allowed. Besides the
    /// normal progression, a failed dial goes straight to `Closed`.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target) || (self == Self::Connecting && target == Self::Closed)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closing | Self::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Why an agent's connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The server closed the socket.
    Remote,
    /// [`Agent::close`](crate::Agent::close) was called.
    Local,
    /// Dialing, sending or receiving failed.
    Transport(String),
    /// A frame could not be decoded or violated the protocol.
    Protocol(String),
}

impl CloseReason {
    /// Whether a new connection could fix this. Protocol violations
    /// would repeat on the next socket.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Protocol(_))
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote => f.write_str("closed by server"),
            Self::Local => f.write_str("closed locally"),
            Self::Transport(msg) => write!(f, "transport failure: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol violation: {msg}"),
        }
    }
}
