//! The protocol agent: one socket, many concurrent calls, one ordered
//! notification stream.
//!
//! An [`Agent`] owns a single connection to the game gateway and does three
//! things with it:
//!
//! 1. **Correlation**: every outbound call gets an index from a ring of
//!    [`CORRELATION_SLOTS`](liqi_protocol::CORRELATION_SLOTS) slots. The
//!    response frame carrying the same index completes that call, in
//!    whatever order responses arrive.
//! 2. **Routing**: notifications are decoded and handed to the subscribers
//!    of their local event name, strictly in arrival order. Live actions
//!    arrive as two events (the carrier, then the deciphered action).
//! 3. **Lifecycle**: `Connecting → Open → Closing → Closed`, observable
//!    through [`Agent::state`], [`Agent::wait_open`] and [`Agent::closed`].
//!
//! # How it fits in the stack
//!
//! ```text
//! Match driver (above)  ← authenticates, replays, mirrors the table
//!     ↕
//! Agent (this crate)    ← correlation, routing, lifecycle
//!     ↕
//! Frame codec (below)   ← bytes ⇄ named payloads
//! ```

mod agent;
mod auth;
mod config;
mod error;
mod pending;
mod state;
mod subscribers;

pub use agent::Agent;
pub use auth::session_credential;
pub use config::{AgentOptions, ErrorPolicy, response_error_code};
pub use error::AgentError;
pub use state::{CloseReason, ConnectionState};
pub use subscribers::SubscriptionId;
