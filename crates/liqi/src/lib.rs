//! # liqi
//!
//! Client for the liqi game gateway.
//!
//! The workspace is layered, one crate per concern:
//!
//! ```text
//! liqi-transport   whole binary frames over a socket
//! liqi-protocol    frame tags, the two-layer envelope, schema-driven payloads
//! liqi-agent       request/response correlation, notification routing
//! liqi-heartbeat   fixed-interval keep-alive
//! liqi-table       table state rebuilt from the action stream
//! liqi             authentication, resync, reconnection (this crate)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use liqi::prelude::*;
//!
//! # async fn play(catalog_json: &str) -> Result<(), LiqiError> {
//! let codec = FrameCodec::new(SchemaCatalog::from_json_str(catalog_json)?);
//! let config = ClientConfig::new(
//!     Endpoint::game("game.example.net"),
//!     Credentials {
//!         account_id: 123456,
//!         token: "token-from-lobby".into(),
//!         game_uuid: "uuid-from-lobby".into(),
//!     },
//! );
//! let outcome = MatchClient::new(config, codec, Tsumogiri).run().await?;
//! println!("final score: {}", outcome.table.state().self_player()?.score());
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
mod session;
pub mod telemetry;

pub use client::{MatchClient, MatchHandle, MatchOutcome};
pub use config::{ClientConfig, Credentials, Endpoint, ReconnectPolicy, SyncCursor};
pub use error::LiqiError;

pub use liqi_agent as agent;
pub use liqi_heartbeat as heartbeat;
pub use liqi_protocol as protocol;
pub use liqi_table as table;
pub use liqi_transport as transport;

/// The types most programs need.
pub mod prelude {
    pub use crate::{
        ClientConfig, Credentials, Endpoint, LiqiError, MatchClient, MatchHandle, MatchOutcome,
        ReconnectPolicy, SyncCursor,
    };
    pub use liqi_agent::{AgentOptions, ErrorPolicy};
    pub use liqi_heartbeat::HeartbeatConfig;
    pub use liqi_protocol::{FrameCodec, SchemaCatalog};
    pub use liqi_table::{
        Decision, EventKind, OperationList, Strategy, TableEvent, TableState, Tsumogiri,
    };
}
