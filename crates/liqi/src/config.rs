//! Client configuration.

use liqi_agent::AgentOptions;
use liqi_heartbeat::HeartbeatConfig;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// Where to dial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub url: String,
}

impl Endpoint {
    /// The lobby gateway on `host`.
    pub fn lobby(host: &str) -> Self {
        Self {
            url: format!("wss://{host}/gateway"),
        }
    }

    /// The in-match gateway on `host`.
    pub fn game(host: &str) -> Self {
        Self {
            url: format!("wss://{host}/game-gateway-zone"),
        }
    }

    pub fn url(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// What the lobby hands out when a match is found.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub account_id: u32,
    pub token: String,
    pub game_uuid: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("account_id", &self.account_id)
            .field("token", &"<redacted>")
            .field("game_uuid", &self.game_uuid)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ReconnectPolicy
// ---------------------------------------------------------------------------

/// How many times to dial before giving up.
///
/// The default never gives up and dials again immediately, matching the
/// official client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Total connection attempts, the first included. `None` is unbounded.
    pub max_attempts: Option<u32>,
}

impl ReconnectPolicy {
    pub fn unbounded() -> Self {
        Self { max_attempts: None }
    }

    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts),
        }
    }

    /// Whether another attempt may follow `made` attempts.
    pub fn allows_another(&self, made: u32) -> bool {
        self.max_attempts.is_none_or(|max| made < max)
    }
}

// ---------------------------------------------------------------------------
// SyncCursor
// ---------------------------------------------------------------------------

/// Bounds for the archived log requested on resync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursor {
    /// `"-1"` asks for the current round.
    pub round_id: String,
    /// Highest step to include.
    pub step: u32,
}

impl Default for SyncCursor {
    fn default() -> Self {
        Self {
            round_id: "-1".to_string(),
            step: 1_000_000,
        }
    }
}

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: Endpoint,
    pub credentials: Credentials,
    pub agent: AgentOptions,
    pub heartbeat: HeartbeatConfig,
    pub reconnect: ReconnectPolicy,
    pub sync_cursor: SyncCursor,
}

impl ClientConfig {
    /// A config with default agent, heartbeat, reconnect and sync settings.
    pub fn new(endpoint: Endpoint, credentials: Credentials) -> Self {
        Self {
            endpoint,
            credentials,
            agent: AgentOptions::default(),
            heartbeat: HeartbeatConfig::default(),
            reconnect: ReconnectPolicy::default(),
            sync_cursor: SyncCursor::default(),
        }
    }

    pub fn with_heartbeat(mut self, heartbeat: HeartbeatConfig) -> Self {
        self.heartbeat = heartbeat.validated();
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_agent_options(mut self, agent: AgentOptions) -> Self {
        self.agent = agent;
        self
    }

    pub fn with_sync_cursor(mut self, cursor: SyncCursor) -> Self {
        self.sync_cursor = cursor;
        self
    }
}
