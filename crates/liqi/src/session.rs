//! One connection attempt, from dial to match end or disconnect.
//!
//! The flow is:
//!   1. Dial, and route the table's events into an ordered queue
//!   2. Start the keep-alive, stopped by the socket closing
//!   3. Authenticate → seat assignment and match config
//!   4. Match already running? Replay the archived log, then acknowledge.
//!      Otherwise enter the match.
//!   5. Loop: apply queued events, answer turn decisions
//!
//! Every request races the socket's close, so a dropped connection ends
//! the attempt with [`LiqiError::Disconnected`] instead of hanging.

use std::sync::Arc;

use liqi_agent::{Agent, AgentError, ErrorPolicy, response_error_code, session_credential};
use liqi_heartbeat::spawn_heartbeat;
use liqi_protocol::{FrameCodec, ProtocolError, bytes_from_value};
use liqi_table::{
    AccountId, GAME_SERVICE, HANDLED_EVENTS, SessionPhase, Strategy, Table, TableEvent,
};
use liqi_transport::Connector;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::{ClientConfig, LiqiError};

/// Closes the agent when the attempt ends, however it ends.
///
/// The keep-alive task holds its own agent handle, so dropping ours alone
/// would never close the socket.
struct CloseOnDrop(Agent);

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Everything an attempt borrows from the supervisor.
pub(crate) struct Attempt<'a, K: Connector, S: Strategy> {
    pub config: &'a ClientConfig,
    pub codec: &'a FrameCodec,
    pub connector: &'a Arc<K>,
    pub table: &'a mut Table,
    pub strategy: &'a mut S,
    pub number: u32,
}

impl<K: Connector, S: Strategy> Attempt<'_, K, S> {
    /// Runs the attempt. `Ok` means the match ended.
    pub async fn run(self) -> Result<(), LiqiError> {
        let agent = Agent::connect_with(
            Arc::clone(self.connector),
            self.config.endpoint.url.clone(),
            self.codec.clone(),
            self.config.agent.clone(),
        );
        let _guard = CloseOnDrop(agent.clone());
        tracing::info!(attempt = self.number, url = %self.config.endpoint.url, "connecting");

        // --- Step 1: route events in arrival order ---
        let (tx, mut events) = mpsc::unbounded_channel();
        for &name in HANDLED_EVENTS {
            let tx = tx.clone();
            agent.subscribe(name, move |payload| {
                let _ = tx.send((name, payload.clone()));
            });
        }
        drop(tx);

        // --- Step 2: keep-alive ---
        let pinger = agent.clone();
        let _keepalive = spawn_heartbeat(
            self.config.heartbeat.clone(),
            move |beat| {
                let agent = pinger.clone();
                async move {
                    tracing::trace!(beat, "keep-alive");
                    agent
                        .send_request(GAME_SERVICE, "checkNetworkDelay", &json!({}))
                        .await
                        .map(drop)
                }
            },
            agent.closed(),
        );

        let Self {
            config,
            codec,
            table,
            strategy,
            ..
        } = self;

        // --- Step 3: authenticate ---
        table.advance(SessionPhase::Authenticating)?;
        authenticate(&agent, config, table).await?;

        // --- Step 4: resync or enter ---
        if table.phase() == SessionPhase::Resyncing {
            resync(&agent, config, codec, table, strategy).await?;
        } else {
            call(&agent, "enterGame", json!({}), ErrorPolicy::Raise).await?;
            table.advance(SessionPhase::Live)?;
        }

        // --- Step 5: live ---
        let closed = agent.closed();
        tokio::pin!(closed);
        loop {
            tokio::select! {
                biased;
                next = events.recv() => {
                    let Some((name, payload)) = next else {
                        return Err(LiqiError::Disconnected(agent.closed().await));
                    };
                    let produced = apply(table, name, &payload)?;
                    act(&agent, table, strategy, produced).await?;
                    if table.is_ended() {
                        tracing::info!("match over");
                        return Ok(());
                    }
                }
                reason = &mut closed => return Err(LiqiError::Disconnected(reason)),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

async fn authenticate(
    agent: &Agent,
    config: &ClientConfig,
    table: &mut Table,
) -> Result<(), LiqiError> {
    let creds = &config.credentials;
    let gift = session_credential(&creds.token, creds.account_id, &creds.game_uuid);
    let res = call(
        agent,
        "authGame",
        json!({
            "account_id": creds.account_id,
            "token": creds.token,
            "game_uuid": creds.game_uuid,
            "gift": gift,
        }),
        ErrorPolicy::ReturnAsData,
    )
    .await?;
    if let Some(code) = response_error_code(&res) {
        tracing::error!(code, account_id = creds.account_id, "authentication rejected");
        return Err(LiqiError::AuthRejected { code });
    }

    let seat_list = res["seat_list"]
        .as_array()
        .ok_or_else(|| malformed("authGame", "no seat_list"))?
        .iter()
        .map(|id| id.as_u64().and_then(|id| u32::try_from(id).ok()))
        .collect::<Option<Vec<u32>>>()
        .ok_or_else(|| malformed("authGame", "seat_list holds a non-account value"))?;
    let config_value = res.get("game_config").cloned().unwrap_or(Value::Null);
    table.seat_players(AccountId(creds.account_id), &seat_list, config_value)?;

    let in_progress = res["is_game_start"].as_bool().unwrap_or(false);
    if in_progress {
        table.advance(SessionPhase::Resyncing)?;
    }
    tracing::info!(in_progress, "authenticated");
    Ok(())
}

async fn resync<S: Strategy>(
    agent: &Agent,
    config: &ClientConfig,
    codec: &FrameCodec,
    table: &mut Table,
    strategy: &mut S,
) -> Result<(), LiqiError> {
    let res = call(
        agent,
        "syncGame",
        json!({
            "round_id": config.sync_cursor.round_id,
            "step": config.sync_cursor.step,
        }),
        ErrorPolicy::Raise,
    )
    .await?;

    let actions = res["game_restore"]["actions"]
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or_default();
    tracing::info!(actions = actions.len(), "replaying archived log");

    table.begin_replay();
    for action in actions {
        let name = action["name"]
            .as_str()
            .ok_or_else(|| malformed("syncGame", "archived action without a name"))?;
        let data = bytes_from_value(&action["data"]).ok_or_else(|| ProtocolError::InvalidValue {
            message: "ActionPrototype".to_string(),
            field: "data".to_string(),
            reason: "expected bytes".to_string(),
        })?;
        let event = codec.decode_archived_action(name, &data)?;
        apply(table, &event.name, &event.payload)?;
    }

    call(agent, "finishSyncGame", json!({}), ErrorPolicy::Raise).await?;
    let pending = table.finish_replay();
    table.advance(SessionPhase::Live)?;
    act(agent, table, strategy, pending.into_iter().collect()).await
}

fn apply(table: &mut Table, name: &str, payload: &Value) -> Result<Vec<TableEvent>, LiqiError> {
    table.apply(name, payload).map_err(|e| {
        tracing::error!(event = name, error = %e, "table out of sync with server");
        LiqiError::Table(e)
    })
}

/// Hands every turn decision in `events` to the strategy and sends its answer.
async fn act<S: Strategy>(
    agent: &Agent,
    table: &mut Table,
    strategy: &mut S,
    events: Vec<TableEvent>,
) -> Result<(), LiqiError> {
    for event in events {
        let TableEvent::TurnDecision(offer) = event else {
            continue;
        };
        let Some(decision) = strategy.on_turn(table.state(), &offer) else {
            tracing::debug!("strategy passed on the turn");
            continue;
        };
        let request = decision.to_request();
        tracing::debug!(method = request.method, ?decision, "sending decision");
        let res = call(agent, request.method, request.fields, ErrorPolicy::ReturnAsData).await?;
        if let Some(code) = response_error_code(&res) {
            tracing::warn!(code, method = request.method, "decision refused");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Calls a game method, racing the socket's close.
async fn call(
    agent: &Agent,
    method: &'static str,
    fields: Value,
    policy: ErrorPolicy,
) -> Result<Value, LiqiError> {
    let closed = agent.closed();
    tokio::select! {
        biased;
        reply = agent.send_request_with(GAME_SERVICE, method, &fields, policy) => match reply {
            Ok(value) => Ok(value),
            Err(AgentError::Closed) => Err(LiqiError::Disconnected(agent.closed().await)),
            Err(e) => Err(e.into()),
        },
        reason = closed => Err(LiqiError::Disconnected(reason)),
    }
}

fn malformed(method: &'static str, reason: &str) -> LiqiError {
    LiqiError::MalformedResponse {
        method,
        reason: reason.to_string(),
    }
}
