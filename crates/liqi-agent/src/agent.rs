//! [`Agent`]: the handle, and the I/O task behind it.
//!
//! The handle is cheap to clone. All clones talk to one I/O task, which
//! owns the connection and runs a `select!` loop over two sources:
//!
//! ```text
//!            ┌──────────── outbound commands (Send / Close)
//!  I/O task ─┤
//!            └──────────── inbound frames → dispatch
//!                                            ├─ Response     → pending table → caller
//!                                            ├─ Notification → subscribers (in order)
//!                                            └─ Request      → fatal
//! ```
//!
//! Subscriber handlers run on the I/O task, one frame at a time, so a
//! handler always finishes before the next frame is decoded.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use liqi_protocol::{FrameCodec, InboundFrame, Notification};
use liqi_transport::{Connection, Connector};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};

use crate::pending::{PendingEntry, PendingTable};
use crate::subscribers::SubscriberRegistry;
use crate::{AgentError, AgentOptions, CloseReason, ConnectionState, ErrorPolicy, SubscriptionId};

enum Command {
    Send(Vec<u8>),
    Close,
}

struct Inner {
    codec: FrameCodec,
    options: AgentOptions,
    pending: Mutex<PendingTable>,
    subscribers: Mutex<SubscriberRegistry>,
    state: watch::Sender<ConnectionState>,
    close_reason: watch::Sender<Option<CloseReason>>,
    commands: mpsc::UnboundedSender<Command>,
}

/// Lock helper: a handler that panicked does not poison the agent.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A connection to the game gateway.
///
/// See the [crate docs](crate) for the model.
#[derive(Clone)]
pub struct Agent {
    inner: Arc<Inner>,
}

impl Agent {
    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    fn new(
        codec: FrameCodec,
        options: AgentOptions,
        state: ConnectionState,
    ) -> (Self, mpsc::UnboundedReceiver<Command>) {
        let (commands, rx) = mpsc::unbounded_channel();
        let inner = Inner {
            codec,
            options,
            pending: Mutex::new(PendingTable::default()),
            subscribers: Mutex::new(SubscriberRegistry::default()),
            state: watch::channel(state).0,
            close_reason: watch::channel(None).0,
            commands,
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            rx,
        )
    }

    /// Dials `url` over WebSocket. The agent starts in `Connecting`; see
    /// [`connect_with`](Self::connect_with).
    pub fn connect(url: impl Into<String>, codec: FrameCodec, options: AgentOptions) -> Self {
        Self::connect_with(Arc::new(liqi_transport::WebSocketConnector), url, codec, options)
    }

    /// Dials `url` through `connector` on a background task.
    ///
    /// Returns immediately in `Connecting`. Calls made now wait for the
    /// socket to open; if the dial fails the agent moves to `Closed` with
    /// [`CloseReason::Transport`] and those calls fail.
    pub fn connect_with<K: Connector>(
        connector: Arc<K>,
        url: impl Into<String>,
        codec: FrameCodec,
        options: AgentOptions,
    ) -> Self {
        let url = url.into();
        let (agent, commands) = Self::new(codec, options, ConnectionState::Connecting);
        let inner = Arc::clone(&agent.inner);
        tokio::spawn(async move {
            tracing::debug!(%url, "dialing");
            match connector.connect(&url).await {
                Ok(conn) => run_io(inner, conn, commands).await,
                Err(e) => {
                    tracing::warn!(%url, error = %e, "dial failed");
                    inner.finish(CloseReason::Transport(e.to_string()));
                }
            }
        });
        agent
    }

    /// Wraps a connection that is already open.
    pub fn from_connection<C: Connection>(
        conn: C,
        codec: FrameCodec,
        options: AgentOptions,
    ) -> Self {
        let (agent, commands) = Self::new(codec, options, ConnectionState::Connecting);
        tokio::spawn(run_io(Arc::clone(&agent.inner), conn, commands));
        agent
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn codec(&self) -> &FrameCodec {
        &self.inner.codec
    }

    /// Waits until the connection is `Open`.
    ///
    /// # Errors
    /// [`AgentError::Closed`] if the agent reaches `Closing` or `Closed`
    /// first (or already has).
    pub async fn wait_open(&self) -> Result<(), AgentError> {
        let mut rx = self.inner.state.subscribe();
        let open = rx
            .wait_for(|s| *s != ConnectionState::Connecting)
            .await
            .map(|s| *s == ConnectionState::Open)
            .unwrap_or(false);
        if open { Ok(()) } else { Err(AgentError::Closed) }
    }

    /// Resolves with the reason once the connection has fully closed.
    ///
    /// The returned future does not borrow the agent, so it can be moved
    /// into other tasks (a heartbeat, a `select!` arm).
    pub fn closed(&self) -> impl Future<Output = CloseReason> + Send + 'static {
        let mut rx = self.inner.close_reason.subscribe();
        async move {
            match rx.wait_for(Option::is_some).await {
                Ok(reason) => reason.clone().unwrap_or(CloseReason::Local),
                Err(_) => CloseReason::Local,
            }
        }
    }

    /// The close reason, if the connection has closed.
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.inner.close_reason.borrow().clone()
    }

    /// Asks the I/O task to close the socket. Returns immediately; await
    /// [`closed`](Self::closed) to observe completion.
    pub fn close(&self) {
        let _ = self.inner.commands.send(Command::Close);
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    /// Calls `service.method` using the agent's default [`ErrorPolicy`].
    pub async fn send_request(
        &self,
        service: &str,
        method: &str,
        fields: &Value,
    ) -> Result<Value, AgentError> {
        self.send_request_with(service, method, fields, self.inner.options.error_policy)
            .await
    }

    /// Calls `service.method` and waits for the matching response.
    ///
    /// The request is encoded before anything else, so a method the catalog
    /// lacks fails immediately. The call then waits for `Open`.
    ///
    /// A response that never arrives (the socket closed first, or the
    /// index was reused) leaves this future pending; race it against
    /// [`closed`](Self::closed) when that matters.
    pub async fn send_request_with(
        &self,
        service: &str,
        method: &str,
        fields: &Value,
        policy: ErrorPolicy,
    ) -> Result<Value, AgentError> {
        let request = self.inner.codec.encode_request(service, method, fields)?;
        self.wait_open().await?;

        let (reply, response) = oneshot::channel();
        let index = lock(&self.inner.pending).insert(PendingEntry {
            response_type: request.response_type.clone(),
            reply,
        });
        tracing::debug!(index, method = %request.method, "request sent");
        self.inner
            .commands
            .send(Command::Send(request.to_frame(index)))
            .map_err(|_| AgentError::Closed)?;

        let response = response.await.map_err(|_| AgentError::Closed)?;
        policy.apply(response)
    }

    /// Number of calls still waiting for their response.
    pub fn pending_requests(&self) -> usize {
        lock(&self.inner.pending).len()
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    /// Calls `handler` with the payload of every `event` notification.
    ///
    /// `event` is the local name, without the namespace prefix
    /// (`ActionDiscardTile`, not `.lq.ActionDiscardTile`).
    pub fn subscribe<F>(&self, event: &str, handler: F) -> SubscriptionId
    where
        F: FnMut(&Value) + Send + 'static,
    {
        let id = lock(&self.inner.subscribers).subscribe(event, Box::new(handler));
        tracing::trace!(%event, %id, "subscribed");
        id
    }

    /// Removes one registration. Returns `false` if it was not found.
    pub fn unsubscribe(&self, event: &str, id: SubscriptionId) -> bool {
        lock(&self.inner.subscribers).unsubscribe(event, id)
    }

    /// Resolves with the payload of the next `event` notification.
    ///
    /// The registration happens when this method is called, not when the
    /// future is first polled, so an event arriving in between is not
    /// missed. The registration removes itself after delivery.
    pub fn await_next(
        &self,
        event: &str,
    ) -> impl Future<Output = Result<Value, AgentError>> + Send + 'static {
        let (_, rx) = lock(&self.inner.subscribers).subscribe_once(event);
        async move { rx.await.map_err(|_| AgentError::Closed) }
    }

    /// Number of registrations for `event`.
    pub fn subscriber_count(&self, event: &str) -> usize {
        lock(&self.inner.subscribers).count(event)
    }
}

// ---------------------------------------------------------------------------
// I/O task
// ---------------------------------------------------------------------------

impl Inner {
    fn set_state(&self, next: ConnectionState) {
        self.state.send_if_modified(|state| {
            if state.can_transition_to(next) {
                tracing::debug!(from = %state, to = %next, "agent state");
                *state = next;
                true
            } else {
                false
            }
        });
    }

    fn finish(&self, reason: CloseReason) {
        tracing::info!(%reason, "agent closed");
        self.close_reason.send_replace(Some(reason));
        self.set_state(ConnectionState::Closed);
    }

    fn dispatch_frame(&self, bytes: &[u8]) -> Result<(), AgentError> {
        match self.codec.decode_frame(bytes)? {
            InboundFrame::Notification { name, payload } => {
                for event in self.codec.decode_notification(&name, &payload)? {
                    self.publish(&event);
                }
            }
            InboundFrame::Response { index, payload } => {
                let Some(entry) = lock(&self.pending).take(index) else {
                    tracing::debug!(index, "response for no pending request, ignoring");
                    return Ok(());
                };
                let value = self.codec.decode_payload(&entry.response_type, &payload)?;
                tracing::debug!(index, response_type = %entry.response_type, "response received");
                let _ = entry.reply.send(value);
            }
            InboundFrame::Request { index, name, .. } => {
                return Err(AgentError::UnexpectedRequest { index, name });
            }
        }
        Ok(())
    }

    fn publish(&self, event: &Notification) {
        // Collect first, deliver after the lock is released, so handlers
        // may subscribe and unsubscribe.
        let targets = lock(&self.subscribers).targets(&event.name);
        tracing::trace!(event = %event.name, subscribers = targets.len(), "notification");
        for target in targets {
            target.deliver(&event.payload);
        }
    }
}

async fn run_io<C: Connection>(
    inner: Arc<Inner>,
    conn: C,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let conn_id = conn.id();
    inner.set_state(ConnectionState::Open);
    tracing::info!(%conn_id, "agent open");

    let reason = loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Send(frame)) => {
                    if let Err(e) = conn.send(&frame).await {
                        break CloseReason::Transport(e.to_string());
                    }
                }
                Some(Command::Close) | None => break CloseReason::Local,
            },
            frame = conn.recv() => match frame {
                Ok(Some(bytes)) => {
                    if let Err(e) = inner.dispatch_frame(&bytes) {
                        tracing::error!(%conn_id, error = %e, "fatal inbound frame");
                        break CloseReason::Protocol(e.to_string());
                    }
                }
                Ok(None) => break CloseReason::Remote,
                Err(e) => break CloseReason::Transport(e.to_string()),
            },
        }
    };

    inner.set_state(ConnectionState::Closing);
    if let Err(e) = conn.close().await {
        tracing::debug!(%conn_id, error = %e, "close failed");
    }
    inner.finish(reason);
}
