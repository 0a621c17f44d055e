//! [`MatchClient`]: plays one match, reconnecting as needed.

use std::sync::Arc;

use liqi_protocol::FrameCodec;
use liqi_table::{Strategy, Table};
use liqi_transport::{Connector, WebSocketConnector};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::session::Attempt;
use crate::{ClientConfig, LiqiError};

/// How a finished match left the client.
#[derive(Debug)]
pub struct MatchOutcome {
    /// The table as of the match-ending notification.
    pub table: Table,
    /// Connections used, the first included.
    pub attempts: u32,
}

/// Drives a match from authentication to the end.
///
/// Each connection attempt authenticates, resyncs if the match is already
/// running, and plays until the match ends or the socket drops. A dropped
/// socket starts a new attempt right away, for as long as the
/// [`ReconnectPolicy`](crate::ReconnectPolicy) allows. Protocol violations,
/// a rejected credential and table desynchronisation end the run.
pub struct MatchClient<K: Connector, S: Strategy> {
    config: ClientConfig,
    codec: FrameCodec,
    connector: Arc<K>,
    strategy: S,
    table: Table,
}

impl<S: Strategy> MatchClient<WebSocketConnector, S> {
    /// A client that dials over WebSocket.
    pub fn new(config: ClientConfig, codec: FrameCodec, strategy: S) -> Self {
        Self::with_connector(config, codec, Arc::new(WebSocketConnector), strategy)
    }
}

impl<K: Connector, S: Strategy> MatchClient<K, S> {
    pub fn with_connector(
        config: ClientConfig,
        codec: FrameCodec,
        connector: Arc<K>,
        strategy: S,
    ) -> Self {
        Self {
            config,
            codec,
            connector,
            strategy,
            table: Table::new(),
        }
    }

    /// The table, for subscribing to its events before [`run`](Self::run).
    pub fn table_mut(&mut self) -> &mut Table {
        &mut self.table
    }

    /// Plays the match to its end.
    ///
    /// # Errors
    /// - [`LiqiError::ReconnectExhausted`] when the policy runs out
    /// - [`LiqiError::AuthRejected`] when the credential is refused
    /// - [`LiqiError::Table`] when the table desynchronises
    /// - [`LiqiError::Disconnected`] for protocol violations
    pub async fn run(mut self) -> Result<MatchOutcome, LiqiError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let result = Attempt {
                config: &self.config,
                codec: &self.codec,
                connector: &self.connector,
                table: &mut self.table,
                strategy: &mut self.strategy,
                number: attempts,
            }
            .run()
            .await;

            match result {
                Ok(()) => {
                    tracing::info!(attempts, "match finished");
                    return Ok(MatchOutcome {
                        table: self.table,
                        attempts,
                    });
                }
                Err(LiqiError::Disconnected(reason)) if reason.is_recoverable() => {
                    if self.table.is_ended() {
                        return Ok(MatchOutcome {
                            table: self.table,
                            attempts,
                        });
                    }
                    if !self.config.reconnect.allows_another(attempts) {
                        tracing::error!(attempts, %reason, "reconnect attempts exhausted");
                        return Err(LiqiError::ReconnectExhausted { attempts, last: reason });
                    }
                    tracing::warn!(attempt = attempts, %reason, "connection lost, reconnecting");
                }
                Err(e) => {
                    tracing::error!(attempts, error = %e, "match aborted");
                    return Err(e);
                }
            }
        }
    }
}

impl<K: Connector, S: Strategy + 'static> MatchClient<K, S> {
    /// Runs the match on a new task.
    pub fn spawn(self) -> MatchHandle {
        let (cancel, cancelled) = oneshot::channel::<()>();
        let join = tokio::spawn(async move {
            tokio::select! {
                result = self.run() => result,
                _ = cancelled => {
                    tracing::info!("match cancelled");
                    Err(LiqiError::Cancelled)
                }
            }
        });
        MatchHandle {
            cancel: Some(cancel),
            join,
        }
    }
}

/// A match running on its own task.
///
/// Dropping the handle cancels the match.
#[derive(Debug)]
pub struct MatchHandle {
    cancel: Option<oneshot::Sender<()>>,
    join: JoinHandle<Result<MatchOutcome, LiqiError>>,
}

impl MatchHandle {
    /// Stops the match. [`join`](Self::join) then returns
    /// [`LiqiError::Cancelled`].
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel.take() {
            let _ = tx.send(());
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Waits for the match task to finish.
    pub async fn join(self) -> Result<MatchOutcome, LiqiError> {
        let Self { cancel, join } = self;
        let result = join.await;
        drop(cancel);
        result?
    }
}
