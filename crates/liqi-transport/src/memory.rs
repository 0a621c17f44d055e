//! In-process connection pair.
//!
//! Two [`MemoryConnection`] ends joined by unbounded channels. Used to run
//! the agent and the match driver against a scripted peer without sockets.

use std::collections::VecDeque;

use tokio::sync::{Mutex, mpsc, watch};

use crate::{Connection, ConnectionId, Connector, TransportError};

/// One end of an in-memory duplex frame channel.
pub struct MemoryConnection {
    id: ConnectionId,
    tx: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    rx: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    closed: watch::Sender<bool>,
}

impl MemoryConnection {
    /// Creates two connected ends. Frames sent on one are received on the other.
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (Self::new(a_tx, a_rx), Self::new(b_tx, b_rx))
    }

    fn new(tx: mpsc::UnboundedSender<Vec<u8>>, rx: mpsc::UnboundedReceiver<Vec<u8>>) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            id: ConnectionId::next(),
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(rx),
            closed,
        }
    }
}

impl Connection for MemoryConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let guard = self.tx.lock().await;
        let tx = guard
            .as_ref()
            .ok_or_else(|| TransportError::ConnectionClosed("closed locally".into()))?;
        tx.send(data.to_vec())
            .map_err(|_| TransportError::ConnectionClosed("peer dropped".into()))
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Ok(None);
        }
        let mut rx = self.rx.lock().await;
        tokio::select! {
            frame = rx.recv() => Ok(frame),
            _ = closed.changed() => Ok(None),
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.tx.lock().await.take();
        self.closed.send_replace(true);
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

/// A [`Connector`] that hands out pre-built [`MemoryConnection`]s in order.
///
/// Dialing after the queue is exhausted fails, which lets tests observe a
/// bounded reconnect loop giving up.
#[derive(Default)]
pub struct MemoryConnector {
    queue: Mutex<VecDeque<MemoryConnection>>,
    dialed: Mutex<Vec<String>>,
}

impl MemoryConnector {
    /// Creates a connector that will return `connections` one per dial.
    pub fn new(connections: impl IntoIterator<Item = MemoryConnection>) -> Self {
        Self {
            queue: Mutex::new(connections.into_iter().collect()),
            dialed: Mutex::new(Vec::new()),
        }
    }

    /// URLs dialed so far, in order.
    pub async fn dialed(&self) -> Vec<String> {
        self.dialed.lock().await.clone()
    }
}

impl Connector for MemoryConnector {
    type Connection = MemoryConnection;

    async fn connect(&self, url: &str) -> Result<Self::Connection, TransportError> {
        self.dialed.lock().await.push(url.to_string());
        self.queue
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| TransportError::ConnectFailed {
                url: url.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "no scripted connection left",
                ),
            })
    }
}
