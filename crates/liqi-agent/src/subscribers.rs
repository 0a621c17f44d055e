//! Notification subscribers, keyed by local event name.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tokio::sync::oneshot;

/// Identifies one registration, for [`Agent::unsubscribe`](crate::Agent::unsubscribe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

pub(crate) type Handler = Arc<Mutex<Box<dyn FnMut(&Value) + Send>>>;

enum Entry {
    Handler(Handler),
    Once(oneshot::Sender<Value>),
}

/// What a single publish must deliver to.
pub(crate) enum Target {
    Handler(Handler),
    Once(oneshot::Sender<Value>),
}

impl Target {
    pub fn deliver(self, payload: &Value) {
        match self {
            Self::Handler(handler) => {
                let mut handler = handler.lock().unwrap_or_else(PoisonError::into_inner);
                (*handler)(payload);
            }
            Self::Once(tx) => {
                let _ = tx.send(payload.clone());
            }
        }
    }
}

#[derive(Default)]
pub(crate) struct SubscriberRegistry {
    by_name: HashMap<String, Vec<(SubscriptionId, Entry)>>,
    next_id: u64,
}

impl SubscriberRegistry {
    fn allocate(&mut self) -> SubscriptionId {
        self.next_id += 1;
        SubscriptionId(self.next_id)
    }

    pub fn subscribe(
        &mut self,
        name: &str,
        handler: Box<dyn FnMut(&Value) + Send>,
    ) -> SubscriptionId {
        let id = self.allocate();
        self.by_name
            .entry(name.to_string())
            .or_default()
            .push((id, Entry::Handler(Arc::new(Mutex::new(handler)))));
        id
    }

    pub fn subscribe_once(&mut self, name: &str) -> (SubscriptionId, oneshot::Receiver<Value>) {
        let id = self.allocate();
        let (tx, rx) = oneshot::channel();
        self.by_name
            .entry(name.to_string())
            .or_default()
            .push((id, Entry::Once(tx)));
        (id, rx)
    }

    /// Returns `false` if `id` was not registered under `name`.
    pub fn unsubscribe(&mut self, name: &str, id: SubscriptionId) -> bool {
        let Some(entries) = self.by_name.get_mut(name) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            self.by_name.remove(name);
        }
        removed
    }

    /// Collects the delivery targets for one event, in registration
    /// order. One-shot entries are removed here.
    pub fn targets(&mut self, name: &str) -> Vec<Target> {
        let Some(entries) = self.by_name.remove(name) else {
            return Vec::new();
        };
        let mut targets = Vec::with_capacity(entries.len());
        let mut kept = Vec::with_capacity(entries.len());
        for (id, entry) in entries {
            match entry {
                Entry::Handler(handler) => {
                    targets.push(Target::Handler(Arc::clone(&handler)));
                    kept.push((id, Entry::Handler(handler)));
                }
                Entry::Once(tx) => targets.push(Target::Once(tx)),
            }
        }
        if !kept.is_empty() {
            self.by_name.insert(name.to_string(), kept);
        }
        targets
    }

    pub fn count(&self, name: &str) -> usize {
        self.by_name.get(name).map_or(0, Vec::len)
    }
}
