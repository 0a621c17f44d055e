//! Table events and the bus that fans them out.

use std::collections::HashMap;
use std::fmt;

use tokio::sync::oneshot;

use crate::actions::{
    ActionAnGangAddGang, ActionBaBei, ActionChiPengGang, ActionDealTile, ActionDiscardTile,
    ActionHule, ActionLiuJu, ActionNewRound, ActionNoTile, NotifyGameEndResult, NotifyGameTerminate,
    OperationList,
};

/// Something the table applied, or a decision it is waiting for.
///
/// Events are published after the state change they describe, so a
/// subscriber reading the table sees the post-action state.
#[derive(Debug, Clone, PartialEq)]
pub enum TableEvent {
    NewRound(ActionNewRound),
    Deal(ActionDealTile),
    Discard(ActionDiscardTile),
    Call(ActionChiPengGang),
    Kan(ActionAnGangAddGang),
    Kita(ActionBaBei),
    Win(ActionHule),
    ExhaustiveDraw(ActionNoTile),
    AbortiveDraw(ActionLiuJu),
    GameEnd(NotifyGameEndResult),
    GameTerminated(NotifyGameTerminate),
    /// The server is waiting on the local player.
    TurnDecision(OperationList),
}

impl TableEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::NewRound(_) => EventKind::NewRound,
            Self::Deal(_) => EventKind::Deal,
            Self::Discard(_) => EventKind::Discard,
            Self::Call(_) => EventKind::Call,
            Self::Kan(_) => EventKind::Kan,
            Self::Kita(_) => EventKind::Kita,
            Self::Win(_) => EventKind::Win,
            Self::ExhaustiveDraw(_) => EventKind::ExhaustiveDraw,
            Self::AbortiveDraw(_) => EventKind::AbortiveDraw,
            Self::GameEnd(_) => EventKind::GameEnd,
            Self::GameTerminated(_) => EventKind::GameTerminated,
            Self::TurnDecision(_) => EventKind::TurnDecision,
        }
    }
}

/// The subscription key for a [`TableEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NewRound,
    Deal,
    Discard,
    Call,
    Kan,
    Kita,
    Win,
    ExhaustiveDraw,
    AbortiveDraw,
    GameEnd,
    GameTerminated,
    TurnDecision,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table-sub-{}", self.0)
    }
}

enum Subscriber {
    Handler(Box<dyn FnMut(&TableEvent) + Send>),
    Once(oneshot::Sender<TableEvent>),
}

/// Typed publish/subscribe for table events.
///
/// Delivery is synchronous and in registration order. One-shot
/// registrations made with [`next`](Self::next) remove themselves after
/// the first delivery.
#[derive(Default)]
pub struct EventBus {
    subscribers: HashMap<EventKind, Vec<(SubscriberId, Subscriber)>>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> SubscriberId {
        self.next_id += 1;
        SubscriberId(self.next_id)
    }

    pub fn subscribe<F>(&mut self, kind: EventKind, handler: F) -> SubscriberId
    where
        F: FnMut(&TableEvent) + Send + 'static,
    {
        let id = self.allocate();
        self.subscribers
            .entry(kind)
            .or_default()
            .push((id, Subscriber::Handler(Box::new(handler))));
        id
    }

    /// Returns `false` if `id` was not registered for `kind`.
    pub fn unsubscribe(&mut self, kind: EventKind, id: SubscriberId) -> bool {
        let Some(list) = self.subscribers.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(sub, _)| *sub != id);
        before != list.len()
    }

    /// Resolves with the next event of `kind`.
    pub fn next(&mut self, kind: EventKind) -> oneshot::Receiver<TableEvent> {
        let id = self.allocate();
        let (tx, rx) = oneshot::channel();
        self.subscribers
            .entry(kind)
            .or_default()
            .push((id, Subscriber::Once(tx)));
        rx
    }

    /// Delivers `event` and returns how many subscribers received it.
    pub fn publish(&mut self, event: &TableEvent) -> usize {
        let Some(list) = self.subscribers.remove(&event.kind()) else {
            return 0;
        };
        let mut delivered = 0;
        let mut kept = Vec::with_capacity(list.len());
        for (id, sub) in list {
            match sub {
                Subscriber::Handler(mut handler) => {
                    handler(event);
                    delivered += 1;
                    kept.push((id, Subscriber::Handler(handler)));
                }
                Subscriber::Once(tx) => {
                    if tx.send(event.clone()).is_ok() {
                        delivered += 1;
                    }
                }
            }
        }
        if !kept.is_empty() {
            self.subscribers.insert(event.kind(), kept);
        }
        delivered
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers.get(&kind).map_or(0, Vec::len)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("kinds", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn terminated() -> TableEvent {
        TableEvent::GameTerminated(NotifyGameTerminate {
            reason: "timeout".into(),
        })
    }

    #[test]
    fn test_publish_reaches_only_matching_kind() {
        let mut bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        bus.subscribe(EventKind::GameTerminated, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        bus.subscribe(EventKind::Deal, |_| panic!("wrong kind"));

        assert_eq!(bus.publish(&terminated()), 1);
        assert_eq!(bus.publish(&terminated()), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let mut bus = EventBus::new();
        let id = bus.subscribe(EventKind::GameTerminated, |_| panic!("unsubscribed"));
        assert!(bus.unsubscribe(EventKind::GameTerminated, id));
        assert!(!bus.unsubscribe(EventKind::GameTerminated, id));
        assert_eq!(bus.publish(&terminated()), 0);
    }

    #[test]
    fn test_next_resolves_once_then_unregisters() {
        let mut bus = EventBus::new();
        let mut rx = bus.next(EventKind::GameTerminated);
        assert_eq!(bus.subscriber_count(EventKind::GameTerminated), 1);

        bus.publish(&terminated());
        assert_eq!(rx.try_recv().unwrap(), terminated());
        assert_eq!(bus.subscriber_count(EventKind::GameTerminated), 0);
    }
}
