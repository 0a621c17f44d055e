//! The pending-request table.
//!
//! Indices come from a ring of [`CORRELATION_SLOTS`] values. The first
//! request uses index 0; after the last slot the counter wraps to 0
//! again. With that many requests in flight at once, a new entry lands
//! on an index that is still pending and the older caller is orphaned.
//! That is logged, not prevented.

use std::collections::HashMap;

use liqi_protocol::CORRELATION_SLOTS;
use serde_json::Value;
use tokio::sync::oneshot;

/// One outstanding call.
pub(crate) struct PendingEntry {
    /// Fully qualified message name of the expected response.
    pub response_type: String,
    pub reply: oneshot::Sender<Value>,
}

#[derive(Default)]
pub(crate) struct PendingTable {
    entries: HashMap<u16, PendingEntry>,
    next_index: u16,
}

impl PendingTable {
    /// Stores `entry` under the next index and returns that index.
    pub fn insert(&mut self, entry: PendingEntry) -> u16 {
        let index = self.next_index;
        self.next_index = (self.next_index + 1) % CORRELATION_SLOTS;
        if let Some(orphan) = self.entries.insert(index, entry) {
            tracing::warn!(
                index,
                response_type = %orphan.response_type,
                "correlation index reused while still pending; older call orphaned"
            );
        }
        index
    }

    /// Removes and returns the entry for `index`, if any.
    pub fn take(&mut self, index: u16) -> Option<PendingEntry> {
        self.entries.remove(&index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(response_type: &str) -> (PendingEntry, oneshot::Receiver<Value>) {
        let (reply, rx) = oneshot::channel();
        let entry = PendingEntry {
            response_type: response_type.to_string(),
            reply,
        };
        (entry, rx)
    }

    #[test]
    fn test_insert_first_index_is_zero_then_increments() {
        let mut table = PendingTable::default();
        assert_eq!(table.insert(entry("a").0), 0);
        assert_eq!(table.insert(entry("b").0), 1);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_take_removes_exactly_once() {
        let mut table = PendingTable::default();
        let index = table.insert(entry("lq.ResCommon").0);
        let taken = table.take(index).unwrap();
        assert_eq!(taken.response_type, "lq.ResCommon");
        assert!(table.take(index).is_none());
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_insert_wraps_after_last_slot() {
        let mut table = PendingTable {
            next_index: CORRELATION_SLOTS - 1,
            ..Default::default()
        };
        assert_eq!(table.insert(entry("a").0), CORRELATION_SLOTS - 1);
        assert_eq!(table.insert(entry("b").0), 0);
    }

    #[test]
    fn test_insert_overwrite_orphans_older_entry() {
        let mut table = PendingTable::default();
        let (first, mut first_rx) = entry("old");
        table.insert(first);
        table.next_index = 0;
        table.insert(entry("new").0);

        assert_eq!(table.len(), 1);
        assert_eq!(table.take(0).unwrap().response_type, "new");
        // The orphaned sender was dropped.
        assert!(first_rx.try_recv().is_err());
    }
}
