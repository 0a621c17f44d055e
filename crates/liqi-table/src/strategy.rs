//! The seam for decision-making.

use crate::actions::{OperationKind, OperationList};
use crate::{Decision, TableState};

/// Chooses what to do when the server waits on the local player.
///
/// The driver calls `on_turn` for every turn decision, after the table
/// has applied the action that raised it. Returning `None` sends nothing
/// and lets the server's own timeout act.
pub trait Strategy: Send {
    fn on_turn(&mut self, table: &TableState, offer: &OperationList) -> Option<Decision>;
}

impl<F> Strategy for F
where
    F: FnMut(&TableState, &OperationList) -> Option<Decision> + Send,
{
    fn on_turn(&mut self, table: &TableState, offer: &OperationList) -> Option<Decision> {
        self(table, offer)
    }
}

/// Discards every drawn tile and passes on every call.
///
/// Enough to keep a seat alive through a match without stalling the
/// table on timeouts.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tsumogiri;

impl Strategy for Tsumogiri {
    fn on_turn(&mut self, table: &TableState, offer: &OperationList) -> Option<Decision> {
        if offer.offers(OperationKind::Discard) {
            let tile = *table.hand().ok()?.last()?;
            return Some(Decision::Discard { tile, moqie: true });
        }
        offer
            .operation_list
            .iter()
            .filter_map(|op| op.kind())
            .any(OperationKind::is_call)
            .then_some(Decision::Pass)
    }
}
