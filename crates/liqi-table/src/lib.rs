//! Table state for liqi matches.
//!
//! The server never sends a snapshot of the table. It sends actions
//! (a round starts, a seat draws, discards, calls) and the client folds
//! them into its own picture. [`Table`] does that folding: feed it every
//! event in arrival order with [`Table::apply`] and read the result from
//! [`Table::state`].
//!
//! ```text
//! ActionNewRound ─┐
//! ActionDealTile ─┼─→ Table::apply ─→ TableState (seats, hands, ponds, melds, doras)
//! ActionDiscard… ─┘         │
//!                           └──→ EventBus ─→ TableEvent (incl. TurnDecision)
//! ```
//!
//! When the local player has choices, the action's payload carries an
//! operation list and the table emits a [`TableEvent::TurnDecision`].
//! A [`Strategy`] turns that into a [`Decision`], and
//! [`Decision::to_request`] into the request the agent sends.
//!
//! # Key types
//!
//! - [`Table`]: the state machine
//! - [`TableState`]: read-only view, with accessors that fail before the
//!   first round instead of returning empty data
//! - [`Tile`], [`Meld`], [`PlayerState`]: what the state is made of
//! - [`SessionPhase`]: authenticate, resync, play, end

pub mod actions;
mod decision;
mod error;
mod events;
mod machine;
mod meld;
mod phase;
mod player;
mod state;
mod strategy;
mod tile;

pub use actions::{OperationKind, OperationList};
pub use decision::{Decision, GAME_SERVICE, OutboundRequest};
pub use error::TableError;
pub use events::{EventBus, EventKind, SubscriberId, TableEvent};
pub use machine::{HANDLED_EVENTS, RIICHI_DEPOSIT, STARTING_HAND, Table};
pub use meld::{Meld, MeldId, MeldKind};
pub use phase::SessionPhase;
pub use player::{AccountId, Hand, PlayerState};
pub use state::{RoundInfo, TableState};
pub use strategy::{Strategy, Tsumogiri};
pub use tile::{Suit, Tile};
