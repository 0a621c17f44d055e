//! Error types for the table layer.

use crate::meld::MeldKind;
use crate::phase::SessionPhase;
use crate::tile::Tile;

/// Errors raised while reconstructing table state.
///
/// Every variant that concerns a player carries the seat, and every
/// variant that concerns a tile carries the tile, so a single log line
/// is enough to find the offending action.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// A round-scoped accessor was called before the first round started.
    #[error("table uninitialized: {0} is not available before the first round")]
    Uninitialized(&'static str),

    /// Seats have not been assigned yet, or the account is not in the seat list.
    #[error("not seated at this table")]
    NotSeated,

    /// A tile string did not parse.
    #[error("invalid tile {0:?}")]
    InvalidTile(String),

    /// An action referenced a seat the table does not have.
    #[error("seat {seat} out of range for a {seats}-seat table")]
    SeatOutOfRange { seat: usize, seats: usize },

    /// The known hand does not contain the tile an action removes.
    #[error("seat {seat}: tile {tile} not in hand")]
    TileNotInHand { seat: usize, tile: Tile },

    /// An opponent's concealed count would go below zero.
    #[error("seat {seat}: concealed tile count would underflow")]
    HandUnderflow { seat: usize },

    /// A call claimed a discard that is not at the tail of the origin pond.
    #[error("seat {seat} called {expected} from seat {from}, but the pond tail is {found}")]
    CallMismatch {
        seat: usize,
        from: usize,
        expected: Tile,
        found: String,
    },

    /// An added kan named a tile with no matching open triplet.
    #[error("seat {seat}: no open triplet of {tile} to extend")]
    MissingTriplet { seat: usize, tile: Tile },

    /// A meld was built with the wrong number of tiles.
    #[error("{kind} needs {expected} tiles, got {found}")]
    MeldSize {
        kind: MeldKind,
        expected: usize,
        found: usize,
    },

    /// An action carried a meld type code this table does not know.
    #[error("{event}: unknown meld type {code}")]
    UnknownMeldType { event: &'static str, code: u32 },

    /// An action was well-formed on the wire but internally inconsistent.
    #[error("{event}: {reason}")]
    MalformedAction { event: &'static str, reason: String },

    /// A payload did not match the expected action shape.
    #[error("{event}: payload does not match: {source}")]
    Payload {
        event: String,
        #[source]
        source: serde_json::Error,
    },

    /// A session phase change that the lifecycle does not allow.
    #[error("invalid phase transition {from} -> {to}")]
    InvalidPhase { from: SessionPhase, to: SessionPhase },
}
