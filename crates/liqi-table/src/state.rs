//! The reconstructed table, read-only from the outside.

use serde_json::Value;

use crate::meld::{Meld, MeldId};
use crate::player::{AccountId, Hand, PlayerState};
use crate::{TableError, Tile};

/// Round counters from the last round start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoundInfo {
    /// Prevailing wind, 0 for east.
    pub wind: u32,
    /// Hand number within the wind. Also the dealer's seat.
    pub hand: u32,
    pub repeat: u32,
    pub riichi_sticks: u32,
}

impl RoundInfo {
    pub fn dealer(&self) -> usize {
        self.hand as usize
    }
}

/// Everything the client knows about the table.
///
/// Mutated only by [`Table`](crate::Table). Seat-scoped accessors fail with
/// [`TableError::NotSeated`] before seats are assigned; round-scoped ones
/// fail with [`TableError::Uninitialized`] before the first round starts.
#[derive(Debug, Clone, Default)]
pub struct TableState {
    pub(crate) self_seat: Option<usize>,
    pub(crate) seats: Vec<AccountId>,
    pub(crate) config: Value,
    pub(crate) players: Vec<PlayerState>,
    pub(crate) melds: Vec<Meld>,
    pub(crate) round: Option<RoundInfo>,
    pub(crate) dora_indicators: Vec<Tile>,
    pub(crate) tiles_left: u32,
}

impl TableState {
    // -----------------------------------------------------------------------
    // Seating
    // -----------------------------------------------------------------------

    /// The local player's seat.
    pub fn seat(&self) -> Result<usize, TableError> {
        self.self_seat.ok_or(TableError::NotSeated)
    }

    pub fn seat_count(&self) -> usize {
        self.seats.len()
    }

    pub fn is_three_player(&self) -> bool {
        self.seats.len() == 3
    }

    /// Seat of `account`, if seated.
    pub fn seat_of(&self, account: AccountId) -> Option<usize> {
        self.seats.iter().position(|a| *a == account)
    }

    pub fn players(&self) -> Result<&[PlayerState], TableError> {
        if self.players.is_empty() {
            return Err(TableError::NotSeated);
        }
        Ok(&self.players)
    }

    pub fn player(&self, seat: usize) -> Result<&PlayerState, TableError> {
        self.players.get(seat).ok_or(TableError::SeatOutOfRange {
            seat,
            seats: self.players.len(),
        })
    }

    pub fn self_player(&self) -> Result<&PlayerState, TableError> {
        self.player(self.seat()?)
    }

    /// The match configuration sent at authentication.
    pub fn config(&self) -> &Value {
        &self.config
    }

    /// East-only match, read from `mode.mode` in the configuration.
    pub fn is_east_only(&self) -> bool {
        self.config["mode"]["mode"].as_u64().is_some_and(|m| m % 10 == 1)
    }

    /// Ranked room id, from `meta.mode_id`.
    pub fn ranked_room(&self) -> Option<u64> {
        self.config["meta"]["mode_id"].as_u64()
    }

    // -----------------------------------------------------------------------
    // Round
    // -----------------------------------------------------------------------

    pub fn round(&self) -> Result<RoundInfo, TableError> {
        self.round.ok_or(TableError::Uninitialized("round"))
    }

    /// The local player's concealed tiles.
    pub fn hand(&self) -> Result<&[Tile], TableError> {
        self.round()?;
        match self.self_player()?.hand() {
            Hand::Known(tiles) => Ok(tiles),
            Hand::Concealed(_) => Err(TableError::NotSeated),
        }
    }

    pub fn dora_indicators(&self) -> Result<&[Tile], TableError> {
        self.round()?;
        Ok(&self.dora_indicators)
    }

    /// The tiles the current indicators point at.
    pub fn doras(&self) -> Result<Vec<Tile>, TableError> {
        let three = self.is_three_player();
        Ok(self
            .dora_indicators()?
            .iter()
            .map(|t| t.dora_successor(three))
            .collect())
    }

    pub fn tiles_left(&self) -> Result<u32, TableError> {
        self.round()?;
        Ok(self.tiles_left)
    }

    pub fn meld(&self, id: MeldId) -> Option<&Meld> {
        self.melds.get(id.0)
    }

    pub fn melds_of(&self, seat: usize) -> Result<Vec<&Meld>, TableError> {
        Ok(self
            .player(seat)?
            .meld_ids()
            .iter()
            .filter_map(|id| self.meld(*id))
            .collect())
    }

    /// Whether the local hand has no open melds. Closed kans and kita
    /// keep a hand closed.
    pub fn hand_is_closed(&self) -> Result<bool, TableError> {
        self.round()?;
        Ok(self
            .melds_of(self.seat()?)?
            .iter()
            .all(|m| !m.kind().is_open()))
    }

    /// Every tile the local player can see: the own hand, all melds, all
    /// ponds and the dora indicators.
    pub fn visible_tiles(&self) -> Result<Vec<Tile>, TableError> {
        let mut tiles = self.hand()?.to_vec();
        tiles.extend(self.melds.iter().flat_map(|m| m.tiles().iter().copied()));
        tiles.extend(self.players.iter().flat_map(|p| p.pond().iter().copied()));
        tiles.extend(self.dora_indicators.iter().copied());
        Ok(tiles)
    }

    // -----------------------------------------------------------------------
    // Mutation helpers for the state machine
    // -----------------------------------------------------------------------

    pub(crate) fn player_mut(&mut self, seat: usize) -> Result<&mut PlayerState, TableError> {
        let seats = self.players.len();
        self.players
            .get_mut(seat)
            .ok_or(TableError::SeatOutOfRange { seat, seats })
    }

    pub(crate) fn add_meld(&mut self, seat: usize, meld: Meld) -> Result<MeldId, TableError> {
        let id = MeldId(self.melds.len());
        self.player_mut(seat)?.melds.push(id);
        self.melds.push(meld);
        Ok(id)
    }

    pub(crate) fn meld_mut(&mut self, id: MeldId) -> Option<&mut Meld> {
        self.melds.get_mut(id.0)
    }
}
