//! Per-seat state.

use std::fmt;

use crate::meld::MeldId;
use crate::{TableError, Tile};

/// A game account number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountId(pub u32);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "account-{}", self.0)
    }
}

/// What is known about a seat's concealed tiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hand {
    /// The local player's hand, tile by tile.
    Known(Vec<Tile>),
    /// An opponent's hand: only the count is visible.
    Concealed(usize),
}

impl Hand {
    pub fn len(&self) -> usize {
        match self {
            Self::Known(tiles) => tiles.len(),
            Self::Concealed(n) => *n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The tiles, if this hand is known.
    pub fn tiles(&self) -> Option<&[Tile]> {
        match self {
            Self::Known(tiles) => Some(tiles),
            Self::Concealed(_) => None,
        }
    }

    /// Adds a tile. For a concealed hand only the count changes.
    pub(crate) fn push(&mut self, tile: Tile) {
        match self {
            Self::Known(tiles) => tiles.push(tile),
            Self::Concealed(n) => *n += 1,
        }
    }

    /// An opponent's draw.
    pub(crate) fn draw_unseen(&mut self) {
        if let Self::Concealed(n) = self {
            *n += 1;
        }
    }

    /// Removes one tile equal to `tile`, bonus flag included.
    ///
    /// A concealed hand only loses one from its count.
    pub(crate) fn remove_exact(&mut self, seat: usize, tile: &Tile) -> Result<(), TableError> {
        self.remove_where(seat, tile, |held| held.strictly_matches(tile))
    }

    /// Removes one tile with the same face as `tile`, bonus flag ignored.
    /// Returns the tile that was actually held.
    pub(crate) fn remove_matching(&mut self, seat: usize, tile: &Tile) -> Result<Tile, TableError> {
        match self {
            Self::Known(tiles) => {
                let pos = tiles
                    .iter()
                    .position(|held| held.strictly_matches(tile))
                    .or_else(|| tiles.iter().position(|held| held.matches(tile)))
                    .ok_or(TableError::TileNotInHand { seat, tile: *tile })?;
                Ok(tiles.remove(pos))
            }
            Self::Concealed(n) => {
                *n = n.checked_sub(1).ok_or(TableError::HandUnderflow { seat })?;
                Ok(*tile)
            }
        }
    }

    fn remove_where(
        &mut self,
        seat: usize,
        tile: &Tile,
        pred: impl Fn(&Tile) -> bool,
    ) -> Result<(), TableError> {
        match self {
            Self::Known(tiles) => {
                let pos = tiles
                    .iter()
                    .position(pred)
                    .ok_or(TableError::TileNotInHand { seat, tile: *tile })?;
                tiles.remove(pos);
            }
            Self::Concealed(n) => {
                *n = n.checked_sub(1).ok_or(TableError::HandUnderflow { seat })?;
            }
        }
        Ok(())
    }
}

/// One seat at the table.
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub(crate) account_id: AccountId,
    pub(crate) is_self: bool,
    pub(crate) score: i32,
    pub(crate) hand: Hand,
    pub(crate) pond: Vec<Tile>,
    pub(crate) discard_log: Vec<Tile>,
    pub(crate) melds: Vec<MeldId>,
    pub(crate) riichi_tile: Option<Tile>,
    pub(crate) kita_count: u32,
    pub(crate) revealed_hand: Option<Vec<Tile>>,
}

impl PlayerState {
    pub(crate) fn new(account_id: AccountId, is_self: bool) -> Self {
        Self {
            account_id,
            is_self,
            score: 0,
            hand: if is_self {
                Hand::Known(Vec::new())
            } else {
                Hand::Concealed(0)
            },
            pond: Vec::new(),
            discard_log: Vec::new(),
            melds: Vec::new(),
            riichi_tile: None,
            kita_count: 0,
            revealed_hand: None,
        }
    }

    /// Clears everything round-scoped. The score is kept.
    pub(crate) fn reset_round(&mut self, hand: Hand) {
        self.hand = hand;
        self.pond.clear();
        self.discard_log.clear();
        self.melds.clear();
        self.riichi_tile = None;
        self.kita_count = 0;
        self.revealed_hand = None;
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub fn is_self(&self) -> bool {
        self.is_self
    }

    pub fn score(&self) -> i32 {
        self.score
    }

    pub fn hand(&self) -> &Hand {
        &self.hand
    }

    /// Number of tiles in the concealed hand.
    pub fn concealed_count(&self) -> usize {
        self.hand.len()
    }

    /// Discards still lying in front of the seat. Called tiles leave the pond.
    pub fn pond(&self) -> &[Tile] {
        &self.pond
    }

    /// Every discard of the round, including those later called.
    pub fn discard_log(&self) -> &[Tile] {
        &self.discard_log
    }

    pub fn meld_ids(&self) -> &[MeldId] {
        &self.melds
    }

    /// The discard that declared riichi, once declared.
    pub fn riichi_tile(&self) -> Option<&Tile> {
        self.riichi_tile.as_ref()
    }

    pub fn is_riichi(&self) -> bool {
        self.riichi_tile.is_some()
    }

    pub fn kita_count(&self) -> u32 {
        self.kita_count
    }

    /// An opponent's hand as shown at a win or exhaustive draw.
    pub fn revealed_hand(&self) -> Option<&[Tile]> {
        self.revealed_hand.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> Tile {
        s.parse().unwrap()
    }

    #[test]
    fn test_remove_exact_respects_bonus_flag() {
        let mut hand = Hand::Known(vec![t("0m"), t("5m")]);
        hand.remove_exact(0, &t("5m")).unwrap();
        assert_eq!(hand.tiles().unwrap(), &[t("0m")]);
        assert!(matches!(
            hand.remove_exact(0, &t("5m")),
            Err(TableError::TileNotInHand { seat: 0, .. })
        ));
    }

    #[test]
    fn test_remove_matching_prefers_exact_face() {
        let mut hand = Hand::Known(vec![t("0m"), t("5m")]);
        let removed = hand.remove_matching(0, &t("5m")).unwrap();
        assert!(!removed.is_bonus());
        let removed = hand.remove_matching(0, &t("5m")).unwrap();
        assert!(removed.is_bonus());
    }

    #[test]
    fn test_concealed_hand_underflow() {
        let mut hand = Hand::Concealed(1);
        hand.remove_exact(2, &t("1z")).unwrap();
        assert!(hand.is_empty());
        assert!(matches!(
            hand.remove_exact(2, &t("1z")),
            Err(TableError::HandUnderflow { seat: 2 })
        ));
    }

    #[test]
    fn test_reset_round_keeps_score() {
        let mut p = PlayerState::new(AccountId(7), false);
        p.score = 25000;
        p.kita_count = 2;
        p.riichi_tile = Some(t("1p"));
        p.reset_round(Hand::Concealed(13));
        assert_eq!(p.score(), 25000);
        assert_eq!(p.kita_count(), 0);
        assert!(!p.is_riichi());
        assert_eq!(p.concealed_count(), 13);
    }
}
