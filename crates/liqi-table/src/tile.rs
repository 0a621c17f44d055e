//! Tiles and their text form.
//!
//! The wire spells a tile as a rank digit followed by a suit letter:
//! `"3m"`, `"9s"`, `"7z"`. Rank `0` is the bonus (red) five of a number
//! suit, so `"0p"` is a red five of circles. Honors are `1z`..`7z`:
//! east, south, west, north, then white, green, red dragon.

use std::fmt;
use std::str::FromStr;

use crate::TableError;

// ---------------------------------------------------------------------------
// Suit
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Suit {
    /// `p`
    Circles,
    /// `m`
    Characters,
    /// `s`
    Bamboo,
    /// `z`
    Honors,
}

impl Suit {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'p' => Some(Self::Circles),
            'm' => Some(Self::Characters),
            's' => Some(Self::Bamboo),
            'z' => Some(Self::Honors),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Self::Circles => 'p',
            Self::Characters => 'm',
            Self::Bamboo => 's',
            Self::Honors => 'z',
        }
    }

    pub fn is_honor(self) -> bool {
        self == Self::Honors
    }

    /// Highest rank in the suit.
    pub fn max_rank(self) -> u8 {
        if self.is_honor() { 7 } else { 9 }
    }
}

// ---------------------------------------------------------------------------
// Tile
// ---------------------------------------------------------------------------

/// One physical tile.
///
/// `==` compares everything, including provenance. Use
/// [`matches`](Self::matches) to compare faces with the bonus flag
/// ignored and [`strictly_matches`](Self::strictly_matches) to compare
/// faces including it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tile {
    suit: Suit,
    rank: u8,
    bonus: bool,
    called_from: Option<usize>,
}

impl Tile {
    /// A plain tile.
    ///
    /// # Errors
    /// [`TableError::InvalidTile`] if `rank` is outside the suit.
    pub fn new(suit: Suit, rank: u8) -> Result<Self, TableError> {
        if rank == 0 || rank > suit.max_rank() {
            return Err(TableError::InvalidTile(format!("{rank}{}", suit.as_char())));
        }
        Ok(Self {
            suit,
            rank,
            bonus: false,
            called_from: None,
        })
    }

    /// The bonus five of a number suit.
    pub fn bonus_five(suit: Suit) -> Result<Self, TableError> {
        if suit.is_honor() {
            return Err(TableError::InvalidTile(format!("0{}", suit.as_char())));
        }
        Ok(Self {
            suit,
            rank: 5,
            bonus: true,
            called_from: None,
        })
    }

    /// The north wind, the tile set aside as kita in three-player games.
    pub fn north() -> Self {
        Self {
            suit: Suit::Honors,
            rank: 4,
            bonus: false,
            called_from: None,
        }
    }

    pub fn suit(&self) -> Suit {
        self.suit
    }

    pub fn rank(&self) -> u8 {
        self.rank
    }

    pub fn is_bonus(&self) -> bool {
        self.bonus
    }

    /// Seat this tile was claimed from, for tiles in called melds.
    pub fn called_from(&self) -> Option<usize> {
        self.called_from
    }

    pub fn with_called_from(mut self, seat: usize) -> Self {
        self.called_from = Some(seat);
        self
    }

    pub(crate) fn into_bonus(mut self) -> Self {
        self.bonus = true;
        self
    }

    /// Same suit and rank. The bonus flag and provenance are ignored.
    pub fn matches(&self, other: &Tile) -> bool {
        self.suit == other.suit && self.rank == other.rank
    }

    /// Same suit, rank and bonus flag. Provenance is ignored.
    pub fn strictly_matches(&self, other: &Tile) -> bool {
        self.matches(other) && self.bonus == other.bonus
    }

    /// The tile a dora indicator points at.
    ///
    /// Numbers wrap 9 to 1, winds wrap north to east and dragons wrap red
    /// to white. In three-player games the characters suit only holds 1
    /// and 9, so a `1m` indicator points at `9m`.
    pub fn dora_successor(&self, three_player: bool) -> Tile {
        let rank = match (self.suit, self.rank) {
            (Suit::Honors, 4) => 1,
            (Suit::Honors, 7) => 5,
            (Suit::Characters, 1) if three_player => 9,
            (Suit::Honors, r) => r + 1,
            (_, 9) => 1,
            (_, r) => r + 1,
        };
        Tile {
            suit: self.suit,
            rank,
            bonus: false,
            called_from: None,
        }
    }

    /// Rank distance within a suit.
    ///
    /// `None` across suits, and between two different honors: honors
    /// only connect to themselves.
    pub fn distance(&self, other: &Tile) -> Option<u8> {
        if self.suit != other.suit {
            return None;
        }
        if self.suit.is_honor() {
            return (self.rank == other.rank).then_some(0);
        }
        Some(self.rank.abs_diff(other.rank))
    }
}

impl FromStr for Tile {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TableError::InvalidTile(s.to_string());
        let mut chars = s.chars();
        let (Some(digit), Some(letter), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(invalid());
        };
        let rank = digit.to_digit(10).ok_or_else(invalid)? as u8;
        let suit = Suit::from_char(letter).ok_or_else(invalid)?;
        if rank == 0 {
            Tile::bonus_five(suit).map_err(|_| invalid())
        } else {
            Tile::new(suit, rank).map_err(|_| invalid())
        }
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digit = if self.bonus { 0 } else { self.rank };
        write!(f, "{digit}{}", self.suit.as_char())
    }
}

/// Parses every string in `tiles`.
pub(crate) fn parse_all(tiles: &[String]) -> Result<Vec<Tile>, TableError> {
    tiles.iter().map(|t| t.parse()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> Tile {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_bonus_five_is_rank_five() {
        let red = t("0m");
        assert_eq!(red.suit(), Suit::Characters);
        assert_eq!(red.rank(), 5);
        assert!(red.is_bonus());
        assert_eq!(red.to_string(), "0m");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        for bad in ["", "5", "5x", "8z", "0z", "55m", "am"] {
            assert!(bad.parse::<Tile>().is_err(), "{bad:?} parsed");
        }
    }

    #[test]
    fn test_matches_ignores_bonus_but_strict_does_not() {
        assert!(t("0p").matches(&t("5p")));
        assert!(!t("0p").strictly_matches(&t("5p")));
        assert!(t("5p").strictly_matches(&t("5p").with_called_from(2)));
        assert!(!t("5p").matches(&t("5s")));
    }

    #[test]
    fn test_dora_successor_wraps() {
        assert_eq!(t("9s").dora_successor(false), t("1s"));
        assert_eq!(t("4z").dora_successor(false), t("1z"));
        assert_eq!(t("7z").dora_successor(false), t("5z"));
        assert_eq!(t("3z").dora_successor(false), t("4z"));
        assert_eq!(t("0p").dora_successor(false), t("6p"));
    }

    #[test]
    fn test_dora_successor_three_player_characters() {
        assert_eq!(t("1m").dora_successor(true), t("9m"));
        assert_eq!(t("1m").dora_successor(false), t("2m"));
        assert_eq!(t("9m").dora_successor(true), t("1m"));
    }

    #[test]
    fn test_distance_within_and_across_suits() {
        assert_eq!(t("2m").distance(&t("7m")), Some(5));
        assert_eq!(t("2m").distance(&t("2p")), None);
        assert_eq!(t("5z").distance(&t("5z")), Some(0));
        assert_eq!(t("5z").distance(&t("6z")), None);
    }
}
