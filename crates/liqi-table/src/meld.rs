//! Melds and the per-round meld arena.

use std::fmt;

use crate::{TableError, Tile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeldKind {
    /// Chi.
    Sequence,
    /// Pon.
    Triplet,
    /// Kan claimed from a discard.
    OpenKan,
    ClosedKan,
    /// A north tile set aside in three-player games.
    Kita,
    /// A pon extended with the fourth tile.
    AddedKan,
}

impl MeldKind {
    pub fn tile_count(self) -> usize {
        match self {
            Self::Sequence | Self::Triplet => 3,
            Self::OpenKan | Self::ClosedKan | Self::AddedKan => 4,
            Self::Kita => 1,
        }
    }

    /// Maps the `type` of a call action (chi 0, pon 1, kan 2).
    pub fn from_call_type(code: u32) -> Result<Self, TableError> {
        match code {
            0 => Ok(Self::Sequence),
            1 => Ok(Self::Triplet),
            2 => Ok(Self::OpenKan),
            code => Err(TableError::UnknownMeldType {
                event: "ActionChiPengGang",
                code,
            }),
        }
    }

    /// Whether the meld exposes tiles taken from another seat.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Sequence | Self::Triplet | Self::OpenKan | Self::AddedKan)
    }
}

impl fmt::Display for MeldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sequence => "sequence",
            Self::Triplet => "triplet",
            Self::OpenKan => "open kan",
            Self::ClosedKan => "closed kan",
            Self::Kita => "kita",
            Self::AddedKan => "added kan",
        };
        f.write_str(name)
    }
}

/// A called or declared set of tiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meld {
    kind: MeldKind,
    tiles: Vec<Tile>,
}

impl Meld {
    /// # Errors
    /// [`TableError::MeldSize`] if `tiles` has the wrong length for `kind`.
    pub fn new(kind: MeldKind, tiles: Vec<Tile>) -> Result<Self, TableError> {
        if tiles.len() != kind.tile_count() {
            return Err(TableError::MeldSize {
                kind,
                expected: kind.tile_count(),
                found: tiles.len(),
            });
        }
        Ok(Self { kind, tiles })
    }

    pub fn kind(&self) -> MeldKind {
        self.kind
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Extends a triplet to an added kan.
    pub(crate) fn upgrade_to_added_kan(&mut self, tile: Tile) -> Result<(), TableError> {
        if self.kind != MeldKind::Triplet {
            return Err(TableError::MeldSize {
                kind: MeldKind::AddedKan,
                expected: MeldKind::Triplet.tile_count(),
                found: self.tiles.len(),
            });
        }
        self.kind = MeldKind::AddedKan;
        self.tiles.push(tile);
        Ok(())
    }
}

/// Index of a meld in the table's per-round arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeldId(pub(crate) usize);

impl fmt::Display for MeldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "meld-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiles(list: &[&str]) -> Vec<Tile> {
        list.iter().map(|t| t.parse().unwrap()).collect()
    }

    #[test]
    fn test_new_rejects_wrong_count() {
        let err = Meld::new(MeldKind::Triplet, tiles(&["1z", "1z"])).unwrap_err();
        assert!(matches!(err, TableError::MeldSize { expected: 3, found: 2, .. }));
    }

    #[test]
    fn test_upgrade_triplet_to_added_kan() {
        let mut meld = Meld::new(MeldKind::Triplet, tiles(&["2s", "2s", "2s"])).unwrap();
        meld.upgrade_to_added_kan("2s".parse().unwrap()).unwrap();
        assert_eq!(meld.kind(), MeldKind::AddedKan);
        assert_eq!(meld.tiles().len(), 4);
    }

    #[test]
    fn test_upgrade_sequence_fails() {
        let mut meld = Meld::new(MeldKind::Sequence, tiles(&["1s", "2s", "3s"])).unwrap();
        assert!(meld.upgrade_to_added_kan("2s".parse().unwrap()).is_err());
    }

    #[test]
    fn test_from_call_type_unknown_code() {
        assert_eq!(MeldKind::from_call_type(1).unwrap(), MeldKind::Triplet);
        assert!(matches!(
            MeldKind::from_call_type(7),
            Err(TableError::UnknownMeldType { code: 7, .. })
        ));
    }
}
