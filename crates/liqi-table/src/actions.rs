//! Typed payloads for the actions and notifications the table consumes.
//!
//! The codec hands over decoded messages as JSON values whose keys are
//! the schema's field names. Each struct here mirrors one message, with
//! every field defaulted, since the wire omits zero values.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Operations offered to the local player
// ---------------------------------------------------------------------------

/// The choices the server offers on the local player's turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationList {
    pub seat: usize,
    pub operation_list: Vec<OptionalOperation>,
    pub time_add: u32,
    pub time_fixed: u32,
}

impl OperationList {
    /// The offer of `kind`, if present.
    pub fn find(&self, kind: OperationKind) -> Option<&OptionalOperation> {
        self.operation_list.iter().find(|op| op.kind() == Some(kind))
    }

    pub fn offers(&self, kind: OperationKind) -> bool {
        self.find(kind).is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionalOperation {
    #[serde(rename = "type")]
    pub code: u32,
    /// Candidate tile groups, one `|`-joined string per choice.
    pub combination: Vec<String>,
}

impl OptionalOperation {
    pub fn kind(&self) -> Option<OperationKind> {
        OperationKind::from_code(self.code)
    }
}

/// Operation codes shared by offers and decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Discard,
    Chi,
    Pon,
    ClosedKan,
    OpenKan,
    AddedKan,
    Riichi,
    Tsumo,
    Ron,
    NineTerminals,
    Kita,
}

impl OperationKind {
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            1 => Self::Discard,
            2 => Self::Chi,
            3 => Self::Pon,
            4 => Self::ClosedKan,
            5 => Self::OpenKan,
            6 => Self::AddedKan,
            7 => Self::Riichi,
            8 => Self::Tsumo,
            9 => Self::Ron,
            10 => Self::NineTerminals,
            11 => Self::Kita,
            _ => return None,
        })
    }

    pub fn code(self) -> u32 {
        match self {
            Self::Discard => 1,
            Self::Chi => 2,
            Self::Pon => 3,
            Self::ClosedKan => 4,
            Self::OpenKan => 5,
            Self::AddedKan => 6,
            Self::Riichi => 7,
            Self::Tsumo => 8,
            Self::Ron => 9,
            Self::NineTerminals => 10,
            Self::Kita => 11,
        }
    }

    /// Whether the operation answers another seat's discard rather than
    /// the local player's own draw.
    pub fn is_call(self) -> bool {
        matches!(self, Self::Chi | Self::Pon | Self::OpenKan | Self::Ron)
    }
}

// ---------------------------------------------------------------------------
// Round actions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionNewRound {
    /// Prevailing wind.
    pub chang: u32,
    /// Hand number within the wind; also the dealer's seat.
    pub ju: u32,
    /// Repeat counter.
    pub ben: u32,
    pub tiles: Vec<String>,
    pub dora: String,
    pub doras: Vec<String>,
    pub scores: Vec<i32>,
    /// Riichi sticks on the table.
    pub liqibang: u32,
    pub left_tile_count: u32,
    pub operation: Option<OperationList>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionDealTile {
    pub seat: usize,
    /// Empty when another seat draws.
    pub tile: String,
    pub left_tile_count: u32,
    pub doras: Vec<String>,
    pub operation: Option<OperationList>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionDiscardTile {
    pub seat: usize,
    pub tile: String,
    pub is_liqi: bool,
    pub is_wliqi: bool,
    /// Discarded straight from the draw.
    pub moqie: bool,
    pub doras: Vec<String>,
    pub operation: Option<OperationList>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionChiPengGang {
    pub seat: usize,
    #[serde(rename = "type")]
    pub meld_type: u32,
    pub tiles: Vec<String>,
    /// Source seat of each entry in `tiles`.
    pub froms: Vec<usize>,
    pub operation: Option<OperationList>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionAnGangAddGang {
    pub seat: usize,
    #[serde(rename = "type")]
    pub meld_type: u32,
    /// A single tile.
    pub tiles: String,
    pub doras: Vec<String>,
    pub operation: Option<OperationList>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionBaBei {
    pub seat: usize,
    pub moqie: bool,
    pub doras: Vec<String>,
    pub operation: Option<OperationList>,
}

// ---------------------------------------------------------------------------
// Round results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HuleInfo {
    pub seat: usize,
    pub zimo: bool,
    pub hand: Vec<String>,
    pub ming: Vec<String>,
    pub hu_tile: String,
    pub liqi: bool,
    pub point_sum: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionHule {
    pub hules: Vec<HuleInfo>,
    pub old_scores: Vec<i32>,
    pub delta_scores: Vec<i32>,
    pub scores: Vec<i32>,
    pub gameend: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoTilePlayer {
    pub tingpai: bool,
    pub hand: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoTileScore {
    pub seat: usize,
    pub old_scores: Vec<i32>,
    pub delta_scores: Vec<i32>,
    pub score: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionNoTile {
    pub liujumanguan: bool,
    pub players: Vec<NoTilePlayer>,
    pub scores: Vec<NoTileScore>,
    pub gameend: bool,
}

/// An abortive draw.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionLiuJu {
    #[serde(rename = "type")]
    pub kind: u32,
    pub seat: usize,
    pub tiles: Vec<String>,
    pub gameend: bool,
}

// ---------------------------------------------------------------------------
// Match end
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalStanding {
    pub seat: usize,
    pub total_point: i32,
    pub part_point_1: i32,
    pub grading_score: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameEndResult {
    pub players: Vec<FinalStanding>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyGameEndResult {
    pub result: GameEndResult,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyGameTerminate {
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use super::*;

    #[test]
    fn test_operation_kind_codes_round_trip() {
        for code in 1..=11 {
            assert_eq!(OperationKind::from_code(code).unwrap().code(), code);
        }
        assert!(OperationKind::from_code(0).is_none());
        assert!(OperationKind::from_code(12).is_none());
    }

    #[test]
    fn test_missing_fields_default() {
        let a: ActionDiscardTile =
            serde_json::from_value(json!({ "seat": 1, "tile": "3s" })).unwrap();
        assert!(!a.is_liqi);
        assert!(a.doras.is_empty());
        assert!(a.operation.is_none());
    }

    #[test]
    fn test_operation_list_find() {
        let ops: OperationList = serde_json::from_value(json!({
            "seat": 0,
            "operation_list": [{ "type": 1 }, { "type": 7, "combination": ["3m"] }]
        }))
        .unwrap();
        assert!(ops.offers(OperationKind::Discard));
        assert_eq!(ops.find(OperationKind::Riichi).unwrap().combination, vec!["3m"]);
        assert!(!ops.offers(OperationKind::Tsumo));
    }
}
