//! Decisions and the requests that carry them.

use rand::Rng;
use serde_json::{Value, json};

use crate::Tile;
use crate::actions::OperationKind;

/// The service that accepts in-game operations.
pub const GAME_SERVICE: &str = "FastTest";

/// One answer to a [`TurnDecision`](crate::TableEvent::TurnDecision).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Discard `tile`; `moqie` when it is the tile just drawn.
    Discard { tile: Tile, moqie: bool },
    /// Declare riichi by discarding `tile`.
    Riichi { tile: Tile, moqie: bool },
    /// Closed or added kan; `index` picks the offered combination.
    SelfKan { kind: OperationKind, index: usize },
    /// Set a north tile aside.
    Kita { moqie: bool },
    Tsumo,
    /// Abort the hand with nine different terminals and honors.
    NineTerminals,
    /// Chi, pon, open kan or ron on another seat's discard; `index` picks
    /// the offered combination.
    Call { kind: OperationKind, index: usize },
    /// Decline the calls on offer.
    Pass,
}

/// A request ready for the agent.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub service: &'static str,
    pub method: &'static str,
    pub fields: Value,
}

/// Think time reported to the server, in seconds.
fn think_time() -> u32 {
    rand::rng().random_range(1..=3)
}

impl Decision {
    /// Builds the request for this decision.
    pub fn to_request(&self) -> OutboundRequest {
        let timeuse = think_time();
        let (method, fields) = match self {
            Self::Discard { tile, moqie } => (
                "inputOperation",
                json!({
                    "type": OperationKind::Discard.code(),
                    "tile": tile.to_string(),
                    "moqie": moqie,
                    "timeuse": timeuse,
                }),
            ),
            Self::Riichi { tile, moqie } => (
                "inputOperation",
                json!({
                    "type": OperationKind::Riichi.code(),
                    "tile": tile.to_string(),
                    "moqie": moqie,
                    "timeuse": timeuse,
                }),
            ),
            Self::SelfKan { kind, index } => (
                "inputOperation",
                json!({ "type": kind.code(), "index": index, "timeuse": timeuse }),
            ),
            Self::Kita { moqie } => (
                "inputOperation",
                json!({ "type": OperationKind::Kita.code(), "moqie": moqie, "timeuse": timeuse }),
            ),
            Self::Tsumo => (
                "inputOperation",
                json!({ "type": OperationKind::Tsumo.code(), "timeuse": timeuse }),
            ),
            Self::NineTerminals => (
                "inputOperation",
                json!({
                    "type": OperationKind::NineTerminals.code(),
                    "index": 0,
                    "timeuse": timeuse,
                }),
            ),
            Self::Call { kind, index } => (
                "inputChiPengGang",
                json!({ "type": kind.code(), "index": index, "timeuse": timeuse }),
            ),
            Self::Pass => (
                "inputChiPengGang",
                json!({ "cancel_operation": true, "timeuse": timeuse }),
            ),
        };
        OutboundRequest {
            service: GAME_SERVICE,
            method,
            fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discard_request_fields() {
        let req = Decision::Discard {
            tile: "0s".parse().unwrap(),
            moqie: true,
        }
        .to_request();
        assert_eq!(req.service, "FastTest");
        assert_eq!(req.method, "inputOperation");
        assert_eq!(req.fields["type"], 1);
        assert_eq!(req.fields["tile"], "0s");
        assert_eq!(req.fields["moqie"], true);
    }

    #[test]
    fn test_think_time_in_range() {
        for _ in 0..50 {
            let t = Decision::Tsumo.to_request().fields["timeuse"].as_u64().unwrap();
            assert!((1..=3).contains(&t));
        }
    }

    #[test]
    fn test_pass_cancels_on_call_method() {
        let req = Decision::Pass.to_request();
        assert_eq!(req.method, "inputChiPengGang");
        assert_eq!(req.fields["cancel_operation"], true);
    }

    #[test]
    fn test_call_and_kita_codes() {
        let pon = Decision::Call {
            kind: OperationKind::Pon,
            index: 1,
        }
        .to_request();
        assert_eq!((pon.fields["type"].as_u64(), pon.fields["index"].as_u64()), (Some(3), Some(1)));

        let kita = Decision::Kita { moqie: false }.to_request();
        assert_eq!(kita.method, "inputOperation");
        assert_eq!(kita.fields["type"], 11);

        let abort = Decision::NineTerminals.to_request();
        assert_eq!(
            (abort.fields["type"].as_u64(), abort.fields["index"].as_u64()),
            (Some(10), Some(0))
        );
    }
}
