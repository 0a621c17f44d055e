//! Table reconstruction from action sequences.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use liqi_table::{
    AccountId, Decision, EventKind, MeldKind, OperationKind, SessionPhase, Strategy, Table,
    TableError, TableEvent, Tile, Tsumogiri,
};
use serde_json::{Value, json};

const SELF_ACCOUNT: u32 = 20;
const SELF_SEAT: usize = 1;

const HAND: [&str; 13] = [
    "1m", "2m", "3m", "4m", "5m", "1p", "2p", "3p", "1s", "2s", "3s", "1z", "1z",
];

fn t(s: &str) -> Tile {
    s.parse().unwrap()
}

fn four_seat_table() -> Table {
    let mut table = Table::new();
    table
        .seat_players(
            AccountId(SELF_ACCOUNT),
            &[10, SELF_ACCOUNT, 30, 40],
            json!({ "mode": { "mode": 1 }, "meta": { "mode_id": 2 } }),
        )
        .unwrap();
    table
}

fn new_round(dealer: u32, tiles: &[&str]) -> Value {
    json!({
        "chang": 0,
        "ju": dealer,
        "ben": 0,
        "tiles": tiles,
        "doras": ["3s"],
        "scores": [25000, 25000, 25000, 25000],
        "left_tile_count": 69
    })
}

fn discard(seat: usize, tile: &str) -> Value {
    json!({ "seat": seat, "tile": tile })
}

fn table_in_round(tiles: &[&str]) -> Table {
    let mut table = four_seat_table();
    table.apply("ActionNewRound", &new_round(0, tiles)).unwrap();
    table
}

// =========================================================================
// Round start
// =========================================================================

#[test]
fn test_new_round_deals_thirteen_and_dealer_fourteen() {
    let table = table_in_round(&HAND);
    let state = table.state();

    assert_eq!(state.hand().unwrap().len(), 13);
    assert_eq!(state.player(0).unwrap().concealed_count(), 14);
    assert_eq!(state.player(2).unwrap().concealed_count(), 13);
    assert_eq!(state.tiles_left().unwrap(), 69);
    assert_eq!(state.dora_indicators().unwrap(), &[t("3s")]);
    assert_eq!(state.doras().unwrap(), vec![t("4s")]);
    assert_eq!(state.round().unwrap().dealer(), 0);
    assert!(state.is_east_only());
    assert_eq!(state.ranked_room(), Some(2));
}

#[test]
fn test_new_round_self_dealer_holds_fourteen() {
    let mut table = four_seat_table();
    let mut tiles = HAND.to_vec();
    tiles.push("9p");
    table
        .apply("ActionNewRound", &new_round(SELF_SEAT as u32, &tiles))
        .unwrap();
    assert_eq!(table.state().hand().unwrap().len(), 14);
    assert_eq!(table.state().player(0).unwrap().concealed_count(), 13);
}

#[test]
fn test_new_round_clears_previous_round() {
    let mut table = table_in_round(&HAND);
    table.apply("ActionDiscardTile", &discard(0, "9m")).unwrap();
    table.apply("ActionNewRound", &new_round(1, &HAND)).unwrap();

    let state = table.state();
    assert!(state.player(0).unwrap().pond().is_empty());
    assert!(state.player(0).unwrap().discard_log().is_empty());
    assert_eq!(state.player(0).unwrap().concealed_count(), 13);
    assert_eq!(state.player(1).unwrap().score(), 25000);
}

// =========================================================================
// Draws and discards
// =========================================================================

#[test]
fn test_deal_and_discard_update_counts() {
    let mut table = table_in_round(&HAND);
    table.apply("ActionDiscardTile", &discard(0, "9m")).unwrap();
    table
        .apply("ActionDealTile", &json!({ "seat": 1, "tile": "7p", "left_tile_count": 68 }))
        .unwrap();
    table.apply("ActionDiscardTile", &discard(1, "7p")).unwrap();
    table
        .apply("ActionDealTile", &json!({ "seat": 2, "left_tile_count": 67 }))
        .unwrap();

    let state = table.state();
    assert_eq!(state.player(0).unwrap().concealed_count(), 13);
    assert_eq!(state.player(0).unwrap().pond(), &[t("9m")]);
    assert_eq!(state.hand().unwrap().len(), 13);
    assert!(!state.hand().unwrap().contains(&t("7p")));
    assert_eq!(state.player(2).unwrap().concealed_count(), 14);
    assert_eq!(state.tiles_left().unwrap(), 67);
}

#[test]
fn test_self_discard_of_missing_tile_fails() {
    let mut table = table_in_round(&HAND);
    let err = table.apply("ActionDiscardTile", &discard(1, "9s")).unwrap_err();
    assert!(matches!(err, TableError::TileNotInHand { seat: 1, .. }));
}

#[test]
fn test_riichi_deducts_deposit_and_records_tile() {
    let mut table = table_in_round(&HAND);
    table
        .apply("ActionDiscardTile", &json!({ "seat": 0, "tile": "9m", "is_liqi": true }))
        .unwrap();

    let p = table.state().player(0).unwrap();
    assert_eq!(p.score(), 24000);
    assert_eq!(p.riichi_tile(), Some(&t("9m")));
    assert!(p.is_riichi());
}

#[test]
fn test_double_riichi_repeated_flag_deducts_once() {
    let mut table = table_in_round(&HAND);
    table
        .apply("ActionDiscardTile", &json!({ "seat": 0, "tile": "9m", "is_wliqi": true }))
        .unwrap();
    table
        .apply("ActionDiscardTile", &json!({ "seat": 0, "tile": "8m", "is_wliqi": true }))
        .unwrap();

    let p = table.state().player(0).unwrap();
    assert_eq!(p.score(), 24000);
    assert_eq!(p.riichi_tile(), Some(&t("9m")));
}

#[test]
fn test_discard_replaces_dora_indicators() {
    let mut table = table_in_round(&HAND);
    table
        .apply("ActionDiscardTile", &json!({ "seat": 0, "tile": "9m", "doras": ["3s", "7z"] }))
        .unwrap();
    assert_eq!(table.state().dora_indicators().unwrap(), &[t("3s"), t("7z")]);
}

// =========================================================================
// Calls
// =========================================================================

#[test]
fn test_call_records_provenance_and_empties_pond() {
    let mut table = table_in_round(&HAND);
    table.apply("ActionDiscardTile", &discard(2, "6m")).unwrap();
    table
        .apply(
            "ActionChiPengGang",
            &json!({ "seat": 1, "type": 0, "tiles": ["4m", "5m", "6m"], "froms": [1, 1, 2] }),
        )
        .unwrap();

    let state = table.state();
    let melds = state.melds_of(SELF_SEAT).unwrap();
    assert_eq!(melds.len(), 1);
    assert_eq!(melds[0].kind(), MeldKind::Sequence);
    let tiles = melds[0].tiles();
    assert_eq!(tiles[0].called_from(), None);
    assert_eq!(tiles[2].called_from(), Some(2));

    assert!(state.player(2).unwrap().pond().is_empty());
    assert_eq!(state.player(2).unwrap().discard_log(), &[t("6m")]);
    assert_eq!(state.hand().unwrap().len(), 11);
    assert!(!state.hand_is_closed().unwrap());
}

#[test]
fn test_call_against_wrong_pond_tail_fails() {
    let mut table = table_in_round(&HAND);
    table.apply("ActionDiscardTile", &discard(0, "1p")).unwrap();
    let err = table
        .apply(
            "ActionChiPengGang",
            &json!({ "seat": 2, "type": 1, "tiles": ["2p", "2p", "2p"], "froms": [2, 2, 0] }),
        )
        .unwrap_err();
    assert!(matches!(err, TableError::CallMismatch { seat: 2, from: 0, .. }));
}

#[test]
fn test_added_kan_extends_existing_triplet() {
    let mut table = table_in_round(&HAND);
    table.apply("ActionDiscardTile", &discard(0, "7z")).unwrap();
    table
        .apply(
            "ActionChiPengGang",
            &json!({ "seat": 2, "type": 1, "tiles": ["7z", "7z", "7z"], "froms": [2, 2, 0] }),
        )
        .unwrap();
    table
        .apply("ActionAnGangAddGang", &json!({ "seat": 2, "type": 2, "tiles": "7z" }))
        .unwrap();

    let state = table.state();
    let melds = state.melds_of(2).unwrap();
    assert_eq!(melds.len(), 1);
    assert_eq!(melds[0].kind(), MeldKind::AddedKan);
    assert_eq!(melds[0].tiles().len(), 4);
    assert_eq!(state.player(2).unwrap().concealed_count(), 10);
}

#[test]
fn test_added_kan_without_triplet_fails() {
    let mut table = table_in_round(&HAND);
    let err = table
        .apply("ActionAnGangAddGang", &json!({ "seat": 3, "type": 5, "tiles": "2s" }))
        .unwrap_err();
    assert!(matches!(err, TableError::MissingTriplet { seat: 3, .. }));
}

// =========================================================================
// Closed kans
// =========================================================================

const FIVES: [&str; 13] = [
    "5p", "5p", "5p", "5p", "1m", "2m", "3m", "1s", "2s", "3s", "1z", "1z", "2z",
];

#[test]
fn test_closed_kan_of_fives_promotes_one_bonus_tile() {
    let mut table = table_in_round(&FIVES);
    table
        .apply("ActionAnGangAddGang", &json!({ "seat": 1, "type": 3, "tiles": "5p" }))
        .unwrap();

    let state = table.state();
    let melds = state.melds_of(SELF_SEAT).unwrap();
    assert_eq!(melds[0].kind(), MeldKind::ClosedKan);
    assert_eq!(melds[0].tiles().iter().filter(|t| t.is_bonus()).count(), 1);
    assert_eq!(state.hand().unwrap().len(), 9);
    assert!(state.hand_is_closed().unwrap());
}

#[test]
fn test_closed_kan_no_promotion_when_bonus_already_visible() {
    let mut table = table_in_round(&FIVES);
    table.apply("ActionDiscardTile", &discard(0, "0p")).unwrap();
    table
        .apply("ActionAnGangAddGang", &json!({ "seat": 1, "type": 3, "tiles": "5p" }))
        .unwrap();

    let melds = table.state().melds_of(SELF_SEAT).unwrap();
    assert!(melds[0].tiles().iter().all(|t| !t.is_bonus()));
}

#[test]
fn test_closed_kan_by_opponent_reduces_count() {
    let mut table = table_in_round(&HAND);
    table
        .apply("ActionAnGangAddGang", &json!({ "seat": 3, "type": 3, "tiles": "9s" }))
        .unwrap();
    assert_eq!(table.state().player(3).unwrap().concealed_count(), 9);
}

#[test]
fn test_kan_unknown_type_fails() {
    let mut table = table_in_round(&HAND);
    let err = table
        .apply("ActionAnGangAddGang", &json!({ "seat": 3, "type": 9, "tiles": "9s" }))
        .unwrap_err();
    assert!(matches!(err, TableError::UnknownMeldType { code: 9, .. }));
}

// =========================================================================
// Three-player
// =========================================================================

#[test]
fn test_kita_sets_north_aside() {
    let mut table = Table::new();
    table
        .seat_players(AccountId(SELF_ACCOUNT), &[10, SELF_ACCOUNT, 30], Value::Null)
        .unwrap();
    let mut tiles = HAND.to_vec();
    tiles[12] = "4z";
    table
        .apply(
            "ActionNewRound",
            &json!({ "ju": 0, "tiles": tiles, "doras": ["1m"], "scores": [35000, 35000, 35000] }),
        )
        .unwrap();
    table.apply("ActionBaBei", &json!({ "seat": 1 })).unwrap();

    let state = table.state();
    assert!(state.is_three_player());
    assert_eq!(state.doras().unwrap(), vec![t("9m")]);
    assert_eq!(state.self_player().unwrap().kita_count(), 1);
    assert!(!state.hand().unwrap().contains(&t("4z")));
    assert_eq!(state.melds_of(SELF_SEAT).unwrap()[0].kind(), MeldKind::Kita);
    assert!(state.hand_is_closed().unwrap());
}

// =========================================================================
// Round results
// =========================================================================

#[test]
fn test_win_reveals_opponent_hand_and_sets_scores() {
    let mut table = table_in_round(&HAND);
    table
        .apply(
            "ActionHule",
            &json!({
                "hules": [{
                    "seat": 3,
                    "hand": ["1p", "1p"],
                    "hu_tile": "1p",
                    "zimo": true,
                    "point_sum": 8000
                }],
                "scores": [23000, 23000, 23000, 31000]
            }),
        )
        .unwrap();
    let state = table.state();
    assert_eq!(state.player(3).unwrap().revealed_hand(), Some(&[t("1p"), t("1p")][..]));
    assert_eq!(state.player(3).unwrap().score(), 31000);
    assert_eq!(state.player(0).unwrap().score(), 23000);
}

#[test]
fn test_exhaustive_draw_applies_last_score_entry() {
    let mut table = table_in_round(&HAND);
    table
        .apply(
            "ActionNoTile",
            &json!({
                "players": [{ "tingpai": true, "hand": ["9p"] }, {}, {}, {}],
                "scores": [{
                    "old_scores": [25000, 25000, 25000, 25000],
                    "delta_scores": [3000, -1000, -1000, -1000]
                }]
            }),
        )
        .unwrap();
    let state = table.state();
    assert_eq!(state.player(0).unwrap().score(), 28000);
    assert_eq!(state.player(1).unwrap().score(), 24000);
    assert_eq!(state.player(0).unwrap().revealed_hand(), Some(&[t("9p")][..]));
}

// =========================================================================
// Turn decisions and replay
// =========================================================================

fn deal_with_offer(tile: &str) -> Value {
    json!({
        "seat": 1,
        "tile": tile,
        "left_tile_count": 60,
        "operation": { "seat": 1, "operation_list": [{ "type": 1 }] }
    })
}

#[test]
fn test_live_deal_with_offer_emits_turn_decision() {
    let mut table = table_in_round(&HAND);
    let events = table.apply("ActionDealTile", &deal_with_offer("7p")).unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].kind(), EventKind::Deal);
    let TableEvent::TurnDecision(offer) = &events[1] else {
        panic!("expected a turn decision");
    };
    assert!(offer.offers(OperationKind::Discard));

    let decision = Tsumogiri.on_turn(table.state(), offer);
    assert_eq!(
        decision,
        Some(Decision::Discard {
            tile: t("7p"),
            moqie: true
        })
    );
}

#[test]
fn test_replay_suppresses_turn_decisions_until_finish() {
    let mut table = four_seat_table();
    let decisions = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&decisions);
    table.events().subscribe(EventKind::TurnDecision, move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    table.advance(SessionPhase::Authenticating).unwrap();
    table.advance(SessionPhase::Resyncing).unwrap();
    table.begin_replay();
    let mut applied = 0;
    applied += table.apply("ActionNewRound", &new_round(0, &HAND)).unwrap().len();
    applied += table.apply("ActionDiscardTile", &discard(0, "9m")).unwrap().len();
    applied += table.apply("ActionDealTile", &deal_with_offer("7p")).unwrap().len();
    assert_eq!(applied, 3);
    assert_eq!(decisions.load(Ordering::SeqCst), 0);

    let pending = table.finish_replay();
    assert!(matches!(pending, Some(TableEvent::TurnDecision(_))));
    assert_eq!(decisions.load(Ordering::SeqCst), 1);
    table.advance(SessionPhase::Live).unwrap();
}

#[test]
fn test_advance_to_authenticating_abandons_interrupted_replay() {
    let mut table = four_seat_table();
    let decisions = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&decisions);
    table.events().subscribe(EventKind::TurnDecision, move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    // The connection drops mid-replay, before the acknowledgement.
    table.advance(SessionPhase::Authenticating).unwrap();
    table.advance(SessionPhase::Resyncing).unwrap();
    table.begin_replay();
    table.apply("ActionNewRound", &new_round(0, &HAND)).unwrap();
    table.apply("ActionDealTile", &deal_with_offer("7p")).unwrap();

    // The next connection enters the match instead of resyncing.
    table.advance(SessionPhase::Authenticating).unwrap();
    assert!(!table.is_replaying());
    table.advance(SessionPhase::Live).unwrap();
    assert!(table.finish_replay().is_none());

    table.apply("ActionNewRound", &new_round(0, &HAND)).unwrap();
    let events = table.apply("ActionDealTile", &deal_with_offer("7p")).unwrap();
    assert!(matches!(events.last(), Some(TableEvent::TurnDecision(_))));
    assert_eq!(decisions.load(Ordering::SeqCst), 1);
}

#[test]
fn test_replay_stale_offer_is_dropped() {
    let mut table = four_seat_table();
    table.begin_replay();
    table.apply("ActionNewRound", &new_round(0, &HAND)).unwrap();
    table.apply("ActionDealTile", &deal_with_offer("7p")).unwrap();
    table.apply("ActionDiscardTile", &discard(1, "7p")).unwrap();
    assert!(table.finish_replay().is_none());
}

#[test]
fn test_reseat_same_list_keeps_round_state() {
    let mut table = table_in_round(&HAND);
    table.apply("ActionDiscardTile", &discard(0, "9m")).unwrap();
    table
        .seat_players(AccountId(SELF_ACCOUNT), &[10, SELF_ACCOUNT, 30, 40], Value::Null)
        .unwrap();
    assert_eq!(table.state().player(0).unwrap().pond(), &[t("9m")]);
}

#[test]
fn test_visible_tiles_cover_hand_ponds_and_doras() {
    let mut table = table_in_round(&HAND);
    table.apply("ActionDiscardTile", &discard(0, "9m")).unwrap();
    let visible = table.state().visible_tiles().unwrap();
    assert_eq!(visible.len(), 13 + 1 + 1);
    assert!(visible.contains(&t("9m")));
    assert!(visible.contains(&t("3s")));
}
