//! [`Table`]: applies server actions to [`TableState`].
//!
//! Each handled event name maps to one handler. A handler decodes its
//! typed payload, updates the state, and returns the events to publish.
//! If the payload carries an operation list, a
//! [`TableEvent::TurnDecision`] follows the action's own event, except
//! during replay, where only the last one is kept until
//! [`finish_replay`](Table::finish_replay).

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::actions::{
    ActionAnGangAddGang, ActionBaBei, ActionChiPengGang, ActionDealTile, ActionDiscardTile,
    ActionHule, ActionLiuJu, ActionNewRound, ActionNoTile, NotifyGameEndResult, NotifyGameTerminate,
    OperationList,
};
use crate::events::{EventBus, TableEvent};
use crate::meld::{Meld, MeldKind};
use crate::phase::SessionPhase;
use crate::player::{AccountId, Hand, PlayerState};
use crate::state::{RoundInfo, TableState};
use crate::tile::{Suit, parse_all};
use crate::{TableError, Tile};

/// Points staked on a riichi declaration.
pub const RIICHI_DEPOSIT: i32 = 1000;

/// Hand size at the start of a round, before the dealer's first draw.
pub const STARTING_HAND: usize = 13;

/// Event names [`Table::apply`] understands.
pub const HANDLED_EVENTS: &[&str] = &[
    "ActionNewRound",
    "ActionDealTile",
    "ActionDiscardTile",
    "ActionChiPengGang",
    "ActionAnGangAddGang",
    "ActionBaBei",
    "ActionHule",
    "ActionNoTile",
    "ActionLiuJu",
    "NotifyGameEndResult",
    "NotifyGameTerminate",
];

/// Added kan type codes. The server has used both.
const ADDED_KAN_TYPES: [u32; 2] = [2, 5];
const CLOSED_KAN_TYPE: u32 = 3;

fn decode<T: DeserializeOwned>(event: &str, payload: &Value) -> Result<T, TableError> {
    serde_json::from_value(payload.clone()).map_err(|source| TableError::Payload {
        event: event.to_string(),
        source,
    })
}

/// The table state machine.
#[derive(Debug, Default)]
pub struct Table {
    state: TableState,
    phase: SessionPhase,
    bus: EventBus,
    replaying: bool,
    deferred: Option<OperationList>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &TableState {
        &self.state
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_ended(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Subscriptions to applied events.
    pub fn events(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    /// Moves the session to `next`.
    ///
    /// Entering `Authenticating` abandons any replay a dropped connection
    /// left unfinished, together with its held-back turn decision.
    ///
    /// # Errors
    /// [`TableError::InvalidPhase`] if the lifecycle does not allow it.
    pub fn advance(&mut self, next: SessionPhase) -> Result<(), TableError> {
        if !self.phase.can_transition_to(next) {
            return Err(TableError::InvalidPhase {
                from: self.phase,
                to: next,
            });
        }
        tracing::debug!(from = %self.phase, to = %next, "session phase");
        if next == SessionPhase::Authenticating && self.replaying {
            tracing::warn!("replay interrupted, discarding it");
            self.replaying = false;
            self.deferred = None;
        }
        self.phase = next;
        Ok(())
    }

    /// Assigns seats from the authentication response.
    ///
    /// Re-seating with the same seat list (a reconnect) keeps scores and
    /// round state; a different list starts over.
    ///
    /// # Errors
    /// [`TableError::NotSeated`] if `account` is not in `seat_list`.
    pub fn seat_players(
        &mut self,
        account: AccountId,
        seat_list: &[u32],
        config: Value,
    ) -> Result<usize, TableError> {
        let seats: Vec<AccountId> = seat_list.iter().copied().map(AccountId).collect();
        let seat = seats
            .iter()
            .position(|a| *a == account)
            .ok_or(TableError::NotSeated)?;

        if seats != self.state.seats {
            self.state = TableState {
                players: seats
                    .iter()
                    .enumerate()
                    .map(|(i, a)| PlayerState::new(*a, i == seat))
                    .collect(),
                seats,
                ..TableState::default()
            };
        }
        self.state.self_seat = Some(seat);
        self.state.config = config;
        tracing::info!(%account, seat, seats = self.state.seat_count(), "seated");
        Ok(seat)
    }

    // -----------------------------------------------------------------------
    // Replay
    // -----------------------------------------------------------------------

    /// Starts replaying an archived log. Turn decisions are held back.
    pub fn begin_replay(&mut self) {
        self.replaying = true;
        self.deferred = None;
    }

    /// Ends replay and publishes the held-back turn decision, if the last
    /// replayed action carried one.
    pub fn finish_replay(&mut self) -> Option<TableEvent> {
        self.replaying = false;
        let event = TableEvent::TurnDecision(self.deferred.take()?);
        self.bus.publish(&event);
        Some(event)
    }

    pub fn is_replaying(&self) -> bool {
        self.replaying
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Applies one event. Names outside [`HANDLED_EVENTS`] are ignored.
    ///
    /// Returns the published events in order. On error the state may be
    /// partly updated; the caller should treat the table as desynchronised.
    pub fn apply(&mut self, name: &str, payload: &Value) -> Result<Vec<TableEvent>, TableError> {
        let (event, operation) = match name {
            "ActionNewRound" => {
                let a: ActionNewRound = decode(name, payload)?;
                self.new_round(&a)?;
                (TableEvent::NewRound(a.clone()), a.operation)
            }
            "ActionDealTile" => {
                let a: ActionDealTile = decode(name, payload)?;
                self.deal(&a)?;
                (TableEvent::Deal(a.clone()), a.operation)
            }
            "ActionDiscardTile" => {
                let a: ActionDiscardTile = decode(name, payload)?;
                self.discard(&a)?;
                (TableEvent::Discard(a.clone()), a.operation)
            }
            "ActionChiPengGang" => {
                let a: ActionChiPengGang = decode(name, payload)?;
                self.call(&a)?;
                (TableEvent::Call(a.clone()), a.operation)
            }
            "ActionAnGangAddGang" => {
                let a: ActionAnGangAddGang = decode(name, payload)?;
                self.kan(&a)?;
                (TableEvent::Kan(a.clone()), a.operation)
            }
            "ActionBaBei" => {
                let a: ActionBaBei = decode(name, payload)?;
                self.kita(&a)?;
                (TableEvent::Kita(a.clone()), a.operation)
            }
            "ActionHule" => {
                let a: ActionHule = decode(name, payload)?;
                self.win(&a)?;
                (TableEvent::Win(a), None)
            }
            "ActionNoTile" => {
                let a: ActionNoTile = decode(name, payload)?;
                self.exhaustive_draw(&a)?;
                (TableEvent::ExhaustiveDraw(a), None)
            }
            "ActionLiuJu" => {
                let a: ActionLiuJu = decode(name, payload)?;
                tracing::info!(kind = a.kind, seat = a.seat, "abortive draw");
                (TableEvent::AbortiveDraw(a), None)
            }
            "NotifyGameEndResult" => {
                let a: NotifyGameEndResult = decode(name, payload)?;
                self.end(name);
                (TableEvent::GameEnd(a), None)
            }
            "NotifyGameTerminate" => {
                let a: NotifyGameTerminate = decode(name, payload)?;
                tracing::warn!(reason = %a.reason, "match terminated by server");
                self.end(name);
                (TableEvent::GameTerminated(a), None)
            }
            other => {
                tracing::trace!(event = other, "not a table event");
                return Ok(Vec::new());
            }
        };

        let mut events = vec![event];
        if self.replaying {
            self.deferred = operation;
        } else if let Some(ops) = operation {
            events.push(TableEvent::TurnDecision(ops));
        }
        for event in &events {
            self.bus.publish(event);
        }
        Ok(events)
    }

    fn end(&mut self, event: &str) {
        if !self.phase.is_terminal() {
            tracing::info!(event, from = %self.phase, "match ended");
            self.phase = SessionPhase::Ended;
        }
    }

    // -----------------------------------------------------------------------
    // Handlers
    // -----------------------------------------------------------------------

    fn seated(&self) -> Result<usize, TableError> {
        self.state.players()?;
        self.state.seat()
    }

    fn replace_doras(&mut self, doras: &[String]) -> Result<(), TableError> {
        if !doras.is_empty() {
            self.state.dora_indicators = parse_all(doras)?;
        }
        Ok(())
    }

    fn new_round(&mut self, a: &ActionNewRound) -> Result<(), TableError> {
        let me = self.seated()?;
        let dealer = a.ju as usize;
        let hand = Hand::Known(parse_all(&a.tiles)?);

        for (seat, player) in self.state.players.iter_mut().enumerate() {
            let start = if seat == me {
                hand.clone()
            } else if seat == dealer {
                Hand::Concealed(STARTING_HAND + 1)
            } else {
                Hand::Concealed(STARTING_HAND)
            };
            player.reset_round(start);
            if let Some(score) = a.scores.get(seat) {
                player.score = *score;
            }
        }

        self.state.melds.clear();
        self.state.dora_indicators.clear();
        if a.doras.is_empty() && !a.dora.is_empty() {
            self.state.dora_indicators.push(a.dora.parse()?);
        }
        self.replace_doras(&a.doras)?;
        self.state.tiles_left = a.left_tile_count;
        self.state.round = Some(RoundInfo {
            wind: a.chang,
            hand: a.ju,
            repeat: a.ben,
            riichi_sticks: a.liqibang,
        });
        tracing::info!(wind = a.chang, hand = a.ju, repeat = a.ben, dealer, "round start");
        Ok(())
    }

    fn deal(&mut self, a: &ActionDealTile) -> Result<(), TableError> {
        let me = self.seated()?;
        let player = self.state.player_mut(a.seat)?;
        if a.seat == me {
            player.hand.push(a.tile.parse()?);
        } else {
            player.hand.draw_unseen();
        }
        self.state.tiles_left = a.left_tile_count;
        self.replace_doras(&a.doras)
    }

    fn discard(&mut self, a: &ActionDiscardTile) -> Result<(), TableError> {
        self.seated()?;
        let tile: Tile = a.tile.parse()?;
        let seat = a.seat;
        let player = self.state.player_mut(seat)?;

        player.hand.remove_exact(seat, &tile)?;
        player.pond.push(tile);
        player.discard_log.push(tile);

        // A double riichi may be flagged again on a later discard.
        if a.is_liqi || (a.is_wliqi && player.riichi_tile.is_none()) {
            player.score -= RIICHI_DEPOSIT;
            player.riichi_tile = Some(tile);
            tracing::debug!(seat, %tile, double = a.is_wliqi, "riichi");
        }
        self.replace_doras(&a.doras)
    }

    fn call(&mut self, a: &ActionChiPengGang) -> Result<(), TableError> {
        self.seated()?;
        let kind = MeldKind::from_call_type(a.meld_type)?;
        if a.froms.len() != a.tiles.len() {
            return Err(TableError::MalformedAction {
                event: "ActionChiPengGang",
                reason: format!("{} tiles but {} sources", a.tiles.len(), a.froms.len()),
            });
        }

        let seat = a.seat;
        let mut tiles = Vec::with_capacity(a.tiles.len());
        for (text, &from) in a.tiles.iter().zip(&a.froms) {
            let tile: Tile = text.parse()?;
            if from == seat {
                self.state.player_mut(seat)?.hand.remove_exact(seat, &tile)?;
                tiles.push(tile);
            } else {
                let found = self.state.player_mut(from)?.pond.pop();
                match found {
                    Some(taken) if taken.matches(&tile) => tiles.push(taken.with_called_from(from)),
                    other => {
                        return Err(TableError::CallMismatch {
                            seat,
                            from,
                            expected: tile,
                            found: other.map_or_else(|| "empty".to_string(), |t| t.to_string()),
                        });
                    }
                }
            }
        }

        self.state.add_meld(seat, Meld::new(kind, tiles)?)?;
        tracing::debug!(seat, %kind, "call");
        Ok(())
    }

    fn kan(&mut self, a: &ActionAnGangAddGang) -> Result<(), TableError> {
        self.seated()?;
        let tile: Tile = a.tiles.parse()?;
        match a.meld_type {
            CLOSED_KAN_TYPE => self.closed_kan(a.seat, tile)?,
            code if ADDED_KAN_TYPES.contains(&code) => self.added_kan(a.seat, tile)?,
            code => {
                return Err(TableError::UnknownMeldType {
                    event: "ActionAnGangAddGang",
                    code,
                });
            }
        }
        self.replace_doras(&a.doras)
    }

    fn closed_kan(&mut self, seat: usize, tile: Tile) -> Result<(), TableError> {
        let plain = Tile::new(tile.suit(), tile.rank())?;
        let player = self.state.player_mut(seat)?;
        let mut tiles = Vec::with_capacity(4);
        for _ in 0..MeldKind::ClosedKan.tile_count() {
            tiles.push(player.hand.remove_matching(seat, &plain)?);
        }

        // A closed kan of fives on the wire never says which one is the
        // bonus tile. Unless one is already accounted for, one of the four
        // must be it.
        if self.bonus_five_unaccounted(&tiles)? {
            tiles[0] = tiles[0].into_bonus();
        }

        self.state.add_meld(seat, Meld::new(MeldKind::ClosedKan, tiles)?)?;
        tracing::debug!(seat, %tile, "closed kan");
        Ok(())
    }

    fn bonus_five_unaccounted(&self, kan: &[Tile]) -> Result<bool, TableError> {
        let Some(first) = kan.first() else {
            return Ok(false);
        };
        if first.rank() != 5 || first.suit() == Suit::Honors || kan.iter().any(Tile::is_bonus) {
            return Ok(false);
        }
        let suit = first.suit();
        let seen = self
            .state
            .visible_tiles()?
            .iter()
            .any(|t| t.is_bonus() && t.suit() == suit);
        Ok(!seen)
    }

    fn added_kan(&mut self, seat: usize, tile: Tile) -> Result<(), TableError> {
        let target = self
            .state
            .player(seat)?
            .meld_ids()
            .iter()
            .copied()
            .find(|id| {
                self.state
                    .meld(*id)
                    .is_some_and(|m| m.kind() == MeldKind::Triplet && m.tiles()[0].matches(&tile))
            })
            .ok_or(TableError::MissingTriplet { seat, tile })?;

        let held = self.state.player_mut(seat)?.hand.remove_matching(seat, &tile)?;
        if let Some(meld) = self.state.meld_mut(target) {
            meld.upgrade_to_added_kan(held)?;
        }
        tracing::debug!(seat, %tile, "added kan");
        Ok(())
    }

    fn kita(&mut self, a: &ActionBaBei) -> Result<(), TableError> {
        self.seated()?;
        let seat = a.seat;
        let north = Tile::north();
        let player = self.state.player_mut(seat)?;
        player.hand.remove_exact(seat, &north)?;
        player.kita_count += 1;
        self.state.add_meld(seat, Meld::new(MeldKind::Kita, vec![north])?)?;
        self.replace_doras(&a.doras)
    }

    fn win(&mut self, a: &ActionHule) -> Result<(), TableError> {
        let me = self.seated()?;
        for hule in &a.hules {
            let revealed = parse_all(&hule.hand)?;
            let player = self.state.player_mut(hule.seat)?;
            if hule.seat != me {
                player.revealed_hand = Some(revealed);
            }
            tracing::info!(seat = hule.seat, tsumo = hule.zimo, points = hule.point_sum, "win");
        }
        self.set_scores(&a.scores);
        Ok(())
    }

    fn exhaustive_draw(&mut self, a: &ActionNoTile) -> Result<(), TableError> {
        let me = self.seated()?;
        for (seat, shown) in a.players.iter().enumerate() {
            if seat != me && shown.tingpai && !shown.hand.is_empty() {
                self.state.player_mut(seat)?.revealed_hand = Some(parse_all(&shown.hand)?);
            }
        }
        if let Some(last) = a.scores.last() {
            let totals: Vec<i32> = last
                .old_scores
                .iter()
                .enumerate()
                .map(|(i, old)| old + last.delta_scores.get(i).copied().unwrap_or(0))
                .collect();
            self.set_scores(&totals);
        }
        tracing::info!(nagashi = a.liujumanguan, "exhaustive draw");
        Ok(())
    }

    fn set_scores(&mut self, scores: &[i32]) {
        for (player, score) in self.state.players.iter_mut().zip(scores) {
            player.score = *score;
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use super::*;

    fn seated() -> Table {
        let mut table = Table::new();
        table
            .seat_players(AccountId(20), &[10, 20, 30, 40], json!({ "mode": { "mode": 1 } }))
            .unwrap();
        table
    }

    #[test]
    fn test_seat_players_rejects_unknown_account() {
        let mut table = Table::new();
        let err = table.seat_players(AccountId(5), &[10, 20], Value::Null).unwrap_err();
        assert!(matches!(err, TableError::NotSeated));
    }

    #[test]
    fn test_accessors_fail_before_first_round() {
        let table = seated();
        assert_eq!(table.state().seat().unwrap(), 1);
        assert!(matches!(table.state().hand(), Err(TableError::Uninitialized(_))));
        assert!(matches!(table.state().tiles_left(), Err(TableError::Uninitialized(_))));
        assert!(matches!(table.state().visible_tiles(), Err(TableError::Uninitialized(_))));
    }

    #[test]
    fn test_round_start_before_seating_fails() {
        let mut table = Table::new();
        let err = table
            .apply("ActionNewRound", &json!({ "tiles": ["1m"] }))
            .unwrap_err();
        assert!(matches!(err, TableError::NotSeated));
    }

    #[test]
    fn test_unhandled_event_is_ignored() {
        let mut table = seated();
        assert!(table.apply("ActionPrototype", &json!({})).unwrap().is_empty());
    }

    #[test]
    fn test_bad_payload_names_event() {
        let mut table = seated();
        let err = table
            .apply("ActionDiscardTile", &json!({ "seat": "north" }))
            .unwrap_err();
        assert!(
            matches!(err, TableError::Payload { ref event, .. } if event == "ActionDiscardTile")
        );
    }

    #[test]
    fn test_advance_rejects_skipping_authentication() {
        let mut table = Table::new();
        assert!(table.advance(SessionPhase::Live).is_err());
        table.advance(SessionPhase::Authenticating).unwrap();
        table.advance(SessionPhase::Live).unwrap();
        assert_eq!(table.phase(), SessionPhase::Live);
    }

    #[test]
    fn test_game_end_marks_table_ended() {
        let mut table = seated();
        table.advance(SessionPhase::Authenticating).unwrap();
        table.advance(SessionPhase::Live).unwrap();
        table.apply("NotifyGameEndResult", &json!({ "result": {} })).unwrap();
        assert!(table.is_ended());
    }
}
