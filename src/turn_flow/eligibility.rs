//! Post-move turn-order bookkeeping.
//!
//! Card-driven orders track who acted and who passed on the current card.
//! A card ends once `max_acting_per_card` seats have acted or no eligible
//! seat is left to act, but never while grants are pending. At card end the
//! seats that acted become ineligible for the next card, pending overrides
//! are applied, and the next card is revealed.

use serde::{Deserialize, Serialize};

use crate::core::{GameState, Move, PlayerId};
use crate::def::{CardDrivenConfig, GameDef, TurnOrderDef};
use crate::zones::ZonePosition;

use super::grants::decline_grants;
use super::runtime::{CardDrivenRuntime, TurnOrderRuntime};

/// What the bookkeeping did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnFlowOutcome {
    /// A card ended (card-driven only).
    pub card_ended: bool,
    /// The move closed the turn; the caller runs the turn boundary.
    pub turn_ended: bool,
}

/// Update the turn-order runtime after `mv` resolved for the active seat.
pub fn apply_turn_flow_eligibility_after_move(
    def: &GameDef,
    state: &mut GameState,
    mv: &Move,
) -> TurnFlowOutcome {
    let mover = state.active_player;
    let player_count = state.player_count();
    let mut outcome = TurnFlowOutcome::default();

    match (&def.turn_order, &mut state.turn_order) {
        (TurnOrderDef::Simultaneous, TurnOrderRuntime::Simultaneous { submitted }) => {
            if !submitted.contains(&mover) {
                submitted.push(mover);
            }
            outcome.turn_ended = submitted.len() >= player_count;
        }
        (TurnOrderDef::CardDriven(config), TurnOrderRuntime::CardDriven(card)) => {
            if !mv.free_operation {
                let is_pass = config.pass_action.as_ref() == Some(&mv.action_id);
                if is_pass && card.in_grant_window() {
                    decline_grants_of(card, mover);
                } else if is_pass {
                    card.passed.push(mover);
                } else if !card.acted.contains(&mover) {
                    card.acted.push(mover);
                }
            }
            if card_should_end(config, card) {
                outcome.card_ended = true;
                outcome.turn_ended = true;
            }
        }
        _ => {}
    }

    if outcome.card_ended {
        end_card(def, state);
    }
    sync_active_seat(def, state);
    outcome
}

fn decline_grants_of(card: &mut CardDrivenRuntime, seat: PlayerId) {
    card.pending_grants.retain(|g| g.seat != seat);
}

/// Whether the current card is over.
#[must_use]
pub fn card_should_end(config: &CardDrivenConfig, card: &CardDrivenRuntime) -> bool {
    !card.in_grant_window()
        && (card.acted.len() >= config.max_acting_per_card as usize
            || card.next_eligible_seat().is_none())
}

/// Close the current card and reveal the next.
pub fn end_card(def: &GameDef, state: &mut GameState) {
    let TurnOrderDef::CardDriven(config) = &def.turn_order else {
        return;
    };
    let Some(card) = state.turn_order.card_driven_mut() else {
        return;
    };

    let mut ineligible = card.acted.clone();
    for o in &card.pending_overrides {
        if o.eligible {
            ineligible.retain(|s| *s != o.seat);
        } else if !ineligible.contains(&o.seat) {
            ineligible.push(o.seat);
        }
    }
    // A card nobody may act on would end immediately; start it fresh instead.
    if card.seat_order.iter().all(|s| ineligible.contains(s)) {
        ineligible.clear();
    }
    ineligible.sort_unstable();

    card.ineligible = ineligible;
    card.acted.clear();
    card.passed.clear();
    card.pending_overrides.clear();
    card.card_index += 1;
    tracing::debug!(card = card.card_index, ineligible = ?card.ineligible, "card ended");

    if let (Some(draw), Some(played)) = (&config.draw_zone, &config.played_zone) {
        if let Some(next) = state.zones.take_front(draw, 1).pop() {
            state.zones.insert(played, next, ZonePosition::Front);
        }
    }
}

/// Mark the active card-driven seat as having passed because it cannot act.
///
/// Inside a grant window the holder's grants are declined instead.
pub fn skip_stuck_seat(def: &GameDef, state: &mut GameState) -> TurnFlowOutcome {
    let mut outcome = TurnFlowOutcome::default();
    let TurnOrderDef::CardDriven(config) = &def.turn_order else {
        return outcome;
    };
    let seat = state.active_player;
    let in_window = state
        .turn_order
        .card_driven()
        .is_some_and(CardDrivenRuntime::in_grant_window);
    if in_window {
        decline_grants(state);
    } else if let Some(card) = state.turn_order.card_driven_mut() {
        if !card.passed.contains(&seat) {
            card.passed.push(seat);
        }
    }
    if state
        .turn_order
        .card_driven()
        .is_some_and(|card| card_should_end(config, card))
    {
        end_card(def, state);
        outcome.card_ended = true;
        outcome.turn_ended = true;
    }
    sync_active_seat(def, state);
    outcome
}

/// Point `active_player` at the seat the turn-order runtime designates.
pub fn sync_active_seat(def: &GameDef, state: &mut GameState) {
    if let Some(seat) = state.turn_order.active_seat(def, state.player_count()) {
        state.active_player = seat;
    }
}

/// Rotate the turn order at a turn boundary.
pub fn rotate_turn_order(def: &GameDef, state: &mut GameState) {
    let player_count = state.player_count();
    match &mut state.turn_order {
        TurnOrderRuntime::RoundRobin => {
            state.active_player = state.active_player.next(player_count);
        }
        TurnOrderRuntime::Fixed { index } => {
            *index += 1;
        }
        TurnOrderRuntime::Simultaneous { submitted } => submitted.clear(),
        // Card ends rotate eligibility themselves.
        TurnOrderRuntime::CardDriven(_) => {}
    }
    sync_active_seat(def, state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ZoneId;
    use crate::def::ZoneDef;
    use crate::turn_flow::FreeOperationGrant;

    fn card_def(seats: u8, max_acting: u32) -> GameDef {
        let mut def = GameDef::minimal("cards");
        let mut config = CardDrivenConfig::new((0..seats).map(PlayerId).collect()).with_pass_action("pass");
        config.max_acting_per_card = max_acting;
        config.draw_zone = Some(ZoneId::new("deck:none"));
        config.played_zone = Some(ZoneId::new("played:none"));
        def.turn_order = TurnOrderDef::CardDriven(config);
        def.zones.push(ZoneDef::new("deck:none"));
        def.zones.push(ZoneDef::new("played:none"));
        def
    }

    fn card(state: &GameState) -> &CardDrivenRuntime {
        state.turn_order.card_driven().unwrap()
    }

    #[test]
    fn test_two_acting_seats_end_the_card() {
        let def = card_def(4, 2);
        let mut state = GameState::new(&def, 4, 0).unwrap();
        assert_eq!(state.active_player, PlayerId(0));

        let first = apply_turn_flow_eligibility_after_move(&def, &mut state, &Move::new("rally"));
        assert!(!first.turn_ended);
        assert_eq!(state.active_player, PlayerId(1));

        apply_turn_flow_eligibility_after_move(&def, &mut state, &Move::new("pass"));
        assert_eq!(state.active_player, PlayerId(2));

        let third = apply_turn_flow_eligibility_after_move(&def, &mut state, &Move::new("march"));
        assert!(third.card_ended && third.turn_ended);
        assert_eq!(card(&state).ineligible, vec![PlayerId(0), PlayerId(2)]);
        assert_eq!(card(&state).card_index, 1);
        assert_eq!(state.active_player, PlayerId(1));
    }

    #[test]
    fn test_pending_grants_hold_the_card_open() {
        let def = card_def(2, 1);
        let mut state = GameState::new(&def, 2, 0).unwrap();
        if let Some(card) = state.turn_order.card_driven_mut() {
            card.pending_grants.push(FreeOperationGrant {
                grant_id: "grant-0".to_string(),
                seat: PlayerId(1),
                operation_class: None,
                action_ids: Vec::new(),
                zone_filter: None,
                sequence_batch_id: None,
                sequence_index: None,
                remaining_uses: 1,
            });
        }
        let outcome = apply_turn_flow_eligibility_after_move(&def, &mut state, &Move::new("rally"));
        assert!(!outcome.card_ended);
        assert_eq!(state.active_player, PlayerId(1));

        // The holder passes, declining the grant; the card can now end.
        let outcome = apply_turn_flow_eligibility_after_move(&def, &mut state, &Move::new("pass"));
        assert!(outcome.card_ended);
        assert!(card(&state).pending_grants.is_empty());
    }

    #[test]
    fn test_overrides_apply_at_card_end() {
        let def = card_def(3, 2);
        let mut state = GameState::new(&def, 3, 0).unwrap();
        if let Some(card) = state.turn_order.card_driven_mut() {
            card.acted = vec![PlayerId(0), PlayerId(1)];
            card.pending_overrides.push(crate::turn_flow::EligibilityOverride {
                seat: PlayerId(0),
                eligible: true,
            });
            card.pending_overrides.push(crate::turn_flow::EligibilityOverride {
                seat: PlayerId(2),
                eligible: false,
            });
        }
        end_card(&def, &mut state);
        assert_eq!(card(&state).ineligible, vec![PlayerId(1), PlayerId(2)]);
        assert!(card(&state).pending_overrides.is_empty());
    }

    #[test]
    fn test_card_end_reveals_next_card() {
        let def = card_def(2, 1);
        let mut state = GameState::new(&def, 2, 0).unwrap();
        let token = crate::zones::Token {
            id: crate::core::TokenId::new("card-1"),
            token_type: "event".to_string(),
            props: Default::default(),
        };
        state.zones.insert(&ZoneId::new("deck:none"), token, ZonePosition::Front);
        end_card(&def, &mut state);
        assert_eq!(state.zones.zone_size(&ZoneId::new("deck:none")), 0);
        assert_eq!(state.zones.zone_size(&ZoneId::new("played:none")), 1);
    }

    #[test]
    fn test_simultaneous_turn_ends_after_all_submit() {
        let mut def = GameDef::minimal("simul");
        def.turn_order = TurnOrderDef::Simultaneous;
        let mut state = GameState::new(&def, 2, 0).unwrap();
        let first = apply_turn_flow_eligibility_after_move(&def, &mut state, &Move::new("bid"));
        assert!(!first.turn_ended);
        assert_eq!(state.active_player, PlayerId(1));
        let second = apply_turn_flow_eligibility_after_move(&def, &mut state, &Move::new("bid"));
        assert!(second.turn_ended);

        rotate_turn_order(&def, &mut state);
        assert_eq!(state.active_player, PlayerId(0));
    }

    #[test]
    fn test_round_robin_rotation() {
        let def = GameDef::minimal("rr");
        let mut state = GameState::new(&def, 3, 0).unwrap();
        rotate_turn_order(&def, &mut state);
        rotate_turn_order(&def, &mut state);
        rotate_turn_order(&def, &mut state);
        assert_eq!(state.active_player, PlayerId(0));
    }
}
