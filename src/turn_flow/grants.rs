//! Free-operation grant checks and consumption.
//!
//! A free move must be covered by a pending grant held by the active seat.
//! Candidates are narrowed step by step; the step that empties the
//! candidate set names the denial:
//!
//! 1. held by the active seat (`noActiveSeatGrant`)
//! 2. operation class matches (`actionClassMismatch`)
//! 3. action id accepted (`actionIdMismatch`)
//! 4. lowest unconsumed index of its batch (`sequenceLocked`)
//! 5. zone filter holds with the move's params bound (`zoneFilterMismatch`)

use crate::core::{FreeOperationDenial, GameState, Move, Result};
use crate::def::{ActionDef, DefRuntime, GameDef};
use crate::eval::{eval_condition, Bindings, EvalContext};

use super::runtime::{CardDrivenRuntime, FreeOperationGrant};

/// Find the grant that covers `mv`, or the reason none does.
///
/// Returns the covering grant's id.
pub fn check_free_operation_grant(
    def: &GameDef,
    runtime: &DefRuntime,
    state: &GameState,
    mv: &Move,
    action: &ActionDef,
    bindings: &Bindings,
) -> Result<std::result::Result<String, FreeOperationDenial>> {
    let Some(card) = state.turn_order.card_driven() else {
        return Ok(Err(FreeOperationDenial::NoActiveSeatGrant));
    };
    let seat = state.active_player;

    let mut candidates: Vec<&FreeOperationGrant> =
        card.pending_grants.iter().filter(|g| g.seat == seat).collect();
    if candidates.is_empty() {
        return Ok(Err(FreeOperationDenial::NoActiveSeatGrant));
    }

    let class = mv.action_class.as_ref().or(action.action_class.as_ref());
    candidates.retain(|g| g.operation_class.is_none() || g.operation_class.as_ref() == class);
    if candidates.is_empty() {
        return Ok(Err(FreeOperationDenial::ActionClassMismatch));
    }

    candidates.retain(|g| g.action_ids.is_empty() || g.action_ids.contains(&mv.action_id));
    if candidates.is_empty() {
        return Ok(Err(FreeOperationDenial::ActionIdMismatch));
    }

    candidates.retain(|g| !is_sequence_locked(card, g));
    if candidates.is_empty() {
        return Ok(Err(FreeOperationDenial::SequenceLocked));
    }

    let ctx = EvalContext::new(def, runtime, state, bindings, seat);
    for grant in candidates {
        let passes = match &grant.zone_filter {
            Some(filter) => eval_condition(filter, &ctx)
                .map_err(|e| e.in_predicate(format!("grant `{}` zone filter", grant.grant_id)))?,
            None => true,
        };
        if passes {
            return Ok(Ok(grant.grant_id.clone()));
        }
    }
    Ok(Err(FreeOperationDenial::ZoneFilterMismatch))
}

/// Whether an earlier grant of the same batch is still pending.
#[must_use]
pub fn is_sequence_locked(card: &CardDrivenRuntime, grant: &FreeOperationGrant) -> bool {
    let (Some(batch), Some(index)) = (&grant.sequence_batch_id, grant.sequence_index) else {
        return false;
    };
    card.pending_grants.iter().any(|other| {
        other.sequence_batch_id.as_ref() == Some(batch)
            && other.sequence_index.is_some_and(|i| i < index)
    })
}

/// Spend one use of a grant, dropping it when exhausted.
pub fn consume_turn_flow_free_operation_grant(state: &mut GameState, grant_id: &str) {
    let Some(card) = state.turn_order.card_driven_mut() else {
        return;
    };
    if let Some(grant) = card.pending_grants.iter_mut().find(|g| g.grant_id == grant_id) {
        grant.remaining_uses = grant.remaining_uses.saturating_sub(1);
    }
    card.pending_grants.retain(|g| g.remaining_uses > 0);
    tracing::debug!(grant = grant_id, remaining = card.pending_grants.len(), "grant consumed");
}

/// Drop every grant held by the seat; used when the holder passes.
pub fn decline_grants(state: &mut GameState) {
    let seat = state.active_player;
    if let Some(card) = state.turn_order.card_driven_mut() {
        card.pending_grants.retain(|g| g.seat != seat);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PlayerId, ZoneId};
    use crate::def::{CardDrivenConfig, TurnOrderDef, ZoneDef};
    use crate::eval::{Condition, Reference, ValueExpr};
    use crate::turn_flow::TurnOrderRuntime;

    fn grant(id: &str, seat: u8) -> FreeOperationGrant {
        FreeOperationGrant {
            grant_id: id.to_string(),
            seat: PlayerId(seat),
            operation_class: None,
            action_ids: Vec::new(),
            zone_filter: None,
            sequence_batch_id: None,
            sequence_index: None,
            remaining_uses: 1,
        }
    }

    fn sequenced(id: &str, index: u32) -> FreeOperationGrant {
        FreeOperationGrant {
            sequence_batch_id: Some("b".to_string()),
            sequence_index: Some(index),
            ..grant(id, 0)
        }
    }

    fn fixture(grants: Vec<FreeOperationGrant>) -> (GameDef, DefRuntime, GameState) {
        let mut def = GameDef::minimal("grants");
        def.zones.push(ZoneDef::new("saigon:none"));
        def.zones.push(ZoneDef::new("hue:none"));
        def.turn_order = TurnOrderDef::CardDriven(CardDrivenConfig::new(vec![PlayerId(0), PlayerId(1)]));
        def.actions.push(ActionDef::new("rally").with_class("operation"));
        def.actions.push(ActionDef::new("march").with_class("operation"));
        let runtime = DefRuntime::new(&def);
        let mut state = GameState::new(&def, 2, 0).unwrap();
        if let TurnOrderRuntime::CardDriven(card) = &mut state.turn_order {
            card.pending_grants = grants;
        }
        state.active_player = PlayerId(0);
        (def, runtime, state)
    }

    fn check(
        def: &GameDef,
        runtime: &DefRuntime,
        state: &GameState,
        mv: &Move,
    ) -> std::result::Result<String, FreeOperationDenial> {
        let action = def.action(&mv.action_id).unwrap();
        let bindings = Bindings::from_params(&mv.params);
        check_free_operation_grant(def, runtime, state, mv, action, &bindings).unwrap()
    }

    #[test]
    fn test_no_grant_for_seat() {
        let (def, runtime, state) = fixture(vec![grant("g1", 1)]);
        assert_eq!(
            check(&def, &runtime, &state, &Move::new("rally").free()),
            Err(FreeOperationDenial::NoActiveSeatGrant)
        );
    }

    #[test]
    fn test_class_and_id_narrowing() {
        let special = FreeOperationGrant {
            operation_class: Some("special".to_string()),
            ..grant("g1", 0)
        };
        let (def, runtime, state) = fixture(vec![special]);
        assert_eq!(
            check(&def, &runtime, &state, &Move::new("rally").free()),
            Err(FreeOperationDenial::ActionClassMismatch)
        );

        let only_march = FreeOperationGrant {
            action_ids: vec![crate::core::ActionId::new("march")],
            ..grant("g2", 0)
        };
        let (def, runtime, state) = fixture(vec![only_march]);
        assert_eq!(
            check(&def, &runtime, &state, &Move::new("rally").free()),
            Err(FreeOperationDenial::ActionIdMismatch)
        );
        assert_eq!(
            check(&def, &runtime, &state, &Move::new("march").free()),
            Ok("g2".to_string())
        );
    }

    #[test]
    fn test_sequence_lock_until_consumed() {
        let only_march = FreeOperationGrant {
            action_ids: vec![crate::core::ActionId::new("march")],
            ..sequenced("g0", 0)
        };
        let (def, runtime, mut state) = fixture(vec![only_march, sequenced("g1", 1)]);
        let rally = Move::new("rally").free();
        assert_eq!(
            check(&def, &runtime, &state, &rally),
            Err(FreeOperationDenial::SequenceLocked)
        );

        consume_turn_flow_free_operation_grant(&mut state, "g0");
        assert_eq!(check(&def, &runtime, &state, &rally), Ok("g1".to_string()));
        assert_eq!(state.turn_order.card_driven().unwrap().pending_grants.len(), 1);
    }

    #[test]
    fn test_zone_filter_uses_move_params() {
        let filtered = FreeOperationGrant {
            zone_filter: Some(Condition::eq(
                ValueExpr::Ref(Reference::Binding("space".to_string())),
                ValueExpr::Str("saigon:none".to_string()),
            )),
            ..grant("g1", 0)
        };
        let (def, runtime, state) = fixture(vec![filtered]);
        let hue = Move::new("rally").free().with_param("space", "hue:none");
        assert_eq!(
            check(&def, &runtime, &state, &hue),
            Err(FreeOperationDenial::ZoneFilterMismatch)
        );
        let saigon = Move::new("rally").free().with_param("space", "saigon:none");
        assert!(check(&def, &runtime, &state, &saigon).is_ok());
        assert!(state.zones.contains_zone(&ZoneId::new("saigon:none")));
    }

    #[test]
    fn test_multi_use_grant() {
        let twice = FreeOperationGrant {
            remaining_uses: 2,
            ..grant("g1", 0)
        };
        let (_, _, mut state) = fixture(vec![twice]);
        consume_turn_flow_free_operation_grant(&mut state, "g1");
        assert_eq!(state.turn_order.card_driven().unwrap().pending_grants[0].remaining_uses, 1);
        consume_turn_flow_free_operation_grant(&mut state, "g1");
        assert!(state.turn_order.card_driven().unwrap().pending_grants.is_empty());
    }
}
