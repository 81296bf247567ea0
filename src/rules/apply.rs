//! Committing a move.
//!
//! `apply_move` validates through the shared resolution path, then commits
//! the resolved state and runs the post-move pipeline: lasting-effect
//! activation, usage counters, grant consumption, triggers for the events
//! the move emitted, `actionResolved` triggers, turn-flow bookkeeping,
//! advancing to the next decision point, and the state hash.
//!
//! Every step works on an owned state; any error discards it and leaves the
//! caller's state as it was.

use serde::{Deserialize, Serialize};

use crate::core::{
    compute_state_hash, ApplyMoveError, GameState, IllegalMoveError, IllegalMoveReason, Move,
};
use crate::effects::EffectTraceEntry;
use crate::eval::Bindings;
use crate::triggers::{TriggerEvent, TriggerLogEntry};
use crate::turn_flow::{
    apply_turn_flow_eligibility_after_move, consume_turn_flow_free_operation_grant,
};

use super::advance::Transition;
use super::resolve::{resolve_move, Resolution, Rules};

/// The outcome of a committed move.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyMoveResult {
    pub state: GameState,
    /// Every trigger firing, in firing order.
    pub trigger_firings: Vec<TriggerLogEntry>,
    /// Non-fatal notes, such as a partial pipeline skipping its cost.
    pub warnings: Vec<String>,
    /// Present when tracing was requested.
    pub effect_trace: Option<Vec<EffectTraceEntry>>,
}

pub(crate) fn apply(
    rules: &Rules<'_>,
    state: &GameState,
    mv: &Move,
) -> std::result::Result<ApplyMoveResult, ApplyMoveError> {
    let resolved = match resolve_move(rules, state, mv)? {
        Resolution::Complete(resolved) => resolved,
        Resolution::Pending(request) => {
            return Err(IllegalMoveError::new(
                IllegalMoveReason::MoveHasIncompleteParams,
                &mv.action_id,
                format!(
                    "decision `{}` has no selection for `{}`",
                    request.decision.decision_id, request.decision.name
                ),
            )
            .into());
        }
    };

    let def = rules.def;
    let mover = state.active_player;
    let mut transition = Transition::new(*rules);
    let result = resolved.session.into_result();
    let mut next = result.state;
    let mut events = result.events;
    transition.record_trace(result.trace);

    let host_bindings = Bindings::from_params(&mv.params);
    next = transition.activate_lasting(next, resolved.action, resolved.executor, &host_bindings, &mut events)?;
    next.record_usage(&resolved.action.id);
    let mut resolved_events = vec![TriggerEvent::ActionResolved {
        action: resolved.action.id.clone(),
        actor: mover,
    }];
    if let (Some((special, executor)), Some(compound)) = (resolved.special, &mv.compound) {
        let sa_bindings = Bindings::from_params(&compound.special_activity.params);
        next = transition.activate_lasting(next, special, executor, &sa_bindings, &mut events)?;
        next.record_usage(&special.id);
        resolved_events.push(TriggerEvent::ActionResolved {
            action: special.id.clone(),
            actor: mover,
        });
    }
    if let Some(grant_id) = &resolved.grant_id {
        consume_turn_flow_free_operation_grant(&mut next, grant_id);
    }

    next = transition.dispatch(next, &events)?;
    next = transition.dispatch(next, &resolved_events)?;

    let outcome = apply_turn_flow_eligibility_after_move(def, &mut next, mv);
    if outcome.turn_ended {
        next = transition.turn_boundary(next)?;
    }
    next = transition.advance(next)?;
    next.state_hash = compute_state_hash(&next);

    let (trigger_firings, trace) = transition.finish();
    tracing::debug!(
        action = %mv.action_id,
        firings = trigger_firings.len(),
        turn = next.turn_count,
        active = %next.active_player,
        "move applied"
    );
    Ok(ApplyMoveResult {
        state: next,
        trigger_firings,
        warnings: resolved.warnings,
        effect_trace: rules.options.trace.then_some(trace),
    })
}
