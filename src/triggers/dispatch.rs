//! Trigger dispatch with bounded cascades.
//!
//! An event is matched against the index, each firing trigger's effects run
//! in their own budgeted session, and the events those effects emit are
//! dispatched recursively one level deeper. A firing deeper than the
//! definition's `max_trigger_depth` aborts the whole transition.

use serde::{Deserialize, Serialize};

use crate::core::{GameState, KernelError, PhaseId, PlayerId, Result, TriggerId};
use crate::def::{DefRuntime, GameDef};
use crate::effects::{apply_effects, EffectContext, EffectTraceEntry, EventContext};
use crate::eval::{eval_condition, EvalContext};

use super::event::{EventKind, TriggerEvent, VarScope};

/// One trigger firing, in firing order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerLogEntry {
    pub trigger: TriggerId,
    pub event: EventKind,
    /// 1 for events raised directly by a move or transition.
    pub depth: u32,
    pub turn: u32,
    pub phase: PhaseId,
}

/// Dispatches events against a definition's triggers and collects the log.
#[derive(Debug)]
pub struct TriggerDispatcher<'a> {
    def: &'a GameDef,
    runtime: &'a DefRuntime,
    max_effect_ops: u32,
    trace: bool,
    log: Vec<TriggerLogEntry>,
    effect_trace: Vec<EffectTraceEntry>,
}

impl<'a> TriggerDispatcher<'a> {
    pub fn new(def: &'a GameDef, runtime: &'a DefRuntime, max_effect_ops: u32) -> Self {
        Self {
            def,
            runtime,
            max_effect_ops,
            trace: false,
            log: Vec::new(),
            effect_trace: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Dispatch top-level events in order.
    pub fn dispatch(&mut self, mut state: GameState, events: &[TriggerEvent]) -> Result<GameState> {
        for event in events {
            state = self.dispatch_at(state, event, 1)?;
        }
        Ok(state)
    }

    fn dispatch_at(&mut self, mut state: GameState, event: &TriggerEvent, depth: u32) -> Result<GameState> {
        let def = self.def;
        let runtime = self.runtime;
        for &index in runtime.triggers.candidates(event.kind()) {
            let trigger = &def.triggers[index];
            if !trigger.event.matches(event) {
                continue;
            }

            let bindings = event.bindings();
            let actor = event_actor(event).unwrap_or(state.active_player);
            {
                let ctx = EvalContext::new(def, runtime, &state, &bindings, actor);
                let mut fires = true;
                for (label, condition) in [("match", &trigger.match_), ("when", &trigger.when)] {
                    if let Some(condition) = condition {
                        fires = eval_condition(condition, &ctx)
                            .map_err(|e| e.in_predicate(format!("trigger `{}` {label}", trigger.id)))?;
                        if !fires {
                            break;
                        }
                    }
                }
                if !fires {
                    continue;
                }
            }

            let max_depth = def.metadata.max_trigger_depth;
            if depth > max_depth {
                return Err(KernelError::MaxTriggerDepthExceeded {
                    max_depth,
                    event: event.to_string(),
                });
            }

            tracing::debug!(trigger = %trigger.id, %event, depth, "trigger fired");
            self.log.push(TriggerLogEntry {
                trigger: trigger.id.clone(),
                event: event.kind(),
                depth,
                turn: state.turn_count,
                phase: state.current_phase.clone(),
            });

            let ctx = EffectContext::new(def, runtime, actor)
                .with_bindings(bindings)
                .with_max_effect_ops(self.max_effect_ops)
                .with_trace(self.trace)
                .with_event_context(EventContext::Trigger {
                    trigger: trigger.id.clone(),
                    depth,
                })
                .with_path_root(format!("trigger:{}", trigger.id));
            let result = apply_effects(&trigger.effects, &state, &ctx)?;
            state = result.state;
            self.effect_trace.extend(result.trace);

            for emitted in &result.events {
                state = self.dispatch_at(state, emitted, depth + 1)?;
            }
        }
        Ok(state)
    }

    /// Append trace entries produced outside trigger bodies, keeping one
    /// chronological trace.
    pub fn extend_trace(&mut self, entries: impl IntoIterator<Item = EffectTraceEntry>) {
        if self.trace {
            self.effect_trace.extend(entries);
        }
    }

    #[must_use]
    pub fn log(&self) -> &[TriggerLogEntry] {
        &self.log
    }

    /// The firing log and the effect trace gathered by trigger bodies.
    #[must_use]
    pub fn finish(self) -> (Vec<TriggerLogEntry>, Vec<EffectTraceEntry>) {
        (self.log, self.effect_trace)
    }
}

/// The seat an event is about, if any.
fn event_actor(event: &TriggerEvent) -> Option<PlayerId> {
    match event {
        TriggerEvent::TurnStart { player, .. }
        | TriggerEvent::TurnEnd { player, .. }
        | TriggerEvent::ActionResolved { actor: player, .. } => Some(*player),
        TriggerEvent::VarChanged {
            scope: VarScope::Player(player),
            ..
        } => Some(*player),
        _ => None,
    }
}
