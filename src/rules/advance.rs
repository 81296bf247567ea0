//! Phase and turn transitions.
//!
//! After a move commits, the kernel advances until the active seat has a
//! legal move or the game is over. Each step either resumes a suspended
//! phase, skips a stuck card-driven seat, enters the next phase, or closes
//! the turn. The number of steps per move is bounded.
//!
//! ## Boundaries
//!
//! Leaving a phase fires `phaseExit`, tears down phase-scoped lasting
//! effects and resets phase usage. Closing a turn fires `turnEnd`, tears
//! down turn-scoped lasting effects, resets turn usage, rotates the turn
//! order, then fires `phaseEnter` and `turnStart` for the new turn.

use im::Vector;

use crate::core::{
    ActionId, ActiveLastingEffect, DefinitionKind, GameState, KernelError, PlayerId, Result,
};
use crate::def::{ActionDef, LastingDuration, TurnOrderDef, UsageScope};
use crate::effects::{apply_effects, EffectContext, EffectTraceEntry, EventContext};
use crate::eval::Bindings;
use crate::triggers::{TriggerDispatcher, TriggerEvent, TriggerLogEntry};
use crate::turn_flow::{rotate_turn_order, skip_stuck_seat, sync_active_seat};

use super::enumerate::has_legal_move;
use super::resolve::Rules;
use super::terminal::terminal_result;

/// One state transition's trigger dispatcher and step budget.
pub(crate) struct Transition<'d> {
    rules: Rules<'d>,
    dispatcher: TriggerDispatcher<'d>,
    steps: u32,
}

impl<'d> Transition<'d> {
    pub fn new(rules: Rules<'d>) -> Self {
        let dispatcher = TriggerDispatcher::new(rules.def, rules.runtime, rules.options.max_effect_ops)
            .with_trace(rules.options.trace);
        Self {
            rules,
            dispatcher,
            steps: 0,
        }
    }

    pub fn dispatch(&mut self, state: GameState, events: &[TriggerEvent]) -> Result<GameState> {
        self.dispatcher.dispatch(state, events)
    }

    pub fn record_trace(&mut self, entries: Vec<EffectTraceEntry>) {
        self.dispatcher.extend_trace(entries);
    }

    /// Firing log and chronological effect trace.
    pub fn finish(self) -> (Vec<TriggerLogEntry>, Vec<EffectTraceEntry>) {
        self.dispatcher.finish()
    }

    // === Lasting effects ===

    /// Run the action's lasting-effect setups and register them.
    ///
    /// Events the setups emit are appended to `events`.
    pub fn activate_lasting(
        &mut self,
        mut state: GameState,
        action: &ActionDef,
        executor: PlayerId,
        bindings: &Bindings,
        events: &mut Vec<TriggerEvent>,
    ) -> Result<GameState> {
        for lasting in &action.lasting_effects {
            let ctx = self
                .lasting_context(&action.id, executor, EventContext::LastingSetup {
                    id: lasting.id.clone(),
                })
                .with_bindings(bindings.clone())
                .with_path_root(format!("lasting:{}/setup", lasting.id));
            let result = apply_effects(&lasting.setup, &state, &ctx)?;
            state = result.state;
            self.record_trace(result.trace);
            events.extend(result.events);
            state.lasting_effects.push_back(ActiveLastingEffect {
                id: lasting.id.clone(),
                action_id: action.id.clone(),
                duration: lasting.duration,
                executor,
            });
            tracing::debug!(lasting = %lasting.id, action = %action.id, "lasting effect activated");
        }
        Ok(state)
    }

    /// Tear down every active lasting effect of `duration`, oldest first.
    fn expire_lasting(&mut self, mut state: GameState, duration: LastingDuration) -> Result<GameState> {
        let (expiring, kept): (Vector<ActiveLastingEffect>, Vector<ActiveLastingEffect>) = state
            .lasting_effects
            .iter()
            .cloned()
            .partition(|active| active.duration == duration);
        if expiring.is_empty() {
            return Ok(state);
        }
        state.lasting_effects = kept;

        let def = self.rules.def;
        for active in expiring {
            let lasting = def
                .lasting_effect(&active.id)
                .ok_or_else(|| KernelError::missing(DefinitionKind::LastingEffect, &active.id))?;
            let ctx = self
                .lasting_context(&active.action_id, active.executor, EventContext::LastingTeardown {
                    id: active.id.clone(),
                })
                .with_path_root(format!("lasting:{}/teardown", active.id));
            let result = apply_effects(&lasting.teardown, &state, &ctx)?;
            state = result.state;
            self.record_trace(result.trace);
            state = self.dispatch(state, &result.events)?;
            tracing::debug!(lasting = %active.id, "lasting effect expired");
        }
        Ok(state)
    }

    fn lasting_context(
        &self,
        action_id: &ActionId,
        executor: PlayerId,
        event_context: EventContext,
    ) -> EffectContext<'d> {
        EffectContext::new(self.rules.def, self.rules.runtime, executor)
            .with_max_effect_ops(self.rules.options.max_effect_ops)
            .with_trace(self.rules.options.trace)
            .with_event_context(event_context)
            .with_action(action_id.clone())
    }

    // === Boundaries ===

    fn leave_phase(&mut self, mut state: GameState) -> Result<GameState> {
        let phase = state.current_phase.clone();
        tracing::debug!(%phase, turn = state.turn_count, "leaving phase");
        state = self.dispatch(state, &[TriggerEvent::PhaseExit { phase }])?;
        state = self.expire_lasting(state, LastingDuration::Phase)?;
        state.reset_usage(UsageScope::Phase);
        Ok(state)
    }

    fn close_turn(&mut self, mut state: GameState) -> Result<GameState> {
        let def = self.rules.def;
        let ending = TriggerEvent::TurnEnd {
            turn: state.turn_count,
            player: state.active_player,
        };
        state = self.dispatch(state, &[ending])?;
        state = self.expire_lasting(state, LastingDuration::Turn)?;
        state.reset_usage(UsageScope::Turn);

        rotate_turn_order(def, &mut state);
        state.turn_count += 1;
        state.current_phase = def.first_phase()?.clone();
        state.interrupt_stack = Vector::new();
        tracing::debug!(turn = state.turn_count, active = %state.active_player, "turn started");

        let events = [
            TriggerEvent::PhaseEnter {
                phase: state.current_phase.clone(),
            },
            TriggerEvent::TurnStart {
                turn: state.turn_count,
                player: state.active_player,
            },
        ];
        self.dispatch(state, &events)
    }

    /// Leave the current phase and close the turn.
    pub fn turn_boundary(&mut self, state: GameState) -> Result<GameState> {
        let state = self.leave_phase(state)?;
        self.close_turn(state)
    }

    fn step(&mut self) -> Result<()> {
        self.steps += 1;
        let max = self.rules.options.max_phase_transitions_per_move;
        if self.steps > max {
            return Err(KernelError::PhaseTransitionBudgetExceeded { max });
        }
        Ok(())
    }

    /// Advance until the active seat can move or the game is over.
    pub fn advance(&mut self, mut state: GameState) -> Result<GameState> {
        let def = self.rules.def;
        loop {
            if terminal_result(def, self.rules.runtime, &state)?.is_some()
                || has_legal_move(&self.rules, &state)?
            {
                return Ok(state);
            }
            self.step()?;

            if let Some(resume) = state.interrupt_stack.back().cloned() {
                state = self.leave_phase(state)?;
                state.interrupt_stack.pop_back();
                tracing::debug!(phase = %resume, "resuming suspended phase");
                state.current_phase = resume;
                continue;
            }

            if matches!(def.turn_order, TurnOrderDef::CardDriven(_)) {
                tracing::debug!(seat = %state.active_player, "seat cannot act, passing");
                let outcome = skip_stuck_seat(def, &mut state);
                if outcome.turn_ended {
                    state = self.turn_boundary(state)?;
                }
                continue;
            }

            state = self.leave_phase(state)?;
            let next = def
                .turn_structure
                .phase_index(&state.current_phase)
                .and_then(|i| def.turn_structure.phases.get(i + 1));
            match next {
                Some(phase) => {
                    state.current_phase = phase.id.clone();
                    sync_active_seat(def, &mut state);
                    let enter = TriggerEvent::PhaseEnter {
                        phase: phase.id.clone(),
                    };
                    state = self.dispatch(state, &[enter])?;
                }
                None => state = self.close_turn(state)?,
            }
        }
    }
}
