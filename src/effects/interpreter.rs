//! Budget-limited effect interpreter.
//!
//! Effects run inside an `EffectSession`: an owned working copy of the
//! state plus the events and trace entries produced so far. The caller's
//! state is never touched; a failed run simply drops the session.
//!
//! ## Budget
//!
//! Every node costs one operation, structural nodes included. The budget is
//! per session, so all stages of one move share it.
//!
//! ## Decisions
//!
//! `chooseOne`/`chooseN` never pick anything. They look up the selection
//! the move already carries and check it against the freshly evaluated
//! domain. In `Strict` mode a missing or bad selection is an
//! `EFFECT_RUNTIME` error; in `Discover` mode it halts the run so the
//! orchestrator can report a pending decision or an illegal move.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use super::effect::{EffectAst, InsertPosition, PriorityGroup, VarTarget};
use super::trace::{EffectTraceEntry, EventContext, Provenance, TraceKind};
use crate::core::{
    ActionId, DefinitionKind, EffectRuntimeReason, GameRngState, GameState, KernelError,
    PlayerId, Result, Scalar, TokenId, Value, ZoneId,
};
use crate::def::{DefRuntime, GameDef, VarDef, ZoneOrdering};
use crate::eval::{
    eval_condition, eval_int, eval_query, eval_value, resolve_player, resolve_token, resolve_zone,
    same_identity, Bindings, EvalContext, PlayerRef, Query, QueryFilter, ValueExpr, ZoneRef,
};
use crate::triggers::{TriggerEvent, VarScope};
use crate::turn_flow::{EligibilityOverride, FreeOperationGrant};
use crate::zones::{check_stacking, Token, TokenLocation, ZonePosition};

/// Default operation budget per top-level call.
pub const DEFAULT_MAX_EFFECT_OPS: u32 = 10_000;

/// Iteration bound of a `forEach` without an explicit `limit`.
pub const DEFAULT_FOR_EACH_LIMIT: i64 = 100;

/// How decision nodes treat missing or invalid selections.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DecisionMode {
    #[default]
    Strict,
    Discover,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChoiceKind {
    ChooseOne,
    ChooseN,
}

/// The next decision a move has not supplied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDecision {
    /// `{effect path}::{resolved bind name}`, stable across calls.
    pub decision_id: String,
    /// Param name the move must carry.
    pub name: String,
    pub kind: ChoiceKind,
    pub domain: Vec<Value>,
    pub min: usize,
    pub max: usize,
}

/// Why a session stopped early.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum EffectHalt {
    Fatal(KernelError),
    Pending(PendingDecision),
    Illegal { decision: String, detail: String },
}

impl From<KernelError> for EffectHalt {
    fn from(err: KernelError) -> Self {
        Self::Fatal(err)
    }
}

impl EffectHalt {
    fn into_kernel_error(self) -> KernelError {
        match self {
            Self::Fatal(err) => err,
            Self::Pending(pending) => KernelError::effect(
                EffectRuntimeReason::MissingDecisionBinding,
                &pending.decision_id,
                format!("no selection for `{}`", pending.name),
            ),
            Self::Illegal { decision, detail } => {
                KernelError::effect(EffectRuntimeReason::ChoiceOutOfDomain, decision, detail)
            }
        }
    }
}

/// Everything effects run against besides the state.
#[derive(Clone, Debug)]
pub struct EffectContext<'a> {
    pub def: &'a GameDef,
    pub runtime: &'a DefRuntime,
    pub actor: PlayerId,
    pub bindings: Bindings,
    pub mode: DecisionMode,
    pub max_effect_ops: u32,
    pub trace: bool,
    pub event_context: EventContext,
    pub action_id: Option<ActionId>,
    /// First segment of every effect path.
    pub path_root: String,
}

impl<'a> EffectContext<'a> {
    pub fn new(def: &'a GameDef, runtime: &'a DefRuntime, actor: PlayerId) -> Self {
        Self {
            def,
            runtime,
            actor,
            bindings: Bindings::new(),
            mode: DecisionMode::Strict,
            max_effect_ops: DEFAULT_MAX_EFFECT_OPS,
            trace: false,
            event_context: EventContext::Direct,
            action_id: None,
            path_root: "effects".to_string(),
        }
    }

    #[must_use]
    pub fn with_bindings(mut self, bindings: Bindings) -> Self {
        self.bindings = bindings;
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: DecisionMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_max_effect_ops(mut self, max_effect_ops: u32) -> Self {
        self.max_effect_ops = max_effect_ops;
        self
    }

    #[must_use]
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    #[must_use]
    pub fn with_event_context(mut self, event_context: EventContext) -> Self {
        self.event_context = event_context;
        self
    }

    #[must_use]
    pub fn with_action(mut self, action_id: ActionId) -> Self {
        self.action_id = Some(action_id);
        self
    }

    #[must_use]
    pub fn with_path_root(mut self, root: impl Into<String>) -> Self {
        self.path_root = root.into();
        self
    }
}

/// Output of a successful `apply_effects`.
#[derive(Clone, Debug)]
pub struct EffectResult {
    pub state: GameState,
    pub rng: GameRngState,
    pub events: Vec<TriggerEvent>,
    pub trace: Vec<EffectTraceEntry>,
    pub ops_used: u32,
}

/// Run an effect list in strict mode.
pub fn apply_effects(
    effects: &[EffectAst],
    state: &GameState,
    ctx: &EffectContext<'_>,
) -> Result<EffectResult> {
    let mut session = EffectSession::new(state.clone(), ctx.max_effect_ops);
    session
        .run(ctx, effects)
        .map_err(EffectHalt::into_kernel_error)?;
    Ok(session.into_result())
}

/// Run a single effect node in strict mode.
pub fn apply_effect(
    effect: &EffectAst,
    state: &GameState,
    ctx: &EffectContext<'_>,
) -> Result<EffectResult> {
    apply_effects(std::slice::from_ref(effect), state, ctx)
}

/// A working copy of the state with its accumulated side outputs.
#[derive(Clone, Debug)]
pub(crate) struct EffectSession {
    pub state: GameState,
    pub events: Vec<TriggerEvent>,
    pub trace: Vec<EffectTraceEntry>,
    ops: u32,
    max_ops: u32,
}

impl EffectSession {
    pub fn new(state: GameState, max_ops: u32) -> Self {
        Self {
            state,
            events: Vec::new(),
            trace: Vec::new(),
            ops: 0,
            max_ops,
        }
    }

    /// Run `effects` with `ctx.bindings` in scope.
    pub fn run(&mut self, ctx: &EffectContext<'_>, effects: &[EffectAst]) -> Step {
        let mut interpreter = Interpreter {
            bindings: ctx.bindings.clone(),
            path: vec![ctx.path_root.clone()],
            session: self,
            ctx,
        };
        interpreter.exec_list(effects)
    }

    pub fn ops_used(&self) -> u32 {
        self.ops
    }

    /// Take the events emitted so far.
    pub fn drain_events(&mut self) -> Vec<TriggerEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn into_result(self) -> EffectResult {
        EffectResult {
            rng: self.state.rng.clone(),
            state: self.state,
            events: self.events,
            trace: self.trace,
            ops_used: self.ops,
        }
    }
}

type Step = std::result::Result<(), EffectHalt>;

struct Interpreter<'s, 'c, 'a> {
    session: &'s mut EffectSession,
    ctx: &'c EffectContext<'a>,
    bindings: Bindings,
    path: Vec<String>,
}

impl<'s, 'c, 'a> Interpreter<'s, 'c, 'a> {
    // === Plumbing ===

    fn path(&self) -> String {
        self.path.join("/")
    }

    fn eval(&self) -> EvalContext<'_> {
        EvalContext::new(
            self.ctx.def,
            self.ctx.runtime,
            &self.session.state,
            &self.bindings,
            self.ctx.actor,
        )
    }

    fn runtime_error(&self, reason: EffectRuntimeReason, message: impl Into<String>) -> EffectHalt {
        EffectHalt::Fatal(KernelError::effect(reason, self.path(), message))
    }

    fn consume(&mut self) -> Step {
        self.session.ops += 1;
        if self.session.ops > self.session.max_ops {
            return Err(EffectHalt::Fatal(KernelError::EffectBudgetExceeded {
                max_effect_ops: self.session.max_ops,
                path: self.path(),
            }));
        }
        Ok(())
    }

    fn record(&mut self, kind: TraceKind) {
        if !self.ctx.trace {
            return;
        }
        let provenance = Provenance {
            phase: self.session.state.current_phase.clone(),
            event_context: self.ctx.event_context.clone(),
            action_id: self.ctx.action_id.clone(),
            effect_path: self.path(),
        };
        self.session.trace.push(EffectTraceEntry { kind, provenance });
    }

    fn int(&self, expr: &ValueExpr) -> std::result::Result<i64, EffectHalt> {
        Ok(eval_int(expr, &self.eval())?)
    }

    fn value(&self, expr: &ValueExpr) -> std::result::Result<Value, EffectHalt> {
        Ok(eval_value(expr, &self.eval())?)
    }

    fn query(&self, query: &Query) -> std::result::Result<Vec<Value>, EffectHalt> {
        Ok(eval_query(query, &self.eval())?)
    }

    fn zone(&self, zone: &ZoneRef) -> std::result::Result<ZoneId, EffectHalt> {
        Ok(resolve_zone(zone, &self.eval())?)
    }

    fn player(&self, player: &PlayerRef) -> std::result::Result<PlayerId, EffectHalt> {
        Ok(resolve_player(player, &self.eval())?)
    }

    fn exec_list(&mut self, effects: &[EffectAst]) -> Step {
        for (i, effect) in effects.iter().enumerate() {
            self.path.push(format!("{i}:{}", effect.kind()));
            self.exec(effect)?;
            self.path.pop();
        }
        Ok(())
    }

    /// Run a nested list under a named path segment and binding scope.
    fn nested(&mut self, segment: &str, effects: &[EffectAst]) -> Step {
        let mark = self.bindings.mark();
        self.path.push(segment.to_string());
        self.exec_list(effects)?;
        self.path.pop();
        self.bindings.truncate(mark);
        Ok(())
    }

    fn exec(&mut self, effect: &EffectAst) -> Step {
        self.consume()?;
        tracing::trace!(path = %self.path(), "effect");

        match effect {
            // === Variables ===
            EffectAst::SetVar { target, var, value } => {
                let value = self.value(value)?;
                let raw = match value.as_int().or_else(|| value.as_bool().map(i64::from)) {
                    Some(v) => v,
                    None => {
                        return Err(KernelError::type_mismatch("int", value.type_name(), var.clone()).into())
                    }
                };
                let (scope, var_def, current) = self.var_slot(target, var)?;
                let next = var_def.clamp(raw);
                self.store_var(scope, var, current, next);
                Ok(())
            }

            EffectAst::AddVar { target, var, delta } => {
                let delta = self.int(delta)?;
                let (scope, var_def, current) = self.var_slot(target, var)?;
                let next = var_def.clamp(current.saturating_add(delta));
                self.store_var(scope, var, current, next);
                Ok(())
            }

            // === Tokens ===
            EffectAst::MoveToken {
                token,
                from,
                to,
                position,
            } => {
                let id = resolve_token(token, &self.eval())?;
                let from = self.zone(from)?;
                let to = self.zone(to)?;
                let index = self.locate_in(&id, &from)?;
                self.relocate(&id, &from, index, &to, *position)
            }

            EffectAst::MoveTokenAdjacent {
                token,
                from,
                to,
                position,
            } => {
                let id = resolve_token(token, &self.eval())?;
                let from = self.zone(from)?;
                let to = self.zone(to)?;
                if !self.ctx.runtime.adjacency.is_adjacent(&from, &to) {
                    return Err(self.runtime_error(
                        EffectRuntimeReason::NotAdjacent,
                        format!("`{to}` is not adjacent to `{from}`"),
                    ));
                }
                let index = self.locate_in(&id, &from)?;
                self.relocate(&id, &from, index, &to, *position)
            }

            EffectAst::MoveAll { from, to, filter } => {
                let from = self.zone(from)?;
                let to = self.zone(to)?;
                self.move_all(&from, &to, filter.as_ref())
            }

            EffectAst::Draw { from, to, count } => {
                let count = self.int(count)?;
                let from = self.zone(from)?;
                let to = self.zone(to)?;
                if count <= 0 || from == to {
                    return Ok(());
                }
                let available = self.session.state.zones.zone_size(&from);
                let taken: Vec<usize> = (0..(count as usize).min(available)).collect();
                self.move_block(&from, &to, &taken)
            }

            EffectAst::Shuffle { zone } => {
                let zone = self.zone(zone)?;
                self.shuffle(&zone);
                Ok(())
            }

            EffectAst::CreateToken {
                token_type,
                zone,
                props,
            } => self.create_token(token_type, zone, props),

            EffectAst::DestroyToken { token } => {
                let id = resolve_token(token, &self.eval())?;
                let (zone, index) = self.locate(&id)?;
                self.session.state.zones.remove_at(&zone, index);
                self.record(TraceKind::TokenDestroyed { token: id, zone });
                Ok(())
            }

            EffectAst::SetTokenProp { token, prop, value } => {
                let id = resolve_token(token, &self.eval())?;
                self.locate(&id)?;
                let value = self.value(value)?;
                let scalar = to_scalar(&value, prop)?;
                self.set_token_prop(&id, prop, scalar)
            }

            EffectAst::SetMarker {
                space,
                marker,
                state,
            } => {
                let space = self.zone(space)?;
                let value = self.value(state)?;
                let new = value
                    .as_str()
                    .ok_or_else(|| KernelError::type_mismatch("str", value.type_name(), marker.clone()))?
                    .to_string();
                self.set_marker(&space, marker, new)
            }

            // === Control ===
            EffectAst::If {
                when,
                then,
                otherwise,
            } => {
                if eval_condition(when, &self.eval())? {
                    self.nested("then", then)
                } else {
                    self.nested("else", otherwise)
                }
            }

            EffectAst::ForEach {
                bind,
                over,
                effects,
                limit,
            } => {
                let items = self.query(over)?;
                let limit = match limit {
                    Some(limit) => self.int(limit)?,
                    None => DEFAULT_FOR_EACH_LIMIT,
                };
                if limit < 0 {
                    return Err(self.runtime_error(
                        EffectRuntimeReason::InvalidLimit,
                        format!("forEach limit {limit} is negative"),
                    ));
                }
                if items.len() as i64 > limit {
                    tracing::debug!(path = %self.path(), items = items.len(), limit, "forEach truncated");
                }
                for (k, item) in items.into_iter().take(limit as usize).enumerate() {
                    let mark = self.bindings.mark();
                    self.bindings.push(bind.clone(), item);
                    self.nested(&format!("each[{k}]"), effects)?;
                    self.bindings.truncate(mark);
                }
                Ok(())
            }

            EffectAst::Let {
                bind,
                value,
                effects,
            } => {
                let value = self.value(value)?;
                let mark = self.bindings.mark();
                self.bindings.push(bind.clone(), value);
                self.nested("in", effects)?;
                self.bindings.truncate(mark);
                Ok(())
            }

            EffectAst::Reduce {
                over,
                item,
                acc,
                initial,
                next,
                result,
                effects,
            } => {
                let items = self.query(over)?;
                let mut accumulator = self.value(initial)?;
                for value in items {
                    let mark = self.bindings.mark();
                    self.bindings.push(item.clone(), value);
                    self.bindings.push(acc.clone(), accumulator);
                    let folded = self.value(next);
                    self.bindings.truncate(mark);
                    accumulator = folded?;
                }
                let mark = self.bindings.mark();
                self.bindings.push(result.clone(), accumulator);
                self.nested("in", effects)?;
                self.bindings.truncate(mark);
                Ok(())
            }

            EffectAst::RollRandom {
                bind,
                min,
                max,
                effects,
            } => {
                let min = self.int(min)?;
                let max = self.int(max)?;
                if min > max {
                    return Err(self.runtime_error(
                        EffectRuntimeReason::InvalidLimit,
                        format!("rollRandom range {min}..={max} is empty"),
                    ));
                }
                let (roll, rng) = self.session.state.rng.next_int(min, max);
                self.session.state.rng = rng;
                let mark = self.bindings.mark();
                self.bindings.push(bind.clone(), Value::int(roll));
                self.nested("in", effects)?;
                self.bindings.truncate(mark);
                Ok(())
            }

            EffectAst::RemoveByPriority {
                budget,
                groups,
                count_bind,
                effects,
            } => {
                let budget = self.int(budget)?;
                if budget < 0 {
                    return Err(self.runtime_error(
                        EffectRuntimeReason::InvalidLimit,
                        format!("removeByPriority budget {budget} is negative"),
                    ));
                }
                let removed = self.remove_by_priority(budget as usize, groups)?;
                let mark = self.bindings.mark();
                if let Some(name) = count_bind {
                    self.bindings.push(name.clone(), Value::int(removed as i64));
                }
                self.nested("in", effects)?;
                self.bindings.truncate(mark);
                Ok(())
            }

            // === Decisions ===
            EffectAst::ChooseOne { bind, options } => self.choose_one(bind, options),

            EffectAst::ChooseN {
                bind,
                options,
                n,
                min,
                max,
            } => self.choose_n(bind, options, n.as_ref(), min.as_ref(), max.as_ref()),

            // === Turn flow ===
            EffectAst::GrantFreeOperation {
                seat,
                operation_class,
                action_ids,
                zone_filter,
                uses,
                sequence,
            } => {
                let seat = self.player(seat)?;
                if *uses == 0 {
                    return Err(self.runtime_error(
                        EffectRuntimeReason::InvalidLimit,
                        "a free-operation grant needs at least one use",
                    ));
                }
                self.require_card_driven("grantFreeOperation")?;
                let Some(runtime) = self.session.state.turn_order.card_driven_mut() else {
                    return Ok(());
                };
                let grant = FreeOperationGrant {
                    grant_id: runtime.allocate_grant_id(),
                    seat,
                    operation_class: operation_class.clone(),
                    action_ids: action_ids.clone(),
                    zone_filter: zone_filter.clone(),
                    sequence_batch_id: sequence.as_ref().map(|s| s.batch.clone()),
                    sequence_index: sequence.as_ref().map(|s| s.index),
                    remaining_uses: *uses,
                };
                tracing::debug!(grant = %grant.grant_id, seat = %seat, "free operation granted");
                runtime.pending_grants.push(grant);
                Ok(())
            }

            EffectAst::SetEligibilityOverride { seat, eligible } => {
                let seat = self.player(seat)?;
                self.require_card_driven("setEligibilityOverride")?;
                if let Some(runtime) = self.session.state.turn_order.card_driven_mut() {
                    runtime.pending_overrides.retain(|o| o.seat != seat);
                    runtime.pending_overrides.push(EligibilityOverride {
                        seat,
                        eligible: *eligible,
                    });
                }
                Ok(())
            }

            EffectAst::PushInterruptPhase { phase } => {
                if !self.ctx.def.turn_structure.is_interrupt(phase) {
                    return Err(self.runtime_error(
                        EffectRuntimeReason::InvalidPhase,
                        format!("`{phase}` is not an interrupt phase"),
                    ));
                }
                let state = &mut self.session.state;
                let suspended = std::mem::replace(&mut state.current_phase, phase.clone());
                state.interrupt_stack.push_back(suspended);
                self.session.events.push(TriggerEvent::PhaseEnter {
                    phase: phase.clone(),
                });
                Ok(())
            }
        }
    }

    // === Variables ===

    fn var_slot(
        &self,
        target: &VarTarget,
        var: &str,
    ) -> std::result::Result<(VarScope, &'a VarDef, i64), EffectHalt> {
        let def: &'a GameDef = self.ctx.def;
        let state = &self.session.state;
        match target {
            VarTarget::Global => {
                let var_def = def.global_var(var)?;
                let current = state.global_var(var).unwrap_or_else(|| var_def.initial());
                Ok((VarScope::Global, var_def, current))
            }
            VarTarget::Player(player) => {
                let player = self.player(player)?;
                let var_def = def.player_var(var)?;
                let current = state
                    .player_var(player, var)
                    .unwrap_or_else(|| var_def.initial());
                Ok((VarScope::Player(player), var_def, current))
            }
            VarTarget::Zone(zone) => {
                let zone = self.zone(zone)?;
                let var_def = def.zone_var(var)?;
                let current = state.zone_var(&zone, var).unwrap_or_else(|| var_def.initial());
                Ok((VarScope::Zone(zone), var_def, current))
            }
        }
    }

    fn store_var(&mut self, scope: VarScope, var: &str, old: i64, new: i64) {
        if old == new {
            return;
        }
        let state = &mut self.session.state;
        match &scope {
            VarScope::Global => {
                state.global_vars.insert(var.to_string(), new);
            }
            VarScope::Player(player) => {
                if let Some(vars) = state.player_vars.get_mut(*player) {
                    vars.insert(var.to_string(), new);
                }
            }
            VarScope::Zone(zone) => {
                let mut vars = state.zone_vars.get(zone).cloned().unwrap_or_default();
                vars.insert(var.to_string(), new);
                state.zone_vars.insert(zone.clone(), vars);
            }
        }
        self.session.events.push(TriggerEvent::VarChanged {
            scope: scope.clone(),
            var: var.to_string(),
            old,
            new,
        });
        self.record(TraceKind::VarChanged {
            scope,
            var: var.to_string(),
            old,
            new,
        });
    }

    // === Tokens ===

    fn locate(&self, id: &TokenId) -> std::result::Result<(ZoneId, usize), EffectHalt> {
        match self.session.state.zones.locate(id) {
            TokenLocation::Found { zone, index } => Ok((zone, index)),
            TokenLocation::Missing => Err(self.runtime_error(
                EffectRuntimeReason::TokenNotFound,
                format!("token `{id}` is not in any zone"),
            )),
            TokenLocation::Duplicated(count) => Err(self.runtime_error(
                EffectRuntimeReason::TokenOwnershipViolation,
                format!("token `{id}` appears in {count} places"),
            )),
        }
    }

    /// Index of `id` in `from`, which must be its only zone.
    fn locate_in(&self, id: &TokenId, from: &ZoneId) -> std::result::Result<usize, EffectHalt> {
        let (zone, index) = self.locate(id)?;
        if &zone != from {
            return Err(self.runtime_error(
                EffectRuntimeReason::SourceZoneMismatch,
                format!("token `{id}` is in `{zone}`, not `{from}`"),
            ));
        }
        Ok(index)
    }

    /// Map a logical position onto the destination's ordering.
    fn insertion(&mut self, zone: &ZoneId, position: InsertPosition) -> ZonePosition {
        let ordering = self
            .ctx
            .def
            .zone(zone)
            .map(|z| z.ordering)
            .unwrap_or_default();
        match (position, ordering) {
            (InsertPosition::Top, ZoneOrdering::Queue) => ZonePosition::Back,
            (InsertPosition::Top, _) => ZonePosition::Front,
            (InsertPosition::Bottom, ZoneOrdering::Queue) => ZonePosition::Front,
            (InsertPosition::Bottom, _) => ZonePosition::Back,
            (InsertPosition::Random, _) => {
                let len = self.session.state.zones.zone_size(zone);
                let (index, rng) = self.session.state.rng.next_index(len + 1);
                self.session.state.rng = rng;
                ZonePosition::Index(index)
            }
        }
    }

    fn relocate(
        &mut self,
        id: &TokenId,
        from: &ZoneId,
        index: usize,
        to: &ZoneId,
        position: InsertPosition,
    ) -> Step {
        let Some(token) = self.session.state.zones.remove_at(from, index) else {
            return Err(self.runtime_error(
                EffectRuntimeReason::TokenNotFound,
                format!("token `{id}` vanished from `{from}`"),
            ));
        };
        let position = self.insertion(to, position);
        if !self.session.state.zones.insert(to, token, position) {
            return Err(KernelError::missing(DefinitionKind::Zone, to).into());
        }
        if from != to {
            check_stacking(self.ctx.def, &self.session.state.zones, to)?;
            self.session.events.push(TriggerEvent::TokenEntered {
                token: id.clone(),
                from: Some(from.clone()),
                zone: to.clone(),
            });
            self.record(TraceKind::TokenMoved {
                token: id.clone(),
                from: from.clone(),
                to: to.clone(),
            });
        }
        Ok(())
    }

    fn move_all(&mut self, from: &ZoneId, to: &ZoneId, filter: Option<&QueryFilter>) -> Step {
        if from == to {
            return Ok(());
        }
        let tokens: Vec<Token> = self
            .session
            .state
            .zones
            .tokens(from)
            .map(|t| t.iter().cloned().collect())
            .unwrap_or_default();

        let mut selected = Vec::with_capacity(tokens.len());
        for (index, token) in tokens.iter().enumerate() {
            let keep = match filter {
                None => true,
                Some(filter) => {
                    let scoped = self.bindings.with(filter.bind.clone(), token.as_value());
                    let ctx = self.eval();
                    eval_condition(&filter.condition, &ctx.with_bindings(&scoped))?
                }
            };
            if keep {
                selected.push(index);
            }
        }
        self.move_block(from, to, &selected)
    }

    /// Move the tokens at `selected` (ascending indices) out of `from` as one
    /// block, keeping their relative order.
    fn move_block(&mut self, from: &ZoneId, to: &ZoneId, selected: &[usize]) -> Step {
        if selected.is_empty() {
            return Ok(());
        }

        let mut moved = Vec::with_capacity(selected.len());
        for index in selected.iter().rev() {
            if let Some(token) = self.session.state.zones.remove_at(from, *index) {
                moved.push(token);
            }
        }
        moved.reverse();

        // The block lands on top in its original order.
        let append = matches!(
            self.ctx.def.zone(to).map(|z| z.ordering),
            Some(ZoneOrdering::Queue)
        );
        let base = if append {
            self.session.state.zones.zone_size(to)
        } else {
            0
        };
        let ids: Vec<TokenId> = moved.iter().map(|t| t.id.clone()).collect();
        for (offset, token) in moved.into_iter().enumerate() {
            if !self
                .session
                .state
                .zones
                .insert(to, token, ZonePosition::Index(base + offset))
            {
                return Err(KernelError::missing(DefinitionKind::Zone, to).into());
            }
        }
        check_stacking(self.ctx.def, &self.session.state.zones, to)?;

        for id in ids {
            self.session.events.push(TriggerEvent::TokenEntered {
                token: id.clone(),
                from: Some(from.clone()),
                zone: to.clone(),
            });
            self.record(TraceKind::TokenMoved {
                token: id,
                from: from.clone(),
                to: to.clone(),
            });
        }
        Ok(())
    }

    fn shuffle(&mut self, zone: &ZoneId) {
        let Some(tokens) = self.session.state.zones.tokens(zone) else {
            return;
        };
        if tokens.len() <= 1 {
            return;
        }
        let mut tokens: Vec<Token> = tokens.iter().cloned().collect();
        let mut rng = self.session.state.rng.clone();
        for i in (1..tokens.len()).rev() {
            let (j, next) = rng.next_index(i + 1);
            rng = next;
            tokens.swap(i, j);
        }
        self.session.state.rng = rng;
        self.session
            .state
            .zones
            .replace(zone, tokens.into_iter().collect());
        self.record(TraceKind::ZoneShuffled { zone: zone.clone() });
    }

    fn create_token(
        &mut self,
        token_type: &str,
        zone: &ZoneRef,
        props: &std::collections::BTreeMap<String, ValueExpr>,
    ) -> Step {
        let type_def = self.ctx.def.token_type(token_type)?;
        let zone = self.zone(zone)?;

        let mut values = type_def.props.clone();
        for (name, expr) in props {
            if !type_def.props.contains_key(name) {
                return Err(KernelError::missing(
                    DefinitionKind::TokenProp,
                    format!("{token_type}.{name}"),
                )
                .into());
            }
            let value = self.value(expr)?;
            values.insert(name.clone(), to_scalar(&value, name)?);
        }

        let state = &mut self.session.state;
        let id = TokenId::from_ordinal(token_type, state.next_token_ordinal);
        state.next_token_ordinal += 1;
        let token = Token {
            id: id.clone(),
            token_type: token_type.to_string(),
            props: values,
        };
        if !state.zones.insert(&zone, token, ZonePosition::Front) {
            return Err(KernelError::missing(DefinitionKind::Zone, &zone).into());
        }
        check_stacking(self.ctx.def, &self.session.state.zones, &zone)?;

        self.session.events.push(TriggerEvent::TokenEntered {
            token: id.clone(),
            from: None,
            zone: zone.clone(),
        });
        self.record(TraceKind::TokenCreated { token: id, zone });
        Ok(())
    }

    fn set_token_prop(&mut self, id: &TokenId, prop: &str, value: Scalar) -> Step {
        let Some(token) = self.session.state.zones.token(id) else {
            return Err(self.runtime_error(
                EffectRuntimeReason::TokenNotFound,
                format!("token `{id}` is not in any zone"),
            ));
        };
        let type_def = self.ctx.def.token_type(&token.token_type)?;
        if !type_def.props.contains_key(prop) {
            return Err(KernelError::missing(
                DefinitionKind::TokenProp,
                format!("{}.{prop}", token.token_type),
            )
            .into());
        }
        let old = token
            .props
            .get(prop)
            .or_else(|| type_def.props.get(prop))
            .cloned()
            .unwrap_or(Scalar::Int(0));
        if old == value {
            return Ok(());
        }
        if let Some(token) = self.session.state.zones.token_mut(id) {
            token.props.insert(prop.to_string(), value.clone());
        }
        self.record(TraceKind::TokenPropChanged {
            token: id.clone(),
            prop: prop.to_string(),
            old,
            new: value,
        });
        Ok(())
    }

    fn set_marker(&mut self, space: &ZoneId, marker: &str, new: String) -> Step {
        let lattice = self.ctx.def.marker(marker)?;
        if !lattice.has_state(&new) {
            return Err(self.runtime_error(
                EffectRuntimeReason::UnknownMarkerState,
                format!("`{new}` is not a state of marker `{marker}`"),
            ));
        }
        let old = self.session.state.marker(self.ctx.def, space, marker)?;
        if old == new {
            return Ok(());
        }
        let state = &mut self.session.state;
        let mut markers = state.markers.get(space).cloned().unwrap_or_default();
        markers.insert(marker.to_string(), new.clone());
        state.markers.insert(space.clone(), markers);
        self.record(TraceKind::MarkerChanged {
            space: space.clone(),
            marker: marker.to_string(),
            old,
            new,
        });
        Ok(())
    }

    fn remove_by_priority(
        &mut self,
        budget: usize,
        groups: &[PriorityGroup],
    ) -> std::result::Result<usize, EffectHalt> {
        let mut removed = 0;
        for group in groups {
            if removed >= budget {
                break;
            }
            let items = self.query(&group.over)?;
            let to = self.zone(&group.to)?;
            for item in items {
                if removed >= budget {
                    break;
                }
                let id = match &item {
                    Value::Token(id) => id.clone(),
                    Value::Scalar(Scalar::Str(s)) => TokenId::new(s.clone()),
                    other => {
                        return Err(KernelError::type_mismatch(
                            "token",
                            other.type_name(),
                            "removeByPriority group",
                        )
                        .into())
                    }
                };
                let (from, index) = self.locate(&id)?;
                self.relocate(&id, &from, index, &to, InsertPosition::Top)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    // === Decisions ===

    /// Substitute `{$name}` placeholders with bound values.
    fn resolve_bind_name(&self, name: &str) -> std::result::Result<String, EffectHalt> {
        if !name.contains('{') {
            return Ok(name.to_string());
        }
        let mut out = String::with_capacity(name.len());
        let mut rest = name;
        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let Some(end) = after.find('}') else {
                out.push_str(&rest[start..]);
                rest = "";
                break;
            };
            let key = &after[..end];
            let value = self.bindings.get(key).ok_or_else(|| KernelError::UnboundBinding {
                name: key.to_string(),
            })?;
            out.push_str(&value.to_string());
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    fn missing_choice(&self, pending: PendingDecision) -> EffectHalt {
        match self.ctx.mode {
            DecisionMode::Discover => EffectHalt::Pending(pending),
            DecisionMode::Strict => self.runtime_error(
                EffectRuntimeReason::MissingDecisionBinding,
                format!("move carries no selection for `{}`", pending.name),
            ),
        }
    }

    fn invalid_choice(&self, reason: EffectRuntimeReason, name: &str, detail: String) -> EffectHalt {
        match self.ctx.mode {
            DecisionMode::Discover => EffectHalt::Illegal {
                decision: name.to_string(),
                detail,
            },
            DecisionMode::Strict => self.runtime_error(reason, detail),
        }
    }

    fn bind_choice(&mut self, bind: &str, name: &str, value: Value) {
        if bind != name {
            self.bindings.push(bind.to_string(), value.clone());
        }
        self.bindings.push(name.to_string(), value);
    }

    fn choose_one(&mut self, bind: &str, options: &Query) -> Step {
        let name = self.resolve_bind_name(bind)?;
        let domain = self.query(options)?;
        let Some(selected) = self.bindings.get(&name).cloned() else {
            let pending = PendingDecision {
                decision_id: format!("{}::{name}", self.path()),
                name,
                kind: ChoiceKind::ChooseOne,
                domain,
                min: 1,
                max: 1,
            };
            return Err(self.missing_choice(pending));
        };
        let Some(resolved) = domain.into_iter().find(|d| same_identity(d, &selected)) else {
            return Err(self.invalid_choice(
                EffectRuntimeReason::ChoiceOutOfDomain,
                &name,
                format!("`{selected}` is not an option for `{name}`"),
            ));
        };
        self.bind_choice(bind, &name, resolved);
        Ok(())
    }

    fn choose_n(
        &mut self,
        bind: &str,
        options: &Query,
        n: Option<&ValueExpr>,
        min: Option<&ValueExpr>,
        max: Option<&ValueExpr>,
    ) -> Step {
        let name = self.resolve_bind_name(bind)?;
        let domain = self.query(options)?;
        let (min, max) = match n {
            Some(n) => {
                let n = self.int(n)?;
                (n, n)
            }
            None => {
                let min = match min {
                    Some(expr) => self.int(expr)?,
                    None => 0,
                };
                let max = match max {
                    Some(expr) => self.int(expr)?,
                    None => domain.len() as i64,
                };
                (min, max)
            }
        };
        if min < 0 || max < min {
            return Err(self.runtime_error(
                EffectRuntimeReason::InvalidLimit,
                format!("chooseN cardinality {min}..={max} is invalid"),
            ));
        }
        let (min, max) = (min as usize, max as usize);

        let Some(selected) = self.bindings.get(&name).cloned() else {
            let pending = PendingDecision {
                decision_id: format!("{}::{name}", self.path()),
                name,
                kind: ChoiceKind::ChooseN,
                domain,
                min,
                max,
            };
            return Err(self.missing_choice(pending));
        };
        let Value::Array(items) = &selected else {
            return Err(self.invalid_choice(
                EffectRuntimeReason::ChoiceNotArray,
                &name,
                format!("`{name}` must be an array, got {}", selected.type_name()),
            ));
        };

        let mut seen = FxHashSet::default();
        if let Some(dup) = items.iter().find(|item| !seen.insert(*item)) {
            return Err(self.invalid_choice(
                EffectRuntimeReason::ChoiceDuplicateSelection,
                &name,
                format!("`{dup}` selected twice for `{name}`"),
            ));
        }
        if items.len() < min || items.len() > max {
            return Err(self.invalid_choice(
                EffectRuntimeReason::ChoiceCardinalityMismatch,
                &name,
                format!(
                    "`{name}` needs {min}..={max} selections, got {}",
                    items.len()
                ),
            ));
        }
        if let Some(outside) = items.iter().find(|item| {
            let item = Value::Scalar((*item).clone());
            !domain.iter().any(|d| same_identity(d, &item))
        }) {
            return Err(self.invalid_choice(
                EffectRuntimeReason::ChoiceOutOfDomain,
                &name,
                format!("`{outside}` is not an option for `{name}`"),
            ));
        }

        self.bind_choice(bind, &name, selected);
        Ok(())
    }

    // === Turn flow ===

    fn require_card_driven(&self, effect: &str) -> Step {
        if self.session.state.turn_order.card_driven().is_none() {
            return Err(self.runtime_error(
                EffectRuntimeReason::TurnOrderMismatch,
                format!("{effect} needs a card-driven turn order"),
            ));
        }
        Ok(())
    }
}

fn to_scalar(value: &Value, context: &str) -> std::result::Result<Scalar, EffectHalt> {
    match value {
        Value::Scalar(s) => Ok(s.clone()),
        Value::Token(id) => Ok(Scalar::Str(id.0.clone())),
        Value::Array(_) => {
            Err(KernelError::type_mismatch("scalar", "array", context.to_string()).into())
        }
    }
}
