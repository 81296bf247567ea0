//! Move validation and resolution.
//!
//! `resolve_move` is the single validation path behind `legal_moves`,
//! `legal_choices_discover` and `apply_move`. It checks, in order:
//!
//! 1. the game is not over
//! 2. the action exists
//! 3. compound rules: accompanying ops and param constraints
//! 4. free-operation grant, or the grant window's restrictions
//! 5. actor and executor selectors
//! 6. phase, usage limits, declared param domains and `pre`
//! 7. pipeline applicability, legality and cost validation
//! 8. compound timing against the host's stages
//! 9. the decision sequence: a discover-mode run of the cost and every
//!    stage, with the special activity interleaved
//!
//! Declared params are settled before `pre` and pipeline predicates so
//! those may read them.
//!
//! A completed resolution carries the working state the effects produced;
//! `apply_move` commits it.

use crate::actions::{
    dispatch_pipeline, evaluate_pipeline, exhausted_limit, CostPolicy, PipelineDispatch,
    PipelineVerdict, PlayerSelector,
};
use crate::core::{
    ActionId, ApplyMoveError, CompoundMove, CompoundTiming, GameState, IllegalMoveError,
    IllegalMoveReason, KernelError, Move, MoveParam, PlayerId, Scalar, Value,
};
use crate::def::{ActionDef, DefRuntime, GameDef, ParamRelation, TurnOrderDef};
use crate::effects::{
    ChoiceKind, DecisionMode, EffectAst, EffectContext, EffectHalt, EffectSession, EventContext,
    PendingDecision,
};
use crate::eval::{eval_condition, eval_query, Bindings, EvalContext};
use crate::turn_flow::{check_free_operation_grant, CardDrivenRuntime};

use super::options::KernelOptions;
use super::terminal::terminal_result;

/// Definition, derived runtime and limits for one kernel call.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Rules<'d> {
    pub def: &'d GameDef,
    pub runtime: &'d DefRuntime,
    pub options: KernelOptions,
}

impl<'d> Rules<'d> {
    pub fn new(def: &'d GameDef, runtime: &'d DefRuntime, options: KernelOptions) -> Self {
        Self {
            def,
            runtime,
            options,
        }
    }
}

/// A decision the move has not supplied yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct DecisionRequest {
    pub decision: PendingDecision,
    /// The selection belongs in the special activity's params.
    pub special_activity: bool,
}

/// A fully validated move and the state its effects produced.
#[derive(Debug)]
pub(crate) struct Resolved<'d> {
    pub session: EffectSession,
    pub action: &'d ActionDef,
    pub executor: PlayerId,
    pub special: Option<(&'d ActionDef, PlayerId)>,
    pub grant_id: Option<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug)]
pub(crate) enum Resolution<'d> {
    Complete(Resolved<'d>),
    Pending(DecisionRequest),
}

/// Why resolution stopped before completing.
enum Stop {
    Pending(DecisionRequest),
    Failed(ApplyMoveError),
}

impl From<KernelError> for Stop {
    fn from(err: KernelError) -> Self {
        Self::Failed(err.into())
    }
}

impl From<IllegalMoveError> for Stop {
    fn from(err: IllegalMoveError) -> Self {
        Self::Failed(err.into())
    }
}

type Flow<T> = std::result::Result<T, Stop>;

fn illegal<T>(reason: IllegalMoveReason, action_id: &ActionId, detail: impl Into<String>) -> Flow<T> {
    Err(IllegalMoveError::new(reason, action_id, detail).into())
}

/// Validate `mv` against `state` and run its decision sequence.
pub(crate) fn resolve_move<'d>(
    rules: &Rules<'d>,
    state: &GameState,
    mv: &Move,
) -> std::result::Result<Resolution<'d>, ApplyMoveError> {
    match resolve(rules, state, mv) {
        Ok(resolved) => Ok(Resolution::Complete(resolved)),
        Err(Stop::Pending(request)) => Ok(Resolution::Pending(request)),
        Err(Stop::Failed(err)) => Err(err),
    }
}

/// A validated action ready to run.
struct Plan<'d> {
    action: &'d ActionDef,
    executor: PlayerId,
    bindings: Bindings,
    cost: &'d [EffectAst],
    stages: Vec<(&'d str, &'d [EffectAst])>,
    policy: CostPolicy,
    special_activity: bool,
}

fn resolve<'d>(rules: &Rules<'d>, state: &GameState, mv: &Move) -> Flow<Resolved<'d>> {
    let def = rules.def;
    if terminal_result(def, rules.runtime, state)?.is_some() {
        return illegal(IllegalMoveReason::GameIsTerminal, &mv.action_id, "the game is over");
    }
    let Some(action) = def.action(&mv.action_id) else {
        return illegal(IllegalMoveReason::UnknownActionId, &mv.action_id, "no such action");
    };

    if let Some(compound) = &mv.compound {
        check_compound(rules, state, mv, compound)?;
    }
    let grant_id = check_grant(rules, state, mv, action)?;

    let host = plan_action(rules, state, mv, action, mv.free_operation, false)?;
    let special = match &mv.compound {
        Some(compound) => {
            check_timing(compound, host.stages.len(), &mv.action_id)?;
            let sa_move = &compound.special_activity;
            let Some(sa_action) = def.action(&sa_move.action_id) else {
                return illegal(IllegalMoveReason::UnknownActionId, &sa_move.action_id, "no such action");
            };
            let plan = plan_action(rules, state, sa_move, sa_action, mv.free_operation, true)?;
            Some((plan, compound.timing, compound.insert_after_stage))
        }
        None => None,
    };

    let mut runner = Runner {
        rules,
        session: EffectSession::new(state.clone(), rules.options.max_effect_ops),
        warnings: Vec::new(),
    };

    runner.run_cost(&host)?;
    if let Some((sa, CompoundTiming::Before, _)) = &special {
        runner.run_all(sa)?;
    }
    for index in 0..host.stages.len() {
        runner.run_stage(&host, index)?;
        if let Some((sa, CompoundTiming::During, Some(after))) = &special {
            if *after == index {
                runner.run_all(sa)?;
            }
        }
    }
    if let Some((sa, CompoundTiming::After, _)) = &special {
        runner.run_all(sa)?;
    }

    tracing::debug!(
        action = %action.id,
        ops = runner.session.ops_used(),
        free = mv.free_operation,
        "move resolved"
    );
    Ok(Resolved {
        session: runner.session,
        action: host.action,
        executor: host.executor,
        special: special.map(|(sa, _, _)| (sa.action, sa.executor)),
        grant_id,
        warnings: runner.warnings,
    })
}

// === Validation steps ===

fn check_compound(rules: &Rules<'_>, state: &GameState, mv: &Move, compound: &CompoundMove) -> Flow<()> {
    let sa = &compound.special_activity;
    if sa.compound.is_some() {
        return illegal(
            IllegalMoveReason::CompoundTimingConfigurationInvalid,
            &mv.action_id,
            "a special activity cannot carry another",
        );
    }
    if rules.def.action(&sa.action_id).is_none() {
        return illegal(IllegalMoveReason::UnknownActionId, &sa.action_id, "no such action");
    }

    let bindings = Bindings::from_params(&sa.params);
    let ctx = EvalContext::new(rules.def, rules.runtime, state, &bindings, state.active_player);
    let PipelineDispatch::Matched(pipeline) = dispatch_pipeline(rules.def, &sa.action_id, &ctx)? else {
        return Ok(());
    };

    if let Some(ops) = &pipeline.accompanying_ops {
        if !ops.contains(&mv.action_id) {
            return illegal(
                IllegalMoveReason::SpecialActivityAccompanyingOpDisallowed,
                &mv.action_id,
                format!("`{}` may not accompany `{}`", sa.action_id, mv.action_id),
            );
        }
    }

    for constraint in &pipeline.compound_param_constraints {
        let op_values = mv
            .params
            .get(&constraint.operation_param)
            .map_or(&[][..], MoveParam::as_slice);
        let sa_values = sa
            .params
            .get(&constraint.special_activity_param)
            .map_or(&[][..], MoveParam::as_slice);
        let holds = match constraint.relation {
            ParamRelation::Disjoint => sa_values.iter().all(|v| !op_values.contains(v)),
            ParamRelation::Subset => sa_values.iter().all(|v| op_values.contains(v)),
        };
        if !holds {
            return illegal(
                IllegalMoveReason::SpecialActivityCompoundParamConstraintFailed,
                &mv.action_id,
                format!(
                    "`{}` must be {:?} with `{}`",
                    constraint.special_activity_param, constraint.relation, constraint.operation_param
                ),
            );
        }
    }
    Ok(())
}

fn check_timing(compound: &CompoundMove, stage_count: usize, action_id: &ActionId) -> Flow<()> {
    match (compound.timing, compound.insert_after_stage) {
        (CompoundTiming::During, Some(after)) if after < stage_count => Ok(()),
        (CompoundTiming::During, after) => illegal(
            IllegalMoveReason::CompoundTimingConfigurationInvalid,
            action_id,
            format!("insert_after_stage {after:?} is not one of {stage_count} stages"),
        ),
        (_, Some(_)) => illegal(
            IllegalMoveReason::CompoundTimingConfigurationInvalid,
            action_id,
            "insert_after_stage only applies to `during`",
        ),
        (_, None) => Ok(()),
    }
}

/// The covering grant of a free move, or the grant window's restriction.
fn check_grant(rules: &Rules<'_>, state: &GameState, mv: &Move, action: &ActionDef) -> Flow<Option<String>> {
    if mv.free_operation {
        let bindings = Bindings::from_params(&mv.params);
        return match check_free_operation_grant(rules.def, rules.runtime, state, mv, action, &bindings)? {
            Ok(grant_id) => Ok(Some(grant_id)),
            Err(denial) => illegal(
                IllegalMoveReason::FreeOperationNotGranted(denial),
                &mv.action_id,
                format!("no pending grant covers this move ({denial})"),
            ),
        };
    }
    let in_window = state
        .turn_order
        .card_driven()
        .is_some_and(CardDrivenRuntime::in_grant_window);
    if in_window && !is_pass_action(rules.def, &mv.action_id) {
        return illegal(
            IllegalMoveReason::ActionNotLegalInCurrentState,
            &mv.action_id,
            "only free operations or a pass are legal while grants are pending",
        );
    }
    Ok(None)
}

pub(crate) fn is_pass_action(def: &GameDef, action_id: &ActionId) -> bool {
    match &def.turn_order {
        TurnOrderDef::CardDriven(config) => config.pass_action.as_ref() == Some(action_id),
        _ => false,
    }
}

/// Steps 5 to 7 for one action of the move.
fn plan_action<'d>(
    rules: &Rules<'d>,
    state: &GameState,
    mv: &Move,
    action: &'d ActionDef,
    free_operation: bool,
    special_activity: bool,
) -> Flow<Plan<'d>> {
    let def = rules.def;
    let active = state.active_player;
    let player_count = state.player_count();
    let bindings = Bindings::from_params(&mv.params);
    let pending = |decision: PendingDecision| {
        Stop::Pending(DecisionRequest {
            decision,
            special_activity,
        })
    };

    // A selector reading a declared param asks for it first, and only ever
    // sees an in-domain seat.
    for selector in [&action.actor, &action.executor] {
        let PlayerSelector::Binding(name) = selector else {
            continue;
        };
        let Some(param) = action.params.iter().find(|p| &p.name == name) else {
            continue;
        };
        let ctx = EvalContext::new(def, rules.runtime, state, &bindings, active);
        let domain = eval_query(&param.domain, &ctx)
            .map_err(|e| e.in_predicate(format!("param `{}` domain", param.name)))?;
        let Some(chosen) = mv.params.get(name) else {
            return Err(pending(param_decision(&param.name, domain)));
        };
        for value in chosen.as_slice() {
            let in_domain = domain.iter().any(|v| v.identity().as_ref() == Some(value));
            let is_seat = matches!(value, Scalar::Int(seat) if PlayerId::from_index(*seat, player_count).is_some());
            if !in_domain || !is_seat {
                return illegal(
                    IllegalMoveReason::MoveParamsNotLegalForAction,
                    &action.id,
                    format!("`{value}` is not a legal seat for `{}`", param.name),
                );
            }
        }
    }

    let actors = action.actor.resolve(&action.id, active, player_count, &bindings)?;
    let executor = action
        .executor
        .resolve_one(&action.id, active, player_count, &bindings)?;
    if !actors.contains(&active) {
        return illegal(
            IllegalMoveReason::ActionNotLegalInCurrentState,
            &action.id,
            format!("{active} is not among the actors ({})", action.actor),
        );
    }
    if !action.allowed_in_phase(&state.current_phase) {
        return illegal(
            IllegalMoveReason::ActionNotLegalInCurrentState,
            &action.id,
            format!("not available in phase `{}`", state.current_phase),
        );
    }
    if let Some(limit) = exhausted_limit(action, state) {
        return illegal(
            IllegalMoveReason::ActionNotLegalInCurrentState,
            &action.id,
            format!("{:?} limit of {} reached", limit.scope, limit.max),
        );
    }

    let ctx = EvalContext::new(def, rules.runtime, state, &bindings, executor);
    for param in &action.params {
        let domain = eval_query(&param.domain, &ctx)
            .map_err(|e| e.in_predicate(format!("param `{}` domain", param.name)))?;
        match mv.params.get(&param.name) {
            None => return Err(pending(param_decision(&param.name, domain))),
            Some(MoveParam::Scalar(value)) => {
                if !domain.iter().any(|v| v.identity().as_ref() == Some(value)) {
                    return illegal(
                        IllegalMoveReason::MoveParamsNotLegalForAction,
                        &action.id,
                        format!("`{value}` is not a legal `{}`", param.name),
                    );
                }
            }
            Some(MoveParam::Array(_)) => {
                return illegal(
                    IllegalMoveReason::MoveParamsNotLegalForAction,
                    &action.id,
                    format!("`{}` takes a single value", param.name),
                );
            }
        }
    }

    if let Some(pre) = &action.pre {
        let holds = eval_condition(pre, &ctx)
            .map_err(|e| e.in_predicate(format!("action `{}` pre", action.id)))?;
        if !holds {
            return illegal(
                IllegalMoveReason::ActionNotLegalInCurrentState,
                &action.id,
                "precondition does not hold",
            );
        }
    }

    let plain_policy = if free_operation { CostPolicy::Free } else { CostPolicy::Spend };
    let (cost, stages, policy) = match dispatch_pipeline(def, &action.id, &ctx)? {
        PipelineDispatch::NoPipeline => (
            action.cost.as_slice(),
            vec![("main", action.effects.as_slice())],
            plain_policy,
        ),
        PipelineDispatch::ConfiguredNoMatch => {
            return illegal(
                IllegalMoveReason::ActionPipelineNotApplicable,
                &action.id,
                "no registered pipeline applies",
            );
        }
        PipelineDispatch::Matched(pipeline) => match evaluate_pipeline(pipeline, free_operation, &ctx)? {
            PipelineVerdict::Illegal(reason) => {
                return illegal(reason, &action.id, format!("pipeline `{}`", pipeline.id));
            }
            PipelineVerdict::Legal(policy) => {
                let stages = if pipeline.stages.is_empty() {
                    vec![("main", action.effects.as_slice())]
                } else {
                    pipeline
                        .stages
                        .iter()
                        .map(|s| (s.name.as_str(), s.effects.as_slice()))
                        .collect()
                };
                (pipeline.cost_effects.as_slice(), stages, policy)
            }
        },
    };

    Ok(Plan {
        action,
        executor,
        bindings,
        cost,
        stages,
        policy,
        special_activity,
    })
}

fn param_decision(name: &str, domain: Vec<Value>) -> PendingDecision {
    PendingDecision {
        decision_id: format!("param::{name}"),
        name: name.to_string(),
        kind: ChoiceKind::ChooseOne,
        domain,
        min: 1,
        max: 1,
    }
}

// === Decision sequence ===

struct Runner<'r, 'd> {
    rules: &'r Rules<'d>,
    session: EffectSession,
    warnings: Vec<String>,
}

impl<'d> Runner<'_, 'd> {
    fn context(&self, plan: &Plan<'_>, root: String, event_context: EventContext) -> EffectContext<'d> {
        let options = self.rules.options;
        EffectContext::new(self.rules.def, self.rules.runtime, plan.executor)
            .with_bindings(plan.bindings.clone())
            .with_mode(DecisionMode::Discover)
            .with_max_effect_ops(options.max_effect_ops)
            .with_trace(options.trace)
            .with_event_context(event_context)
            .with_action(plan.action.id.clone())
            .with_path_root(root)
    }

    fn prefix(plan: &Plan<'_>) -> &'static str {
        if plan.special_activity {
            "sa."
        } else {
            ""
        }
    }

    fn run_cost(&mut self, plan: &Plan<'_>) -> Flow<()> {
        match &plan.policy {
            CostPolicy::Spend => {
                let ctx = self.context(plan, format!("{}cost", Self::prefix(plan)), EventContext::Cost);
                let step = self.session.run(&ctx, plan.cost);
                self.settle(plan, step)
            }
            CostPolicy::Skip { warning } => {
                tracing::warn!(action = %plan.action.id, "{warning}");
                self.warnings.push(warning.clone());
                Ok(())
            }
            CostPolicy::Free => Ok(()),
        }
    }

    fn run_stage(&mut self, plan: &Plan<'_>, index: usize) -> Flow<()> {
        let (name, effects) = plan.stages[index];
        let root = format!("{}stage[{index}:{name}]", Self::prefix(plan));
        let ctx = self.context(plan, root, EventContext::Action);
        let step = self.session.run(&ctx, effects);
        self.settle(plan, step)
    }

    fn run_all(&mut self, plan: &Plan<'_>) -> Flow<()> {
        self.run_cost(plan)?;
        for index in 0..plan.stages.len() {
            self.run_stage(plan, index)?;
        }
        Ok(())
    }

    fn settle(&self, plan: &Plan<'_>, step: std::result::Result<(), EffectHalt>) -> Flow<()> {
        match step {
            Ok(()) => Ok(()),
            Err(EffectHalt::Fatal(err)) => Err(err.into()),
            Err(EffectHalt::Pending(decision)) => Err(Stop::Pending(DecisionRequest {
                decision,
                special_activity: plan.special_activity,
            })),
            Err(EffectHalt::Illegal { decision, detail }) => illegal(
                IllegalMoveReason::MoveParamsNotLegalForAction,
                &plan.action.id,
                format!("{decision}: {detail}"),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::def::{ActionPipelineDef, VarDef};
    use crate::eval::{Condition, Query};

    fn def() -> GameDef {
        let mut def = GameDef::minimal("resolve");
        def.global_vars.push(VarDef::int("funds", 3, 0, 10));
        def.actions.push(
            ActionDef::new("train")
                .with_param("count", Query::int_range(1, 3))
                .with_cost(vec![EffectAst::add_global("funds", -1)])
                .with_effects(vec![EffectAst::choose_one("$bonus", Query::int_range(0, 1))]),
        );
        def
    }

    fn with_rules<R>(def: &GameDef, f: impl FnOnce(&Rules<'_>) -> R) -> R {
        let runtime = DefRuntime::new(def);
        f(&Rules::new(def, &runtime, KernelOptions::default()))
    }

    fn pending(def: &GameDef, state: &GameState, mv: &Move) -> DecisionRequest {
        with_rules(def, |rules| match resolve_move(rules, state, mv).unwrap() {
            Resolution::Pending(request) => request,
            Resolution::Complete(_) => panic!("expected a pending decision"),
        })
    }

    fn reason(def: &GameDef, state: &GameState, mv: &Move) -> Option<IllegalMoveReason> {
        with_rules(def, |rules| match resolve_move(rules, state, mv) {
            Err(err) => err.illegal_reason(),
            Ok(_) => None,
        })
    }

    #[test]
    fn test_declared_param_is_asked_first() {
        let def = def();
        let state = GameState::new(&def, 2, 0).unwrap();
        let request = pending(&def, &state, &Move::new("train"));
        assert_eq!(request.decision.decision_id, "param::count");
        assert_eq!(request.decision.domain.len(), 3);
        assert!(!request.special_activity);
    }

    #[test]
    fn test_effect_decision_follows_params() {
        let def = def();
        let state = GameState::new(&def, 2, 0).unwrap();
        let mv = Move::new("train").with_param("count", 2);
        let request = pending(&def, &state, &mv);
        assert_eq!(request.decision.decision_id, "stage[0:main]/0:chooseOne::$bonus");

        let complete = mv.with_param("$bonus", 1);
        let funds = with_rules(&def, |rules| match resolve_move(rules, &state, &complete).unwrap() {
            Resolution::Complete(resolved) => resolved.session.state.global_var("funds"),
            Resolution::Pending(_) => panic!("expected a complete resolution"),
        });
        assert_eq!(funds, Some(2));
        // The caller's state is untouched.
        assert_eq!(state.global_var("funds"), Some(3));
    }

    #[test]
    fn test_out_of_domain_params() {
        let def = def();
        let state = GameState::new(&def, 2, 0).unwrap();
        assert_eq!(
            reason(&def, &state, &Move::new("train").with_param("count", 9)),
            Some(IllegalMoveReason::MoveParamsNotLegalForAction)
        );
        let bad_bonus = Move::new("train")
            .with_param("count", 1)
            .with_param("$bonus", Scalar::Int(5));
        assert_eq!(
            reason(&def, &state, &bad_bonus),
            Some(IllegalMoveReason::MoveParamsNotLegalForAction)
        );
        assert_eq!(
            reason(&def, &state, &Move::new("recruit")),
            Some(IllegalMoveReason::UnknownActionId)
        );
    }

    #[test]
    fn test_pipeline_not_applicable() {
        let mut def = def();
        def.action_pipelines.push(
            ActionPipelineDef::new("never", "train").with_applicability(Condition::Const(false)),
        );
        let state = GameState::new(&def, 2, 0).unwrap();
        let mv = Move::new("train").with_param("count", 1).with_param("$bonus", 0);
        assert_eq!(
            reason(&def, &state, &mv),
            Some(IllegalMoveReason::ActionPipelineNotApplicable)
        );
    }

    #[test]
    fn test_timing_configuration() {
        let compound = CompoundMove {
            special_activity: Box::new(Move::new("ambush")),
            timing: CompoundTiming::During,
            insert_after_stage: Some(2),
        };
        assert!(check_timing(&compound, 3, &ActionId::new("rally")).is_ok());
        assert!(check_timing(&compound, 2, &ActionId::new("rally")).is_err());
        let before = CompoundMove {
            timing: CompoundTiming::Before,
            ..compound
        };
        assert!(check_timing(&before, 3, &ActionId::new("rally")).is_err());
    }
}
