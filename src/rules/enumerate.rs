//! Legal move enumeration.
//!
//! Every action is explored depth first from its bare move. Each pending
//! decision branches over its options in a canonical order: domain order
//! for `chooseOne` and declared params, and for `chooseN` every
//! combination by size, smallest first, lexicographic by domain index
//! within a size. A branch ends when discovery reports the move complete
//! (kept) or illegal (dropped).
//!
//! Free-operation variants are explored while grants are pending.
//! Operation + special-activity combinations are opt-in.

use crate::core::{ActionId, ApplyMoveError, CompoundTiming, GameState, Move, MoveParam, Result, Scalar};
use crate::effects::{ChoiceKind, PendingDecision};
use crate::turn_flow::CardDrivenRuntime;

use super::options::LegalMoveOptions;
use super::resolve::{is_pass_action, resolve_move, DecisionRequest, Resolution, Rules};
use super::terminal::terminal_result;

/// Enumerate complete legal moves for the active seat.
pub(crate) fn enumerate(
    rules: &Rules<'_>,
    state: &GameState,
    options: &LegalMoveOptions,
) -> Result<Vec<Move>> {
    if terminal_result(rules.def, rules.runtime, state)?.is_some() {
        return Ok(Vec::new());
    }
    let mut explorer = Explorer {
        rules,
        state,
        max_moves: options.max_moves,
        moves: Vec::new(),
    };

    let in_window = state
        .turn_order
        .card_driven()
        .is_some_and(CardDrivenRuntime::in_grant_window);
    for action in &rules.def.actions {
        if explorer.full() {
            break;
        }
        let bare = Move::new(action.id.as_str());
        if in_window && !is_pass_action(rules.def, &action.id) {
            explorer.explore(bare.free())?;
        } else {
            explorer.explore(bare)?;
        }
    }

    if options.include_compound && !explorer.full() {
        explorer.explore_compounds()?;
    }
    tracing::debug!(count = explorer.moves.len(), "legal moves enumerated");
    Ok(explorer.moves)
}

/// Whether the active seat has at least one legal move.
pub(crate) fn has_legal_move(rules: &Rules<'_>, state: &GameState) -> Result<bool> {
    let options = LegalMoveOptions::default().with_max_moves(1);
    Ok(!enumerate(rules, state, &options)?.is_empty())
}

struct Explorer<'r, 'd, 's> {
    rules: &'r Rules<'d>,
    state: &'s GameState,
    max_moves: usize,
    moves: Vec<Move>,
}

impl Explorer<'_, '_, '_> {
    fn full(&self) -> bool {
        self.moves.len() >= self.max_moves
    }

    fn explore(&mut self, mv: Move) -> Result<()> {
        if self.full() {
            return Ok(());
        }
        match resolve_move(self.rules, self.state, &mv) {
            Ok(Resolution::Complete(_)) => {
                self.moves.push(mv);
                Ok(())
            }
            Ok(Resolution::Pending(request)) => self.branch(&mv, &request),
            Err(ApplyMoveError::Illegal(_)) => Ok(()),
            Err(ApplyMoveError::Runtime(err)) => Err(err),
        }
    }

    fn branch(&mut self, mv: &Move, request: &DecisionRequest) -> Result<()> {
        for choice in canonical_choices(&request.decision) {
            if self.full() {
                break;
            }
            self.explore(with_choice(mv, request, choice))?;
        }
        Ok(())
    }

    /// Attach every special activity to every legal host move found so far.
    fn explore_compounds(&mut self) -> Result<()> {
        let def = self.rules.def;
        let hosts: Vec<Move> = self.moves.clone();
        for host in &hosts {
            let stage_count = def
                .pipelines_for(&host.action_id)
                .map(|p| p.stages.len())
                .max()
                .unwrap_or(1)
                .max(1);
            let mut specials: Vec<&ActionId> = Vec::new();
            for pipeline in &def.action_pipelines {
                let accompanies = pipeline
                    .accompanying_ops
                    .as_ref()
                    .is_some_and(|ops| ops.contains(&host.action_id));
                if accompanies && !specials.contains(&&pipeline.action_id) {
                    specials.push(&pipeline.action_id);
                }
            }
            for special in specials {
                let mut timings = vec![(CompoundTiming::Before, None), (CompoundTiming::After, None)];
                timings.extend((0..stage_count).map(|k| (CompoundTiming::During, Some(k))));
                for (timing, after) in timings {
                    if self.full() {
                        return Ok(());
                    }
                    let mut sa = Move::new(special.as_str());
                    sa.free_operation = host.free_operation;
                    self.explore(host.clone().with_special_activity(sa, timing, after))?;
                }
            }
        }
        Ok(())
    }
}

fn with_choice(mv: &Move, request: &DecisionRequest, value: MoveParam) -> Move {
    let mut next = mv.clone();
    let name = request.decision.name.clone();
    match (&mut next.compound, request.special_activity) {
        (Some(compound), true) => {
            compound.special_activity.params.insert(name, value);
        }
        _ => {
            next.params.insert(name, value);
        }
    }
    next
}

/// The options of a decision as move params, in canonical order.
#[must_use]
pub fn canonical_choices(decision: &PendingDecision) -> Vec<MoveParam> {
    let options: Vec<Scalar> = decision.domain.iter().filter_map(|v| v.identity()).collect();
    match decision.kind {
        ChoiceKind::ChooseOne => options.into_iter().map(MoveParam::Scalar).collect(),
        ChoiceKind::ChooseN => {
            let mut out = Vec::new();
            for size in decision.min..=decision.max.min(options.len()) {
                collect_combinations(&options, size, 0, &mut Vec::new(), &mut out);
            }
            out
        }
    }
}

fn collect_combinations(
    options: &[Scalar],
    size: usize,
    start: usize,
    picked: &mut Vec<Scalar>,
    out: &mut Vec<MoveParam>,
) {
    if picked.len() == size {
        out.push(MoveParam::Array(picked.clone()));
        return;
    }
    for index in start..options.len() {
        picked.push(options[index].clone());
        collect_combinations(options, size, index + 1, picked, out);
        picked.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;
    use crate::def::{ActionDef, DefRuntime, GameDef};
    use crate::effects::EffectAst;
    use crate::eval::Query;
    use crate::rules::KernelOptions;

    fn moves(def: &GameDef, state: &GameState, options: &LegalMoveOptions) -> Vec<Move> {
        let runtime = DefRuntime::new(def);
        enumerate(&Rules::new(def, &runtime, KernelOptions::default()), state, options).unwrap()
    }

    #[test]
    fn test_enumerates_in_canonical_order() {
        let mut def = GameDef::minimal("enumerate");
        def.actions.push(ActionDef::new("pass"));
        def.actions.push(
            ActionDef::new("pick").with_effects(vec![EffectAst::choose_n("$n", Query::int_range(1, 3), 1, 2)]),
        );
        let state = GameState::new(&def, 2, 0).unwrap();
        let all = moves(&def, &state, &LegalMoveOptions::default());
        let rendered: Vec<String> = all.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "pass",
                "pick($n=[1])",
                "pick($n=[2])",
                "pick($n=[3])",
                "pick($n=[1,2])",
                "pick($n=[1,3])",
                "pick($n=[2,3])",
            ]
        );

        let capped = moves(&def, &state, &LegalMoveOptions::default().with_max_moves(3));
        assert_eq!(capped.len(), 3);
    }

    #[test]
    fn test_canonical_choices() {
        let decision = PendingDecision {
            decision_id: "d".to_string(),
            name: "$n".to_string(),
            kind: ChoiceKind::ChooseN,
            domain: vec![Value::int(1), Value::int(2), Value::int(3)],
            min: 0,
            max: 5,
        };
        let choices = canonical_choices(&decision);
        // Sizes 0..=3 of a 3-element domain.
        assert_eq!(choices.len(), 1 + 3 + 3 + 1);
        assert_eq!(choices[0], MoveParam::Array(vec![]));
        assert_eq!(
            choices.last(),
            Some(&MoveParam::Array(vec![Scalar::Int(1), Scalar::Int(2), Scalar::Int(3)]))
        );
    }
}
