//! Incremental move construction.
//!
//! `legal_choices_discover` runs the same validation as `apply_move` on a
//! possibly partial move and reports where it stands: complete, waiting
//! for the next decision, or illegal for the reason `apply_move` would give.

use serde::{Deserialize, Serialize};

use crate::core::{ApplyMoveError, GameState, IllegalMoveReason, Move, Result};
use crate::effects::PendingDecision;

use super::resolve::{resolve_move, Resolution, Rules};

/// Where a partial move stands.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChoiceRequest {
    /// Every decision is supplied and the move is legal.
    Complete,
    /// The next decision to supply.
    Pending {
        decision: PendingDecision,
        /// Supply the selection in the special activity's params.
        special_activity: bool,
    },
    Illegal {
        reason: IllegalMoveReason,
        detail: String,
    },
}

impl ChoiceRequest {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// The illegal-move reason, if illegal.
    #[must_use]
    pub fn illegal_reason(&self) -> Option<IllegalMoveReason> {
        match self {
            Self::Illegal { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

/// Discover the next decision of `mv`. Runtime-contract errors propagate.
pub(crate) fn discover(rules: &Rules<'_>, state: &GameState, mv: &Move) -> Result<ChoiceRequest> {
    match resolve_move(rules, state, mv) {
        Ok(Resolution::Complete(_)) => Ok(ChoiceRequest::Complete),
        Ok(Resolution::Pending(request)) => Ok(ChoiceRequest::Pending {
            decision: request.decision,
            special_activity: request.special_activity,
        }),
        Err(ApplyMoveError::Illegal(err)) => Ok(ChoiceRequest::Illegal {
            reason: err.reason,
            detail: err.detail,
        }),
        Err(ApplyMoveError::Runtime(err)) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::def::{ActionDef, DefRuntime, GameDef};
    use crate::effects::{ChoiceKind, EffectAst};
    use crate::eval::Query;
    use crate::rules::KernelOptions;

    fn discover_in(def: &GameDef, state: &GameState, mv: &Move) -> ChoiceRequest {
        let runtime = DefRuntime::new(def);
        discover(&Rules::new(def, &runtime, KernelOptions::default()), state, mv).unwrap()
    }

    #[test]
    fn test_walks_decisions_in_order() {
        let mut def = GameDef::minimal("discover");
        def.actions.push(ActionDef::new("pick").with_effects(vec![
            EffectAst::choose_one("$a", Query::int_range(1, 2)),
            EffectAst::choose_n("$b", Query::int_range(1, 3), 0, 2),
        ]));
        let state = GameState::new(&def, 2, 0).unwrap();

        let first = discover_in(&def, &state, &Move::new("pick"));
        let ChoiceRequest::Pending { decision, .. } = &first else {
            panic!("expected pending, got {first:?}");
        };
        assert_eq!(decision.name, "$a");
        assert_eq!(decision.kind, ChoiceKind::ChooseOne);

        let second = discover_in(&def, &state, &Move::new("pick").with_param("$a", 2));
        let ChoiceRequest::Pending { decision, .. } = &second else {
            panic!("expected pending, got {second:?}");
        };
        assert_eq!(decision.kind, ChoiceKind::ChooseN);
        assert_eq!((decision.min, decision.max), (0, 2));

        let done = Move::new("pick").with_param("$a", 2).with_array("$b", vec![]);
        assert!(discover_in(&def, &state, &done).is_complete());
    }

    #[test]
    fn test_reports_illegal_reason() {
        let def = GameDef::minimal("discover");
        let state = GameState::new(&def, 2, 0).unwrap();
        let result = discover_in(&def, &state, &Move::new("missing"));
        assert_eq!(result.illegal_reason(), Some(IllegalMoveReason::UnknownActionId));
    }
}
