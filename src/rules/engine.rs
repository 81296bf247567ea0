//! The rules engine surface.
//!
//! `RulesEngine` exposes the kernel's entry points over a definition and
//! its derived runtime. `Kernel` owns both, so the runtime is built once and
//! reused across calls.
//!
//! ## Implementation Notes
//!
//! - `legal_moves` is the closure of `legal_choices_discover` under a
//!   canonical chooser; `apply_move` accepts exactly the moves both report
//!   legal, failing with the same reason otherwise.
//! - Every method is a pure function of its inputs. The state passed in is
//!   never modified.

use crate::core::{ApplyMoveError, GameState, Move, Result};
use crate::def::{DefRuntime, GameDef};

use super::apply::{apply, ApplyMoveResult};
use super::discover::{discover, ChoiceRequest};
use super::enumerate::enumerate;
use super::options::{ApplyMoveOptions, KernelOptions, LegalMoveOptions};
use super::resolve::Rules;
use super::setup::setup;
use super::terminal::{terminal_result, TerminalResult};

/// Rules engine trait.
///
/// Implementors supply the definition and its runtime; every rule query has
/// a default implementation on top of them.
pub trait RulesEngine {
    /// The game definition.
    fn definition(&self) -> &GameDef;

    /// Lookup structures derived from `definition()`.
    fn runtime(&self) -> &DefRuntime;

    /// Build the starting state for `player_count` seats.
    fn initial_state(&self, player_count: usize, seed: u64) -> Result<GameState> {
        setup(
            self.definition(),
            self.runtime(),
            player_count,
            seed,
            &KernelOptions::default(),
        )
    }

    /// Every legal move of the active seat, with default options.
    fn legal_moves(&self, state: &GameState) -> Result<Vec<Move>> {
        self.legal_moves_with(state, &LegalMoveOptions::default())
    }

    /// Every legal move of the active seat, up to `options.max_moves`.
    fn legal_moves_with(&self, state: &GameState, options: &LegalMoveOptions) -> Result<Vec<Move>> {
        let rules = Rules::new(self.definition(), self.runtime(), options.kernel);
        enumerate(&rules, state, options)
    }

    /// Where a partially specified move stands.
    fn legal_choices_discover(
        &self,
        state: &GameState,
        mv: &Move,
        options: &KernelOptions,
    ) -> Result<ChoiceRequest> {
        let rules = Rules::new(self.definition(), self.runtime(), *options);
        discover(&rules, state, mv)
    }

    /// Validate and commit `mv`, with default options.
    fn apply_move(
        &self,
        state: &GameState,
        mv: &Move,
    ) -> std::result::Result<ApplyMoveResult, ApplyMoveError> {
        self.apply_move_with(state, mv, &ApplyMoveOptions::default())
    }

    /// Validate and commit `mv`.
    fn apply_move_with(
        &self,
        state: &GameState,
        mv: &Move,
        options: &ApplyMoveOptions,
    ) -> std::result::Result<ApplyMoveResult, ApplyMoveError> {
        let rules = Rules::new(self.definition(), self.runtime(), *options);
        apply(&rules, state, mv)
    }

    /// The result if the game is over, `None` while it continues.
    fn terminal_result(&self, state: &GameState) -> Result<Option<TerminalResult>> {
        terminal_result(self.definition(), self.runtime(), state)
    }

    // === Convenience Methods ===

    /// Whether the game is over.
    fn is_terminal(&self, state: &GameState) -> Result<bool> {
        Ok(self.terminal_result(state)?.is_some())
    }
}

/// A definition paired with its derived runtime.
#[derive(Clone, Debug)]
pub struct Kernel {
    def: GameDef,
    runtime: DefRuntime,
}

impl Kernel {
    /// Take ownership of `def` and derive its runtime.
    #[must_use]
    pub fn new(def: GameDef) -> Self {
        let runtime = DefRuntime::new(&def);
        tracing::debug!(
            game = %def.metadata.id,
            actions = def.actions.len(),
            pipelines = def.action_pipelines.len(),
            triggers = def.triggers.len(),
            "kernel built"
        );
        Self { def, runtime }
    }

    #[must_use]
    pub fn def(&self) -> &GameDef {
        &self.def
    }

    #[must_use]
    pub fn into_def(self) -> GameDef {
        self.def
    }
}

impl RulesEngine for Kernel {
    fn definition(&self) -> &GameDef {
        &self.def
    }

    fn runtime(&self) -> &DefRuntime {
        &self.runtime
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{IllegalMoveReason, PlayerId};
    use crate::def::{ActionDef, EndCondition, EndResultDef, VarDef};
    use crate::effects::EffectAst;
    use crate::eval::{Condition, ValueExpr};

    fn kernel() -> Kernel {
        let mut def = GameDef::minimal("engine");
        def.global_vars.push(VarDef::int("score", 0, 0, 10));
        def.actions.push(ActionDef::new("score").with_effects(vec![EffectAst::add_global("score", 5)]));
        def.end_conditions.push(EndCondition {
            when: Condition::ge(ValueExpr::global("score"), ValueExpr::Int(10)),
            result: EndResultDef::Draw,
        });
        Kernel::new(def)
    }

    #[test]
    fn test_kernel_round_trip() {
        let kernel = kernel();
        let state = kernel.initial_state(2, 1).unwrap();
        assert!(!kernel.is_terminal(&state).unwrap());

        let moves = kernel.legal_moves(&state).unwrap();
        assert_eq!(moves, vec![Move::new("score")]);

        let first = kernel.apply_move(&state, &moves[0]).unwrap();
        let second = kernel.apply_move(&first.state, &moves[0]).unwrap();
        assert_eq!(second.state.global_var("score"), Some(10));
        assert_eq!(kernel.terminal_result(&second.state).unwrap(), Some(TerminalResult::Draw));
        assert!(kernel.legal_moves(&second.state).unwrap().is_empty());

        let err = kernel.apply_move(&second.state, &moves[0]).unwrap_err();
        assert_eq!(err.illegal_reason(), Some(IllegalMoveReason::GameIsTerminal));
    }

    #[test]
    fn test_discover_matches_apply() {
        let kernel = kernel();
        let state = kernel.initial_state(2, 1).unwrap();
        let mv = Move::new("score");
        let choice = kernel
            .legal_choices_discover(&state, &mv, &KernelOptions::default())
            .unwrap();
        assert!(choice.is_complete());
        assert!(kernel.apply_move(&state, &mv).is_ok());
        assert_eq!(state.active_player, PlayerId(0));
    }
}
