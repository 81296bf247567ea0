//! Move orchestration.
//!
//! The three legality surfaces share one validation path:
//! - `legal_choices_discover`: where a partial move stands
//! - `legal_moves`: every complete legal move, in canonical order
//! - `apply_move`: validate, commit, and advance to the next decision point
//!
//! The free functions here derive a `DefRuntime` per call. Callers making
//! many calls against one definition should hold a `Kernel` instead.

mod advance;
mod apply;
mod discover;
pub mod engine;
mod enumerate;
pub mod options;
mod resolve;
mod setup;
pub mod terminal;

pub use apply::ApplyMoveResult;
pub use discover::ChoiceRequest;
pub use engine::{Kernel, RulesEngine};
pub use enumerate::canonical_choices;
pub use options::{
    ApplyMoveOptions, KernelOptions, LegalMoveOptions, DEFAULT_MAX_MOVES,
    DEFAULT_MAX_PHASE_TRANSITIONS,
};
pub use terminal::{PlayerScore, TerminalResult, VictoryInfo};

use crate::core::{ApplyMoveError, GameState, Move, Result};
use crate::def::{DefRuntime, GameDef};

use resolve::Rules;

/// Build the starting state: setup effects applied, hash computed.
pub fn initial_state(def: &GameDef, player_count: usize, seed: u64) -> Result<GameState> {
    let runtime = DefRuntime::new(def);
    setup::setup(def, &runtime, player_count, seed, &KernelOptions::default())
}

/// Every legal move of the active seat.
pub fn legal_moves(def: &GameDef, state: &GameState, options: &LegalMoveOptions) -> Result<Vec<Move>> {
    let runtime = DefRuntime::new(def);
    enumerate::enumerate(&Rules::new(def, &runtime, options.kernel), state, options)
}

/// Where a partially specified move stands.
pub fn legal_choices_discover(
    def: &GameDef,
    state: &GameState,
    mv: &Move,
    options: &KernelOptions,
) -> Result<ChoiceRequest> {
    let runtime = DefRuntime::new(def);
    discover::discover(&Rules::new(def, &runtime, *options), state, mv)
}

/// Validate and commit `mv`.
pub fn apply_move(
    def: &GameDef,
    state: &GameState,
    mv: &Move,
    options: &ApplyMoveOptions,
) -> std::result::Result<ApplyMoveResult, ApplyMoveError> {
    let runtime = DefRuntime::new(def);
    apply::apply(&Rules::new(def, &runtime, *options), state, mv)
}

/// The result if `state` is terminal, `None` while the game continues.
pub fn terminal_result(def: &GameDef, state: &GameState) -> Result<Option<TerminalResult>> {
    let runtime = DefRuntime::new(def);
    terminal::terminal_result(def, &runtime, state)
}
