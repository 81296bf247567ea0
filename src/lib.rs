//! # rules-kernel
//!
//! A deterministic action-execution kernel for turn-based, multi-seat
//! games described entirely by data.
//!
//! ## Design Principles
//!
//! 1. **Game-Agnostic**: Zones, variables, actions, phases, triggers and
//!    turn order all come from a `GameDef`. The kernel hardcodes none of them.
//!
//! 2. **Pure Transitions**: Every entry point maps `(GameDef, GameState, ..)`
//!    to a new value. The input state is never modified, and any error
//!    leaves it as it was.
//!
//! 3. **One Legality Path**: `legal_moves`, `legal_choices_discover` and
//!    `apply_move` share the same validation, so they always agree on what
//!    is legal and why something is not.
//!
//! ## Architecture
//!
//! - **Persistent Data Structures**: `im` collections keep state snapshots
//!   cheap to clone, which discovery and enumeration rely on.
//!
//! - **Explicit Randomness**: The ChaCha8 stream state lives in `GameState`
//!   and is threaded through every consuming operation.
//!
//! - **Bounded Work**: Effect ops, `forEach` iterations, trigger depth and
//!   phase transitions per move all have explicit budgets.
//!
//! ## Modules
//!
//! - `core`: ids, values, moves, state, RNG, hashing, errors
//! - `def`: the game definition and its derived runtime
//! - `eval`: value, condition and query evaluation
//! - `zones`: token storage, adjacency and stacking
//! - `effects`: the effect interpreter
//! - `actions`: selectors, usage limits and pipeline dispatch
//! - `turn_flow`: card-driven eligibility and free-operation grants
//! - `triggers`: event matching and cascading dispatch
//! - `rules`: the move orchestrator and `RulesEngine`

pub mod actions;
pub mod core;
pub mod def;
pub mod effects;
pub mod eval;
pub mod rules;
pub mod triggers;
pub mod turn_flow;
pub mod zones;

// Re-export commonly used types
pub use crate::core::{
    compute_state_hash, ActionId, ApplyMoveError, CompoundMove, CompoundTiming, GameRngState,
    GameState, IllegalMoveError, IllegalMoveReason, KernelError, Move, MoveParam, PhaseId,
    PlayerId, PlayerMap, Result, Scalar, TokenId, Value, ZoneId,
};

pub use crate::def::{ActionDef, ActionPipelineDef, DefRuntime, GameDef};

pub use crate::effects::{
    apply_effect, apply_effects, EffectAst, EffectContext, EffectResult, EffectTraceEntry,
    PendingDecision,
};

pub use crate::eval::{Condition, PlayerRef, Query, ValueExpr, ZoneRef};

pub use crate::rules::{
    apply_move, initial_state, legal_choices_discover, legal_moves, terminal_result,
    ApplyMoveOptions, ApplyMoveResult, ChoiceRequest, Kernel, KernelOptions, LegalMoveOptions,
    RulesEngine, TerminalResult,
};

pub use crate::triggers::{TriggerDef, TriggerEvent, TriggerLogEntry};
