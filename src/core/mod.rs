//! Core kernel types: ids, players, values, moves, state, RNG, hashing, errors.
//!
//! This module contains the fundamental building blocks that are
//! game-agnostic. Games configure the kernel through a `GameDef` rather than
//! modifying the core.

pub mod action;
pub mod error;
pub mod hash;
pub mod ids;
pub mod player;
pub mod rng;
pub mod state;
pub mod value;

pub use action::{CompoundMove, CompoundTiming, Move};
pub use error::{
    ApplyMoveError, DefinitionKind, EffectRuntimeReason, FreeOperationDenial, IllegalMoveError,
    IllegalMoveReason, KernelError, Result,
};
pub use hash::compute_state_hash;
pub use ids::{ActionId, PhaseId, PipelineId, TokenId, TriggerId, ZoneId};
pub use player::{PlayerId, PlayerMap};
pub use rng::GameRngState;
pub use state::{ActionUsage, ActiveLastingEffect, GameState};
pub use value::{MoveParam, Scalar, Value};
