//! Per-call limits and switches.

use serde::{Deserialize, Serialize};

use crate::effects::DEFAULT_MAX_EFFECT_OPS;

/// Default bound on phase/turn transitions while advancing after a move.
pub const DEFAULT_MAX_PHASE_TRANSITIONS: u32 = 64;

/// Default cap on moves returned by `legal_moves`.
pub const DEFAULT_MAX_MOVES: usize = 10_000;

/// Limits for resolving and applying a move.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelOptions {
    /// Operation budget of one effect session (a move's cost and stages
    /// share one; each trigger firing gets its own).
    pub max_effect_ops: u32,
    pub max_phase_transitions_per_move: u32,
    /// Collect an effect trace.
    pub trace: bool,
}

impl Default for KernelOptions {
    fn default() -> Self {
        Self {
            max_effect_ops: DEFAULT_MAX_EFFECT_OPS,
            max_phase_transitions_per_move: DEFAULT_MAX_PHASE_TRANSITIONS,
            trace: false,
        }
    }
}

impl KernelOptions {
    #[must_use]
    pub fn with_max_effect_ops(mut self, max_effect_ops: u32) -> Self {
        self.max_effect_ops = max_effect_ops;
        self
    }

    #[must_use]
    pub fn with_max_phase_transitions(mut self, max: u32) -> Self {
        self.max_phase_transitions_per_move = max;
        self
    }

    #[must_use]
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }
}

/// Options accepted by `apply_move`.
pub type ApplyMoveOptions = KernelOptions;

/// Enumeration bounds for `legal_moves`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalMoveOptions {
    /// Stop after this many moves.
    pub max_moves: usize,
    /// Also enumerate operation + special-activity combinations.
    pub include_compound: bool,
    pub kernel: KernelOptions,
}

impl Default for LegalMoveOptions {
    fn default() -> Self {
        Self {
            max_moves: DEFAULT_MAX_MOVES,
            include_compound: false,
            kernel: KernelOptions::default(),
        }
    }
}

impl LegalMoveOptions {
    #[must_use]
    pub fn with_max_moves(mut self, max_moves: usize) -> Self {
        self.max_moves = max_moves;
        self
    }

    #[must_use]
    pub fn with_compound(mut self, include_compound: bool) -> Self {
        self.include_compound = include_compound;
        self
    }

    #[must_use]
    pub fn with_kernel(mut self, kernel: KernelOptions) -> Self {
        self.kernel = kernel;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ApplyMoveOptions::default();
        assert_eq!(options.max_effect_ops, 10_000);
        assert_eq!(options.max_phase_transitions_per_move, 64);
        assert!(!options.trace);

        let legal = LegalMoveOptions::default().with_max_moves(5).with_compound(true);
        assert_eq!(legal.max_moves, 5);
        assert!(legal.include_compound);
    }
}
