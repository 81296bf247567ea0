//! Evaluation environment.

use super::Bindings;
use crate::core::{GameState, PlayerId};
use crate::def::{DefRuntime, GameDef};

/// Everything an expression can observe.
///
/// Evaluation is pure: the context only hands out shared references.
#[derive(Clone, Copy, Debug)]
pub struct EvalContext<'a> {
    pub def: &'a GameDef,
    pub runtime: &'a DefRuntime,
    pub state: &'a GameState,
    pub bindings: &'a Bindings,
    /// The seat executing the current action or trigger.
    pub actor: PlayerId,
}

impl<'a> EvalContext<'a> {
    pub fn new(
        def: &'a GameDef,
        runtime: &'a DefRuntime,
        state: &'a GameState,
        bindings: &'a Bindings,
        actor: PlayerId,
    ) -> Self {
        Self {
            def,
            runtime,
            state,
            bindings,
            actor,
        }
    }

    /// The seat whose turn it is.
    #[must_use]
    pub fn active(&self) -> PlayerId {
        self.state.active_player
    }

    /// The same context over different bindings.
    #[must_use]
    pub fn with_bindings<'b>(&self, bindings: &'b Bindings) -> EvalContext<'b>
    where
        'a: 'b,
    {
        EvalContext {
            def: self.def,
            runtime: self.runtime,
            state: self.state,
            bindings,
            actor: self.actor,
        }
    }
}
