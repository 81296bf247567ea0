//! Effect AST and its interpreter.
//!
//! ## Key Types
//!
//! - `EffectAst`: closed set of state-changing nodes
//! - `EffectContext`: definition, acting seat, bindings and limits for a run
//! - `EffectResult`: new state, advanced RNG, emitted events and trace
//!
//! Effects never mutate their input. Each run works on its own copy of the
//! state and either returns a complete new state or an error.

mod effect;
mod interpreter;
mod trace;

pub use effect::{EffectAst, GrantSequence, InsertPosition, PriorityGroup, VarTarget};
pub(crate) use interpreter::{EffectHalt, EffectSession};
pub use interpreter::{
    apply_effect, apply_effects, ChoiceKind, DecisionMode, EffectContext, EffectResult,
    PendingDecision, DEFAULT_FOR_EACH_LIMIT, DEFAULT_MAX_EFFECT_OPS,
};
pub use trace::{EffectTraceEntry, EventContext, Provenance, TraceKind};
