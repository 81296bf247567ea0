//! Pure evaluation of value expressions, conditions and queries.
//!
//! ## Key Types
//!
//! - `ValueExpr`, `Condition`, `Query`: closed expression trees
//! - `Bindings`: scope stack of named values, inner shadows outer
//! - `EvalContext`: definition, runtime, state, bindings and acting seat
//!
//! Queries return ordered sequences deduplicated by identity; they serve both
//! as choice domains and as `forEach` sources.

pub mod bindings;
pub mod context;
pub mod evaluator;
pub mod expr;

pub use bindings::Bindings;
pub use context::EvalContext;
pub use evaluator::{
    eval_condition, eval_int, eval_query, eval_value, player_from_value, resolve_player,
    resolve_token, resolve_zone, same_identity, MAX_INT_RANGE,
};
pub use expr::{
    AggregateOp, ArithOp, CompareOp, Condition, PlayerRef, Query, QueryFilter, Reference,
    ValueExpr, ZoneRef,
};
