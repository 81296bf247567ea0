//! Event-driven triggers.
//!
//! Effects, phase and turn transitions and resolved moves raise
//! `TriggerEvent`s. Triggers declared in the definition listen for them by
//! kind, filter with `match`/`when`, and run their effects, possibly raising
//! further events.
//!
//! ## Key Components
//!
//! - [`TriggerEvent`]: an event with its data and binding scope
//! - [`TriggerDef`] / [`EventPattern`]: a declared trigger
//! - [`TriggerIndex`]: event kind to triggers, in firing order
//! - [`TriggerDispatcher`]: recursive dispatch with a depth bound
//! - [`TriggerLogEntry`]: one record per firing
//!
//! ## Ordering
//!
//! Higher `priority` fires first; equal priorities fire in declaration
//! order. A cascade is explored depth first: the events a firing emits are
//! fully dispatched before the next trigger for the original event runs.

mod dispatch;
mod event;
mod registry;

pub use dispatch::{TriggerDispatcher, TriggerLogEntry};
pub use event::{EventKind, TriggerEvent, VarScope};
pub use registry::{EventPattern, TriggerDef, TriggerIndex};
