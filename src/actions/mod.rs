//! Action availability: seat selectors, pipeline dispatch and usage limits.
//!
//! ## Dispatch outcomes
//!
//! - `NoPipeline`: the plain action's `params`, `pre`, `cost` and `effects`
//!   apply directly
//! - `Matched`: the first applicable pipeline replaces cost and effects with
//!   its own cost effects and stages
//! - `ConfiguredNoMatch`: pipelines exist but none applies; the move is
//!   illegal
//!
//! Selector failures are runtime-contract errors (`INVALID_SELECTOR_SPEC`),
//! never illegal moves.

mod pipeline;
mod selector;
mod usage;

pub use pipeline::{dispatch_pipeline, evaluate_pipeline, CostPolicy, PipelineDispatch, PipelineVerdict};
pub use selector::PlayerSelector;
pub use usage::exhausted_limit;
