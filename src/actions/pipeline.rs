//! Pipeline dispatch and cost viability.
//!
//! An action id may have pipelines registered against it. Dispatch picks the
//! first applicable one in declaration order; if pipelines exist but none
//! applies, the action is not available at all.

use crate::core::{ActionId, IllegalMoveReason, Result};
use crate::def::{ActionPipelineDef, Atomicity, GameDef};
use crate::eval::{eval_condition, EvalContext};

/// Outcome of pipeline lookup for an action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineDispatch<'d> {
    /// No pipeline registered: the plain action applies.
    NoPipeline,
    Matched(&'d ActionPipelineDef),
    /// Pipelines registered, none applicable.
    ConfiguredNoMatch,
}

impl<'d> PipelineDispatch<'d> {
    #[must_use]
    pub fn pipeline(&self) -> Option<&'d ActionPipelineDef> {
        match self {
            Self::Matched(pipeline) => Some(pipeline),
            _ => None,
        }
    }
}

/// Find the pipeline for `action_id` in the current state.
pub fn dispatch_pipeline<'d>(
    def: &'d GameDef,
    action_id: &ActionId,
    ctx: &EvalContext<'_>,
) -> Result<PipelineDispatch<'d>> {
    let mut configured = false;
    for pipeline in def.pipelines_for(action_id) {
        configured = true;
        if is_applicable(pipeline, ctx)? {
            tracing::debug!(action = %action_id, pipeline = %pipeline.id, "pipeline matched");
            return Ok(PipelineDispatch::Matched(pipeline));
        }
    }
    if configured {
        Ok(PipelineDispatch::ConfiguredNoMatch)
    } else {
        Ok(PipelineDispatch::NoPipeline)
    }
}

fn is_applicable(pipeline: &ActionPipelineDef, ctx: &EvalContext<'_>) -> Result<bool> {
    if !pipeline.linked_windows.is_empty()
        && !ctx
            .state
            .lasting_effects
            .iter()
            .any(|active| pipeline.linked_windows.contains(&active.id))
    {
        return Ok(false);
    }
    match &pipeline.applicability {
        Some(condition) => eval_condition(condition, ctx)
            .map_err(|e| e.in_predicate(format!("pipeline `{}` applicability", pipeline.id))),
        None => Ok(true),
    }
}

/// What to do with the cost of a legal move.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CostPolicy {
    Spend,
    /// Partial pipeline whose validation failed: resolve without paying.
    Skip { warning: String },
    /// Free operations never pay.
    Free,
}

/// Legality of a matched pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineVerdict {
    Legal(CostPolicy),
    Illegal(IllegalMoveReason),
}

/// Check legality and cost validation, applying the atomicity policy.
pub fn evaluate_pipeline(
    pipeline: &ActionPipelineDef,
    free_operation: bool,
    ctx: &EvalContext<'_>,
) -> Result<PipelineVerdict> {
    if let Some(legality) = &pipeline.legality {
        let legal = eval_condition(legality, ctx)
            .map_err(|e| e.in_predicate(format!("pipeline `{}` legality", pipeline.id)))?;
        if !legal {
            return Ok(PipelineVerdict::Illegal(
                IllegalMoveReason::ActionPipelineLegalityPredicateFailed,
            ));
        }
    }
    if free_operation {
        return Ok(PipelineVerdict::Legal(CostPolicy::Free));
    }
    let cost_ok = match &pipeline.cost_validation {
        Some(condition) => eval_condition(condition, ctx)
            .map_err(|e| e.in_predicate(format!("pipeline `{}` cost validation", pipeline.id)))?,
        None => true,
    };
    if cost_ok {
        return Ok(PipelineVerdict::Legal(CostPolicy::Spend));
    }
    match pipeline.atomicity {
        Atomicity::Atomic => Ok(PipelineVerdict::Illegal(
            IllegalMoveReason::ActionPipelineCostValidationFailed,
        )),
        Atomicity::Partial => Ok(PipelineVerdict::Legal(CostPolicy::Skip {
            warning: format!(
                "pipeline `{}`: cost validation failed, resolving without spending cost",
                pipeline.id
            ),
        })),
    }
}
