//! Error families surfaced by the kernel.
//!
//! Two disjoint families:
//!
//! - **Illegal moves** (`IllegalMoveError`): expected, recoverable outcomes
//!   with a closed reason taxonomy. `legal_choices_discover` reports the same
//!   reasons `apply_move` fails with.
//! - **Runtime-contract errors** (`KernelError`): a broken definition or a
//!   kernel bug. Not meant to be caught and retried; each carries a
//!   machine-readable `code()` and structured fields.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ids::{ActionId, ZoneId};

pub type Result<T> = std::result::Result<T, KernelError>;

/// Why a free-operation move was not granted.
///
/// Declaration order is the taxonomy order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FreeOperationDenial {
    NoActiveSeatGrant,
    SequenceLocked,
    ActionClassMismatch,
    ActionIdMismatch,
    ZoneFilterMismatch,
}

impl FreeOperationDenial {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NoActiveSeatGrant => "noActiveSeatGrant",
            Self::SequenceLocked => "sequenceLocked",
            Self::ActionClassMismatch => "actionClassMismatch",
            Self::ActionIdMismatch => "actionIdMismatch",
            Self::ZoneFilterMismatch => "zoneFilterMismatch",
        }
    }
}

impl fmt::Display for FreeOperationDenial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed taxonomy of illegal-move reasons.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IllegalMoveReason {
    GameIsTerminal,
    UnknownActionId,
    ActionNotLegalInCurrentState,
    ActionPipelineNotApplicable,
    ActionPipelineLegalityPredicateFailed,
    ActionPipelineCostValidationFailed,
    FreeOperationNotGranted(FreeOperationDenial),
    SpecialActivityAccompanyingOpDisallowed,
    SpecialActivityCompoundParamConstraintFailed,
    CompoundTimingConfigurationInvalid,
    MoveParamsNotLegalForAction,
    MoveHasIncompleteParams,
}

impl IllegalMoveReason {
    /// Machine-readable reason code.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::GameIsTerminal => "GAME_IS_TERMINAL",
            Self::UnknownActionId => "UNKNOWN_ACTION_ID",
            Self::ActionNotLegalInCurrentState => "ACTION_NOT_LEGAL_IN_CURRENT_STATE",
            Self::ActionPipelineNotApplicable => "ACTION_PIPELINE_NOT_APPLICABLE",
            Self::ActionPipelineLegalityPredicateFailed => {
                "ACTION_PIPELINE_LEGALITY_PREDICATE_FAILED"
            }
            Self::ActionPipelineCostValidationFailed => "ACTION_PIPELINE_COST_VALIDATION_FAILED",
            Self::FreeOperationNotGranted(_) => "FREE_OPERATION_NOT_GRANTED",
            Self::SpecialActivityAccompanyingOpDisallowed => {
                "SPECIAL_ACTIVITY_ACCOMPANYING_OP_DISALLOWED"
            }
            Self::SpecialActivityCompoundParamConstraintFailed => {
                "SPECIAL_ACTIVITY_COMPOUND_PARAM_CONSTRAINT_FAILED"
            }
            Self::CompoundTimingConfigurationInvalid => "COMPOUND_TIMING_CONFIGURATION_INVALID",
            Self::MoveParamsNotLegalForAction => "MOVE_PARAMS_NOT_LEGAL_FOR_ACTION",
            Self::MoveHasIncompleteParams => "MOVE_HAS_INCOMPLETE_PARAMS",
        }
    }
}

impl fmt::Display for IllegalMoveReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FreeOperationNotGranted(cause) => write!(f, "{} ({cause})", self.code()),
            _ => f.write_str(self.code()),
        }
    }
}

/// A move rejected by validation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("illegal move `{action_id}`: {reason}: {detail}")]
pub struct IllegalMoveError {
    pub reason: IllegalMoveReason,
    pub action_id: ActionId,
    pub detail: String,
}

impl IllegalMoveError {
    pub fn new(reason: IllegalMoveReason, action_id: &ActionId, detail: impl Into<String>) -> Self {
        Self {
            reason,
            action_id: action_id.clone(),
            detail: detail.into(),
        }
    }

    /// Always `ILLEGAL_MOVE`; the specific cause is in `reason`.
    pub const fn code(&self) -> &'static str {
        "ILLEGAL_MOVE"
    }
}

/// Which definition table a dangling reference pointed into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DefinitionKind {
    GlobalVar,
    PlayerVar,
    ZoneVar,
    Zone,
    Action,
    Phase,
    TokenType,
    TokenProp,
    Constant,
    Table,
    TableRow,
    Marker,
    LastingEffect,
    Player,
}

impl fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::GlobalVar => "global variable",
            Self::PlayerVar => "per-player variable",
            Self::ZoneVar => "zone variable",
            Self::Zone => "zone",
            Self::Action => "action",
            Self::Phase => "phase",
            Self::TokenType => "token type",
            Self::TokenProp => "token prop",
            Self::Constant => "constant",
            Self::Table => "table",
            Self::TableRow => "table row",
            Self::Marker => "marker",
            Self::LastingEffect => "lasting effect",
            Self::Player => "player",
        };
        f.write_str(label)
    }
}

/// Sub-classification of `EFFECT_RUNTIME` failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EffectRuntimeReason {
    TokenNotFound,
    TokenOwnershipViolation,
    SourceZoneMismatch,
    NotAdjacent,
    MissingDecisionBinding,
    ChoiceOutOfDomain,
    ChoiceNotArray,
    ChoiceDuplicateSelection,
    ChoiceCardinalityMismatch,
    InvalidLimit,
    UnknownMarkerState,
    TurnOrderMismatch,
    InvalidPhase,
}

impl fmt::Display for EffectRuntimeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::TokenNotFound => "token not found",
            Self::TokenOwnershipViolation => "token ownership violation",
            Self::SourceZoneMismatch => "source zone mismatch",
            Self::NotAdjacent => "destination not adjacent",
            Self::MissingDecisionBinding => "missing decision binding",
            Self::ChoiceOutOfDomain => "choice out of domain",
            Self::ChoiceNotArray => "choice is not an array",
            Self::ChoiceDuplicateSelection => "duplicate selection",
            Self::ChoiceCardinalityMismatch => "cardinality mismatch",
            Self::InvalidLimit => "invalid limit",
            Self::UnknownMarkerState => "unknown marker state",
            Self::TurnOrderMismatch => "turn order mismatch",
            Self::InvalidPhase => "invalid phase",
        };
        f.write_str(label)
    }
}

/// Runtime-contract errors.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum KernelError {
    #[error("effect runtime error at {path}: {reason}: {message}")]
    EffectRuntime {
        reason: EffectRuntimeReason,
        path: String,
        message: String,
    },

    #[error("effect budget of {max_effect_ops} operations exceeded at {path}")]
    EffectBudgetExceeded { max_effect_ops: u32, path: String },

    #[error("invalid selector spec `{selector}` for action `{action_id}`: {message}")]
    InvalidSelectorSpec {
        action_id: ActionId,
        selector: String,
        message: String,
    },

    #[error("missing {kind} definition `{id}`")]
    MissingDefinition { kind: DefinitionKind, id: String },

    #[error("stacking constraint `{constraint}` violated in zone `{zone}`: {count} > {max}")]
    StackingViolation {
        constraint: String,
        zone: ZoneId,
        count: usize,
        max: u32,
    },

    #[error("trigger cascade exceeded max depth {max_depth} while dispatching {event}")]
    MaxTriggerDepthExceeded { max_depth: u32, event: String },

    #[error("more than {max} phase transitions while advancing to the next decision point")]
    PhaseTransitionBudgetExceeded { max: u32 },

    #[error("type mismatch: expected {expected}, found {found} in {context}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
        context: String,
    },

    #[error("unbound name `{name}`")]
    UnboundBinding { name: String },

    #[error("arithmetic error: {message}")]
    Arithmetic { message: String },

    #[error("predicate `{predicate}` failed to evaluate: {source}")]
    PredicateEvaluation {
        predicate: String,
        #[source]
        source: Box<KernelError>,
    },

    #[error("serialization failed: {message}")]
    Serialization { message: String },

    #[error("{count} players requested, definition allows {min}..={max}")]
    InvalidPlayerCount { count: usize, min: u8, max: u8 },
}

impl KernelError {
    /// Machine-readable error code.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::EffectRuntime { .. } => "EFFECT_RUNTIME",
            Self::EffectBudgetExceeded { .. } => "EFFECT_BUDGET_EXCEEDED",
            Self::InvalidSelectorSpec { .. } => "INVALID_SELECTOR_SPEC",
            Self::MissingDefinition { .. } => "MISSING_DEFINITION",
            Self::StackingViolation { .. } => "STACKING_VIOLATION",
            Self::MaxTriggerDepthExceeded { .. } => "MAX_TRIGGER_DEPTH_EXCEEDED",
            Self::PhaseTransitionBudgetExceeded { .. } => "PHASE_TRANSITION_BUDGET_EXCEEDED",
            Self::TypeMismatch { .. } => "TYPE_MISMATCH",
            Self::UnboundBinding { .. } => "UNBOUND_BINDING",
            Self::Arithmetic { .. } => "ARITHMETIC",
            Self::PredicateEvaluation { .. } => "PREDICATE_EVALUATION",
            Self::Serialization { .. } => "SERIALIZATION",
            Self::InvalidPlayerCount { .. } => "INVALID_PLAYER_COUNT",
        }
    }

    pub(crate) fn missing(kind: DefinitionKind, id: impl fmt::Display) -> Self {
        Self::MissingDefinition {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn effect(
        reason: EffectRuntimeReason,
        path: impl fmt::Display,
        message: impl Into<String>,
    ) -> Self {
        Self::EffectRuntime {
            reason,
            path: path.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn type_mismatch(
        expected: &'static str,
        found: &'static str,
        context: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            expected,
            found,
            context: context.into(),
        }
    }

    /// Wrap an evaluation failure of a named predicate.
    pub(crate) fn in_predicate(self, predicate: impl Into<String>) -> Self {
        Self::PredicateEvaluation {
            predicate: predicate.into(),
            source: Box::new(self),
        }
    }
}

/// Failure of `apply_move`.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ApplyMoveError {
    #[error(transparent)]
    Illegal(#[from] IllegalMoveError),

    #[error(transparent)]
    Runtime(#[from] KernelError),
}

impl ApplyMoveError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Illegal(err) => err.code(),
            Self::Runtime(err) => err.code(),
        }
    }

    /// The illegal-move reason, if this is an illegal move.
    pub fn illegal_reason(&self) -> Option<IllegalMoveReason> {
        match self {
            Self::Illegal(err) => Some(err.reason),
            Self::Runtime(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_illegal_move_codes() {
        let err = IllegalMoveError::new(
            IllegalMoveReason::FreeOperationNotGranted(FreeOperationDenial::SequenceLocked),
            &ActionId::new("rally"),
            "grant 1 waits for index 0",
        );
        assert_eq!(err.code(), "ILLEGAL_MOVE");
        assert_eq!(err.reason.code(), "FREE_OPERATION_NOT_GRANTED");
        assert!(err.to_string().contains("sequenceLocked"));
    }

    #[test]
    fn test_kernel_error_codes() {
        let err = KernelError::EffectBudgetExceeded {
            max_effect_ops: 3,
            path: "effects[0]".to_string(),
        };
        assert_eq!(err.code(), "EFFECT_BUDGET_EXCEEDED");

        let wrapped = KernelError::missing(DefinitionKind::GlobalVar, "score").in_predicate("legality");
        assert_eq!(wrapped.code(), "PREDICATE_EVALUATION");
        assert!(wrapped.to_string().contains("score"));
    }

    #[test]
    fn test_apply_move_error_conversion() {
        let err: ApplyMoveError = KernelError::Arithmetic {
            message: "division by zero".to_string(),
        }
        .into();
        assert_eq!(err.code(), "ARITHMETIC");
        assert_eq!(err.illegal_reason(), None);
    }
}
