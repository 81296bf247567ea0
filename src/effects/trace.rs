//! Effect trace records.
//!
//! When tracing is enabled the interpreter appends one entry per observable
//! change. Presentation layers replay these instead of diffing states.

use serde::{Deserialize, Serialize};

use crate::core::{ActionId, PhaseId, Scalar, TokenId, TriggerId, ZoneId};
use crate::triggers::VarScope;

/// What caused the effects being run.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventContext {
    Setup,
    Cost,
    Action,
    Trigger { trigger: TriggerId, depth: u32 },
    LastingSetup { id: String },
    LastingTeardown { id: String },
    /// Direct call to `apply_effects`.
    Direct,
}

/// Where a trace entry came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub phase: PhaseId,
    pub event_context: EventContext,
    pub action_id: Option<ActionId>,
    pub effect_path: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TraceKind {
    TokenMoved {
        token: TokenId,
        from: ZoneId,
        to: ZoneId,
    },
    TokenCreated {
        token: TokenId,
        zone: ZoneId,
    },
    TokenDestroyed {
        token: TokenId,
        zone: ZoneId,
    },
    VarChanged {
        scope: VarScope,
        var: String,
        old: i64,
        new: i64,
    },
    TokenPropChanged {
        token: TokenId,
        prop: String,
        old: Scalar,
        new: Scalar,
    },
    MarkerChanged {
        space: ZoneId,
        marker: String,
        old: String,
        new: String,
    },
    ZoneShuffled {
        zone: ZoneId,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectTraceEntry {
    pub kind: TraceKind,
    pub provenance: Provenance,
}
