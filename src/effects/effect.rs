//! The effect AST.
//!
//! Effects are the state-changing half of a definition: costs, resolution
//! stages, trigger bodies, setup and lasting effects are all effect lists.
//! The enum is closed; every interpreter `match` over it is exhaustive.
//!
//! ## Variables
//!
//! - `SetVar` / `AddVar`: write a global, per-player or per-zone variable,
//!   clamped to its declared bounds
//!
//! ## Tokens
//!
//! - `MoveToken`, `MoveTokenAdjacent`, `MoveAll`, `Draw`: relocate tokens
//! - `Shuffle`: Fisher-Yates over a zone
//! - `CreateToken`, `DestroyToken`, `SetTokenProp`, `SetMarker`
//!
//! ## Control
//!
//! - `If`, `ForEach`, `Let`, `Reduce`, `RollRandom`, `RemoveByPriority`
//!
//! ## Decisions
//!
//! - `ChooseOne` / `ChooseN`: validate a move-supplied selection against the
//!   authoritative domain. Bind names may contain `{$name}` placeholders,
//!   replaced by the current value of `$name`, so a decision inside a loop
//!   gets one param per iteration.
//!
//! ## Turn flow
//!
//! - `GrantFreeOperation`, `SetEligibilityOverride`, `PushInterruptPhase`

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::{ActionId, PhaseId};
use crate::eval::{Condition, PlayerRef, Query, QueryFilter, ValueExpr, ZoneRef};

/// Which variable table a `setVar`/`addVar` writes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VarTarget {
    Global,
    Player(PlayerRef),
    Zone(ZoneRef),
}

/// Where a moved token is inserted in its destination.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InsertPosition {
    #[default]
    Top,
    Bottom,
    /// Uniform over every slot; consumes one PRNG draw.
    Random,
}

/// One group of a `removeByPriority`: tokens from `over` go to `to`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriorityGroup {
    pub over: Query,
    pub to: ZoneRef,
}

/// Sequencing of a granted free operation within a batch.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GrantSequence {
    pub batch: String,
    pub index: u32,
}

fn default_uses() -> u32 {
    1
}

/// An effect node.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EffectAst {
    // === Variables ===
    SetVar {
        target: VarTarget,
        var: String,
        value: ValueExpr,
    },

    AddVar {
        target: VarTarget,
        var: String,
        delta: ValueExpr,
    },

    // === Tokens ===
    /// Move the bound token, which must currently be in `from`.
    MoveToken {
        token: String,
        from: ZoneRef,
        to: ZoneRef,
        #[serde(default)]
        position: InsertPosition,
    },

    /// Move every token (or every token passing `filter`), keeping order.
    MoveAll {
        from: ZoneRef,
        to: ZoneRef,
        #[serde(default)]
        filter: Option<QueryFilter>,
    },

    /// As `MoveToken`, but `to` must be adjacent to `from`.
    MoveTokenAdjacent {
        token: String,
        from: ZoneRef,
        to: ZoneRef,
        #[serde(default)]
        position: InsertPosition,
    },

    /// Move up to `count` tokens one at a time from the front of `from` to
    /// the front of `to`.
    Draw {
        from: ZoneRef,
        to: ZoneRef,
        count: ValueExpr,
    },

    Shuffle {
        zone: ZoneRef,
    },

    /// Prepend a new token; `props` override the type's defaults.
    CreateToken {
        token_type: String,
        zone: ZoneRef,
        #[serde(default)]
        props: BTreeMap<String, ValueExpr>,
    },

    DestroyToken {
        token: String,
    },

    SetTokenProp {
        token: String,
        prop: String,
        value: ValueExpr,
    },

    SetMarker {
        space: ZoneRef,
        marker: String,
        state: ValueExpr,
    },

    // === Control ===
    If {
        when: Condition,
        then: Vec<EffectAst>,
        #[serde(default)]
        otherwise: Vec<EffectAst>,
    },

    /// Run `effects` once per item (at most `limit`, default 100).
    ForEach {
        bind: String,
        over: Query,
        effects: Vec<EffectAst>,
        #[serde(default)]
        limit: Option<ValueExpr>,
    },

    Let {
        bind: String,
        value: ValueExpr,
        effects: Vec<EffectAst>,
    },

    /// Fold `over` into `result`, then run `effects` with it bound.
    Reduce {
        over: Query,
        item: String,
        acc: String,
        initial: ValueExpr,
        next: ValueExpr,
        result: String,
        effects: Vec<EffectAst>,
    },

    /// Draw an integer in `min..=max` and run `effects` with it bound.
    RollRandom {
        bind: String,
        min: ValueExpr,
        max: ValueExpr,
        effects: Vec<EffectAst>,
    },

    /// Move up to `budget` tokens out of the groups, first group first.
    RemoveByPriority {
        budget: ValueExpr,
        groups: Vec<PriorityGroup>,
        #[serde(default)]
        count_bind: Option<String>,
        #[serde(default)]
        effects: Vec<EffectAst>,
    },

    // === Decisions ===
    ChooseOne {
        bind: String,
        options: Query,
    },

    /// Exactly `n`, or between `min` (default 0) and `max` (default the
    /// domain size) distinct options.
    ChooseN {
        bind: String,
        options: Query,
        #[serde(default)]
        n: Option<ValueExpr>,
        #[serde(default)]
        min: Option<ValueExpr>,
        #[serde(default)]
        max: Option<ValueExpr>,
    },

    // === Turn flow ===
    GrantFreeOperation {
        seat: PlayerRef,
        #[serde(default)]
        operation_class: Option<String>,
        #[serde(default)]
        action_ids: Vec<ActionId>,
        #[serde(default)]
        zone_filter: Option<Condition>,
        #[serde(default = "default_uses")]
        uses: u32,
        #[serde(default)]
        sequence: Option<GrantSequence>,
    },

    SetEligibilityOverride {
        seat: PlayerRef,
        eligible: bool,
    },

    /// Suspend the current phase and enter an interrupt phase.
    PushInterruptPhase {
        phase: PhaseId,
    },
}

impl EffectAst {
    /// Variant name used in effect paths.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SetVar { .. } => "setVar",
            Self::AddVar { .. } => "addVar",
            Self::MoveToken { .. } => "moveToken",
            Self::MoveAll { .. } => "moveAll",
            Self::MoveTokenAdjacent { .. } => "moveTokenAdjacent",
            Self::Draw { .. } => "draw",
            Self::Shuffle { .. } => "shuffle",
            Self::CreateToken { .. } => "createToken",
            Self::DestroyToken { .. } => "destroyToken",
            Self::SetTokenProp { .. } => "setTokenProp",
            Self::SetMarker { .. } => "setMarker",
            Self::If { .. } => "if",
            Self::ForEach { .. } => "forEach",
            Self::Let { .. } => "let",
            Self::Reduce { .. } => "reduce",
            Self::RollRandom { .. } => "rollRandom",
            Self::RemoveByPriority { .. } => "removeByPriority",
            Self::ChooseOne { .. } => "chooseOne",
            Self::ChooseN { .. } => "chooseN",
            Self::GrantFreeOperation { .. } => "grantFreeOperation",
            Self::SetEligibilityOverride { .. } => "setEligibilityOverride",
            Self::PushInterruptPhase { .. } => "pushInterruptPhase",
        }
    }

    // === Constructors ===

    pub fn add_global(var: impl Into<String>, delta: i64) -> Self {
        Self::AddVar {
            target: VarTarget::Global,
            var: var.into(),
            delta: ValueExpr::Int(delta),
        }
    }

    pub fn set_global(var: impl Into<String>, value: ValueExpr) -> Self {
        Self::SetVar {
            target: VarTarget::Global,
            var: var.into(),
            value,
        }
    }

    pub fn add_player(player: PlayerRef, var: impl Into<String>, delta: ValueExpr) -> Self {
        Self::AddVar {
            target: VarTarget::Player(player),
            var: var.into(),
            delta,
        }
    }

    pub fn draw(from: ZoneRef, to: ZoneRef, count: i64) -> Self {
        Self::Draw {
            from,
            to,
            count: ValueExpr::Int(count),
        }
    }

    pub fn move_token(token: impl Into<String>, from: ZoneRef, to: ZoneRef) -> Self {
        Self::MoveToken {
            token: token.into(),
            from,
            to,
            position: InsertPosition::Top,
        }
    }

    pub fn create(token_type: impl Into<String>, zone: ZoneRef) -> Self {
        Self::CreateToken {
            token_type: token_type.into(),
            zone,
            props: BTreeMap::new(),
        }
    }

    pub fn choose_one(bind: impl Into<String>, options: Query) -> Self {
        Self::ChooseOne {
            bind: bind.into(),
            options,
        }
    }

    pub fn choose_n(bind: impl Into<String>, options: Query, min: i64, max: i64) -> Self {
        Self::ChooseN {
            bind: bind.into(),
            options,
            n: None,
            min: Some(ValueExpr::Int(min)),
            max: Some(ValueExpr::Int(max)),
        }
    }

    pub fn for_each(bind: impl Into<String>, over: Query, effects: Vec<EffectAst>) -> Self {
        Self::ForEach {
            bind: bind.into(),
            over,
            effects,
            limit: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effect_json_shape() {
        let json = r#"{"addVar": {"target": "global", "var": "score", "delta": {"int": 15}}}"#;
        let effect: EffectAst = serde_json::from_str(json).unwrap();
        assert_eq!(effect, EffectAst::add_global("score", 15));
        assert_eq!(effect.kind(), "addVar");
    }

    #[test]
    fn test_defaults() {
        let json = r#"{"grantFreeOperation": {"seat": "active"}}"#;
        let effect: EffectAst = serde_json::from_str(json).unwrap();
        match effect {
            EffectAst::GrantFreeOperation { uses, sequence, .. } => {
                assert_eq!(uses, 1);
                assert!(sequence.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
