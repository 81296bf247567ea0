//! Value, condition and query expression trees.
//!
//! All three are closed enums: adding a variant is a compile error at every
//! evaluation site. Trees are plain data produced by the definition compiler
//! and deserialized with serde (externally tagged, camelCase variant names).

use serde::{Deserialize, Serialize};

use crate::core::{PlayerId, ZoneId};

/// A reference to a single seat.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlayerRef {
    /// The seat whose turn it is.
    Active,
    /// The seat executing the current action.
    Actor,
    /// A fixed seat.
    Id(PlayerId),
    /// A binding holding a seat index.
    Binding(String),
}

/// A reference to a zone.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ZoneRef {
    /// A fixed zone id.
    Id(ZoneId),
    /// A binding holding a zone id string.
    Binding(String),
    /// The per-seat zone with the given base name (`hand` + seat).
    Owned { base: String, owner: PlayerRef },
}

impl ZoneRef {
    /// Shorthand for a fixed zone id.
    pub fn id(zone: impl Into<String>) -> Self {
        Self::Id(ZoneId::new(zone))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AggregateOp {
    Count,
    Sum,
    Min,
    Max,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
}

/// A leaf reference into state, definition or bindings.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Reference {
    Binding(String),
    GlobalVar(String),
    PlayerVar { player: PlayerRef, var: String },
    ZoneVar { zone: ZoneRef, var: String },
    /// A prop of the token held by the named binding.
    TokenProp { token: String, prop: String },
    Constant(String),
    ActivePlayer,
    Actor,
    TurnCount,
    CurrentPhase,
    ZoneTokenCount(ZoneRef),
    Marker { space: ZoneRef, marker: String },
    TableLookup {
        table: String,
        key: Box<ValueExpr>,
        field: String,
    },
}

/// An expression producing a `Value`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueExpr {
    Int(i64),
    Bool(bool),
    Str(String),
    Ref(Reference),
    Arith {
        op: ArithOp,
        left: Box<ValueExpr>,
        right: Box<ValueExpr>,
    },
    /// Fold a query; `value` is evaluated per item with `bind` in scope
    /// (ignored for `count`, defaults to the item itself otherwise).
    Aggregate {
        op: AggregateOp,
        query: Box<Query>,
        bind: String,
        #[serde(default)]
        value: Option<Box<ValueExpr>>,
    },
    IfThenElse {
        when: Box<Condition>,
        then: Box<ValueExpr>,
        otherwise: Box<ValueExpr>,
    },
}

impl ValueExpr {
    pub fn binding(name: impl Into<String>) -> Self {
        Self::Ref(Reference::Binding(name.into()))
    }

    pub fn global(var: impl Into<String>) -> Self {
        Self::Ref(Reference::GlobalVar(var.into()))
    }

    pub fn player_var(player: PlayerRef, var: impl Into<String>) -> Self {
        Self::Ref(Reference::PlayerVar {
            player,
            var: var.into(),
        })
    }

    pub fn zone_count(zone: ZoneRef) -> Self {
        Self::Ref(Reference::ZoneTokenCount(zone))
    }

    pub fn arith(op: ArithOp, left: ValueExpr, right: ValueExpr) -> Self {
        Self::Arith {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn count(query: Query) -> Self {
        Self::Aggregate {
            op: AggregateOp::Count,
            query: Box::new(query),
            bind: "$item".to_string(),
            value: None,
        }
    }
}

/// A per-item filter: `condition` is evaluated with `bind` bound to the item.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryFilter {
    pub bind: String,
    pub condition: Box<Condition>,
}

impl QueryFilter {
    pub fn new(bind: impl Into<String>, condition: Condition) -> Self {
        Self {
            bind: bind.into(),
            condition: Box::new(condition),
        }
    }
}

/// A boolean expression.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Condition {
    Const(bool),
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
    Compare {
        op: CompareOp,
        left: ValueExpr,
        right: ValueExpr,
    },
    /// Item (by identity) is a member of the query result.
    In { item: ValueExpr, set: Query },
    Adjacent { from: ZoneRef, to: ZoneRef },
    TokenInZone { token: String, zone: ZoneRef },
    /// A boolean-valued expression.
    Truthy(ValueExpr),
}

impl Condition {
    pub fn compare(op: CompareOp, left: ValueExpr, right: ValueExpr) -> Self {
        Self::Compare { op, left, right }
    }

    pub fn eq(left: ValueExpr, right: ValueExpr) -> Self {
        Self::compare(CompareOp::Eq, left, right)
    }

    pub fn ge(left: ValueExpr, right: ValueExpr) -> Self {
        Self::compare(CompareOp::Ge, left, right)
    }

    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }
}

/// A set-producing expression.
///
/// Results are ordered and deduplicated by identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Query {
    /// Tokens in a zone, front first.
    TokensInZone {
        zone: ZoneRef,
        #[serde(default)]
        filter: Option<QueryFilter>,
    },
    /// Declared zones in declaration order, optionally by category.
    Zones {
        #[serde(default)]
        category: Option<String>,
        #[serde(default)]
        filter: Option<QueryFilter>,
    },
    /// Zones adjacent to a zone, in id order.
    AdjacentZones {
        zone: ZoneRef,
        #[serde(default)]
        filter: Option<QueryFilter>,
    },
    /// Integers in `min..=max`.
    IntRange { min: ValueExpr, max: ValueExpr },
    /// Enum literals.
    Enums(Vec<String>),
    /// All seats.
    Players,
    /// An array binding (or a single scalar binding as a singleton).
    Binding(String),
    /// One column of a runtime data table, in row order.
    TableColumn { table: String, field: String },
    Concat(Vec<Query>),
}

impl Query {
    pub fn tokens(zone: ZoneRef) -> Self {
        Self::TokensInZone { zone, filter: None }
    }

    pub fn int_range(min: i64, max: i64) -> Self {
        Self::IntRange {
            min: ValueExpr::Int(min),
            max: ValueExpr::Int(max),
        }
    }
}
