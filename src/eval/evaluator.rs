//! Tree-walking evaluation of values, conditions and queries.
//!
//! Everything here is pure and re-entrant: dispatch and legality checks call
//! it speculatively without committing anything. There is no operation
//! budget at this level; query sizes are bounded by `MAX_INT_RANGE` and by
//! the state itself.

use rustc_hash::FxHashSet;

use super::expr::{
    AggregateOp, ArithOp, CompareOp, Condition, PlayerRef, Query, QueryFilter, Reference,
    ValueExpr, ZoneRef,
};
use super::EvalContext;
use crate::core::{
    DefinitionKind, EffectRuntimeReason, KernelError, PlayerId, Result, Scalar, TokenId, Value,
    ZoneId,
};

/// Largest `intRange` a query may produce.
pub const MAX_INT_RANGE: i64 = 10_000;

// === Values ===

/// Evaluate a value expression.
pub fn eval_value(expr: &ValueExpr, ctx: &EvalContext<'_>) -> Result<Value> {
    match expr {
        ValueExpr::Int(i) => Ok(Value::int(*i)),
        ValueExpr::Bool(b) => Ok(Value::bool(*b)),
        ValueExpr::Str(s) => Ok(Value::str(s.clone())),
        ValueExpr::Ref(reference) => eval_reference(reference, ctx),
        ValueExpr::Arith { op, left, right } => {
            let l = eval_int(left, ctx)?;
            let r = eval_int(right, ctx)?;
            arith(*op, l, r).map(Value::int)
        }
        ValueExpr::Aggregate {
            op,
            query,
            bind,
            value,
        } => {
            let items = eval_query(query, ctx)?;
            if *op == AggregateOp::Count {
                return Ok(Value::int(items.len() as i64));
            }
            let mut acc: Option<i64> = None;
            for item in items {
                let inner = ctx.bindings.with(bind.clone(), item.clone());
                let inner_ctx = ctx.with_bindings(&inner);
                let n = match value {
                    Some(expr) => eval_int(expr, &inner_ctx)?,
                    None => item
                        .as_int()
                        .ok_or_else(|| KernelError::type_mismatch("int", item.type_name(), "aggregate item"))?,
                };
                acc = Some(match (op, acc) {
                    (_, None) => n,
                    (AggregateOp::Sum, Some(a)) => arith(ArithOp::Add, a, n)?,
                    (AggregateOp::Min, Some(a)) => a.min(n),
                    (AggregateOp::Max, Some(a)) => a.max(n),
                    (AggregateOp::Count, Some(a)) => a,
                });
            }
            Ok(Value::int(acc.unwrap_or(0)))
        }
        ValueExpr::IfThenElse {
            when,
            then,
            otherwise,
        } => {
            if eval_condition(when, ctx)? {
                eval_value(then, ctx)
            } else {
                eval_value(otherwise, ctx)
            }
        }
    }
}

/// Evaluate an integer-typed expression.
pub fn eval_int(expr: &ValueExpr, ctx: &EvalContext<'_>) -> Result<i64> {
    let value = eval_value(expr, ctx)?;
    value
        .as_int()
        .ok_or_else(|| KernelError::type_mismatch("int", value.type_name(), format!("{expr:?}")))
}

fn arith(op: ArithOp, l: i64, r: i64) -> Result<i64> {
    let overflow = || KernelError::Arithmetic {
        message: format!("overflow in {op:?}({l}, {r})"),
    };
    match op {
        ArithOp::Add => l.checked_add(r).ok_or_else(overflow),
        ArithOp::Sub => l.checked_sub(r).ok_or_else(overflow),
        ArithOp::Mul => l.checked_mul(r).ok_or_else(overflow),
        ArithOp::Div => {
            if r == 0 {
                Err(KernelError::Arithmetic {
                    message: format!("division by zero ({l} / 0)"),
                })
            } else {
                l.checked_div(r).ok_or_else(overflow)
            }
        }
        ArithOp::Min => Ok(l.min(r)),
        ArithOp::Max => Ok(l.max(r)),
    }
}

fn eval_reference(reference: &Reference, ctx: &EvalContext<'_>) -> Result<Value> {
    let state = ctx.state;
    match reference {
        Reference::Binding(name) => lookup_binding(name, ctx).cloned(),
        Reference::GlobalVar(name) => match state.global_var(name) {
            Some(v) => Ok(Value::int(v)),
            None => Err(KernelError::missing(DefinitionKind::GlobalVar, name)),
        },
        Reference::PlayerVar { player, var } => {
            let player = resolve_player(player, ctx)?;
            state
                .player_var(player, var)
                .map(Value::int)
                .ok_or_else(|| KernelError::missing(DefinitionKind::PlayerVar, var))
        }
        Reference::ZoneVar { zone, var } => {
            let zone = resolve_zone(zone, ctx)?;
            state
                .zone_var(&zone, var)
                .map(Value::int)
                .ok_or_else(|| KernelError::missing(DefinitionKind::ZoneVar, format!("{zone}.{var}")))
        }
        Reference::TokenProp { token, prop } => {
            let id = resolve_token(token, ctx)?;
            let token = state.zones.token(&id).ok_or_else(|| {
                KernelError::effect(
                    EffectRuntimeReason::TokenNotFound,
                    "eval",
                    format!("token `{id}` is not in any zone"),
                )
            })?;
            token
                .props
                .get(prop)
                .map(|s| Value::Scalar(s.clone()))
                .ok_or_else(|| {
                    KernelError::missing(DefinitionKind::TokenProp, format!("{}.{prop}", token.token_type))
                })
        }
        Reference::Constant(name) => ctx.def.constant(name).map(Value::int),
        Reference::ActivePlayer => Ok(Value::int(ctx.active().index() as i64)),
        Reference::Actor => Ok(Value::int(ctx.actor.index() as i64)),
        Reference::TurnCount => Ok(Value::int(i64::from(state.turn_count))),
        Reference::CurrentPhase => Ok(Value::str(state.current_phase.as_str())),
        Reference::ZoneTokenCount(zone) => {
            let zone = resolve_zone(zone, ctx)?;
            Ok(Value::int(state.zones.zone_size(&zone) as i64))
        }
        Reference::Marker { space, marker } => {
            let space = resolve_zone(space, ctx)?;
            state.marker(ctx.def, &space, marker).map(Value::str)
        }
        Reference::TableLookup { table, key, field } => {
            let key = eval_value(key, ctx)?;
            let key = key
                .identity()
                .ok_or_else(|| KernelError::type_mismatch("scalar", key.type_name(), "table key"))?;
            let row = ctx.runtime.tables.row(ctx.def, table, &key)?;
            row.get(field)
                .map(|s| Value::Scalar(s.clone()))
                .ok_or_else(|| KernelError::missing(DefinitionKind::TableRow, format!("{table}[{key}].{field}")))
        }
    }
}

fn lookup_binding<'c>(name: &str, ctx: &'c EvalContext<'_>) -> Result<&'c Value> {
    ctx.bindings
        .get(name)
        .ok_or_else(|| KernelError::UnboundBinding {
            name: name.to_string(),
        })
}

// === Resolution helpers ===

/// Resolve a seat reference.
pub fn resolve_player(player: &PlayerRef, ctx: &EvalContext<'_>) -> Result<PlayerId> {
    match player {
        PlayerRef::Active => Ok(ctx.active()),
        PlayerRef::Actor => Ok(ctx.actor),
        PlayerRef::Id(id) => {
            if id.index() < ctx.state.player_count() {
                Ok(*id)
            } else {
                Err(KernelError::missing(DefinitionKind::Player, id))
            }
        }
        PlayerRef::Binding(name) => {
            let value = lookup_binding(name, ctx)?;
            player_from_value(value, ctx.state.player_count(), name)
        }
    }
}

/// Interpret a value as a seat index.
pub fn player_from_value(value: &Value, player_count: usize, context: &str) -> Result<PlayerId> {
    let index = value
        .as_int()
        .ok_or_else(|| KernelError::type_mismatch("int", value.type_name(), context.to_string()))?;
    PlayerId::from_index(index, player_count)
        .ok_or_else(|| KernelError::missing(DefinitionKind::Player, index))
}

/// Resolve a zone reference to a declared zone.
pub fn resolve_zone(zone: &ZoneRef, ctx: &EvalContext<'_>) -> Result<ZoneId> {
    let id = match zone {
        ZoneRef::Id(id) => id.clone(),
        ZoneRef::Binding(name) => {
            let value = lookup_binding(name, ctx)?;
            let id = value
                .as_str()
                .ok_or_else(|| KernelError::type_mismatch("zone id", value.type_name(), name.clone()))?;
            ZoneId::new(id)
        }
        ZoneRef::Owned { base, owner } => {
            let owner = resolve_player(owner, ctx)?;
            ZoneId::owned(base, Some(owner))
        }
    };
    if ctx.state.zones.contains_zone(&id) {
        Ok(id)
    } else {
        Err(KernelError::missing(DefinitionKind::Zone, id))
    }
}

/// Resolve a binding holding a token (or token id string).
pub fn resolve_token(name: &str, ctx: &EvalContext<'_>) -> Result<TokenId> {
    let value = lookup_binding(name, ctx)?;
    match value {
        Value::Token(id) => Ok(id.clone()),
        Value::Scalar(Scalar::Str(s)) => Ok(TokenId::new(s.clone())),
        other => Err(KernelError::type_mismatch("token", other.type_name(), name.to_string())),
    }
}

// === Conditions ===

/// Identity equality: token references equal their id strings.
#[must_use]
pub fn same_identity(a: &Value, b: &Value) -> bool {
    match (a.identity(), b.identity()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Evaluate a condition.
pub fn eval_condition(cond: &Condition, ctx: &EvalContext<'_>) -> Result<bool> {
    match cond {
        Condition::Const(b) => Ok(*b),
        Condition::And(parts) => {
            for part in parts {
                if !eval_condition(part, ctx)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Condition::Or(parts) => {
            for part in parts {
                if eval_condition(part, ctx)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Condition::Not(inner) => Ok(!eval_condition(inner, ctx)?),
        Condition::Compare { op, left, right } => {
            let l = eval_value(left, ctx)?;
            let r = eval_value(right, ctx)?;
            compare(*op, &l, &r)
        }
        Condition::In { item, set } => {
            let item = eval_value(item, ctx)?;
            let set = eval_query(set, ctx)?;
            Ok(set.iter().any(|v| same_identity(v, &item)))
        }
        Condition::Adjacent { from, to } => {
            let from = resolve_zone(from, ctx)?;
            let to = resolve_zone(to, ctx)?;
            Ok(ctx.runtime.adjacency.is_adjacent(&from, &to))
        }
        Condition::TokenInZone { token, zone } => {
            let id = resolve_token(token, ctx)?;
            let zone = resolve_zone(zone, ctx)?;
            Ok(ctx
                .state
                .zones
                .tokens(&zone)
                .is_some_and(|tokens| tokens.iter().any(|t| t.id == id)))
        }
        Condition::Truthy(expr) => {
            let value = eval_value(expr, ctx)?;
            match value {
                Value::Scalar(Scalar::Bool(b)) => Ok(b),
                Value::Scalar(Scalar::Int(i)) => Ok(i != 0),
                other => Err(KernelError::type_mismatch("bool", other.type_name(), "truthy")),
            }
        }
    }
}

fn compare(op: CompareOp, l: &Value, r: &Value) -> Result<bool> {
    let ints = || -> Result<(i64, i64)> {
        let a = l
            .as_int()
            .ok_or_else(|| KernelError::type_mismatch("int", l.type_name(), format!("{op:?}")))?;
        let b = r
            .as_int()
            .ok_or_else(|| KernelError::type_mismatch("int", r.type_name(), format!("{op:?}")))?;
        Ok((a, b))
    };
    Ok(match op {
        CompareOp::Eq => same_identity(l, r),
        CompareOp::Ne => !same_identity(l, r),
        CompareOp::Lt => {
            let (a, b) = ints()?;
            a < b
        }
        CompareOp::Le => {
            let (a, b) = ints()?;
            a <= b
        }
        CompareOp::Gt => {
            let (a, b) = ints()?;
            a > b
        }
        CompareOp::Ge => {
            let (a, b) = ints()?;
            a >= b
        }
    })
}

// === Queries ===

/// Evaluate a query: an ordered sequence deduplicated by identity.
pub fn eval_query(query: &Query, ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    let mut raw = Vec::new();
    collect_query(query, ctx, &mut raw)?;

    let mut seen = FxHashSet::default();
    let mut out = Vec::with_capacity(raw.len());
    for value in raw {
        match value.identity() {
            Some(key) => {
                if seen.insert(key) {
                    out.push(value);
                }
            }
            None => out.push(value),
        }
    }
    Ok(out)
}

fn passes(filter: &Option<QueryFilter>, item: &Value, ctx: &EvalContext<'_>) -> Result<bool> {
    match filter {
        None => Ok(true),
        Some(filter) => {
            let inner = ctx.bindings.with(filter.bind.clone(), item.clone());
            eval_condition(&filter.condition, &ctx.with_bindings(&inner))
        }
    }
}

fn collect_query(query: &Query, ctx: &EvalContext<'_>, out: &mut Vec<Value>) -> Result<()> {
    match query {
        Query::TokensInZone { zone, filter } => {
            let zone = resolve_zone(zone, ctx)?;
            if let Some(tokens) = ctx.state.zones.tokens(&zone) {
                for token in tokens {
                    let item = token.as_value();
                    if passes(filter, &item, ctx)? {
                        out.push(item);
                    }
                }
            }
        }
        Query::Zones { category, filter } => {
            for zone in &ctx.def.zones {
                if let Some(category) = category {
                    if zone.category.as_ref() != Some(category) {
                        continue;
                    }
                }
                let item = Value::str(zone.id.as_str());
                if passes(filter, &item, ctx)? {
                    out.push(item);
                }
            }
        }
        Query::AdjacentZones { zone, filter } => {
            let zone = resolve_zone(zone, ctx)?;
            for neighbour in ctx.runtime.adjacency.neighbours(&zone) {
                let item = Value::str(neighbour.as_str());
                if passes(filter, &item, ctx)? {
                    out.push(item);
                }
            }
        }
        Query::IntRange { min, max } => {
            let min = eval_int(min, ctx)?;
            let max = eval_int(max, ctx)?;
            if min <= max {
                let size = max.saturating_sub(min).saturating_add(1);
                if size > MAX_INT_RANGE {
                    return Err(KernelError::Arithmetic {
                        message: format!("intRange {min}..={max} exceeds {MAX_INT_RANGE} items"),
                    });
                }
                out.extend((min..=max).map(Value::int));
            }
        }
        Query::Enums(values) => out.extend(values.iter().map(|v| Value::str(v.clone()))),
        Query::Players => {
            out.extend(PlayerId::all(ctx.state.player_count()).map(|p| Value::int(p.index() as i64)));
        }
        Query::Binding(name) => match lookup_binding(name, ctx)? {
            Value::Array(items) => out.extend(items.iter().cloned().map(Value::Scalar)),
            other => out.push(other.clone()),
        },
        Query::TableColumn { table, field } => {
            let table_def = ctx
                .def
                .tables
                .iter()
                .find(|t| &t.id == table)
                .ok_or_else(|| KernelError::missing(DefinitionKind::Table, table))?;
            out.extend(
                table_def
                    .rows
                    .iter()
                    .filter_map(|row| row.get(field))
                    .cloned()
                    .map(Value::Scalar),
            );
        }
        Query::Concat(parts) => {
            for part in parts {
                collect_query(part, ctx, out)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::GameState;
    use crate::def::{DefRuntime, GameDef, VarDef, ZoneDef};
    use crate::eval::Bindings;
    use crate::zones::{Token, ZonePosition};

    fn fixture() -> (GameDef, DefRuntime, GameState) {
        let mut def = GameDef::minimal("eval");
        def.constants.insert("limit".to_string(), 4);
        def.global_vars = vec![VarDef::int("score", 2, 0, 10)];
        def.per_player_vars = vec![VarDef::int("gold", 5, 0, 99)];
        def.zones = vec![
            ZoneDef::new("a:none").with_adjacent(&["b:none"]).with_category("province"),
            ZoneDef::new("b:none").with_category("province"),
            ZoneDef::new("c:none"),
        ];
        let runtime = DefRuntime::new(&def);
        let mut state = GameState::new(&def, 2, 0).unwrap();
        let a = ZoneId::new("a:none");
        for (id, strength) in [("t#0", 3), ("t#1", 1), ("t#2", 5)] {
            let mut token = Token {
                id: TokenId::new(id),
                token_type: "troop".to_string(),
                props: Default::default(),
            };
            token.props.insert("strength".to_string(), Scalar::Int(strength));
            state.zones.insert(&a, token, ZonePosition::Back);
        }
        (def, runtime, state)
    }

    #[test]
    fn test_refs_and_arith() {
        let (def, runtime, state) = fixture();
        let bindings = Bindings::new();
        let ctx = EvalContext::new(&def, &runtime, &state, &bindings, PlayerId::new(0));

        let expr = ValueExpr::arith(
            ArithOp::Add,
            ValueExpr::global("score"),
            ValueExpr::Ref(Reference::Constant("limit".to_string())),
        );
        assert_eq!(eval_int(&expr, &ctx).unwrap(), 6);

        let gold = ValueExpr::player_var(PlayerRef::Active, "gold");
        assert_eq!(eval_int(&gold, &ctx).unwrap(), 5);

        let div = ValueExpr::arith(ArithOp::Div, ValueExpr::Int(1), ValueExpr::Int(0));
        assert_eq!(eval_value(&div, &ctx).unwrap_err().code(), "ARITHMETIC");
    }

    #[test]
    fn test_aggregate_with_binder() {
        let (def, runtime, state) = fixture();
        let bindings = Bindings::new();
        let ctx = EvalContext::new(&def, &runtime, &state, &bindings, PlayerId::new(0));

        let sum = ValueExpr::Aggregate {
            op: AggregateOp::Sum,
            query: Box::new(Query::tokens(ZoneRef::id("a:none"))),
            bind: "$t".to_string(),
            value: Some(Box::new(ValueExpr::Ref(Reference::TokenProp {
                token: "$t".to_string(),
                prop: "strength".to_string(),
            }))),
        };
        assert_eq!(eval_int(&sum, &ctx).unwrap(), 9);

        let count = ValueExpr::count(Query::tokens(ZoneRef::id("c:none")));
        assert_eq!(eval_int(&count, &ctx).unwrap(), 0);
    }

    #[test]
    fn test_filtered_query_keeps_order() {
        let (def, runtime, state) = fixture();
        let bindings = Bindings::new();
        let ctx = EvalContext::new(&def, &runtime, &state, &bindings, PlayerId::new(0));

        let strong = Query::TokensInZone {
            zone: ZoneRef::id("a:none"),
            filter: Some(QueryFilter::new(
                "$t",
                Condition::ge(
                    ValueExpr::Ref(Reference::TokenProp {
                        token: "$t".to_string(),
                        prop: "strength".to_string(),
                    }),
                    ValueExpr::Int(3),
                ),
            )),
        };
        let ids: Vec<String> = eval_query(&strong, &ctx)
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(ids, vec!["t#0", "t#2"]);
    }

    #[test]
    fn test_query_dedup_and_zones() {
        let (def, runtime, state) = fixture();
        let bindings = Bindings::new();
        let ctx = EvalContext::new(&def, &runtime, &state, &bindings, PlayerId::new(0));

        let query = Query::Concat(vec![
            Query::Enums(vec!["x".to_string(), "y".to_string()]),
            Query::Enums(vec!["y".to_string(), "z".to_string()]),
        ]);
        assert_eq!(eval_query(&query, &ctx).unwrap().len(), 3);

        let provinces = Query::Zones {
            category: Some("province".to_string()),
            filter: None,
        };
        assert_eq!(
            eval_query(&provinces, &ctx).unwrap(),
            vec![Value::str("a:none"), Value::str("b:none")]
        );

        let adjacent = Condition::Adjacent {
            from: ZoneRef::id("b:none"),
            to: ZoneRef::id("a:none"),
        };
        assert!(eval_condition(&adjacent, &ctx).unwrap());
    }

    #[test]
    fn test_token_identity_membership() {
        let (def, runtime, state) = fixture();
        let mut bindings = Bindings::new();
        bindings.push("$pick", Value::str("t#1"));
        let ctx = EvalContext::new(&def, &runtime, &state, &bindings, PlayerId::new(0));

        let member = Condition::In {
            item: ValueExpr::binding("$pick"),
            set: Query::tokens(ZoneRef::id("a:none")),
        };
        assert!(eval_condition(&member, &ctx).unwrap());
    }

    #[test]
    fn test_errors() {
        let (def, runtime, state) = fixture();
        let bindings = Bindings::new();
        let ctx = EvalContext::new(&def, &runtime, &state, &bindings, PlayerId::new(0));

        let unbound = eval_value(&ValueExpr::binding("$nope"), &ctx).unwrap_err();
        assert_eq!(unbound.code(), "UNBOUND_BINDING");

        let missing = eval_value(&ValueExpr::global("nope"), &ctx).unwrap_err();
        assert_eq!(missing.code(), "MISSING_DEFINITION");

        let mismatch = Condition::compare(CompareOp::Lt, ValueExpr::Str("a".into()), ValueExpr::Int(1));
        assert_eq!(eval_condition(&mismatch, &ctx).unwrap_err().code(), "TYPE_MISMATCH");

        let huge = Query::int_range(0, MAX_INT_RANGE * 2);
        assert!(eval_query(&huge, &ctx).is_err());
        assert!(eval_query(&Query::int_range(3, 1), &ctx).unwrap().is_empty());
    }
}
