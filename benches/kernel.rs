use criterion::{black_box, criterion_group, criterion_main, Criterion};

use rules_kernel::core::{compute_state_hash, Move};
use rules_kernel::def::{ActionDef, GameDef, TokenTypeDef, UsageScope, VarDef, ZoneDef};
use rules_kernel::effects::EffectAst;
use rules_kernel::eval::{Query, ZoneRef};
use rules_kernel::rules::{Kernel, LegalMoveOptions, RulesEngine};

/// A board of 40 tokens and a handful of choice-heavy actions.
fn bench_def() -> GameDef {
    let mut def = GameDef::minimal("bench");
    def.global_vars.push(VarDef::int("tally", 0, 0, 1000));
    def.zones.push(ZoneDef::new("board:none"));
    def.zones.push(ZoneDef::new("reserve:none"));
    def.token_types.push(TokenTypeDef::new("unit").with_prop("rank", 1));
    def.setup = (0..40)
        .map(|_| EffectAst::create("unit", ZoneRef::id("board:none")))
        .collect();

    def.actions.push(ActionDef::new("pass").with_limit(UsageScope::Turn, 1));
    def.actions.push(ActionDef::new("shift").with_effects(vec![
        EffectAst::choose_one("$u", Query::tokens(ZoneRef::id("board:none"))),
        EffectAst::move_token("$u", ZoneRef::id("board:none"), ZoneRef::id("reserve:none")),
    ]));
    def.actions.push(ActionDef::new("pair").with_effects(vec![EffectAst::choose_n(
        "$n",
        Query::int_range(1, 8),
        2,
        2,
    )]));
    def.actions.push(ActionDef::new("tick").with_effects(vec![EffectAst::for_each(
        "$i",
        Query::int_range(1, 20),
        vec![EffectAst::add_global("tally", 1)],
    )]));
    def
}

fn bench_state_clone(c: &mut Criterion) {
    let kernel = Kernel::new(bench_def());
    let state = kernel.initial_state(2, 0).unwrap();
    c.bench_function("state_clone", |b| b.iter(|| black_box(&state).clone()));
}

fn bench_state_hash(c: &mut Criterion) {
    let kernel = Kernel::new(bench_def());
    let state = kernel.initial_state(2, 0).unwrap();
    c.bench_function("state_hash", |b| b.iter(|| compute_state_hash(black_box(&state))));
}

fn bench_legal_moves(c: &mut Criterion) {
    let kernel = Kernel::new(bench_def());
    let state = kernel.initial_state(2, 0).unwrap();
    c.bench_function("legal_moves_initial", |b| {
        b.iter(|| kernel.legal_moves(black_box(&state)).unwrap())
    });

    let capped = LegalMoveOptions::default().with_max_moves(10);
    c.bench_function("legal_moves_capped_10", |b| {
        b.iter(|| kernel.legal_moves_with(black_box(&state), &capped).unwrap())
    });
}

fn bench_apply_move(c: &mut Criterion) {
    let kernel = Kernel::new(bench_def());
    let state = kernel.initial_state(2, 0).unwrap();
    let tick = Move::new("tick");
    c.bench_function("apply_move_for_each_20", |b| {
        b.iter(|| kernel.apply_move(black_box(&state), black_box(&tick)).unwrap())
    });

    let shift = kernel
        .legal_moves(&state)
        .unwrap()
        .into_iter()
        .find(|m| m.action_id.as_str() == "shift")
        .unwrap();
    c.bench_function("apply_move_choose_one", |b| {
        b.iter(|| kernel.apply_move(black_box(&state), black_box(&shift)).unwrap())
    });
}

criterion_group!(
    benches,
    bench_state_clone,
    bench_state_hash,
    bench_legal_moves,
    bench_apply_move
);
criterion_main!(benches);
