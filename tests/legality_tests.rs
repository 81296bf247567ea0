//! Legality surface integration tests.
//!
//! `legal_moves`, `legal_choices_discover` and `apply_move` must agree on
//! every move: the same verdict, and the same reason when illegal.

use proptest::prelude::*;

use rules_kernel::actions::PlayerSelector;
use rules_kernel::core::{IllegalMoveReason, Move, MoveParam, PlayerId, Scalar, ZoneId};
use rules_kernel::def::{ActionDef, GameDef, TokenTypeDef, UsageScope, VarDef, ZoneDef};
use rules_kernel::effects::{ChoiceKind, EffectAst, VarTarget};
use rules_kernel::eval::{ArithOp, Condition, PlayerRef, Query, ValueExpr, ZoneRef};
use rules_kernel::rules::{
    apply_move, initial_state, legal_choices_discover, legal_moves, ApplyMoveOptions,
    ChoiceRequest, KernelOptions, LegalMoveOptions,
};
use rules_kernel::GameState;

fn actor_hand() -> ZoneRef {
    ZoneRef::Owned {
        base: "hand".to_string(),
        owner: PlayerRef::Actor,
    }
}

/// Two seats, a four-card deck, and four actions usable once per turn.
fn skirmish() -> GameDef {
    let mut def = GameDef::minimal("skirmish");
    def.global_vars.push(VarDef::int("pot", 0, 0, 50));
    def.per_player_vars.push(VarDef::int("gold", 3, 0, 20));
    def.zones.push(ZoneDef::new("deck:none"));
    def.zones.push(ZoneDef::new("hand:0"));
    def.zones.push(ZoneDef::new("hand:1"));
    def.token_types.push(TokenTypeDef::new("card"));
    def.setup = (0..4)
        .map(|_| EffectAst::create("card", ZoneRef::id("deck:none")))
        .collect();

    def.actions.push(ActionDef::new("pass").with_limit(UsageScope::Turn, 1));
    def.actions.push(
        ActionDef::new("bet")
            .with_param("$n", Query::int_range(1, 3))
            .with_pre(Condition::ge(
                ValueExpr::player_var(PlayerRef::Actor, "gold"),
                ValueExpr::binding("$n"),
            ))
            .with_cost(vec![EffectAst::add_player(
                PlayerRef::Actor,
                "gold",
                ValueExpr::arith(ArithOp::Sub, ValueExpr::Int(0), ValueExpr::binding("$n")),
            )])
            .with_effects(vec![EffectAst::AddVar {
                target: VarTarget::Global,
                var: "pot".to_string(),
                delta: ValueExpr::binding("$n"),
            }])
            .with_limit(UsageScope::Turn, 1),
    );
    def.actions.push(
        ActionDef::new("draw")
            .with_pre(Condition::ge(
                ValueExpr::zone_count(ZoneRef::id("deck:none")),
                ValueExpr::Int(1),
            ))
            .with_effects(vec![EffectAst::draw(ZoneRef::id("deck:none"), actor_hand(), 1)])
            .with_limit(UsageScope::Turn, 1),
    );
    def.actions.push(
        ActionDef::new("discard")
            .with_effects(vec![
                EffectAst::choose_n("$cards", Query::tokens(actor_hand()), 1, 2),
                EffectAst::for_each(
                    "$c",
                    Query::Binding("$cards".to_string()),
                    vec![EffectAst::move_token("$c", actor_hand(), ZoneRef::id("deck:none"))],
                ),
            ])
            .with_limit(UsageScope::Turn, 1),
    );
    def
}

/// Play the `picks`-th legal move (modulo the count) repeatedly.
fn play(def: &GameDef, seed: u64, picks: &[usize]) -> GameState {
    let mut state = initial_state(def, 2, seed).unwrap();
    for pick in picks {
        let moves = legal_moves(def, &state, &LegalMoveOptions::default()).unwrap();
        if moves.is_empty() {
            break;
        }
        let mv = &moves[pick % moves.len()];
        state = apply_move(def, &state, mv, &ApplyMoveOptions::default())
            .unwrap()
            .state;
    }
    state
}

fn assert_parity(def: &GameDef, state: &GameState, mv: &Move) {
    let discovered = legal_choices_discover(def, state, mv, &KernelOptions::default()).unwrap();
    let applied = apply_move(def, state, mv, &ApplyMoveOptions::default());
    let listed = legal_moves(def, state, &LegalMoveOptions::default())
        .unwrap()
        .contains(mv);

    match &discovered {
        ChoiceRequest::Complete => {
            assert!(applied.is_ok(), "discover says complete, apply says {applied:?} for {mv}");
            assert!(listed, "complete move {mv} missing from legal_moves");
        }
        ChoiceRequest::Pending { .. } => {
            let err = applied.unwrap_err();
            assert_eq!(err.illegal_reason(), Some(IllegalMoveReason::MoveHasIncompleteParams));
            assert!(!listed);
        }
        ChoiceRequest::Illegal { reason, .. } => {
            let err = applied.unwrap_err();
            assert_eq!(err.illegal_reason(), Some(*reason), "reasons differ for {mv}");
            assert!(!listed);
        }
    }
}

#[test]
fn test_every_listed_move_is_complete_and_applies() {
    let def = skirmish();
    let state = play(&def, 3, &[2, 0]);
    let moves = legal_moves(&def, &state, &LegalMoveOptions::default()).unwrap();
    assert!(!moves.is_empty());
    for mv in &moves {
        assert!(legal_choices_discover(&def, &state, mv, &KernelOptions::default())
            .unwrap()
            .is_complete());
        assert!(apply_move(&def, &state, mv, &ApplyMoveOptions::default()).is_ok());
    }
}

#[test]
fn test_initial_moves_in_canonical_order() {
    let def = skirmish();
    let state = initial_state(&def, 2, 0).unwrap();
    let rendered: Vec<String> = legal_moves(&def, &state, &LegalMoveOptions::default())
        .unwrap()
        .iter()
        .map(ToString::to_string)
        .collect();
    // The hand is empty, so there is nothing to discard.
    assert_eq!(rendered, vec!["pass", "bet($n=1)", "bet($n=2)", "bet($n=3)", "draw"]);
}

#[test]
fn test_discover_walks_a_wizard() {
    let def = skirmish();
    // Seat 0 draws, then passes its turn away once everything is spent.
    let state = play(&def, 0, &[4]);
    assert_eq!(state.zones.zone_size(&ZoneId::new("hand:0")), 1);

    let first = legal_choices_discover(&def, &state, &Move::new("discard"), &KernelOptions::default())
        .unwrap();
    let ChoiceRequest::Pending { decision, special_activity } = first else {
        panic!("expected a pending decision");
    };
    assert!(!special_activity);
    assert_eq!(decision.name, "$cards");
    assert_eq!(decision.kind, ChoiceKind::ChooseN);
    assert_eq!(decision.domain.len(), 1);

    let card = decision.domain[0].identity().unwrap();
    let done = Move::new("discard").with_array("$cards", vec![card]);
    assert!(legal_choices_discover(&def, &state, &done, &KernelOptions::default())
        .unwrap()
        .is_complete());
}

#[test]
fn test_illegal_reasons_agree() {
    let def = skirmish();
    let state = initial_state(&def, 2, 0).unwrap();
    let cases = [
        (Move::new("ghost"), IllegalMoveReason::UnknownActionId),
        (Move::new("bet").with_param("$n", 7), IllegalMoveReason::MoveParamsNotLegalForAction),
        (
            Move::new("bet").with_array("$n", vec![Scalar::Int(1)]),
            IllegalMoveReason::MoveParamsNotLegalForAction,
        ),
        (Move::new("bet"), IllegalMoveReason::MoveHasIncompleteParams),
        (
            Move::new("discard").with_array("$cards", vec![Scalar::str("card#0")]),
            IllegalMoveReason::MoveParamsNotLegalForAction,
        ),
    ];
    for (mv, reason) in cases {
        let err = apply_move(&def, &state, &mv, &ApplyMoveOptions::default()).unwrap_err();
        assert_eq!(err.illegal_reason(), Some(reason), "{mv}");
        assert_eq!(err.code(), "ILLEGAL_MOVE");
        assert_parity(&def, &state, &mv);
    }
}

#[test]
fn test_usage_limit_blocks_second_use() {
    let def = skirmish();
    let state = initial_state(&def, 2, 0).unwrap();
    let mv = Move::new("bet").with_param("$n", 1);
    let next = apply_move(&def, &state, &mv, &ApplyMoveOptions::default()).unwrap().state;
    assert_eq!(next.active_player, PlayerId::new(0));
    assert_eq!(next.global_var("pot"), Some(1));
    assert_eq!(next.player_var(PlayerId::new(0), "gold"), Some(2));

    let err = apply_move(&def, &next, &mv, &ApplyMoveOptions::default()).unwrap_err();
    assert_eq!(err.illegal_reason(), Some(IllegalMoveReason::ActionNotLegalInCurrentState));
    assert_parity(&def, &next, &mv);
}

#[test]
fn test_failed_apply_leaves_state_untouched() {
    let def = skirmish();
    let state = initial_state(&def, 2, 0).unwrap();
    let before = state.clone();
    let _ = apply_move(&def, &state, &Move::new("bet").with_param("$n", 9), &ApplyMoveOptions::default());
    assert_eq!(state, before);
}

#[test]
fn test_seat_param_is_validated_before_its_selector() {
    let mut def = skirmish();
    let mut gift = ActionDef::new("gift")
        .with_param("$to", Query::Players)
        .with_effects(vec![EffectAst::add_player(PlayerRef::Actor, "gold", ValueExpr::Int(1))]);
    gift.executor = PlayerSelector::Binding("$to".to_string());
    def.actions.push(gift);
    // A domain wider than the seat count lists only real seats.
    let mut wish = ActionDef::new("wish").with_param("$to", Query::int_range(0, 5));
    wish.executor = PlayerSelector::Binding("$to".to_string());
    def.actions.push(wish);

    let state = initial_state(&def, 2, 0).unwrap();
    for mv in [
        Move::new("gift").with_param("$to", 7),
        Move::new("gift").with_param("$to", Scalar::str("north")),
        Move::new("wish").with_param("$to", 4),
    ] {
        let err = apply_move(&def, &state, &mv, &ApplyMoveOptions::default()).unwrap_err();
        assert_eq!(err.illegal_reason(), Some(IllegalMoveReason::MoveParamsNotLegalForAction), "{mv}");
        assert_parity(&def, &state, &mv);
    }

    let gift = Move::new("gift").with_param("$to", 1);
    let next = apply_move(&def, &state, &gift, &ApplyMoveOptions::default()).unwrap().state;
    assert_eq!(next.player_var(PlayerId::new(1), "gold"), Some(4));

    let listed: Vec<String> = legal_moves(&def, &state, &LegalMoveOptions::default())
        .unwrap()
        .iter()
        .filter(|m| m.action_id.as_str() == "wish")
        .map(ToString::to_string)
        .collect();
    assert_eq!(listed, vec!["wish($to=0)", "wish($to=1)"]);
}

// === Property: parity over generated moves ===

fn candidate_move(state: &GameState, action: usize, n: i64, mask: u8, stray: bool) -> Move {
    match action {
        0 => Move::new("pass"),
        1 => Move::new("bet").with_param("$n", n),
        2 => Move::new("draw"),
        3 => {
            let hand = ZoneId::owned("hand", Some(state.active_player));
            let mut picked: Vec<Scalar> = state
                .zones
                .tokens(&hand)
                .map(|tokens| {
                    tokens
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| mask & (1 << i) != 0)
                        .map(|(_, t)| Scalar::str(t.id.as_str()))
                        .collect()
                })
                .unwrap_or_default();
            if stray {
                picked.push(Scalar::str("card#99"));
            }
            let mut mv = Move::new("discard");
            mv.params.insert("$cards".to_string(), MoveParam::Array(picked));
            mv
        }
        _ => Move::new("ghost"),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_surfaces_agree(
        seed in 0u64..1000,
        picks in prop::collection::vec(0usize..8, 0..10),
        action in 0usize..5,
        n in -1i64..5,
        mask in 0u8..16,
        stray in prop::bool::weighted(0.2),
    ) {
        let def = skirmish();
        let state = play(&def, seed, &picks);
        let mv = candidate_move(&state, action, n, mask, stray);
        assert_parity(&def, &state, &mv);
    }
}
