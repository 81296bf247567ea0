//! Initial state construction.

use crate::core::{compute_state_hash, GameState, Result};
use crate::def::{DefRuntime, GameDef};
use crate::effects::{apply_effects, EffectContext, EventContext};
use crate::turn_flow::sync_active_seat;

use super::options::KernelOptions;

/// Build the starting state: a blank state for `player_count` seats seeded
/// with `seed`, with the definition's setup effects applied.
///
/// Setup runs as the first active seat. Its events do not fire triggers.
pub(crate) fn setup(
    def: &GameDef,
    runtime: &DefRuntime,
    player_count: usize,
    seed: u64,
    options: &KernelOptions,
) -> Result<GameState> {
    let mut state = GameState::new(def, player_count, seed)?;
    if !def.setup.is_empty() {
        let ctx = EffectContext::new(def, runtime, state.active_player)
            .with_max_effect_ops(options.max_effect_ops)
            .with_event_context(EventContext::Setup)
            .with_path_root("setup");
        state = apply_effects(&def.setup, &state, &ctx)?.state;
        sync_active_seat(def, &mut state);
    }
    state.state_hash = compute_state_hash(&state);
    tracing::debug!(game = %def.metadata.id, players = player_count, seed, "initial state built");
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::def::{TokenTypeDef, VarDef, ZoneDef};
    use crate::effects::EffectAst;
    use crate::eval::ZoneRef;

    #[test]
    fn test_setup_effects_run_once() {
        let mut def = GameDef::minimal("setup");
        def.global_vars.push(VarDef::int("round", 0, 0, 9));
        def.zones.push(ZoneDef::new("deck:none"));
        def.token_types.push(TokenTypeDef::new("card"));
        def.setup = vec![
            EffectAst::add_global("round", 1),
            EffectAst::create("card", ZoneRef::id("deck:none")),
            EffectAst::create("card", ZoneRef::id("deck:none")),
        ];
        let runtime = DefRuntime::new(&def);
        let state = setup(&def, &runtime, 2, 9, &KernelOptions::default()).unwrap();
        assert_eq!(state.global_var("round"), Some(1));
        assert_eq!(state.zones.zone_size(&crate::core::ZoneId::new("deck:none")), 2);
        assert_eq!(state.state_hash, compute_state_hash(&state));
        assert_ne!(state.state_hash, 0);
    }

    #[test]
    fn test_rejects_bad_player_count() {
        let def = GameDef::minimal("setup");
        let runtime = DefRuntime::new(&def);
        let err = setup(&def, &runtime, 9, 0, &KernelOptions::default()).unwrap_err();
        assert_eq!(err.code(), "INVALID_PLAYER_COUNT");
    }
}
