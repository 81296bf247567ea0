//! Zobrist-style state hash.
//!
//! Every observable feature of a state (a variable value, a token at a zone
//! position, a marker, the phase, ...) maps to a 64-bit key: the feature is
//! hashed with `FxHasher` and the result avalanched with the SplitMix64
//! finaliser. The state hash is the XOR of all feature keys.
//!
//! The hash is recomputed in full after every transition. The PRNG state is
//! a feature too, so states whose future draws differ never share a hash.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

use super::state::GameState;

/// SplitMix64 finaliser.
#[inline]
fn mix(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Key for one feature. `tag` separates feature families.
#[inline]
fn feature_key<T: Hash + ?Sized>(tag: u8, feature: &T) -> u64 {
    let mut hasher = FxHasher::default();
    tag.hash(&mut hasher);
    feature.hash(&mut hasher);
    mix(hasher.finish())
}

/// Recompute the hash of a state from scratch.
#[must_use]
pub fn compute_state_hash(state: &GameState) -> u64 {
    let mut hash = 0u64;

    for (name, value) in &state.global_vars {
        hash ^= feature_key(1, &(name, value));
    }
    for (player, vars) in state.player_vars.iter() {
        for (name, value) in vars {
            hash ^= feature_key(2, &(player, name, value));
        }
    }
    for (zone, vars) in &state.zone_vars {
        for (name, value) in vars {
            hash ^= feature_key(3, &(zone, name, value));
        }
    }
    for (zone, tokens) in state.zones.iter() {
        for (index, token) in tokens.iter().enumerate() {
            hash ^= feature_key(4, &(zone, index, &token.id, &token.token_type));
            for (prop, value) in &token.props {
                hash ^= feature_key(5, &(&token.id, prop, value));
            }
        }
    }
    for (space, markers) in &state.markers {
        for (marker, value) in markers {
            hash ^= feature_key(6, &(space, marker, value));
        }
    }
    for (action, usage) in &state.action_usage {
        hash ^= feature_key(7, &(action, usage));
    }
    for (depth, phase) in state.interrupt_stack.iter().enumerate() {
        hash ^= feature_key(8, &(depth, phase));
    }
    for (index, lasting) in state.lasting_effects.iter().enumerate() {
        hash ^= feature_key(9, &(index, lasting));
    }

    hash ^= feature_key(10, &state.current_phase);
    hash ^= feature_key(11, &state.active_player);
    hash ^= feature_key(12, &state.turn_count);
    hash ^= feature_key(13, &state.next_token_ordinal);
    hash ^= feature_key(14, &state.turn_order);
    hash ^= feature_key(15, &state.rng);
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PlayerId, TokenId, ZoneId};
    use crate::def::{GameDef, VarDef, ZoneDef};
    use crate::zones::{Token, ZonePosition};

    fn state() -> GameState {
        let mut def = GameDef::minimal("hash");
        def.global_vars = vec![VarDef::int("score", 0, 0, 10)];
        def.zones = vec![ZoneDef::new("a:none"), ZoneDef::new("b:none")];
        GameState::new(&def, 2, 1).unwrap()
    }

    fn token(id: &str) -> Token {
        Token {
            id: TokenId::new(id),
            token_type: "t".to_string(),
            props: Default::default(),
        }
    }

    #[test]
    fn test_hash_is_stable() {
        let s = state();
        assert_eq!(compute_state_hash(&s), compute_state_hash(&s.clone()));
    }

    #[test]
    fn test_hash_sees_vars_and_positions() {
        let base = state();
        let h0 = compute_state_hash(&base);

        let mut changed = base.clone();
        changed.global_vars.insert("score".to_string(), 1);
        assert_ne!(compute_state_hash(&changed), h0);

        let a = ZoneId::new("a:none");
        let mut ab = base.clone();
        ab.zones.insert(&a, token("x"), ZonePosition::Back);
        ab.zones.insert(&a, token("y"), ZonePosition::Back);
        let mut ba = base.clone();
        ba.zones.insert(&a, token("y"), ZonePosition::Back);
        ba.zones.insert(&a, token("x"), ZonePosition::Back);
        assert_ne!(compute_state_hash(&ab), compute_state_hash(&ba));

        let mut other_seat = base.clone();
        other_seat.active_player = PlayerId::new(1);
        assert_ne!(compute_state_hash(&other_seat), h0);
    }

    #[test]
    fn test_rng_position_is_hashed() {
        let base = state();
        let mut advanced = base.clone();
        advanced.rng = advanced.rng.next_index(6).1;
        assert_ne!(compute_state_hash(&advanced), compute_state_hash(&base));

        let mut replayed = base.clone();
        replayed.rng = base.rng.next_index(6).1;
        assert_eq!(compute_state_hash(&replayed), compute_state_hash(&advanced));
    }
}
