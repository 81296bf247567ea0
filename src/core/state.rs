//! Game state: one immutable snapshot of a game in progress.
//!
//! ## GameState
//!
//! Complete state of a game:
//! - Global, per-player and per-zone variables
//! - Zone contents (`ZoneStore`) and the token ordinal counter
//! - Phase, interrupt resume stack, active seat, turn counter
//! - PRNG state and state hash
//! - Per-action usage counters
//! - Turn-order runtime, markers, active lasting effects
//!
//! Uses `im` persistent data structures so cloning a state is O(1); every
//! transition clones, edits the clone and returns it. The value is plain
//! data and round-trips through serde (JSON and bincode).

use im::{OrdMap, Vector};
use serde::{Deserialize, Serialize};

use super::error::{KernelError, Result};
use super::ids::{ActionId, PhaseId, ZoneId};
use super::player::{PlayerId, PlayerMap};
use super::rng::GameRngState;
use crate::def::{GameDef, LastingDuration, UsageScope};
use crate::turn_flow::TurnOrderRuntime;
use crate::zones::ZoneStore;

/// How often an action has been taken, per scope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionUsage {
    pub turn: u32,
    pub phase: u32,
    pub game: u32,
}

impl ActionUsage {
    #[must_use]
    pub fn get(&self, scope: UsageScope) -> u32 {
        match scope {
            UsageScope::Turn => self.turn,
            UsageScope::Phase => self.phase,
            UsageScope::Game => self.game,
        }
    }
}

/// A lasting effect whose teardown has not run yet.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActiveLastingEffect {
    pub id: String,
    pub action_id: ActionId,
    pub duration: LastingDuration,
    /// Seat the setup ran as; teardown runs as the same seat.
    pub executor: PlayerId,
}

/// Complete game state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    // === Variables ===
    pub global_vars: OrdMap<String, i64>,
    pub player_vars: PlayerMap<OrdMap<String, i64>>,
    pub zone_vars: OrdMap<ZoneId, OrdMap<String, i64>>,

    // === Tokens ===
    pub zones: ZoneStore,
    /// Next token ordinal; never decreases.
    pub next_token_ordinal: u64,

    // === Progression ===
    pub current_phase: PhaseId,
    /// Phases to resume, innermost last.
    pub interrupt_stack: Vector<PhaseId>,
    pub active_player: PlayerId,
    /// Turn number (starts at 1).
    pub turn_count: u32,
    pub turn_order: TurnOrderRuntime,

    // === Bookkeeping ===
    pub action_usage: OrdMap<ActionId, ActionUsage>,
    /// space -> marker -> state.
    pub markers: OrdMap<ZoneId, OrdMap<String, String>>,
    pub lasting_effects: Vector<ActiveLastingEffect>,

    // === Determinism ===
    pub rng: GameRngState,
    pub state_hash: u64,
}

impl GameState {
    /// A blank state for `def`: variables at their initial values, every
    /// declared zone empty, first phase, seat 0 (or the turn order's seat)
    /// active. Setup effects are not run; see `initial_state`.
    pub fn new(def: &GameDef, player_count: usize, seed: u64) -> Result<Self> {
        let min = usize::from(def.metadata.min_players);
        let max = usize::from(def.metadata.max_players);
        if player_count == 0 || player_count > 255 || player_count < min || player_count > max {
            return Err(KernelError::InvalidPlayerCount {
                count: player_count,
                min: def.metadata.min_players,
                max: def.metadata.max_players,
            });
        }

        let global_vars = def
            .global_vars
            .iter()
            .map(|v| (v.name.clone(), v.initial()))
            .collect();
        let per_player: OrdMap<String, i64> = def
            .per_player_vars
            .iter()
            .map(|v| (v.name.clone(), v.initial()))
            .collect();
        let per_zone: OrdMap<String, i64> = def
            .zone_vars
            .iter()
            .map(|v| (v.name.clone(), v.initial()))
            .collect();

        let mut zones = ZoneStore::new();
        let mut zone_vars = OrdMap::new();
        let mut markers = OrdMap::new();
        for zone in &def.zones {
            zones.init_zone(zone.id.clone());
            if !per_zone.is_empty() {
                zone_vars.insert(zone.id.clone(), per_zone.clone());
            }
        }
        if let Some(map) = &def.map {
            for space in &map.spaces {
                let defaults: OrdMap<String, String> = def
                    .markers
                    .iter()
                    .map(|m| (m.id.clone(), m.default.clone()))
                    .collect();
                if !defaults.is_empty() {
                    markers.insert(space.id.clone(), defaults);
                }
            }
        }

        let turn_order = TurnOrderRuntime::initial(def, player_count);
        let active_player = turn_order
            .active_seat(def, player_count)
            .unwrap_or(PlayerId::new(0));

        Ok(Self {
            global_vars,
            player_vars: PlayerMap::new(player_count, |_| per_player.clone()),
            zone_vars,
            zones,
            next_token_ordinal: 0,
            current_phase: def.first_phase()?.clone(),
            interrupt_stack: Vector::new(),
            active_player,
            turn_count: 1,
            turn_order,
            action_usage: OrdMap::new(),
            markers,
            lasting_effects: Vector::new(),
            rng: GameRngState::seeded(seed),
            state_hash: 0,
        })
    }

    /// Get player count.
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.player_vars.player_count()
    }

    #[must_use]
    pub fn global_var(&self, name: &str) -> Option<i64> {
        self.global_vars.get(name).copied()
    }

    #[must_use]
    pub fn player_var(&self, player: PlayerId, name: &str) -> Option<i64> {
        self.player_vars.get(player)?.get(name).copied()
    }

    #[must_use]
    pub fn zone_var(&self, zone: &ZoneId, name: &str) -> Option<i64> {
        self.zone_vars.get(zone)?.get(name).copied()
    }

    /// Current marker state on a space, falling back to the lattice default.
    pub fn marker(&self, def: &GameDef, space: &ZoneId, marker: &str) -> Result<String> {
        if let Some(state) = self.markers.get(space).and_then(|m| m.get(marker)) {
            return Ok(state.clone());
        }
        Ok(def.marker(marker)?.default.clone())
    }

    /// Usage counters for an action.
    #[must_use]
    pub fn usage(&self, action: &ActionId) -> ActionUsage {
        self.action_usage.get(action).copied().unwrap_or_default()
    }

    /// Reset one usage scope for every action.
    pub fn reset_usage(&mut self, scope: UsageScope) {
        let reset: OrdMap<ActionId, ActionUsage> = self
            .action_usage
            .iter()
            .map(|(id, usage)| {
                let mut usage = *usage;
                match scope {
                    UsageScope::Turn => usage.turn = 0,
                    UsageScope::Phase => usage.phase = 0,
                    UsageScope::Game => usage.game = 0,
                }
                (id.clone(), usage)
            })
            .collect();
        self.action_usage = reset;
    }

    /// Record one use of an action in every scope.
    pub fn record_usage(&mut self, action: &ActionId) {
        let mut usage = self.usage(action);
        usage.turn += 1;
        usage.phase += 1;
        usage.game += 1;
        self.action_usage.insert(action.clone(), usage);
    }

    /// Serialize to a compact binary snapshot.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| KernelError::Serialization {
            message: e.to_string(),
        })
    }

    /// Restore a snapshot produced by `to_bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| KernelError::Serialization {
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::def::{MarkerLatticeDef, VarDef, ZoneDef};

    fn def() -> GameDef {
        let mut def = GameDef::minimal("state");
        def.global_vars = vec![VarDef::int("score", 3, 0, 10)];
        def.per_player_vars = vec![VarDef::int("gold", 5, 0, 99)];
        def.zone_vars = vec![VarDef::bool("contested", false)];
        def.zones = vec![ZoneDef::new("deck:none"), ZoneDef::new("hand:0"), ZoneDef::new("hand:1")];
        def
    }

    #[test]
    fn test_new_state() {
        let state = GameState::new(&def(), 2, 42).unwrap();
        assert_eq!(state.player_count(), 2);
        assert_eq!(state.global_var("score"), Some(3));
        assert_eq!(state.player_var(PlayerId::new(1), "gold"), Some(5));
        assert_eq!(state.zone_var(&ZoneId::new("hand:1"), "contested"), Some(0));
        assert_eq!(state.current_phase, PhaseId::new("main"));
        assert_eq!(state.turn_count, 1);
        assert!(state.zones.contains_zone(&ZoneId::new("deck:none")));
    }

    #[test]
    fn test_player_count_bounds() {
        let mut def = def();
        def.metadata.min_players = 2;
        let err = GameState::new(&def, 1, 0).unwrap_err();
        assert_eq!(err.code(), "INVALID_PLAYER_COUNT");
        assert!(GameState::new(&def, 5, 0).is_err());
    }

    #[test]
    fn test_usage_counters() {
        let mut state = GameState::new(&def(), 2, 0).unwrap();
        let id = ActionId::new("train");
        state.record_usage(&id);
        state.record_usage(&id);
        state.reset_usage(UsageScope::Phase);
        let usage = state.usage(&id);
        assert_eq!((usage.turn, usage.phase, usage.game), (2, 0, 2));
        assert_eq!(usage.get(UsageScope::Game), 2);
    }

    #[test]
    fn test_marker_default() {
        let mut def = def();
        def.markers = vec![MarkerLatticeDef {
            id: "support".to_string(),
            states: vec!["neutral".to_string(), "active".to_string()],
            default: "neutral".to_string(),
        }];
        let state = GameState::new(&def, 2, 0).unwrap();
        let marker = state.marker(&def, &ZoneId::new("deck:none"), "support").unwrap();
        assert_eq!(marker, "neutral");
    }

    #[test]
    fn test_bincode_and_json_round_trip() {
        let state = GameState::new(&def(), 2, 7).unwrap();

        let bytes = state.to_bytes().unwrap();
        assert_eq!(GameState::from_bytes(&bytes).unwrap(), state);

        let json = serde_json::to_string(&state).unwrap();
        let back: GameState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
