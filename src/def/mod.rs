//! Game definitions.
//!
//! A `GameDef` is the compiled, immutable rule set the kernel executes. The
//! kernel never hardcodes zones, phases or actions: the definition declares
//! them and the kernel interprets it.
//!
//! Definitions are deserialized with serde (camelCase variant names,
//! snake_case fields). Referential integrity is assumed; a dangling id met at
//! runtime is a `MISSING_DEFINITION` error.
//!
//! ## Key Types
//!
//! - `GameDef`: the full definition
//! - `VarDef`, `ZoneDef`, `TokenTypeDef`: state layout
//! - `ActionDef`, `ActionPipelineDef`: what seats can do
//! - `TurnStructure`, `TurnOrderDef`: who acts when
//! - `DefRuntime`: derived, immutable lookup structures

pub mod actions;
pub mod runtime;
pub mod turns;
pub mod vars;
pub mod zones;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use actions::{
    ActionDef, ActionPipelineDef, Atomicity, CompoundParamConstraint, LastingDuration,
    LastingEffectDef, ParamDef, ParamRelation, PipelineStage, UsageLimit, UsageScope,
};
pub use runtime::{DefRuntime, TableIndex};
pub use turns::{
    CardDrivenConfig, CheckpointTiming, EndCondition, EndResultDef, PhaseDef, TurnOrderDef,
    TurnStructure, VictoryCheckpoint, VictoryConfig, VictoryMargin,
};
pub use vars::{VarDef, VarType};
pub use zones::{
    DataTableDef, MapDef, MapSpaceDef, MarkerLatticeDef, StackingConstraint, TokenTypeDef,
    ZoneDef, ZoneOrdering,
};

use crate::core::{ActionId, DefinitionKind, KernelError, PhaseId, Result, ZoneId};
use crate::effects::EffectAst;
use crate::triggers::TriggerDef;

/// Default bound on trigger cascade depth.
pub const DEFAULT_MAX_TRIGGER_DEPTH: u32 = 8;

/// Identity and seat bounds of a definition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameMetadata {
    pub id: String,
    pub min_players: u8,
    pub max_players: u8,
    #[serde(default = "default_max_trigger_depth")]
    pub max_trigger_depth: u32,
}

fn default_max_trigger_depth() -> u32 {
    DEFAULT_MAX_TRIGGER_DEPTH
}

/// A compiled game definition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameDef {
    pub metadata: GameMetadata,

    // === State layout ===
    #[serde(default)]
    pub constants: BTreeMap<String, i64>,
    #[serde(default)]
    pub global_vars: Vec<VarDef>,
    #[serde(default)]
    pub per_player_vars: Vec<VarDef>,
    #[serde(default)]
    pub zone_vars: Vec<VarDef>,
    #[serde(default)]
    pub zones: Vec<ZoneDef>,
    #[serde(default)]
    pub token_types: Vec<TokenTypeDef>,
    #[serde(default)]
    pub markers: Vec<MarkerLatticeDef>,
    #[serde(default)]
    pub tables: Vec<DataTableDef>,
    #[serde(default)]
    pub map: Option<MapDef>,
    #[serde(default)]
    pub stacking_constraints: Vec<StackingConstraint>,

    // === Flow ===
    #[serde(default)]
    pub setup: Vec<EffectAst>,
    pub turn_structure: TurnStructure,
    #[serde(default)]
    pub turn_order: TurnOrderDef,
    #[serde(default)]
    pub end_conditions: Vec<EndCondition>,

    // === Rules ===
    #[serde(default)]
    pub actions: Vec<ActionDef>,
    #[serde(default)]
    pub action_pipelines: Vec<ActionPipelineDef>,
    #[serde(default)]
    pub triggers: Vec<TriggerDef>,
}

impl GameDef {
    /// A definition with one `main` phase and nothing else, for 1-4 seats.
    pub fn minimal(id: impl Into<String>) -> Self {
        Self {
            metadata: GameMetadata {
                id: id.into(),
                min_players: 1,
                max_players: 4,
                max_trigger_depth: DEFAULT_MAX_TRIGGER_DEPTH,
            },
            constants: BTreeMap::new(),
            global_vars: Vec::new(),
            per_player_vars: Vec::new(),
            zone_vars: Vec::new(),
            zones: Vec::new(),
            token_types: Vec::new(),
            markers: Vec::new(),
            tables: Vec::new(),
            map: None,
            stacking_constraints: Vec::new(),
            setup: Vec::new(),
            turn_structure: TurnStructure::new(&["main"]),
            turn_order: TurnOrderDef::RoundRobin,
            end_conditions: Vec::new(),
            actions: Vec::new(),
            action_pipelines: Vec::new(),
            triggers: Vec::new(),
        }
    }

    pub fn action(&self, id: &ActionId) -> Option<&ActionDef> {
        self.actions.iter().find(|a| &a.id == id)
    }

    /// Pipelines registered for an action, in declaration order.
    pub fn pipelines_for<'a, 'b>(
        &'a self,
        id: &'b ActionId,
    ) -> impl Iterator<Item = &'a ActionPipelineDef> + 'b
    where
        'a: 'b,
    {
        self.action_pipelines.iter().filter(move |p| &p.action_id == id)
    }

    pub fn global_var(&self, name: &str) -> Result<&VarDef> {
        self.global_vars
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| KernelError::missing(DefinitionKind::GlobalVar, name))
    }

    pub fn player_var(&self, name: &str) -> Result<&VarDef> {
        self.per_player_vars
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| KernelError::missing(DefinitionKind::PlayerVar, name))
    }

    pub fn zone_var(&self, name: &str) -> Result<&VarDef> {
        self.zone_vars
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| KernelError::missing(DefinitionKind::ZoneVar, name))
    }

    pub fn zone(&self, id: &ZoneId) -> Option<&ZoneDef> {
        self.zones.iter().find(|z| &z.id == id)
    }

    pub fn token_type(&self, id: &str) -> Result<&TokenTypeDef> {
        self.token_types
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| KernelError::missing(DefinitionKind::TokenType, id))
    }

    pub fn marker(&self, id: &str) -> Result<&MarkerLatticeDef> {
        self.markers
            .iter()
            .find(|m| m.id == id)
            .ok_or_else(|| KernelError::missing(DefinitionKind::Marker, id))
    }

    pub fn constant(&self, name: &str) -> Result<i64> {
        self.constants
            .get(name)
            .copied()
            .ok_or_else(|| KernelError::missing(DefinitionKind::Constant, name))
    }

    /// Whether a phase is declared (regular or interrupt).
    #[must_use]
    pub fn has_phase(&self, phase: &PhaseId) -> bool {
        self.turn_structure.phase_index(phase).is_some() || self.turn_structure.is_interrupt(phase)
    }

    /// The first regular phase.
    pub fn first_phase(&self) -> Result<&PhaseId> {
        self.turn_structure
            .phases
            .first()
            .map(|p| &p.id)
            .ok_or_else(|| KernelError::missing(DefinitionKind::Phase, "<first phase>"))
    }

    /// The lasting-effect definition with `id`, searched across actions.
    pub fn lasting_effect(&self, id: &str) -> Option<&LastingEffectDef> {
        self.actions
            .iter()
            .flat_map(|a| a.lasting_effects.iter())
            .find(|l| l.id == id)
    }
}
