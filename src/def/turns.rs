//! Turn structure, turn order and end-condition definitions.

use serde::{Deserialize, Serialize};

use crate::core::{ActionId, PhaseId, PlayerId, ZoneId};
use crate::eval::{Condition, PlayerRef, ValueExpr};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseDef {
    pub id: PhaseId,
}

impl PhaseDef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: PhaseId::new(id) }
    }
}

/// Ordered phases of a turn plus interrupt phases.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnStructure {
    pub phases: Vec<PhaseDef>,
    /// Only reachable through `pushInterruptPhase`.
    #[serde(default)]
    pub interrupts: Vec<PhaseDef>,
}

impl TurnStructure {
    pub fn new(phases: &[&str]) -> Self {
        Self {
            phases: phases.iter().map(|p| PhaseDef::new(*p)).collect(),
            interrupts: Vec::new(),
        }
    }

    /// Index of a regular phase.
    #[must_use]
    pub fn phase_index(&self, phase: &PhaseId) -> Option<usize> {
        self.phases.iter().position(|p| &p.id == phase)
    }

    #[must_use]
    pub fn is_interrupt(&self, phase: &PhaseId) -> bool {
        self.interrupts.iter().any(|p| &p.id == phase)
    }
}

/// How the active seat is chosen.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TurnOrderDef {
    /// Seats in index order.
    #[default]
    RoundRobin,
    /// Seats in an explicit order.
    Fixed { order: Vec<PlayerId> },
    /// Eligibility driven by a sequence of cards.
    CardDriven(CardDrivenConfig),
    /// Every seat submits once per turn, lowest unsubmitted seat first.
    Simultaneous,
}

/// Card-driven turn-order configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDrivenConfig {
    /// Eligibility order on every card.
    pub seats: Vec<PlayerId>,
    #[serde(default = "default_max_acting")]
    pub max_acting_per_card: u32,
    /// The action that passes; passing declines any grants held.
    #[serde(default)]
    pub pass_action: Option<ActionId>,
    /// When set, a card is moved from here to `played_zone` at every card end.
    #[serde(default)]
    pub draw_zone: Option<ZoneId>,
    #[serde(default)]
    pub played_zone: Option<ZoneId>,
    #[serde(default)]
    pub victory: Option<VictoryConfig>,
}

fn default_max_acting() -> u32 {
    2
}

impl CardDrivenConfig {
    pub fn new(seats: Vec<PlayerId>) -> Self {
        Self {
            seats,
            max_acting_per_card: default_max_acting(),
            pass_action: None,
            draw_zone: None,
            played_zone: None,
            victory: None,
        }
    }

    #[must_use]
    pub fn with_pass_action(mut self, action: impl Into<String>) -> Self {
        self.pass_action = Some(ActionId::new(action));
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CheckpointTiming {
    /// Checked continuously; the named seat wins as soon as it holds.
    During,
    /// Ends the game; the winner comes from the margin ranking.
    Final,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VictoryCheckpoint {
    pub id: String,
    #[serde(default)]
    pub seat: Option<PlayerId>,
    pub timing: CheckpointTiming,
    pub when: Condition,
}

/// A seat's victory margin, evaluated for final ranking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VictoryMargin {
    pub seat: PlayerId,
    pub value: ValueExpr,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VictoryConfig {
    #[serde(default)]
    pub checkpoints: Vec<VictoryCheckpoint>,
    #[serde(default)]
    pub margins: Vec<VictoryMargin>,
}

/// Result declared by an end condition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EndResultDef {
    Draw,
    LossAll,
    Win { player: PlayerRef },
    /// Rank seats by `value` evaluated with `$player` bound, highest first
    /// unless `ascending`.
    Score {
        value: ValueExpr,
        #[serde(default)]
        ascending: bool,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndCondition {
    pub when: Condition,
    pub result: EndResultDef,
}
