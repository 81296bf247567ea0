//! Turn-order runtime state carried in `GameState`.
//!
//! The variant always matches the definition's `TurnOrderDef`.

use serde::{Deserialize, Serialize};

use crate::core::{ActionId, PlayerId};
use crate::def::{GameDef, TurnOrderDef};
use crate::eval::Condition;

/// A free operation granted to a seat outside normal sequencing.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FreeOperationGrant {
    pub grant_id: String,
    pub seat: PlayerId,
    /// Required action class; `None` accepts any.
    #[serde(default)]
    pub operation_class: Option<String>,
    /// Accepted actions; empty accepts any.
    #[serde(default)]
    pub action_ids: Vec<ActionId>,
    /// Evaluated with the move's params bound.
    #[serde(default)]
    pub zone_filter: Option<Condition>,
    #[serde(default)]
    pub sequence_batch_id: Option<String>,
    #[serde(default)]
    pub sequence_index: Option<u32>,
    pub remaining_uses: u32,
}

/// Eligibility to force on the next card.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EligibilityOverride {
    pub seat: PlayerId,
    pub eligible: bool,
}

/// Card-driven eligibility and grant state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardDrivenRuntime {
    pub seat_order: Vec<PlayerId>,
    /// Seats not eligible on the current card, sorted.
    pub ineligible: Vec<PlayerId>,
    /// Seats that took an operation on the current card, in order.
    pub acted: Vec<PlayerId>,
    pub passed: Vec<PlayerId>,
    /// Front grant's seat is active while any grant is pending.
    pub pending_grants: Vec<FreeOperationGrant>,
    pub pending_overrides: Vec<EligibilityOverride>,
    pub card_index: u32,
    pub next_grant_ordinal: u32,
}

impl CardDrivenRuntime {
    pub fn new(seat_order: Vec<PlayerId>) -> Self {
        Self {
            seat_order,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_eligible(&self, seat: PlayerId) -> bool {
        !self.ineligible.contains(&seat)
    }

    /// First eligible seat that has neither acted nor passed on this card.
    #[must_use]
    pub fn next_eligible_seat(&self) -> Option<PlayerId> {
        self.seat_order
            .iter()
            .copied()
            .find(|s| self.is_eligible(*s) && !self.acted.contains(s) && !self.passed.contains(s))
    }

    /// The grant holder if grants are pending, otherwise the next eligible seat.
    #[must_use]
    pub fn active_seat(&self) -> Option<PlayerId> {
        self.pending_grants
            .first()
            .map(|g| g.seat)
            .or_else(|| self.next_eligible_seat())
    }

    /// Whether grants are pending (the grant window is open).
    #[must_use]
    pub fn in_grant_window(&self) -> bool {
        !self.pending_grants.is_empty()
    }

    /// Allocate the next grant id.
    pub fn allocate_grant_id(&mut self) -> String {
        let id = format!("grant-{}", self.next_grant_ordinal);
        self.next_grant_ordinal += 1;
        id
    }
}

/// Turn-order runtime, one variant per `TurnOrderDef`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TurnOrderRuntime {
    RoundRobin,
    /// Position in the fixed order.
    Fixed { index: usize },
    CardDriven(CardDrivenRuntime),
    /// Seats that already submitted this turn.
    Simultaneous { submitted: Vec<PlayerId> },
}

impl TurnOrderRuntime {
    /// Fresh runtime for a definition.
    #[must_use]
    pub fn initial(def: &GameDef, player_count: usize) -> Self {
        match &def.turn_order {
            TurnOrderDef::RoundRobin => Self::RoundRobin,
            TurnOrderDef::Fixed { .. } => Self::Fixed { index: 0 },
            TurnOrderDef::CardDriven(config) => {
                let seats = if config.seats.is_empty() {
                    PlayerId::all(player_count).collect()
                } else {
                    config.seats.clone()
                };
                Self::CardDriven(CardDrivenRuntime::new(seats))
            }
            TurnOrderDef::Simultaneous => Self::Simultaneous {
                submitted: Vec::new(),
            },
        }
    }

    /// The seat the runtime designates, or `None` when the active seat is
    /// carried by the state alone (round robin).
    #[must_use]
    pub fn active_seat(&self, def: &GameDef, player_count: usize) -> Option<PlayerId> {
        match (self, &def.turn_order) {
            (Self::Fixed { index }, TurnOrderDef::Fixed { order }) if !order.is_empty() => {
                Some(order[*index % order.len()])
            }
            (Self::CardDriven(runtime), _) => runtime
                .active_seat()
                .or_else(|| runtime.seat_order.first().copied()),
            (Self::Simultaneous { submitted }, _) => {
                PlayerId::all(player_count).find(|p| !submitted.contains(p))
            }
            _ => None,
        }
    }

    pub fn card_driven(&self) -> Option<&CardDrivenRuntime> {
        match self {
            Self::CardDriven(runtime) => Some(runtime),
            _ => None,
        }
    }

    pub fn card_driven_mut(&mut self) -> Option<&mut CardDrivenRuntime> {
        match self {
            Self::CardDriven(runtime) => Some(runtime),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::def::CardDrivenConfig;

    fn seats(ids: &[u8]) -> Vec<PlayerId> {
        ids.iter().map(|i| PlayerId::new(*i)).collect()
    }

    #[test]
    fn test_card_driven_active_seat() {
        let mut runtime = CardDrivenRuntime::new(seats(&[2, 0, 1]));
        assert_eq!(runtime.active_seat(), Some(PlayerId::new(2)));

        runtime.ineligible.push(PlayerId::new(2));
        assert_eq!(runtime.active_seat(), Some(PlayerId::new(0)));

        runtime.acted.push(PlayerId::new(0));
        runtime.passed.push(PlayerId::new(1));
        assert_eq!(runtime.active_seat(), None);
    }

    #[test]
    fn test_grant_holder_is_active() {
        let mut runtime = CardDrivenRuntime::new(seats(&[0, 1]));
        let grant_id = runtime.allocate_grant_id();
        runtime.pending_grants.push(FreeOperationGrant {
            grant_id,
            seat: PlayerId::new(1),
            operation_class: None,
            action_ids: Vec::new(),
            zone_filter: None,
            sequence_batch_id: None,
            sequence_index: None,
            remaining_uses: 1,
        });
        assert!(runtime.in_grant_window());
        assert_eq!(runtime.active_seat(), Some(PlayerId::new(1)));
        assert_eq!(runtime.next_grant_ordinal, 1);
    }

    #[test]
    fn test_initial_variants() {
        let mut def = GameDef::minimal("order");
        def.turn_order = TurnOrderDef::Fixed { order: seats(&[1, 0]) };
        let runtime = TurnOrderRuntime::initial(&def, 2);
        assert_eq!(runtime.active_seat(&def, 2), Some(PlayerId::new(1)));

        def.turn_order = TurnOrderDef::CardDriven(CardDrivenConfig::new(Vec::new()));
        let runtime = TurnOrderRuntime::initial(&def, 3);
        assert_eq!(runtime.card_driven().unwrap().seat_order, seats(&[0, 1, 2]));
    }
}
