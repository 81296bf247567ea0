//! Domain events.
//!
//! Events are emitted by effects (`tokenEntered`, `varChanged`,
//! `phaseEnter` from interrupts), by phase and turn transitions, and
//! synthetically after a move (`actionResolved`). Triggers listen for them.
//!
//! Each event exposes a binding scope to the trigger's `match`/`when`
//! conditions and effects: `$event` (the kind name) plus event-specific
//! names.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::{ActionId, PhaseId, PlayerId, TokenId, Value, ZoneId};
use crate::eval::Bindings;

/// Where a variable lives.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VarScope {
    Global,
    Player(PlayerId),
    Zone(ZoneId),
}

/// The kind of an event, used for trigger indexing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    PhaseEnter,
    PhaseExit,
    TurnStart,
    TurnEnd,
    ActionResolved,
    TokenEntered,
    VarChanged,
}

impl EventKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PhaseEnter => "phaseEnter",
            Self::PhaseExit => "phaseExit",
            Self::TurnStart => "turnStart",
            Self::TurnEnd => "turnEnd",
            Self::ActionResolved => "actionResolved",
            Self::TokenEntered => "tokenEntered",
            Self::VarChanged => "varChanged",
        }
    }
}

/// A domain event with its data.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TriggerEvent {
    PhaseEnter {
        phase: PhaseId,
    },
    PhaseExit {
        phase: PhaseId,
    },
    TurnStart {
        turn: u32,
        player: PlayerId,
    },
    TurnEnd {
        turn: u32,
        player: PlayerId,
    },
    ActionResolved {
        action: ActionId,
        actor: PlayerId,
    },
    /// `from` is `None` for created tokens.
    TokenEntered {
        token: TokenId,
        from: Option<ZoneId>,
        zone: ZoneId,
    },
    VarChanged {
        scope: VarScope,
        var: String,
        old: i64,
        new: i64,
    },
}

impl TriggerEvent {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::PhaseEnter { .. } => EventKind::PhaseEnter,
            Self::PhaseExit { .. } => EventKind::PhaseExit,
            Self::TurnStart { .. } => EventKind::TurnStart,
            Self::TurnEnd { .. } => EventKind::TurnEnd,
            Self::ActionResolved { .. } => EventKind::ActionResolved,
            Self::TokenEntered { .. } => EventKind::TokenEntered,
            Self::VarChanged { .. } => EventKind::VarChanged,
        }
    }

    /// The binding scope this event exposes.
    #[must_use]
    pub fn bindings(&self) -> Bindings {
        let mut b = Bindings::new();
        b.push("$event", Value::str(self.kind().as_str()));
        match self {
            Self::PhaseEnter { phase } | Self::PhaseExit { phase } => {
                b.push("$phase", Value::str(phase.as_str()));
            }
            Self::TurnStart { turn, player } | Self::TurnEnd { turn, player } => {
                b.push("$turn", Value::int(i64::from(*turn)));
                b.push("$player", Value::int(player.index() as i64));
            }
            Self::ActionResolved { action, actor } => {
                b.push("$action", Value::str(action.as_str()));
                b.push("$player", Value::int(actor.index() as i64));
            }
            Self::TokenEntered { token, from, zone } => {
                b.push("$token", Value::Token(token.clone()));
                b.push("$zone", Value::str(zone.as_str()));
                if let Some(from) = from {
                    b.push("$from", Value::str(from.as_str()));
                }
            }
            Self::VarChanged {
                scope,
                var,
                old,
                new,
            } => {
                b.push("$var", Value::str(var.clone()));
                b.push("$old", Value::int(*old));
                b.push("$new", Value::int(*new));
                match scope {
                    VarScope::Global => {}
                    VarScope::Player(player) => b.push("$player", Value::int(player.index() as i64)),
                    VarScope::Zone(zone) => b.push("$zone", Value::str(zone.as_str())),
                }
            }
        }
        b
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PhaseEnter { phase } => write!(f, "phaseEnter({phase})"),
            Self::PhaseExit { phase } => write!(f, "phaseExit({phase})"),
            Self::TurnStart { turn, player } => write!(f, "turnStart({turn}, {player})"),
            Self::TurnEnd { turn, player } => write!(f, "turnEnd({turn}, {player})"),
            Self::ActionResolved { action, actor } => write!(f, "actionResolved({action}, {actor})"),
            Self::TokenEntered { token, zone, .. } => write!(f, "tokenEntered({token} -> {zone})"),
            Self::VarChanged { var, old, new, .. } => write!(f, "varChanged({var}: {old} -> {new})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_bindings() {
        let event = TriggerEvent::VarChanged {
            scope: VarScope::Player(PlayerId::new(1)),
            var: "gold".to_string(),
            old: 3,
            new: 5,
        };
        let b = event.bindings();
        assert_eq!(b.get("$event"), Some(&Value::str("varChanged")));
        assert_eq!(b.get("$new"), Some(&Value::int(5)));
        assert_eq!(b.get("$player"), Some(&Value::int(1)));
    }

    #[test]
    fn test_token_entered_binds_token() {
        let event = TriggerEvent::TokenEntered {
            token: TokenId::new("troop#3"),
            from: None,
            zone: ZoneId::new("a:none"),
        };
        let b = event.bindings();
        assert_eq!(b.get("$token"), Some(&Value::Token(TokenId::new("troop#3"))));
        assert!(b.get("$from").is_none());
        assert_eq!(event.kind(), EventKind::TokenEntered);
    }
}
