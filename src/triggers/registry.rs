//! Trigger definitions and the per-definition trigger index.
//!
//! Triggers are declared in the `GameDef`. The index is built once per
//! definition and maps each event kind to the triggers listening for it,
//! already in firing order.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::core::{ActionId, PhaseId, TriggerId, ZoneId};
use crate::def::GameDef;
use crate::effects::EffectAst;
use crate::eval::Condition;

use super::event::{EventKind, TriggerEvent};

/// Which events a trigger listens for.
///
/// `None` fields match any value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventPattern {
    PhaseEnter {
        #[serde(default)]
        phase: Option<PhaseId>,
    },
    PhaseExit {
        #[serde(default)]
        phase: Option<PhaseId>,
    },
    TurnStart,
    TurnEnd,
    ActionResolved {
        #[serde(default)]
        action: Option<ActionId>,
    },
    TokenEntered {
        #[serde(default)]
        zone: Option<ZoneId>,
    },
    VarChanged {
        #[serde(default)]
        var: Option<String>,
    },
}

impl EventPattern {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::PhaseEnter { .. } => EventKind::PhaseEnter,
            Self::PhaseExit { .. } => EventKind::PhaseExit,
            Self::TurnStart => EventKind::TurnStart,
            Self::TurnEnd => EventKind::TurnEnd,
            Self::ActionResolved { .. } => EventKind::ActionResolved,
            Self::TokenEntered { .. } => EventKind::TokenEntered,
            Self::VarChanged { .. } => EventKind::VarChanged,
        }
    }

    /// Structural match against an event's data.
    #[must_use]
    pub fn matches(&self, event: &TriggerEvent) -> bool {
        fn accepts<T: PartialEq>(wanted: &Option<T>, actual: &T) -> bool {
            wanted.as_ref().is_none_or(|w| w == actual)
        }
        match (self, event) {
            (Self::PhaseEnter { phase }, TriggerEvent::PhaseEnter { phase: actual })
            | (Self::PhaseExit { phase }, TriggerEvent::PhaseExit { phase: actual }) => {
                accepts(phase, actual)
            }
            (Self::TurnStart, TriggerEvent::TurnStart { .. })
            | (Self::TurnEnd, TriggerEvent::TurnEnd { .. }) => true,
            (Self::ActionResolved { action }, TriggerEvent::ActionResolved { action: actual, .. }) => {
                accepts(action, actual)
            }
            (Self::TokenEntered { zone }, TriggerEvent::TokenEntered { zone: actual, .. }) => {
                accepts(zone, actual)
            }
            (Self::VarChanged { var }, TriggerEvent::VarChanged { var: actual, .. }) => {
                accepts(var, actual)
            }
            _ => false,
        }
    }
}

/// A trigger definition.
///
/// `match` and `when` are both evaluated with the event's bindings in scope;
/// the trigger fires only if both hold.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerDef {
    pub id: TriggerId,
    pub event: EventPattern,
    #[serde(default, rename = "match")]
    pub match_: Option<Condition>,
    #[serde(default)]
    pub when: Option<Condition>,
    pub effects: Vec<EffectAst>,
    /// Higher fires first; ties fire in declaration order.
    #[serde(default)]
    pub priority: i32,
}

impl TriggerDef {
    pub fn new(id: impl Into<String>, event: EventPattern) -> Self {
        Self {
            id: TriggerId::new(id),
            event,
            match_: None,
            when: None,
            effects: Vec::new(),
            priority: 0,
        }
    }

    #[must_use]
    pub fn with_match(mut self, condition: Condition) -> Self {
        self.match_ = Some(condition);
        self
    }

    #[must_use]
    pub fn with_when(mut self, condition: Condition) -> Self {
        self.when = Some(condition);
        self
    }

    #[must_use]
    pub fn with_effect(mut self, effect: EffectAst) -> Self {
        self.effects.push(effect);
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// Trigger lookup by event kind.
///
/// Stores positions in `GameDef::triggers`, sorted by priority (descending)
/// then declaration order.
#[derive(Clone, Debug, Default)]
pub struct TriggerIndex {
    by_kind: FxHashMap<EventKind, Vec<usize>>,
}

impl TriggerIndex {
    #[must_use]
    pub fn from_def(def: &GameDef) -> Self {
        let mut by_kind: FxHashMap<EventKind, Vec<usize>> = FxHashMap::default();
        for (index, trigger) in def.triggers.iter().enumerate() {
            by_kind.entry(trigger.event.kind()).or_default().push(index);
        }
        for list in by_kind.values_mut() {
            list.sort_by(|a, b| {
                def.triggers[*b]
                    .priority
                    .cmp(&def.triggers[*a].priority)
                    .then_with(|| a.cmp(b))
            });
        }
        Self { by_kind }
    }

    /// Trigger positions listening for `kind`, in firing order.
    #[must_use]
    pub fn candidates(&self, kind: EventKind) -> &[usize] {
        self.by_kind.get(&kind).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_kind.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_kind.is_empty()
    }
}
