//! Action and action-pipeline definitions.

use serde::{Deserialize, Serialize};

use crate::actions::PlayerSelector;
use crate::core::{ActionId, PhaseId, PipelineId};
use crate::effects::EffectAst;
use crate::eval::{Condition, Query};

/// A declared move parameter and its legal domain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamDef {
    pub name: String,
    pub domain: Query,
}

/// Scope of a usage counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UsageScope {
    Turn,
    Phase,
    Game,
}

/// How many times an action may be taken per scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageLimit {
    pub scope: UsageScope,
    pub max: u32,
}

/// When a lasting effect expires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LastingDuration {
    Turn,
    Phase,
}

/// A setup/teardown pair activated when its action resolves.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastingEffectDef {
    pub id: String,
    pub duration: LastingDuration,
    #[serde(default)]
    pub setup: Vec<EffectAst>,
    #[serde(default)]
    pub teardown: Vec<EffectAst>,
}

/// A plain action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDef {
    pub id: ActionId,
    /// Seats allowed to take the action; must include the active seat.
    #[serde(default)]
    pub actor: PlayerSelector,
    /// The seat effects run as; must resolve to exactly one seat.
    #[serde(default)]
    pub executor: PlayerSelector,
    /// Phases the action is available in; empty means every phase.
    #[serde(default)]
    pub phases: Vec<PhaseId>,
    #[serde(default)]
    pub action_class: Option<String>,
    #[serde(default)]
    pub params: Vec<ParamDef>,
    #[serde(default)]
    pub pre: Option<Condition>,
    #[serde(default)]
    pub cost: Vec<EffectAst>,
    #[serde(default)]
    pub effects: Vec<EffectAst>,
    #[serde(default)]
    pub limits: Vec<UsageLimit>,
    #[serde(default)]
    pub lasting_effects: Vec<LastingEffectDef>,
}

impl ActionDef {
    /// An action for the active seat with no params and no effects.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: ActionId::new(id),
            actor: PlayerSelector::Active,
            executor: PlayerSelector::Active,
            phases: Vec::new(),
            action_class: None,
            params: Vec::new(),
            pre: None,
            cost: Vec::new(),
            effects: Vec::new(),
            limits: Vec::new(),
            lasting_effects: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, domain: Query) -> Self {
        self.params.push(ParamDef {
            name: name.into(),
            domain,
        });
        self
    }

    #[must_use]
    pub fn with_pre(mut self, pre: Condition) -> Self {
        self.pre = Some(pre);
        self
    }

    #[must_use]
    pub fn with_cost(mut self, cost: Vec<EffectAst>) -> Self {
        self.cost = cost;
        self
    }

    #[must_use]
    pub fn with_effects(mut self, effects: Vec<EffectAst>) -> Self {
        self.effects = effects;
        self
    }

    #[must_use]
    pub fn with_limit(mut self, scope: UsageScope, max: u32) -> Self {
        self.limits.push(UsageLimit { scope, max });
        self
    }

    #[must_use]
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.action_class = Some(class.into());
        self
    }

    #[must_use]
    pub fn in_phases(mut self, phases: &[&str]) -> Self {
        self.phases = phases.iter().map(|p| PhaseId::new(*p)).collect();
        self
    }

    #[must_use]
    pub fn with_lasting_effect(mut self, lasting: LastingEffectDef) -> Self {
        self.lasting_effects.push(lasting);
        self
    }

    /// Whether the action may be taken in `phase`.
    #[must_use]
    pub fn allowed_in_phase(&self, phase: &PhaseId) -> bool {
        self.phases.is_empty() || self.phases.contains(phase)
    }
}

/// Whether a failed cost validation makes a pipeline illegal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Atomicity {
    /// Cost validation must pass.
    #[default]
    Atomic,
    /// Proceed without spending cost when validation fails.
    Partial,
}

/// A named resolution stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStage {
    pub name: String,
    #[serde(default)]
    pub effects: Vec<EffectAst>,
}

/// Relation between a host operation's and a special activity's param sets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParamRelation {
    /// No selected value appears in both.
    Disjoint,
    /// Every special-activity value also appears in the operation's.
    Subset,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompoundParamConstraint {
    pub relation: ParamRelation,
    pub operation_param: String,
    pub special_activity_param: String,
}

/// Optional enhanced dispatch profile for an action id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPipelineDef {
    pub id: PipelineId,
    pub action_id: ActionId,
    #[serde(default)]
    pub applicability: Option<Condition>,
    #[serde(default)]
    pub legality: Option<Condition>,
    #[serde(default)]
    pub cost_validation: Option<Condition>,
    #[serde(default)]
    pub cost_effects: Vec<EffectAst>,
    #[serde(default)]
    pub stages: Vec<PipelineStage>,
    #[serde(default)]
    pub atomicity: Atomicity,
    /// Operations this pipeline may accompany as a special activity;
    /// `None` allows any.
    #[serde(default)]
    pub accompanying_ops: Option<Vec<ActionId>>,
    #[serde(default)]
    pub compound_param_constraints: Vec<CompoundParamConstraint>,
    /// Lasting-effect ids; when non-empty the pipeline only applies while
    /// one of them is active.
    #[serde(default)]
    pub linked_windows: Vec<String>,
}

impl ActionPipelineDef {
    pub fn new(id: impl Into<String>, action_id: impl Into<String>) -> Self {
        Self {
            id: PipelineId::new(id),
            action_id: ActionId::new(action_id),
            applicability: None,
            legality: None,
            cost_validation: None,
            cost_effects: Vec::new(),
            stages: Vec::new(),
            atomicity: Atomicity::Atomic,
            accompanying_ops: None,
            compound_param_constraints: Vec::new(),
            linked_windows: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_applicability(mut self, condition: Condition) -> Self {
        self.applicability = Some(condition);
        self
    }

    #[must_use]
    pub fn with_legality(mut self, condition: Condition) -> Self {
        self.legality = Some(condition);
        self
    }

    #[must_use]
    pub fn with_cost_validation(mut self, condition: Condition) -> Self {
        self.cost_validation = Some(condition);
        self
    }

    #[must_use]
    pub fn with_cost_effects(mut self, effects: Vec<EffectAst>) -> Self {
        self.cost_effects = effects;
        self
    }

    #[must_use]
    pub fn with_stage(mut self, name: impl Into<String>, effects: Vec<EffectAst>) -> Self {
        self.stages.push(PipelineStage {
            name: name.into(),
            effects,
        });
        self
    }

    #[must_use]
    pub fn partial(mut self) -> Self {
        self.atomicity = Atomicity::Partial;
        self
    }

    #[must_use]
    pub fn accompanying(mut self, ops: &[&str]) -> Self {
        self.accompanying_ops = Some(ops.iter().map(|op| ActionId::new(*op)).collect());
        self
    }

    #[must_use]
    pub fn with_param_constraint(
        mut self,
        relation: ParamRelation,
        operation_param: impl Into<String>,
        special_activity_param: impl Into<String>,
    ) -> Self {
        self.compound_param_constraints.push(CompoundParamConstraint {
            relation,
            operation_param: operation_param.into(),
            special_activity_param: special_activity_param.into(),
        });
        self
    }

    #[must_use]
    pub fn with_linked_window(mut self, lasting_effect: impl Into<String>) -> Self {
        self.linked_windows.push(lasting_effect.into());
        self
    }
}
