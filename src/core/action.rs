//! Moves: requests to take an action.
//!
//! A move names an action and carries its parameter values (declared params
//! plus decision bindings such as `$target`). A move is a request value, not
//! persisted state.
//!
//! ## Example
//!
//! ```
//! use rules_kernel::core::{Move, Scalar};
//!
//! let pass = Move::new("pass");
//! let train = Move::new("train")
//!     .with_param("space", Scalar::str("saigon:none"))
//!     .with_array("$pieces", vec![Scalar::str("troop#1"), Scalar::str("troop#2")]);
//! assert!(pass.params.is_empty());
//! assert_eq!(train.params.len(), 2);
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::ids::ActionId;
use super::value::{MoveParam, Scalar};

/// When a special activity is interleaved with its host operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CompoundTiming {
    Before,
    /// After the stage named by `insert_after_stage`.
    During,
    After,
}

/// A special activity carried by an operation move.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompoundMove {
    pub special_activity: Box<Move>,
    pub timing: CompoundTiming,
    #[serde(default)]
    pub insert_after_stage: Option<usize>,
}

/// A complete or partial move.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    pub action_id: ActionId,
    #[serde(default)]
    pub params: BTreeMap<String, MoveParam>,
    #[serde(default)]
    pub free_operation: bool,
    /// Overrides the action's declared class for grant matching.
    #[serde(default)]
    pub action_class: Option<String>,
    #[serde(default)]
    pub compound: Option<CompoundMove>,
}

impl Move {
    /// A move with no params.
    pub fn new(action_id: impl Into<String>) -> Self {
        Self {
            action_id: ActionId::new(action_id),
            params: BTreeMap::new(),
            free_operation: false,
            action_class: None,
            compound: None,
        }
    }

    /// Set a scalar param.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.params.insert(name.into(), MoveParam::Scalar(value.into()));
        self
    }

    /// Set an array param.
    #[must_use]
    pub fn with_array(mut self, name: impl Into<String>, values: Vec<Scalar>) -> Self {
        self.params.insert(name.into(), MoveParam::Array(values));
        self
    }

    /// Mark as a free operation.
    #[must_use]
    pub fn free(mut self) -> Self {
        self.free_operation = true;
        self
    }

    #[must_use]
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.action_class = Some(class.into());
        self
    }

    /// Attach a special activity.
    #[must_use]
    pub fn with_special_activity(
        mut self,
        special_activity: Move,
        timing: CompoundTiming,
        insert_after_stage: Option<usize>,
    ) -> Self {
        self.compound = Some(CompoundMove {
            special_activity: Box::new(special_activity),
            timing,
            insert_after_stage,
        });
        self
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.action_id)?;
        if !self.params.is_empty() {
            f.write_str("(")?;
            for (i, (name, value)) in self.params.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                match value {
                    MoveParam::Scalar(s) => write!(f, "{name}={s}")?,
                    MoveParam::Array(items) => {
                        let items: Vec<String> = items.iter().map(ToString::to_string).collect();
                        write!(f, "{name}=[{}]", items.join(","))?;
                    }
                }
            }
            f.write_str(")")?;
        }
        if self.free_operation {
            f.write_str(" [free]")?;
        }
        if let Some(compound) = &self.compound {
            write!(f, " + {}", compound.special_activity)?;
        }
        Ok(())
    }
}
