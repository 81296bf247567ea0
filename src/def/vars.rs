//! Variable definitions.

use serde::{Deserialize, Serialize};

/// Storage type of a variable. Both are stored as `i64`; booleans as 0/1.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VarType {
    #[default]
    Int,
    Bool,
}

/// A global, per-player or per-zone variable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarDef {
    pub name: String,
    #[serde(rename = "type", default)]
    pub var_type: VarType,
    #[serde(default)]
    pub init: i64,
    #[serde(default = "default_min")]
    pub min: i64,
    #[serde(default = "default_max")]
    pub max: i64,
}

fn default_min() -> i64 {
    i64::MIN
}

fn default_max() -> i64 {
    i64::MAX
}

impl VarDef {
    /// An integer variable.
    pub fn int(name: impl Into<String>, init: i64, min: i64, max: i64) -> Self {
        Self {
            name: name.into(),
            var_type: VarType::Int,
            init,
            min,
            max,
        }
    }

    /// A boolean variable.
    pub fn bool(name: impl Into<String>, init: bool) -> Self {
        Self {
            name: name.into(),
            var_type: VarType::Bool,
            init: i64::from(init),
            min: 0,
            max: 1,
        }
    }

    /// Effective bounds. Booleans always clamp to `[0, 1]`.
    #[must_use]
    pub fn bounds(&self) -> (i64, i64) {
        match self.var_type {
            VarType::Int => (self.min, self.max.max(self.min)),
            VarType::Bool => (0, 1),
        }
    }

    /// Clamp a value into this variable's bounds.
    #[must_use]
    pub fn clamp(&self, value: i64) -> i64 {
        let (min, max) = self.bounds();
        value.clamp(min, max)
    }

    /// The clamped initial value.
    #[must_use]
    pub fn initial(&self) -> i64 {
        self.clamp(self.init)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp() {
        let score = VarDef::int("score", 0, 0, 10);
        assert_eq!(score.clamp(15), 10);
        assert_eq!(score.clamp(-3), 0);
        assert_eq!(score.clamp(7), 7);
    }

    #[test]
    fn test_bool_bounds() {
        let flag = VarDef::bool("flag", true);
        assert_eq!(flag.initial(), 1);
        assert_eq!(flag.clamp(5), 1);
        assert_eq!(flag.clamp(-5), 0);
    }

    #[test]
    fn test_defaults_from_json() {
        let var: VarDef = serde_json::from_str(r#"{"name": "gold"}"#).unwrap();
        assert_eq!(var.var_type, VarType::Int);
        assert_eq!(var.bounds(), (i64::MIN, i64::MAX));
    }
}
