//! Zone, token-type, map, marker and data-table definitions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::{PlayerId, Scalar, ZoneId};

/// How insertion positions map onto a zone's list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ZoneOrdering {
    /// `top` inserts at the front.
    #[default]
    Stack,
    /// `top` inserts at the back; draws still take from the front.
    Queue,
    /// Order carries no meaning.
    Set,
}

/// A zone declaration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneDef {
    pub id: ZoneId,
    /// Explicit owner; derived from the id suffix when absent.
    #[serde(default)]
    pub owner: Option<PlayerId>,
    #[serde(default)]
    pub ordering: ZoneOrdering,
    #[serde(default)]
    pub adjacent_to: Vec<ZoneId>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, Scalar>,
}

impl ZoneDef {
    /// Create an unowned, stack-ordered zone.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: ZoneId::new(id),
            owner: None,
            ordering: ZoneOrdering::Stack,
            adjacent_to: Vec::new(),
            category: None,
            attributes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_ordering(mut self, ordering: ZoneOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    #[must_use]
    pub fn with_adjacent(mut self, zones: &[&str]) -> Self {
        self.adjacent_to = zones.iter().map(|z| ZoneId::new(*z)).collect();
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// The owning seat, if any.
    #[must_use]
    pub fn owner(&self) -> Option<PlayerId> {
        self.owner.or_else(|| self.id.owner())
    }
}

/// A token type with default prop values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTypeDef {
    pub id: String,
    #[serde(default)]
    pub props: BTreeMap<String, Scalar>,
}

impl TokenTypeDef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            props: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_prop(mut self, name: impl Into<String>, default: impl Into<Scalar>) -> Self {
        self.props.insert(name.into(), default.into());
        self
    }
}

/// Cap on how many tokens (optionally of given types) a zone may hold.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackingConstraint {
    pub id: String,
    /// Governed zones; empty means every zone (subject to `zone_category`).
    #[serde(default)]
    pub zones: Vec<ZoneId>,
    #[serde(default)]
    pub zone_category: Option<String>,
    /// Counted token types; empty means every type.
    #[serde(default)]
    pub token_types: Vec<String>,
    pub max: u32,
}

/// Optional map geometry merged into the adjacency graph.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapDef {
    pub spaces: Vec<MapSpaceDef>,
}

/// A map space. Spaces are also declared as zones.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapSpaceDef {
    pub id: ZoneId,
    #[serde(default)]
    pub adjacent_to: Vec<ZoneId>,
    #[serde(default)]
    pub attributes: BTreeMap<String, Scalar>,
}

/// An ordered set of marker states for space-keyed markers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerLatticeDef {
    pub id: String,
    pub states: Vec<String>,
    pub default: String,
}

impl MarkerLatticeDef {
    #[must_use]
    pub fn has_state(&self, state: &str) -> bool {
        self.states.iter().any(|s| s == state)
    }
}

/// A runtime data table: rows indexed by the value of the `key` field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataTableDef {
    pub id: String,
    pub key: String,
    #[serde(default)]
    pub rows: Vec<BTreeMap<String, Scalar>>,
}
