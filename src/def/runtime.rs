//! Structures derived once from a definition.
//!
//! None of these change after construction, so a `DefRuntime` can be cached
//! alongside its `GameDef` and shared between threads.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use super::GameDef;
use crate::core::{DefinitionKind, KernelError, Result, Scalar};
use crate::triggers::TriggerIndex;
use crate::zones::AdjacencyGraph;

/// Data-table rows indexed by key value.
#[derive(Clone, Debug, Default)]
pub struct TableIndex {
    tables: FxHashMap<String, FxHashMap<Scalar, usize>>,
}

impl TableIndex {
    #[must_use]
    pub fn from_def(def: &GameDef) -> Self {
        let mut tables = FxHashMap::default();
        for table in &def.tables {
            let mut rows = FxHashMap::default();
            for (index, row) in table.rows.iter().enumerate() {
                if let Some(key) = row.get(&table.key) {
                    // First row wins for duplicate keys.
                    rows.entry(key.clone()).or_insert(index);
                }
            }
            tables.insert(table.id.clone(), rows);
        }
        Self { tables }
    }

    /// The row of `table` whose key equals `key`.
    pub fn row<'d>(
        &self,
        def: &'d GameDef,
        table: &str,
        key: &Scalar,
    ) -> Result<&'d BTreeMap<String, Scalar>> {
        let index = self
            .tables
            .get(table)
            .ok_or_else(|| KernelError::missing(DefinitionKind::Table, table))?;
        let row = index
            .get(key)
            .ok_or_else(|| KernelError::missing(DefinitionKind::TableRow, format!("{table}[{key}]")))?;
        def.tables
            .iter()
            .find(|t| t.id == table)
            .and_then(|t| t.rows.get(*row))
            .ok_or_else(|| KernelError::missing(DefinitionKind::Table, table))
    }
}

/// Immutable lookup structures derived from a `GameDef`.
#[derive(Clone, Debug, Default)]
pub struct DefRuntime {
    pub adjacency: AdjacencyGraph,
    pub tables: TableIndex,
    pub triggers: TriggerIndex,
}

impl DefRuntime {
    /// Derive the runtime for a definition.
    #[must_use]
    pub fn new(def: &GameDef) -> Self {
        Self {
            adjacency: AdjacencyGraph::from_def(def),
            tables: TableIndex::from_def(def),
            triggers: TriggerIndex::from_def(def),
        }
    }
}
