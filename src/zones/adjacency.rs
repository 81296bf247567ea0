//! Zone adjacency graph.
//!
//! Built once per definition from each zone's `adjacent_to` list and the
//! optional map geometry. Edges are symmetric: if A->B is declared then B->A
//! exists too. Neighbour lists are sorted by zone id so queries over them are
//! order-stable.

use rustc_hash::FxHashMap;

use crate::core::ZoneId;
use crate::def::GameDef;

/// Undirected adjacency between zones.
#[derive(Clone, Debug, Default)]
pub struct AdjacencyGraph {
    neighbours: FxHashMap<ZoneId, Vec<ZoneId>>,
}

impl AdjacencyGraph {
    /// Build the graph for a definition.
    #[must_use]
    pub fn from_def(def: &GameDef) -> Self {
        let mut graph = Self::default();
        for zone in &def.zones {
            for other in &zone.adjacent_to {
                graph.add_edge(&zone.id, other);
            }
        }
        if let Some(map) = &def.map {
            for space in &map.spaces {
                for other in &space.adjacent_to {
                    graph.add_edge(&space.id, other);
                }
            }
        }
        for list in graph.neighbours.values_mut() {
            list.sort();
            list.dedup();
        }
        graph
    }

    fn add_edge(&mut self, a: &ZoneId, b: &ZoneId) {
        if a == b {
            return;
        }
        self.neighbours.entry(a.clone()).or_default().push(b.clone());
        self.neighbours.entry(b.clone()).or_default().push(a.clone());
    }

    /// Neighbours of a zone, sorted by id.
    #[must_use]
    pub fn neighbours(&self, zone: &ZoneId) -> &[ZoneId] {
        self.neighbours.get(zone).map_or(&[], Vec::as_slice)
    }

    /// Check whether two zones are adjacent.
    #[must_use]
    pub fn is_adjacent(&self, a: &ZoneId, b: &ZoneId) -> bool {
        self.neighbours(a).binary_search(b).is_ok()
    }

    /// Number of zones with at least one neighbour.
    #[must_use]
    pub fn len(&self) -> usize {
        self.neighbours.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.neighbours.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::def::{GameDef, MapDef, MapSpaceDef, ZoneDef};

    fn def_with_map() -> GameDef {
        let mut def = GameDef::minimal("adjacency");
        def.zones = vec![
            ZoneDef::new("a:none").with_adjacent(&["b:none"]),
            ZoneDef::new("b:none"),
            ZoneDef::new("c:none"),
        ];
        def.map = Some(MapDef {
            spaces: vec![MapSpaceDef {
                id: ZoneId::new("c:none"),
                adjacent_to: vec![ZoneId::new("b:none")],
                attributes: Default::default(),
            }],
        });
        def
    }

    #[test]
    fn test_edges_are_symmetric() {
        let graph = AdjacencyGraph::from_def(&def_with_map());
        let a = ZoneId::new("a:none");
        let b = ZoneId::new("b:none");
        let c = ZoneId::new("c:none");

        assert!(graph.is_adjacent(&a, &b));
        assert!(graph.is_adjacent(&b, &a));
        assert!(graph.is_adjacent(&b, &c));
        assert!(!graph.is_adjacent(&a, &c));
    }

    #[test]
    fn test_neighbours_sorted() {
        let graph = AdjacencyGraph::from_def(&def_with_map());
        let b = ZoneId::new("b:none");
        assert_eq!(
            graph.neighbours(&b),
            &[ZoneId::new("a:none"), ZoneId::new("c:none")]
        );
        assert!(graph.neighbours(&ZoneId::new("zzz")).is_empty());
    }
}
