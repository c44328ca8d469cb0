//! The `depends_on` relation between a component's resources, on `petgraph`.
//!
//! Edges point from a dependent to the resource it depends on.

use std::collections::HashSet;

use deckhand_common::error::{DeckhandError, Result};
use indexmap::IndexMap;
use petgraph::graph::NodeIndex;

/// A dependency graph of services and tasks.
#[derive(Debug, Default)]
pub struct DependsOnGraph {
    graph: petgraph::Graph<String, ()>,
    nodes: IndexMap<String, NodeIndex>,
}

impl DependsOnGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a resource node, returning the existing node if already present.
    pub fn add_resource(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.to_owned());
        let _ = self.nodes.insert(name.to_owned(), idx);
        idx
    }

    /// Records that `dependent` depends on `dependency`.
    ///
    /// Both ends are added as nodes if missing.
    pub fn add_dependency(&mut self, dependent: &str, dependency: &str) {
        let from = self.add_resource(dependent);
        let to = self.add_resource(dependency);
        let _ = self.graph.add_edge(from, to, ());
    }

    /// Returns `true` if a path from `search` leads back to `search`.
    ///
    /// The walk shares a single `seen` set across branches and only reports
    /// a cycle when the search root itself reappears. A cycle reachable
    /// from `search` that does not pass through it is not reported here;
    /// checking every node as its own root catches those.
    #[must_use]
    pub fn is_part_of_circular_reference(&self, search: &str) -> bool {
        let Some(&root) = self.nodes.get(search) else {
            return false;
        };
        let mut seen = HashSet::new();
        self.returns_to(root, root, &mut seen)
    }

    fn returns_to(&self, search: NodeIndex, current: NodeIndex, seen: &mut HashSet<NodeIndex>) -> bool {
        for next in self.graph.neighbors(current) {
            if next == search {
                return true;
            }
            if seen.insert(next) && self.returns_to(search, next, seen) {
                return true;
            }
        }
        false
    }

    /// Names of every resource that lies on a cycle, in insertion order.
    #[must_use]
    pub fn circular_resources(&self) -> Vec<String> {
        self.nodes
            .keys()
            .filter(|name| self.is_part_of_circular_reference(name))
            .cloned()
            .collect()
    }

    /// Returns resources ordered so that dependencies come first.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph contains a cycle.
    pub fn startup_order(&self) -> Result<Vec<String>> {
        match petgraph::algo::toposort(&self.graph, None) {
            Ok(indices) => Ok(indices
                .iter()
                .rev()
                .filter_map(|&idx| self.graph.node_weight(idx).cloned())
                .collect()),
            Err(cycle) => Err(DeckhandError::Config {
                message: format!(
                    "cyclic depends_on detected at \"{}\"",
                    self.graph.node_weight(cycle.node_id()).map_or("?", String::as_str)
                ),
            }),
        }
    }
}
