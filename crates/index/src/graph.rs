use std::collections::{HashMap, HashSet};

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::{Bfs, EdgeRef};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EdgeAttributes {
    pub label: Option<String>,
    pub strength: Option<f64>,
}

/// A borrowed view of one edge. `source`/`target` keep the orientation of
/// the relationship that first created the edge.
#[derive(Debug, Clone, Copy)]
pub struct EdgeView<'a> {
    pub source: &'a str,
    pub target: &'a str,
    pub attributes: &'a EdgeAttributes,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub component_count: usize,
}

/// Undirected entity graph. Nodes are keyed by entity name and keep
/// insertion order; an unordered pair of names holds at most one edge.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeGraph {
    graph: UnGraph<String, EdgeAttributes>,
    index: HashMap<String, NodeIndex>,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adding an existing name is a no-op.
    pub fn add_node(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(name) {
            return idx;
        }

        let idx = self.graph.add_node(name.to_string());
        self.index.insert(name.to_string(), idx);
        idx
    }

    /// Add the edge `a - b`, or replace the attributes of the existing one.
    pub fn upsert_edge(&mut self, a: &str, b: &str, attributes: EdgeAttributes) {
        let a = self.add_node(a);
        let b = self.add_node(b);
        self.graph.update_edge(a, b, attributes);
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains_node(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Node names in insertion order.
    pub fn node_names(&self) -> Vec<&str> {
        self.graph
            .node_indices()
            .map(|idx| self.graph[idx].as_str())
            .collect()
    }

    pub fn edge(&self, a: &str, b: &str) -> Option<&EdgeAttributes> {
        let a = *self.index.get(a)?;
        let b = *self.index.get(b)?;
        self.graph
            .find_edge(a, b)
            .map(|edge| &self.graph[edge])
    }

    /// Edges in creation order.
    pub fn edges(&self) -> impl Iterator<Item = EdgeView<'_>> {
        self.graph.edge_references().map(|edge| EdgeView {
            source: self.graph[edge.source()].as_str(),
            target: self.graph[edge.target()].as_str(),
            attributes: edge.weight(),
        })
    }

    /// Connected components, ordered by their earliest node. Names inside a
    /// component keep insertion order.
    pub fn connected_components(&self) -> Vec<Vec<String>> {
        let mut visited = vec![false; self.graph.node_count()];
        let mut components = Vec::new();

        for start in self.graph.node_indices() {
            if visited[start.index()] {
                continue;
            }

            let mut members = Vec::new();
            let mut bfs = Bfs::new(&self.graph, start);
            while let Some(idx) = bfs.next(&self.graph) {
                visited[idx.index()] = true;
                members.push(idx);
            }

            members.sort();
            components.push(
                members
                    .into_iter()
                    .map(|idx| self.graph[idx].clone())
                    .collect(),
            );
        }

        components
    }

    /// Copy of the nodes named in `names` and every edge between them.
    /// Unknown names are ignored.
    pub fn induced_subgraph<S: AsRef<str>>(&self, names: &[S]) -> KnowledgeGraph {
        let wanted: HashSet<&str> = names.iter().map(|n| n.as_ref()).collect();
        let mut subgraph = KnowledgeGraph::new();

        for idx in self.graph.node_indices() {
            if wanted.contains(self.graph[idx].as_str()) {
                subgraph.add_node(&self.graph[idx]);
            }
        }

        for edge in self.edges() {
            if wanted.contains(edge.source) && wanted.contains(edge.target) {
                subgraph.upsert_edge(edge.source, edge.target, edge.attributes.clone());
            }
        }

        subgraph
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            node_count: self.node_count(),
            edge_count: self.edge_count(),
            component_count: self.connected_components().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(label: &str, strength: f64) -> EdgeAttributes {
        EdgeAttributes {
            label: Some(label.to_string()),
            strength: Some(strength),
        }
    }

    #[test]
    fn test_add_node_is_idempotent() {
        let mut graph = KnowledgeGraph::new();
        let first = graph.add_node("Alice");
        let second = graph.add_node("Alice");

        assert_eq!(first, second);
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_upsert_edge_ignores_direction() {
        let mut graph = KnowledgeGraph::new();
        graph.upsert_edge("Alice", "Bob", attrs("knows", 0.2));
        graph.upsert_edge("Bob", "Alice", attrs("manages", 0.8));

        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.edge("Alice", "Bob"), Some(&attrs("manages", 0.8)));
        assert_eq!(graph.edge("Bob", "Alice"), Some(&attrs("manages", 0.8)));
    }

    #[test]
    fn test_connected_components_in_node_order() {
        let mut graph = KnowledgeGraph::new();
        graph.add_node("Loner");
        graph.upsert_edge("A", "B", EdgeAttributes::default());
        graph.upsert_edge("C", "D", EdgeAttributes::default());
        graph.upsert_edge("B", "E", EdgeAttributes::default());

        assert_eq!(
            graph.connected_components(),
            vec![
                vec!["Loner".to_string()],
                vec!["A".to_string(), "B".to_string(), "E".to_string()],
                vec!["C".to_string(), "D".to_string()],
            ]
        );
        assert_eq!(graph.stats().component_count, 3);
    }

    #[test]
    fn test_induced_subgraph_keeps_internal_edges_only() {
        let mut graph = KnowledgeGraph::new();
        graph.upsert_edge("A", "B", attrs("ab", 0.5));
        graph.upsert_edge("B", "C", attrs("bc", 0.5));
        graph.upsert_edge("A", "C", attrs("ac", 0.5));

        let sub = graph.induced_subgraph(&["A", "B", "missing"]);

        assert_eq!(sub.node_names(), vec!["A", "B"]);
        assert_eq!(sub.edge_count(), 1);
        assert_eq!(sub.edge("A", "B"), Some(&attrs("ab", 0.5)));
    }

    #[test]
    fn test_self_loop_stays_single_node_component() {
        let mut graph = KnowledgeGraph::new();
        graph.upsert_edge("Echo", "Echo", EdgeAttributes::default());

        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.connected_components(), vec![vec!["Echo".to_string()]]);
    }
}
