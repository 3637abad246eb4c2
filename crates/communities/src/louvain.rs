use std::collections::{BTreeMap, HashMap};

use index::KnowledgeGraph;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::error::PartitionError;
use crate::partition::CommunityDetector;

#[derive(Debug, Clone, Copy)]
pub struct LouvainConfig {
    pub max_iterations: usize,
    /// Seeds the node visiting order so repeated runs agree
    pub seed: u64,
}

impl Default for LouvainConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            seed: 42,
        }
    }
}

/// Modularity-based local moving over an unweighted graph.
pub struct LouvainDetector {
    config: LouvainConfig,
}

impl LouvainDetector {
    pub fn new(config: LouvainConfig) -> Self {
        Self { config }
    }

    /// Returns the community of each node, by node position.
    fn detect_communities(&self, n: usize, adj_list: &[BTreeMap<usize, f64>]) -> Vec<usize> {
        // Initialize: each node in its own community
        let mut communities: Vec<usize> = (0..n).collect();

        let degrees: Vec<f64> = adj_list.iter().map(|neighbors| neighbors.values().sum()).collect();
        let m: f64 = degrees.iter().sum::<f64>() / 2.0; // Total weight of edges

        // Sum of member degrees per community
        let mut sigma_tot = degrees.clone();

        let mut order: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        let mut improved = true;
        let mut iteration = 0;

        while improved && iteration < self.config.max_iterations {
            improved = false;
            iteration += 1;
            order.shuffle(&mut rng);

            for &node in &order {
                let current_comm = communities[node];
                let k_i = degrees[node];

                // Weight from node into each neighboring community
                let mut neighbor_comms: BTreeMap<usize, f64> = BTreeMap::new();
                for (&neighbor, &weight) in &adj_list[node] {
                    *neighbor_comms.entry(communities[neighbor]).or_insert(0.0) += weight;
                }
                let k_i_in_from = neighbor_comms.get(&current_comm).copied().unwrap_or(0.0);

                let mut best_comm = current_comm;
                let mut best_gain = 0.0;

                for (&comm, &k_i_in_to) in &neighbor_comms {
                    if comm == current_comm {
                        continue;
                    }

                    let gain = modularity_gain(
                        k_i,
                        k_i_in_to,
                        k_i_in_from,
                        sigma_tot[comm],
                        sigma_tot[current_comm],
                        m,
                    );

                    if gain > best_gain {
                        best_gain = gain;
                        best_comm = comm;
                    }
                }

                // Move to best community if improvement found
                if best_comm != current_comm {
                    sigma_tot[current_comm] -= k_i;
                    sigma_tot[best_comm] += k_i;
                    communities[node] = best_comm;
                    improved = true;
                }
            }
        }

        debug!(nodes = n, iterations = iteration, "louvain converged");
        communities
    }
}

/// Change in modularity from moving a node of degree `k_i` out of its
/// community (total degree `sigma_from`, including the node) into another
/// (total degree `sigma_to`).
fn modularity_gain(
    k_i: f64,
    k_i_in_to: f64,
    k_i_in_from: f64,
    sigma_to: f64,
    sigma_from: f64,
    m: f64,
) -> f64 {
    (k_i_in_to - k_i_in_from) / m - (k_i * (sigma_to - sigma_from + k_i)) / (2.0 * m * m)
}

impl CommunityDetector for LouvainDetector {
    fn partition(&self, component: &KnowledgeGraph) -> Result<Vec<Vec<String>>, PartitionError> {
        let names = component.node_names();
        let n = names.len();
        if n < 2 {
            return Err(PartitionError::TooFewNodes(n));
        }

        let position: HashMap<&str, usize> = names.iter().enumerate().map(|(i, &name)| (name, i)).collect();

        // Self-loops carry no information about which community to join
        let mut adj_list: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); n];
        for edge in component.edges() {
            let source = position[edge.source];
            let target = position[edge.target];
            if source == target {
                continue;
            }
            *adj_list[source].entry(target).or_insert(0.0) += 1.0;
            *adj_list[target].entry(source).or_insert(0.0) += 1.0;
        }

        if adj_list.iter().all(BTreeMap::is_empty) {
            return Err(PartitionError::NoEdges);
        }

        let assignment = self.detect_communities(n, &adj_list);

        // Communities are numbered by their first member in node order
        let mut slot: HashMap<usize, usize> = HashMap::new();
        let mut groups: Vec<Vec<String>> = Vec::new();
        for (node, &comm) in assignment.iter().enumerate() {
            let next = groups.len();
            let idx = *slot.entry(comm).or_insert(next);
            if idx == groups.len() {
                groups.push(Vec::new());
            }
            groups[idx].push(names[node].to_string());
        }

        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use index::EdgeAttributes;

    fn connect(graph: &mut KnowledgeGraph, a: &str, b: &str) {
        graph.upsert_edge(a, b, EdgeAttributes::default());
    }

    fn two_cliques() -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::new();
        for (a, b) in [("A", "B"), ("A", "C"), ("B", "C"), ("D", "E"), ("D", "F"), ("E", "F")] {
            connect(&mut graph, a, b);
        }
        // Weak bridge
        connect(&mut graph, "C", "D");
        graph
    }

    #[test]
    fn test_splits_two_cliques_joined_by_a_bridge() {
        let detector = LouvainDetector::new(LouvainConfig::default());
        let mut groups = detector.partition(&two_cliques()).unwrap();
        for group in &mut groups {
            group.sort();
        }
        groups.sort();

        assert_eq!(
            groups,
            vec![
                vec!["A".to_string(), "B".to_string(), "C".to_string()],
                vec!["D".to_string(), "E".to_string(), "F".to_string()],
            ]
        );
    }

    #[test]
    fn test_same_seed_same_result() {
        let detector = LouvainDetector::new(LouvainConfig::default());
        let graph = two_cliques();
        assert_eq!(detector.partition(&graph).unwrap(), detector.partition(&graph).unwrap());
    }

    #[test]
    fn test_output_partitions_the_nodes() {
        let mut graph = KnowledgeGraph::new();
        connect(&mut graph, "Alice", "Acme");
        connect(&mut graph, "Bob", "Acme");
        connect(&mut graph, "Bob", "Alice");

        let groups = LouvainDetector::new(LouvainConfig::default())
            .partition(&graph)
            .unwrap();
        let mut members: Vec<String> = groups.into_iter().flatten().collect();
        members.sort();
        assert_eq!(members, vec!["Acme", "Alice", "Bob"]);
    }

    #[test]
    fn test_degenerate_inputs_fail() {
        let detector = LouvainDetector::new(LouvainConfig::default());

        let mut single = KnowledgeGraph::new();
        single.add_node("A");
        assert_eq!(detector.partition(&single), Err(PartitionError::TooFewNodes(1)));

        let mut disconnected = KnowledgeGraph::new();
        disconnected.add_node("A");
        disconnected.add_node("B");
        assert_eq!(detector.partition(&disconnected), Err(PartitionError::NoEdges));
    }
}
