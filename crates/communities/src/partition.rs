use std::collections::HashSet;

use index::KnowledgeGraph;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::PartitionError;

/// Splits one connected, multi-node graph into communities.
pub trait CommunityDetector: Send + Sync {
    fn partition(&self, component: &KnowledgeGraph) -> Result<Vec<Vec<String>>, PartitionError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Community {
    pub id: usize,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Partition {
    pub communities: Vec<Community>,
    /// Components skipped because detection failed on them
    pub dropped_components: usize,
}

/// Partition the graph component by component. Single-node components
/// become their own community; larger ones go through `detector`, and a
/// component the detector fails on is logged and left out.
pub fn partition_graph(graph: &KnowledgeGraph, detector: &dyn CommunityDetector) -> Partition {
    let mut partition = Partition::default();

    for (component_index, component) in graph.connected_components().into_iter().enumerate() {
        if component.len() == 1 {
            push_community(&mut partition, component);
            continue;
        }

        let subgraph = graph.induced_subgraph(&component);
        let detected = detector
            .partition(&subgraph)
            .and_then(|groups| validate_groups(&component, groups));

        match detected {
            Ok(groups) => {
                debug!(
                    component = component_index,
                    nodes = component.len(),
                    communities = groups.len(),
                    "partitioned component"
                );
                for group in groups {
                    push_community(&mut partition, group);
                }
            }
            Err(e) => {
                warn!(
                    component = component_index,
                    nodes = component.len(),
                    error = %e,
                    "community detection failed, skipping component"
                );
                partition.dropped_components += 1;
            }
        }
    }

    info!(
        communities = partition.communities.len(),
        dropped_components = partition.dropped_components,
        "partitioned graph"
    );

    partition
}

fn push_community(partition: &mut Partition, members: Vec<String>) {
    let id = partition.communities.len();
    partition.communities.push(Community { id, members });
}

/// Every member exactly once, nothing from outside the component. Empty
/// groups are dropped.
fn validate_groups(
    component: &[String],
    groups: Vec<Vec<String>>,
) -> Result<Vec<Vec<String>>, PartitionError> {
    let expected: HashSet<&str> = component.iter().map(String::as_str).collect();
    let mut seen: HashSet<&str> = HashSet::new();

    for member in groups.iter().flatten() {
        if !expected.contains(member.as_str()) {
            return Err(PartitionError::InvalidPartition(format!(
                "{member} is not part of the component"
            )));
        }
        if !seen.insert(member.as_str()) {
            return Err(PartitionError::InvalidPartition(format!(
                "{member} appears in more than one community"
            )));
        }
    }

    if seen.len() != expected.len() {
        return Err(PartitionError::InvalidPartition(format!(
            "{} of {} nodes were assigned",
            seen.len(),
            expected.len()
        )));
    }

    Ok(groups.into_iter().filter(|g| !g.is_empty()).collect())
}
