use extract::Object;
use tracing::info;

use crate::graph::{EdgeAttributes, KnowledgeGraph};

/// Fold the summarized objects into one graph. Entities become nodes;
/// relationships become edges and create missing endpoints. A later
/// relationship between the same pair replaces the earlier attributes.
pub fn build_graph(objects: &[Object]) -> KnowledgeGraph {
    let mut graph = KnowledgeGraph::new();

    for object in objects {
        match object {
            Object::Entity(entity) => {
                graph.add_node(&entity.name);
            }
            Object::Relationship(relationship) => {
                graph.upsert_edge(
                    &relationship.from_entity.name,
                    &relationship.to_entity.name,
                    EdgeAttributes {
                        label: relationship.label.clone(),
                        strength: relationship.strength,
                    },
                );
            }
        }
    }

    info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "built knowledge graph"
    );

    graph
}
