use std::sync::Arc;

use anyhow::{Context, Result};
use extract::TextGenerator;
use extract::llm;
use futures::{StreamExt, TryStreamExt, stream};
use index::{EdgeView, KnowledgeGraph};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::partition::Community;

const SUMMARY_INSTRUCTION: &str = r#"Summarise the following community based on the entities and relationships.
Keep it concise and factual. Do NOT use markdown formatting.

Respond with {"summary": string} and nothing else."#;

/// Number of member names carried on each summary for display
const KEY_ENTITY_COUNT: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunitySummary {
    pub community_id: usize,
    pub entity_count: usize,
    pub summary: String,
    pub key_entities: Vec<String>,
}

pub struct CommunitySummarizer {
    generator: Arc<dyn TextGenerator>,
    max_concurrency: usize,
}

impl CommunitySummarizer {
    pub fn new(generator: Arc<dyn TextGenerator>, max_concurrency: usize) -> Self {
        Self {
            generator,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Render a community's members and the relationships among them.
    pub fn describe_community(community: &Community, graph: &KnowledgeGraph) -> String {
        let subgraph = graph.induced_subgraph(&community.members);
        let relationships: Vec<String> = subgraph.edges().map(describe_edge).collect();

        format!(
            "This community consists of {} members: {}.\nRelationships:\n- {}",
            community.members.len(),
            community.members.join(", "),
            relationships.join("\n- ")
        )
    }

    /// Generate summary for a community
    pub async fn summarize_community(
        &self,
        community: &Community,
        graph: &KnowledgeGraph,
    ) -> Result<CommunitySummary, extract::GenerationError> {
        let content = Self::describe_community(community, graph);
        let summary = llm::generate_summary(self.generator.as_ref(), SUMMARY_INSTRUCTION, &content).await?;

        Ok(CommunitySummary {
            community_id: community.id,
            entity_count: community.members.len(),
            summary,
            key_entities: community.members.iter().take(KEY_ENTITY_COUNT).cloned().collect(),
        })
    }

    /// One summary per community, in community order.
    pub async fn summarize_all(
        &self,
        communities: &[Community],
        graph: &KnowledgeGraph,
    ) -> Result<Vec<CommunitySummary>> {
        stream::iter(communities.iter().enumerate())
            .map(|(index, community)| async move {
                let summary = self
                    .summarize_community(community, graph)
                    .await
                    .with_context(|| format!("community summarization failed for community {index}"))?;
                debug!(community = community.id, members = summary.entity_count, "summarised community");
                Ok::<_, anyhow::Error>(summary)
            })
            .buffered(self.max_concurrency)
            .try_collect()
            .await
    }
}

fn describe_edge(edge: EdgeView<'_>) -> String {
    let label = edge.attributes.label.as_deref();
    format!(
        "{} is {} to {} (strength: {:.1}, label: {})",
        edge.source,
        label.unwrap_or("connected"),
        edge.target,
        edge.attributes.strength.unwrap_or(0.0),
        label.unwrap_or("")
    )
}
