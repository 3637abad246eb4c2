use std::sync::Arc;

use anyhow::{Context, Result};
use communities::CommunitySummary;
use extract::TextGenerator;
use extract::llm;
use futures::{StreamExt, TryStreamExt, stream};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const COMBINE_INSTRUCTION: &str = "Combine these answers into a single concise response.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalSearchResult {
    pub answer: String,
    /// Map-stage answers, in community order
    pub community_answers: Vec<CommunityAnswer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityAnswer {
    pub community_id: usize,
    pub answer: String,
}

/// Map-reduce over community summaries: every summary answers the query on
/// its own, then one request folds those answers into the global answer.
pub struct GlobalSearchEngine {
    generator: Arc<dyn TextGenerator>,
    max_concurrency: usize,
}

impl GlobalSearchEngine {
    pub fn new(generator: Arc<dyn TextGenerator>, max_concurrency: usize) -> Self {
        Self {
            generator,
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn map_instruction(summary: &str) -> String {
        format!("Answer the user query using the provided summary: {summary}")
    }

    /// The reduce payload: the ordered answer list as a JSON array.
    pub fn combine_content(answers: &[String]) -> Result<String> {
        let list = serde_json::to_string(answers).context("Failed to encode community answers")?;
        Ok(format!("Answers: {list}"))
    }

    pub async fn search(&self, query: &str, summaries: &[CommunitySummary]) -> Result<GlobalSearchResult> {
        let community_answers = self.answer_per_community(query, summaries).await?;

        let answers: Vec<String> = community_answers.iter().map(|a| a.answer.clone()).collect();
        let content = Self::combine_content(&answers)?;
        let answer = llm::generate_text(self.generator.as_ref(), COMBINE_INSTRUCTION, &content)
            .await
            .context("query answering failed while combining answers")?;

        info!(communities = summaries.len(), "combined community answers");

        Ok(GlobalSearchResult {
            answer,
            community_answers,
        })
    }

    async fn answer_per_community(
        &self,
        query: &str,
        summaries: &[CommunitySummary],
    ) -> Result<Vec<CommunityAnswer>> {
        stream::iter(summaries.iter().enumerate())
            .map(|(index, summary)| async move {
                let instruction = Self::map_instruction(&summary.summary);
                let answer = llm::generate_text(self.generator.as_ref(), &instruction, query)
                    .await
                    .with_context(|| format!("query answering failed for answer {index}"))?;
                debug!(community = summary.community_id, "answered from community");
                Ok::<_, anyhow::Error>(CommunityAnswer {
                    community_id: summary.community_id,
                    answer,
                })
            })
            .buffered(self.max_concurrency)
            .try_collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use extract::testing::ScriptedGenerator;
    use extract::{GenerationError, ResponseShape};

    fn summaries(texts: &[&str]) -> Vec<CommunitySummary> {
        texts
            .iter()
            .enumerate()
            .map(|(id, text)| CommunitySummary {
                community_id: id,
                entity_count: 1,
                summary: text.to_string(),
                key_entities: Vec::new(),
            })
            .collect()
    }

    /// Echoes the summary back on map requests and the payload on reduce.
    fn echo_generator() -> Arc<ScriptedGenerator> {
        Arc::new(ScriptedGenerator::new(|request| {
            match request.instruction.strip_prefix("Answer the user query using the provided summary: ") {
                Some(summary) => Ok(format!("  from {summary}  ")),
                None => Ok(format!("final <{}>", request.content)),
            }
        }))
    }

    #[tokio::test]
    async fn test_map_request_carries_summary_and_query() {
        let generator = echo_generator();
        let engine = GlobalSearchEngine::new(generator.clone(), 2);

        engine
            .search("Where does Alice work?", &summaries(&["Alice works at Acme"]))
            .await
            .unwrap();

        let requests = generator.requests();
        let map = requests
            .iter()
            .find(|r| r.instruction.contains("Alice works at Acme"))
            .unwrap();
        assert_eq!(map.content, "Where does Alice work?");
        assert_eq!(map.shape, ResponseShape::Text);
    }

    #[tokio::test]
    async fn test_reduce_embeds_ordered_answers() {
        let generator = echo_generator();
        let engine = GlobalSearchEngine::new(generator.clone(), 4);

        let result = engine
            .search("q", &summaries(&["first", "second", "third"]))
            .await
            .unwrap();

        let answers: Vec<&str> = result.community_answers.iter().map(|a| a.answer.as_str()).collect();
        assert_eq!(answers, vec!["from first", "from second", "from third"]);

        let reduce = generator.requests().pop().unwrap();
        assert_eq!(reduce.instruction, COMBINE_INSTRUCTION);
        assert_eq!(
            reduce.content,
            r#"Answers: ["from first","from second","from third"]"#
        );
        assert_eq!(result.answer, format!("final <{}>", reduce.content));
    }

    #[tokio::test]
    async fn test_no_summaries_still_reduces() {
        let generator = echo_generator();
        let engine = GlobalSearchEngine::new(generator.clone(), 1);

        let result = engine.search("q", &[]).await.unwrap();

        assert_eq!(generator.call_count(), 1);
        assert_eq!(result.answer, "final <Answers: []>");
        assert!(result.community_answers.is_empty());
    }

    #[tokio::test]
    async fn test_map_failure_names_the_answer() {
        let generator = Arc::new(ScriptedGenerator::new(|request| {
            if request.instruction.ends_with("second") {
                Err(GenerationError::Service("connection reset".to_string()))
            } else {
                Ok("ok".to_string())
            }
        }));
        let engine = GlobalSearchEngine::new(generator, 1);

        let err = engine.search("q", &summaries(&["first", "second"])).await.unwrap_err();

        assert!(err.to_string().contains("answer 1"));
        assert_eq!(
            err.downcast_ref::<GenerationError>(),
            Some(&GenerationError::Service("connection reset".to_string()))
        );
    }
}
