pub mod error;
pub mod llm;
pub mod prompt;
pub mod schema;
pub mod summarizer;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::GenerationError;
pub use llm::{GenerationRequest, OllamaClient, ResponseShape, TextGenerator};
pub use schema::{Entity, Object, Relationship};
pub use summarizer::ObjectSummarizer;

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::{StreamExt, TryStreamExt, stream};
use tracing::debug;

pub struct Extractor {
    generator: Arc<dyn TextGenerator>,
    max_concurrency: usize,
}

impl Extractor {
    pub fn new(generator: Arc<dyn TextGenerator>, max_concurrency: usize) -> Self {
        Self {
            generator,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Extract entities and relationships from a chunk of text
    pub async fn extract_from_text(&self, text: &str) -> Result<Vec<Object>, GenerationError> {
        let instruction = prompt::extraction_instruction();
        llm::generate_objects(self.generator.as_ref(), &instruction, text).await
    }

    /// Extract from every chunk, keeping chunk order and response order
    /// within each chunk. The first failing chunk aborts the whole stage.
    pub async fn extract_chunks<T: AsRef<str> + Sync>(&self, chunks: &[T]) -> Result<Vec<Object>> {
        let per_chunk: Vec<Vec<Object>> = stream::iter(chunks.iter().enumerate())
            .map(|(index, chunk)| async move {
                let objects = self
                    .extract_from_text(chunk.as_ref())
                    .await
                    .with_context(|| format!("object extraction failed for chunk {index}"))?;
                debug!(chunk = index, objects = objects.len(), "extracted objects");
                Ok::<_, anyhow::Error>(objects)
            })
            .buffered(self.max_concurrency)
            .try_collect()
            .await?;

        Ok(per_chunk.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedGenerator;

    fn entity_json(name: &str) -> String {
        format!(r#"{{"type": "entity", "object": {{"name": "{name}", "type": "person", "description": null}}}}"#)
    }

    #[tokio::test]
    async fn test_appends_objects_in_chunk_order_without_dedup() {
        let generator = Arc::new(ScriptedGenerator::new(|request| {
            let body = match request.content.as_str() {
                "first" => format!("[{}, {}]", entity_json("Alice"), entity_json("Bob")),
                _ => format!("[{}]", entity_json("Alice")),
            };
            Ok(body)
        }));
        let extractor = Extractor::new(generator.clone(), 4);

        let objects = extractor.extract_chunks(&["first", "second"]).await.unwrap();

        let names: Vec<&str> = objects
            .iter()
            .map(|o| match o {
                Object::Entity(e) => e.name.as_str(),
                Object::Relationship(_) => "rel",
            })
            .collect();
        assert_eq!(names, vec!["Alice", "Bob", "Alice"]);
        assert_eq!(generator.call_count(), 2);
        assert!(generator.requests().iter().all(|r| r.shape == ResponseShape::Objects));
    }

    #[tokio::test]
    async fn test_malformed_response_fails_with_chunk_index() {
        let generator = Arc::new(ScriptedGenerator::new(|request| {
            if request.content == "bad" {
                Ok("definitely not json".to_string())
            } else {
                Ok("[]".to_string())
            }
        }));
        let extractor = Extractor::new(generator, 1);

        let err = extractor
            .extract_chunks(&["ok", "bad", "ok"])
            .await
            .unwrap_err();

        assert!(err.to_string().contains("chunk 1"));
        assert!(matches!(
            err.downcast_ref::<GenerationError>(),
            Some(GenerationError::SchemaViolation { .. })
        ));
    }

    #[tokio::test]
    async fn test_service_error_propagates() {
        let generator = Arc::new(ScriptedGenerator::new(|_| {
            Err(GenerationError::Service("rate limited".to_string()))
        }));
        let extractor = Extractor::new(generator, 2);

        let err = extractor.extract_chunks(&["text"]).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GenerationError>(),
            Some(GenerationError::Service(_))
        ));
    }
}
