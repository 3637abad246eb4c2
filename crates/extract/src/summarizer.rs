use std::sync::Arc;

use anyhow::{Context, Result};
use futures::{StreamExt, TryStreamExt, stream};
use tracing::debug;

use crate::llm::{self, TextGenerator};
use crate::prompt;
use crate::schema::Object;

/// Asks the service to merge duplicate objects, one batch at a time.
pub struct ObjectSummarizer {
    generator: Arc<dyn TextGenerator>,
    batch_size: usize,
    max_concurrency: usize,
}

impl ObjectSummarizer {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        batch_size: usize,
        max_concurrency: usize,
    ) -> Result<Self> {
        if batch_size == 0 {
            anyhow::bail!("batch_size must be greater than zero");
        }

        Ok(Self {
            generator,
            batch_size,
            max_concurrency: max_concurrency.max(1),
        })
    }

    pub fn render_batch(objects: &[Object]) -> String {
        objects
            .iter()
            .map(Object::describe)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub async fn summarize(&self, objects: &[Object]) -> Result<Vec<Object>> {
        let instruction = prompt::merge_instruction();

        let per_batch: Vec<Vec<Object>> = stream::iter(objects.chunks(self.batch_size).enumerate())
            .map(|(index, batch)| {
                let instruction = &instruction;
                async move {
                    let content = Self::render_batch(batch);
                    let merged = llm::generate_objects(self.generator.as_ref(), instruction, &content)
                        .await
                        .with_context(|| format!("object summarization failed for batch {index}"))?;
                    debug!(batch = index, input = batch.len(), output = merged.len(), "merged batch");
                    Ok::<_, anyhow::Error>(merged)
                }
            })
            .buffered(self.max_concurrency)
            .try_collect()
            .await?;

        Ok(per_batch.into_iter().flatten().collect())
    }
}
