use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use extract::{GenerationError, GenerationRequest, TextGenerator};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Memoizes successful responses of the wrapped generator by request.
pub struct CachedGenerator {
    inner: Arc<dyn TextGenerator>,
    responses: DashMap<String, String>,
    max_entries: usize,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: usize,
    pub misses: usize,
}

impl CachedGenerator {
    pub fn new(inner: Arc<dyn TextGenerator>, max_entries: usize) -> Self {
        Self {
            inner,
            responses: DashMap::new(),
            max_entries: max_entries.max(1),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    fn cache_key(request: &GenerationRequest) -> String {
        let mut hasher = Sha256::new();
        hasher.update(request.shape.to_string().as_bytes());
        hasher.update([0]);
        hasher.update(request.instruction.as_bytes());
        hasher.update([0]);
        hasher.update(request.content.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn store(&self, key: String, response: String) {
        if self.responses.len() >= self.max_entries {
            // Simple eviction: clear 25% when full
            let to_remove: Vec<_> = self
                .responses
                .iter()
                .take((self.max_entries / 4).max(1))
                .map(|r| r.key().clone())
                .collect();
            for key in to_remove {
                self.responses.remove(&key);
            }
        }
        self.responses.insert(key, response);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.responses.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl TextGenerator for CachedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let key = Self::cache_key(request);
        if let Some(cached) = self.responses.get(&key).map(|r| r.value().clone()) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(shape = %request.shape, "response cache hit");
            return Ok(cached);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let response = self.inner.generate(request).await?;
        self.store(key, response.clone());
        Ok(response)
    }
}
