use std::path::Path;

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub mode: OperationMode,
    pub llm: LlmConfig,
    pub chunking: ChunkingConfig,
    pub summarization: SummarizationConfig,
    pub concurrency: ConcurrencyConfig,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
    pub detection: DetectionConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    Fast,      // Wide fan-out, aggressive caching, short timeouts
    Accurate,  // Always fresh, patient retries
    Balanced,  // Default
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizationConfig {
    pub batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    pub max_concurrent_llm_calls: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub max_iterations: usize,
    pub seed: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: OperationMode::Balanced,
            llm: LlmConfig {
                base_url: "http://localhost:11434".to_string(),
                model: "llama3".to_string(),
                request_timeout_secs: 60,
            },
            chunking: ChunkingConfig {
                chunk_size: 600,
                chunk_overlap: 100,
            },
            summarization: SummarizationConfig { batch_size: 100 },
            concurrency: ConcurrencyConfig {
                max_concurrent_llm_calls: 3,
            },
            retry: RetryConfig {
                max_retries: 3,
                initial_backoff_ms: 1000,
                max_backoff_ms: 10000,
            },
            cache: CacheConfig {
                enabled: true,
                max_entries: 10000,
            },
            detection: DetectionConfig {
                max_iterations: 10,
                seed: 42,
            },
        }
    }
}

impl AppConfig {
    pub fn for_mode(mode: OperationMode) -> Self {
        match mode {
            OperationMode::Fast => Self::fast_mode(),
            OperationMode::Accurate => Self::accurate_mode(),
            OperationMode::Balanced => Self::default(),
        }
    }

    pub fn fast_mode() -> Self {
        let base = Self::default();
        Self {
            mode: OperationMode::Fast,
            llm: LlmConfig {
                request_timeout_secs: 30,
                ..base.llm
            },
            concurrency: ConcurrencyConfig {
                max_concurrent_llm_calls: 10,
            },
            retry: RetryConfig {
                max_retries: 2,
                initial_backoff_ms: 500,
                max_backoff_ms: 5000,
            },
            cache: CacheConfig {
                enabled: true,
                max_entries: 50000,
            },
            ..base
        }
    }

    pub fn accurate_mode() -> Self {
        let base = Self::default();
        Self {
            mode: OperationMode::Accurate,
            llm: LlmConfig {
                request_timeout_secs: 120,
                ..base.llm
            },
            concurrency: ConcurrencyConfig {
                max_concurrent_llm_calls: 2,
            },
            retry: RetryConfig {
                max_retries: 5,
                initial_backoff_ms: 2000,
                max_backoff_ms: 20000,
            },
            cache: CacheConfig {
                enabled: false,
                max_entries: 0,
            },
            detection: DetectionConfig {
                max_iterations: 25,
                ..base.detection
            },
            ..base
        }
    }

    /// Start from the preset for `mode` and overlay whatever keys the JSON
    /// file at `path` sets. Keys the file leaves out keep the preset value.
    pub fn load(mode: OperationMode, path: Option<&Path>) -> Result<Self> {
        let preset = Self::for_mode(mode);
        let Some(path) = path else {
            return Ok(preset);
        };

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let overrides: Value = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        let mut merged = serde_json::to_value(&preset).context("Failed to encode preset config")?;
        merge_json(&mut merged, overrides);

        serde_json::from_value(merged)
            .with_context(|| format!("Invalid config in {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.chunking.chunk_size > 0, "chunk_size must be greater than zero");
        ensure!(
            self.chunking.chunk_overlap < self.chunking.chunk_size,
            "chunk_overlap ({}) must be smaller than chunk_size ({})",
            self.chunking.chunk_overlap,
            self.chunking.chunk_size
        );
        ensure!(self.summarization.batch_size >= 1, "batch_size must be at least 1");
        ensure!(
            self.concurrency.max_concurrent_llm_calls >= 1,
            "max_concurrent_llm_calls must be at least 1"
        );
        ensure!(
            self.retry.initial_backoff_ms <= self.retry.max_backoff_ms,
            "initial_backoff_ms must not exceed max_backoff_ms"
        );
        Ok(())
    }
}

fn merge_json(base: &mut Value, overrides: Value) {
    match (base, overrides) {
        (Value::Object(base), Value::Object(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}
