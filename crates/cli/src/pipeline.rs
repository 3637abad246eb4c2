use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use communities::{CommunityDetector, CommunitySummarizer, LouvainConfig, LouvainDetector};
use extract::{Extractor, ObjectSummarizer, OllamaClient, TextGenerator};
use index::GraphStats;
use ingest::{Chunker, ChunkerConfig, Document, TiktokenTokenizer, Tokenizer};
use query::GlobalSearchEngine;
use serde::Serialize;
use tracing::{Instrument, info, info_span};

use crate::cache::CachedGenerator;
use crate::config::AppConfig;
use crate::metrics::{PipelineMetrics, Stage, TimedOperation};
use crate::retry::{RetryPolicy, RetryingGenerator};

pub const OBJECTS_FILE: &str = "objects.jsonl";
pub const SUMMARISED_OBJECTS_FILE: &str = "summarised_objects.jsonl";

/// Every intermediate count of one run plus the global answer.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub chunks: usize,
    pub objects: usize,
    pub summarised_objects: usize,
    pub graph: GraphStats,
    pub communities: usize,
    pub dropped_components: usize,
    pub community_summaries: usize,
    pub answer: String,
}

pub struct Pipeline {
    config: AppConfig,
    generator: Arc<dyn TextGenerator>,
    tokenizer: Arc<dyn Tokenizer>,
    detector: Box<dyn CommunityDetector>,
    artifact_dir: PathBuf,
    metrics: PipelineMetrics,
}

impl Pipeline {
    pub fn new(
        config: AppConfig,
        generator: Arc<dyn TextGenerator>,
        tokenizer: Arc<dyn Tokenizer>,
        detector: Box<dyn CommunityDetector>,
        artifact_dir: PathBuf,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            generator,
            tokenizer,
            detector,
            artifact_dir,
            metrics: PipelineMetrics::new(),
        })
    }

    /// Wire the production collaborators described by `config`: the Ollama
    /// client behind retry and (optionally) cache layers, the tiktoken
    /// tokenizer and the Louvain detector.
    pub fn from_config(config: AppConfig, artifact_dir: PathBuf) -> Result<Self> {
        let client = OllamaClient::new(
            config.llm.base_url.clone(),
            config.llm.model.clone(),
            Duration::from_secs(config.llm.request_timeout_secs),
        )?;
        let generator = layer_generator(Arc::new(client), &config);

        let tokenizer = Arc::new(TiktokenTokenizer::new()?);
        let detector = Box::new(LouvainDetector::new(LouvainConfig {
            max_iterations: config.detection.max_iterations,
            seed: config.detection.seed,
        }));

        Self::new(config, generator, tokenizer, detector, artifact_dir)
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub async fn run(&self, documents: &[Document], query: &str) -> Result<RunReport> {
        let concurrency = self.config.concurrency.max_concurrent_llm_calls;

        // Source documents -> text chunks
        let timer = TimedOperation::start();
        let chunker = Chunker::new(
            ChunkerConfig {
                chunk_size: self.config.chunking.chunk_size,
                overlap_tokens: self.config.chunking.chunk_overlap,
            },
            self.tokenizer.clone(),
        )?;
        let chunks = chunker.chunk_documents(documents)?;
        self.metrics.record_stage(Stage::Chunk, timer.elapsed());
        self.metrics.record_chunks(chunks.len());
        println!("Texts chunked in {} chunks.", chunks.len());

        // Text chunks -> element instances
        let timer = TimedOperation::start();
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let objects = Extractor::new(self.generator.clone(), concurrency)
            .extract_chunks(&texts)
            .instrument(info_span!("extract", chunks = texts.len()))
            .await?;
        index::write_payloads(&self.artifact_dir.join(OBJECTS_FILE), &objects).await?;
        self.metrics.record_stage(Stage::Extract, timer.elapsed());
        self.metrics.record_objects(objects.len());
        println!("{} objects found.", objects.len());

        // Element instances -> element summaries
        let timer = TimedOperation::start();
        let summarised = ObjectSummarizer::new(
            self.generator.clone(),
            self.config.summarization.batch_size,
            concurrency,
        )?
        .summarize(&objects)
        .instrument(info_span!("summarize", objects = objects.len()))
        .await?;
        index::write_payloads(&self.artifact_dir.join(SUMMARISED_OBJECTS_FILE), &summarised).await?;
        self.metrics.record_stage(Stage::Summarize, timer.elapsed());
        self.metrics.record_summarised_objects(summarised.len());
        println!("{} summarised objects found.", summarised.len());

        // Element summaries -> graph communities
        let timer = TimedOperation::start();
        let graph = index::build_graph(&summarised);
        let stats = graph.stats();
        info!(
            nodes = stats.node_count,
            edges = stats.edge_count,
            components = stats.component_count,
            "graph built"
        );
        self.metrics.record_stage(Stage::Graph, timer.elapsed());

        let timer = TimedOperation::start();
        let partition = communities::partition_graph(&graph, self.detector.as_ref());
        self.metrics.record_stage(Stage::Partition, timer.elapsed());
        self.metrics
            .record_partition(partition.communities.len(), partition.dropped_components);
        println!("{} communities found.", partition.communities.len());

        // Graph communities -> community summaries
        let timer = TimedOperation::start();
        let community_summaries = CommunitySummarizer::new(self.generator.clone(), concurrency)
            .summarize_all(&partition.communities, &graph)
            .instrument(info_span!("community_summary", communities = partition.communities.len()))
            .await?;
        self.metrics.record_stage(Stage::CommunitySummary, timer.elapsed());
        self.metrics.record_community_summaries(community_summaries.len());
        println!("{} community summaries generated.", community_summaries.len());

        // Community summaries -> community answers -> global answer
        let timer = TimedOperation::start();
        let result = GlobalSearchEngine::new(self.generator.clone(), concurrency)
            .search(query, &community_summaries)
            .instrument(info_span!("query"))
            .await?;
        self.metrics.record_stage(Stage::Query, timer.elapsed());
        self.metrics.record_answers(result.community_answers.len());

        Ok(RunReport {
            chunks: chunks.len(),
            objects: objects.len(),
            summarised_objects: summarised.len(),
            graph: stats,
            communities: partition.communities.len(),
            dropped_components: partition.dropped_components,
            community_summaries: community_summaries.len(),
            answer: result.answer,
        })
    }
}

/// Client, then retry, then the optional response cache on the outside.
fn layer_generator(client: Arc<dyn TextGenerator>, config: &AppConfig) -> Arc<dyn TextGenerator> {
    let retrying: Arc<dyn TextGenerator> = Arc::new(RetryingGenerator::new(
        client,
        RetryPolicy::from_config(&config.retry),
    ));

    if config.cache.enabled {
        Arc::new(CachedGenerator::new(retrying, config.cache.max_entries))
    } else {
        retrying
    }
}
