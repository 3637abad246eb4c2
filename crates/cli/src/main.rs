use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{AppConfig, OperationMode, Pipeline};
use ingest::FileReader;
use tracing::{Instrument, info, info_span};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use uuid::Uuid;

const DEFAULT_QUERY: &str = "What are the top themes in this text?";

#[derive(Parser, Debug)]
#[command(author, version, about = "Index a text corpus into a community graph and answer a global query")]
struct Args {
    /// Directory of .txt/.md documents
    #[arg(default_value = "input", env = "GRAPHRAG_INPUT")]
    input: PathBuf,

    /// Question answered over the community summaries
    #[arg(short, long, default_value = DEFAULT_QUERY)]
    query: String,

    /// JSON config file layered over the preset
    #[arg(short, long, env = "GRAPHRAG_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OperationMode::Balanced, env = "GRAPHRAG_MODE")]
    mode: OperationMode,

    /// Where objects.jsonl and summarised_objects.jsonl are written
    #[arg(long, default_value = ".", env = "GRAPHRAG_ARTIFACT_DIR")]
    artifact_dir: PathBuf,

    #[arg(long, env = "OLLAMA_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "OLLAMA_MODEL")]
    model: Option<String>,

    /// Tokens per chunk
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Tokens shared by consecutive chunks
    #[arg(long)]
    chunk_overlap: Option<usize>,

    /// Objects per summarization request
    #[arg(long)]
    batch_size: Option<usize>,

    #[arg(long, env = "GRAPHRAG_MAX_CONCURRENCY")]
    max_concurrency: Option<usize>,

    /// Disable the response cache
    #[arg(long)]
    no_cache: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(url) = &self.base_url {
            config.llm.base_url = url.clone();
        }
        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
        if let Some(size) = self.chunk_size {
            config.chunking.chunk_size = size;
        }
        if let Some(overlap) = self.chunk_overlap {
            config.chunking.chunk_overlap = overlap;
        }
        if let Some(batch) = self.batch_size {
            config.summarization.batch_size = batch;
        }
        if let Some(width) = self.max_concurrency {
            config.concurrency.max_concurrent_llm_calls = width;
        }
        if self.no_cache {
            config.cache.enabled = false;
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries progress counts and the answer
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(args.log_json);

    let mut config = AppConfig::load(args.mode, args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    let run_id = Uuid::new_v4();
    let span = info_span!("run", %run_id);

    info!(parent: &span, mode = ?config.mode, model = %config.llm.model, input = ?args.input, "starting run");

    let documents = FileReader::read_directory(&args.input)
        .await
        .with_context(|| format!("Failed to read corpus from {:?}", args.input))?;
    info!(parent: &span, documents = documents.len(), "corpus loaded");

    let pipeline = Pipeline::from_config(config, args.artifact_dir.clone())?;
    let report = pipeline
        .run(&documents, &args.query)
        .instrument(span.clone())
        .await?;

    println!("{}", report.answer);

    let snapshot = pipeline.metrics().snapshot();
    info!(
        parent: &span,
        metrics = %serde_json::to_string(&snapshot)?,
        "run complete"
    );

    Ok(())
}
