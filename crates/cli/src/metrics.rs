use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Stages of one indexing-and-query run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Chunk,
    Extract,
    Summarize,
    Graph,
    Partition,
    CommunitySummary,
    Query,
}

impl Stage {
    const ALL: [Stage; 7] = [
        Stage::Chunk,
        Stage::Extract,
        Stage::Summarize,
        Stage::Graph,
        Stage::Partition,
        Stage::CommunitySummary,
        Stage::Query,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Default)]
pub struct PipelineMetrics {
    // Timing (in microseconds), indexed by stage
    stage_time_us: [AtomicU64; 7],

    // Counts
    chunks: AtomicUsize,
    objects: AtomicUsize,
    summarised_objects: AtomicUsize,
    communities: AtomicUsize,
    dropped_components: AtomicUsize,
    community_summaries: AtomicUsize,
    answers: AtomicUsize,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_stage(&self, stage: Stage, duration: Duration) {
        self.stage_time_us[stage.index()].fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_chunks(&self, count: usize) {
        self.chunks.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_objects(&self, count: usize) {
        self.objects.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_summarised_objects(&self, count: usize) {
        self.summarised_objects.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_partition(&self, communities: usize, dropped_components: usize) {
        self.communities.fetch_add(communities, Ordering::Relaxed);
        self.dropped_components.fetch_add(dropped_components, Ordering::Relaxed);
    }

    pub fn record_community_summaries(&self, count: usize) {
        self.community_summaries.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_answers(&self, count: usize) {
        self.answers.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let ms = |stage: Stage| self.stage_time_us[stage.index()].load(Ordering::Relaxed) as f64 / 1000.0;

        MetricsSnapshot {
            chunk_time_ms: ms(Stage::Chunk),
            extract_time_ms: ms(Stage::Extract),
            summarize_time_ms: ms(Stage::Summarize),
            graph_time_ms: ms(Stage::Graph),
            partition_time_ms: ms(Stage::Partition),
            community_summary_time_ms: ms(Stage::CommunitySummary),
            query_time_ms: ms(Stage::Query),
            total_time_ms: Stage::ALL.iter().map(|&s| ms(s)).sum(),
            chunks: self.chunks.load(Ordering::Relaxed),
            objects: self.objects.load(Ordering::Relaxed),
            summarised_objects: self.summarised_objects.load(Ordering::Relaxed),
            communities: self.communities.load(Ordering::Relaxed),
            dropped_components: self.dropped_components.load(Ordering::Relaxed),
            community_summaries: self.community_summaries.load(Ordering::Relaxed),
            answers: self.answers.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub chunk_time_ms: f64,
    pub extract_time_ms: f64,
    pub summarize_time_ms: f64,
    pub graph_time_ms: f64,
    pub partition_time_ms: f64,
    pub community_summary_time_ms: f64,
    pub query_time_ms: f64,
    pub total_time_ms: f64,
    pub chunks: usize,
    pub objects: usize,
    pub summarised_objects: usize,
    pub communities: usize,
    pub dropped_components: usize,
    pub community_summaries: usize,
    pub answers: usize,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
