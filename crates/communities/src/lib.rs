pub mod error;
pub mod louvain;
pub mod partition;
pub mod summarizer;

pub use error::PartitionError;
pub use louvain::{LouvainConfig, LouvainDetector};
pub use partition::{Community, CommunityDetector, Partition, partition_graph};
pub use summarizer::{CommunitySummarizer, CommunitySummary};
