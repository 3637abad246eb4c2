use thiserror::Error;

/// Failure of community detection on a single connected component.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PartitionError {
    #[error("component has {0} node(s), detection needs at least two")]
    TooFewNodes(usize),

    #[error("component has no edges between distinct nodes")]
    NoEdges,

    #[error("detected communities do not partition the component: {0}")]
    InvalidPartition(String),

    #[error("community detection failed: {0}")]
    Failed(String),
}
