pub mod builder;
pub mod graph;
pub mod jsonl;

pub use builder::build_graph;
pub use graph::{EdgeAttributes, EdgeView, GraphStats, KnowledgeGraph};
pub use jsonl::write_payloads;
