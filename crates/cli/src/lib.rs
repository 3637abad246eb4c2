pub mod cache;
pub mod config;
pub mod metrics;
pub mod pipeline;
pub mod retry;

pub use config::{AppConfig, OperationMode};
pub use pipeline::{Pipeline, RunReport};
