use thiserror::Error;

use crate::llm::ResponseShape;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    /// The service answered, but not in the requested shape.
    #[error("response does not match the {shape} shape: {reason}")]
    SchemaViolation { shape: ResponseShape, reason: String },

    /// Transport, auth or rate-limit failure from the service.
    #[error("text generation service error: {0}")]
    Service(String),
}

impl GenerationError {
    pub fn schema(shape: ResponseShape, reason: impl Into<String>) -> Self {
        Self::SchemaViolation {
            shape,
            reason: reason.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Service(_))
    }
}
