use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub doc_id: String,
    pub chunk_id: String,
    pub text: String,
    pub source: String,
    /// Position of this chunk within its document
    pub order: usize,
    pub token_span: (usize, usize), // [start, end) token positions
}

impl Chunk {
    pub fn new(
        doc_id: String,
        text: String,
        source: String,
        order: usize,
        token_span: (usize, usize),
    ) -> Self {
        // Generate stable chunk_id from content
        let chunk_id = Self::generate_chunk_id(&doc_id, &text, token_span);

        Self {
            doc_id,
            chunk_id,
            text,
            source,
            order,
            token_span,
        }
    }

    fn generate_chunk_id(doc_id: &str, text: &str, span: (usize, usize)) -> String {
        let mut hasher = Sha256::new();
        hasher.update(doc_id.as_bytes());
        hasher.update(text.as_bytes());
        hasher.update(span.0.to_string().as_bytes());
        hasher.update(span.1.to_string().as_bytes());
        let result = hasher.finalize();
        hex::encode(&result[..16]) // Use first 16 bytes (32 hex chars)
    }

    pub fn token_count(&self) -> usize {
        self.token_span.1 - self.token_span.0
    }
}
