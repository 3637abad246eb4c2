pub mod chunk;
pub mod chunker;
pub mod reader;
pub mod tokenizer;

pub use chunk::Chunk;
pub use chunker::{Chunker, ChunkerConfig};
pub use reader::{Document, FileReader};
pub use tokenizer::{TiktokenTokenizer, Tokenizer};

use sha2::{Digest, Sha256};

/// Generate a stable document ID from file path
pub fn generate_doc_id(path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..16])
}
