use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use crate::chunk::Chunk;
use crate::reader::Document;
use crate::tokenizer::Tokenizer;

#[derive(Debug, Clone, Copy)]
pub struct ChunkerConfig {
    pub chunk_size: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 600,
            overlap_tokens: 100,
        }
    }
}

impl ChunkerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            anyhow::bail!("chunk_size must be greater than zero");
        }
        if self.overlap_tokens >= self.chunk_size {
            anyhow::bail!(
                "overlap_tokens ({}) must be smaller than chunk_size ({})",
                self.overlap_tokens,
                self.chunk_size
            );
        }
        Ok(())
    }

    fn stride(&self) -> usize {
        self.chunk_size - self.overlap_tokens
    }
}

/// Splits documents into fixed-width token windows that overlap by
/// `overlap_tokens`. Chunks never span two documents.
pub struct Chunker {
    config: ChunkerConfig,
    tokenizer: Arc<dyn Tokenizer>,
}

impl Chunker {
    pub fn new(config: ChunkerConfig, tokenizer: Arc<dyn Tokenizer>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, tokenizer })
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    pub fn chunk_text(&self, doc_id: &str, text: &str, source: &str) -> Result<Vec<Chunk>> {
        let tokens = self.tokenizer.encode(text);
        let mut chunks = Vec::new();

        if tokens.is_empty() {
            debug!(source, "document has no tokens, skipping");
            return Ok(chunks);
        }

        let stride = self.config.stride();
        let mut start = 0usize;

        loop {
            let end = (start + self.config.chunk_size).min(tokens.len());
            let window = self
                .tokenizer
                .decode(&tokens[start..end])
                .with_context(|| format!("Failed to decode tokens {start}..{end} of {source}"))?;

            chunks.push(Chunk::new(
                doc_id.to_string(),
                window,
                source.to_string(),
                chunks.len(),
                (start, end),
            ));

            // The window that reaches the end of the document is the last one
            if end == tokens.len() {
                break;
            }
            start += stride;
        }

        Ok(chunks)
    }

    /// Chunk every document in order and flatten the result.
    pub fn chunk_documents(&self, documents: &[Document]) -> Result<Vec<Chunk>> {
        let mut all_chunks = Vec::new();

        for document in documents {
            let chunks = self.chunk_text(&document.doc_id, &document.text, &document.source)?;
            debug!(source = %document.source, chunks = chunks.len(), "chunked document");
            all_chunks.extend(chunks);
        }

        Ok(all_chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::TiktokenTokenizer;

    /// One token per character, so token arithmetic is easy to check by hand.
    struct CharTokenizer;

    impl Tokenizer for CharTokenizer {
        fn encode(&self, text: &str) -> Vec<u32> {
            text.chars().map(|c| c as u32).collect()
        }

        fn decode(&self, tokens: &[u32]) -> Result<String> {
            tokens
                .iter()
                .map(|&t| char::from_u32(t).context("invalid char token"))
                .collect()
        }
    }

    fn char_chunker(size: usize, overlap: usize) -> Chunker {
        Chunker::new(
            ChunkerConfig {
                chunk_size: size,
                overlap_tokens: overlap,
            },
            Arc::new(CharTokenizer),
        )
        .unwrap()
    }

    fn expected_count(n: usize, size: usize, overlap: usize) -> usize {
        let numerator = n.saturating_sub(overlap).max(1);
        numerator.div_ceil(size - overlap)
    }

    #[test]
    fn test_rejects_overlap_not_smaller_than_size() {
        let config = ChunkerConfig {
            chunk_size: 10,
            overlap_tokens: 10,
        };
        assert!(Chunker::new(config, Arc::new(CharTokenizer)).is_err());
    }

    #[test]
    fn test_short_document_yields_one_chunk() {
        let chunker = char_chunker(600, 100);
        let chunks = chunker.chunk_text("doc", "short text", "a.txt").unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "short text");
        assert_eq!(chunks[0].token_span, (0, 10));
    }

    #[test]
    fn test_empty_document_yields_no_chunks() {
        let chunker = char_chunker(10, 2);
        assert!(chunker.chunk_text("doc", "", "a.txt").unwrap().is_empty());
    }

    #[test]
    fn test_chunk_count_matches_window_formula() {
        let (size, overlap) = (10, 3);
        let chunker = char_chunker(size, overlap);

        for n in 1..60 {
            let text: String = "abcdefghij".chars().cycle().take(n).collect();
            let chunks = chunker.chunk_text("doc", &text, "a.txt").unwrap();
            assert_eq!(chunks.len(), expected_count(n, size, overlap), "n = {n}");
            assert!(chunks.iter().all(|c| c.token_count() <= size));
        }
    }

    #[test]
    fn test_windows_cover_and_reconstruct_text() {
        let (size, overlap) = (8, 3);
        let chunker = char_chunker(size, overlap);
        let text = "The quick brown fox jumps over the lazy dog";
        let chunks = chunker.chunk_text("doc", text, "a.txt").unwrap();

        // Every token position lies inside some window
        let n = text.chars().count();
        for pos in 0..n {
            assert!(chunks.iter().any(|c| c.token_span.0 <= pos && pos < c.token_span.1));
        }

        // Non-overlapping prefixes rebuild the original
        let stride = size - overlap;
        let mut rebuilt = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i + 1 == chunks.len() {
                rebuilt.push_str(&chunk.text);
            } else {
                rebuilt.extend(chunk.text.chars().take(stride));
            }
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_documents_are_never_merged() {
        let chunker = char_chunker(100, 10);
        let documents = vec![
            Document::new("a.txt".to_string(), "first".to_string()),
            Document::new("b.txt".to_string(), "second".to_string()),
        ];

        let chunks = chunker.chunk_documents(&documents).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "first");
        assert_eq!(chunks[1].text, "second");
        assert_ne!(chunks[0].doc_id, chunks[1].doc_id);
    }

    #[test]
    fn test_chunking_is_deterministic() {
        let chunker = char_chunker(7, 2);
        let text = "deterministic chunking please";
        let first = chunker.chunk_text("doc", text, "a.txt").unwrap();
        let second = chunker.chunk_text("doc", text, "a.txt").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_tiktoken_chunking_round_trips() {
        let chunker = Chunker::new(
            ChunkerConfig {
                chunk_size: 6,
                overlap_tokens: 2,
            },
            Arc::new(TiktokenTokenizer::new().unwrap()),
        )
        .unwrap();
        let text = "Alice works at Acme. Bob is Alice's manager at Acme.";
        let chunks = chunker.chunk_text("doc", text, "a.txt").unwrap();

        assert!(chunks.len() > 1);
        assert_eq!(chunks[0].token_span.0, 0);
        assert_eq!(chunks[1].token_span.0, 4);
        assert!(text.starts_with(&chunks[0].text));
        assert!(text.ends_with(&chunks.last().unwrap().text));
    }

    #[test]
    fn test_tiktoken_windows_may_split_multibyte_characters() {
        let tokenizer = Arc::new(TiktokenTokenizer::new().unwrap());
        let text = "🦀🧬𝔘𝔫𝔦𝔠𝔬𝔡𝔢 鑫龘齉 graph 🜁🜂🜃🜄";
        let n = tokenizer.encode(text).len();

        for size in 2..=7 {
            let chunker = Chunker::new(
                ChunkerConfig {
                    chunk_size: size,
                    overlap_tokens: 1,
                },
                tokenizer.clone(),
            )
            .unwrap();

            let chunks = chunker.chunk_text("doc", text, "a.txt").unwrap();

            assert_eq!(chunks.len(), expected_count(n, size, 1), "size {size}");
            assert_eq!(chunks.last().unwrap().token_span.1, n, "size {size}");
            assert!(chunks.iter().any(|c| c.text.contains("graph")), "size {size}");
        }
    }
}
