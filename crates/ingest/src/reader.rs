use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use walkdir::WalkDir;

use crate::generate_doc_id;

/// One source file of the corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub doc_id: String,
    pub source: String,
    pub text: String,
}

impl Document {
    pub fn new(source: String, text: String) -> Self {
        Self {
            doc_id: generate_doc_id(&source),
            source,
            text,
        }
    }
}

pub struct FileReader;

impl FileReader {
    pub async fn read_file(path: &Path) -> Result<String> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        match extension {
            "txt" | "md" => {
                let content = fs::read_to_string(path)
                    .await
                    .context(format!("Failed to read file: {:?}", path))?;
                Ok(content)
            }
            _ => anyhow::bail!("Unsupported file format: {}", extension),
        }
    }

    /// Read every top-level text file in `dir`, ordered by file name.
    pub async fn read_directory(dir: &Path) -> Result<Vec<Document>> {
        let mut documents = Vec::new();

        let walker = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry.with_context(|| format!("Failed to list {:?}", dir))?;
            let path = entry.path();

            if !entry.file_type().is_file() {
                continue;
            }

            if let Some(ext) = path.extension() {
                if ext == "txt" || ext == "md" {
                    let content = Self::read_file(path).await?;
                    let path_str = path.to_string_lossy().to_string();
                    documents.push(Document::new(path_str, content));
                }
            }
        }

        Ok(documents)
    }
}
