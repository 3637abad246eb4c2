use anyhow::{Context, Result};
use extract::Object;
use std::path::Path;
use tokio::fs;

/// Write one JSON payload per line, replacing any previous file.
/// The entity/relationship tag is not written.
pub async fn write_payloads(path: &Path, objects: &[Object]) -> Result<()> {
    let mut buffer = String::new();

    for object in objects {
        let payload = object
            .payload_json()
            .context("Failed to serialize object payload")?;
        buffer.push_str(&serde_json::to_string(&payload)?);
        buffer.push('\n');
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .await
                .context(format!("Failed to create {:?}", parent))?;
        }
    }

    fs::write(path, buffer)
        .await
        .context(format!("Failed to write {:?}", path))?;

    Ok(())
}
