use anyhow::{Context, Result};
use neosnoize_core::Session;
use std::path::{Path, PathBuf};

/// Writes the rewritten session list consumed by the browser UI.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    path: PathBuf,
}

impl SnapshotWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the snapshot with `sessions` as a compact JSON array.
    ///
    /// Goes through a temp file in the same directory and a rename, so
    /// readers see either the old or the new list.
    pub async fn write(&self, sessions: &[Session]) -> Result<()> {
        let body = serde_json::to_vec(sessions).context("Failed to serialize session snapshot")?;

        let file_name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Invalid snapshot path: {}", self.path.display()))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let temp = self.path.with_file_name(format!(".{file_name}.tmp"));
        tokio::fs::write(&temp, &body)
            .await
            .with_context(|| format!("Failed to write {}", temp.display()))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}
