use anyhow::{Context, Result};
use std::collections::HashSet;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory of cached thumbnail images, one file per cache name.
#[derive(Debug, Clone)]
pub struct ThumbnailCache {
    dir: PathBuf,
}

impl ThumbnailCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Whether `name` is cached as a regular file. Anything else under that
    /// name does not count.
    pub async fn contains(&self, name: &str) -> bool {
        tokio::fs::metadata(self.path_for(name))
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }

    /// Write `bytes` under `name`, creating the directory if needed.
    ///
    /// The data lands in a hidden `.part` file first and is renamed into
    /// place, so a half-written image is never served.
    pub async fn store(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let target = self.path_for(name);
        let partial = self.dir.join(format!(".{name}.part"));
        tokio::fs::write(&partial, bytes)
            .await
            .with_context(|| format!("Failed to write {}", partial.display()))?;
        tokio::fs::rename(&partial, &target)
            .await
            .with_context(|| format!("Failed to move {} into place", target.display()))?;
        Ok(target)
    }

    /// Names of the regular files in the cache. A directory that does not
    /// exist yet holds no files. Names that are not UTF-8 are left out; see
    /// [`Self::evict_except`] for how they are cleaned up.
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .file_names()
            .await?
            .into_iter()
            .filter_map(|name| name.into_string().ok())
            .collect();
        names.sort();
        Ok(names)
    }

    /// Delete every cached file whose name is not in `keep`. Returns the
    /// names that were removed.
    ///
    /// A name that is not UTF-8 can never be in `keep`, so it is always
    /// evicted.
    pub async fn evict_except(&self, keep: &HashSet<String>) -> Result<Vec<String>> {
        let stale = self
            .file_names()
            .await?
            .into_iter()
            .filter(|name| !name.to_str().is_some_and(|name| keep.contains(name)))
            .collect();
        Ok(self.remove_each(stale).await)
    }

    async fn file_names(&self) -> Result<Vec<OsString>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to list {}", self.dir.display()));
            }
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .with_context(|| format!("Failed to list {}", self.dir.display()))?
        {
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if is_file {
                names.push(entry.file_name());
            }
        }
        Ok(names)
    }

    /// Remove each named file. A failed removal is logged and the rest still
    /// go.
    async fn remove_each(&self, names: Vec<OsString>) -> Vec<String> {
        let mut evicted = Vec::new();
        for name in names {
            let path = self.dir.join(&name);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!("Evicted stale thumbnail: {}", path.display());
                    evicted.push(name.to_string_lossy().into_owned());
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to evict {}: {e}", path.display()),
            }
        }
        evicted
    }
}
