use anyhow::{Context, Result};
use neosnoize_core::thumbnail::{plan_thumbnail, rewrite_sessions};
use neosnoize_core::{Session, ThumbnailPlan};
use neosnoize_runtime_config::{NeosNoizeConfig, RuntimePaths};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::cache::ThumbnailCache;
use crate::snapshot::SnapshotWriter;
use crate::source::SessionSource;

/// Outcome of one sync cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub sessions: usize,
    /// Distinct cache files the current list references.
    pub thumbnails: usize,
    pub downloaded: usize,
    pub failed: usize,
    pub evicted: usize,
}

impl CycleReport {
    pub fn changed_cache(&self) -> bool {
        self.downloaded > 0 || self.failed > 0 || self.evicted > 0
    }
}

#[derive(Debug, Clone)]
struct DownloadTarget {
    url: String,
    session_id: String,
}

/// One sync cycle: fetch, resolve, download, evict, persist.
pub struct SessionSync<S> {
    source: Arc<S>,
    cache: ThumbnailCache,
    snapshot: SnapshotWriter,
    local_prefix: String,
}

impl<S: SessionSource> SessionSync<S> {
    pub fn new(
        source: Arc<S>,
        cache: ThumbnailCache,
        snapshot: SnapshotWriter,
        local_prefix: impl Into<String>,
    ) -> Self {
        Self {
            source,
            cache,
            snapshot,
            local_prefix: local_prefix.into(),
        }
    }

    pub fn from_config(source: Arc<S>, config: &NeosNoizeConfig, paths: &RuntimePaths) -> Self {
        Self::new(
            source,
            ThumbnailCache::new(&paths.thumbnail_dir),
            SnapshotWriter::new(&paths.sessions_file),
            config.thumbnail_url.clone(),
        )
    }

    pub fn cache(&self) -> &ThumbnailCache {
        &self.cache
    }

    pub fn snapshot(&self) -> &SnapshotWriter {
        &self.snapshot
    }

    /// Run a full cycle.
    ///
    /// A failed fetch returns early and leaves the cache and snapshot alone.
    /// Every download settles before the snapshot is written; a failed
    /// download is logged and its session still points at the local path.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let sessions = self
            .source
            .fetch_sessions()
            .await
            .context("Failed to fetch session list")?;

        let plans = self.plan(&sessions);
        let targets = download_targets(&sessions, &plans);

        let (downloaded, failed) = self.download_missing(&targets).await;

        // Same names the downloads used, so nothing just fetched is evicted.
        let keep: HashSet<String> = targets.keys().cloned().collect();
        let evicted = match self.cache.evict_except(&keep).await {
            Ok(evicted) => evicted.len(),
            Err(e) => {
                warn!("Thumbnail eviction failed: {e:#}");
                0
            }
        };

        let rewritten = rewrite_sessions(&sessions, &plans, &self.local_prefix);
        self.snapshot.write(&rewritten).await?;

        Ok(CycleReport {
            sessions: sessions.len(),
            thumbnails: targets.len(),
            downloaded,
            failed,
            evicted,
        })
    }

    fn plan(&self, sessions: &[Session]) -> Vec<Option<ThumbnailPlan>> {
        sessions
            .iter()
            .map(|session| {
                let plan = plan_thumbnail(session, &self.local_prefix, |reference| {
                    self.source.resolve_thumbnail(reference)
                });
                if let Some(plan) = plan.as_ref().filter(|p| p.download().is_none()) {
                    warn!(
                        "Session {}: thumbnail '{}' cannot be cached, dropping it",
                        session.log_id(),
                        plan.original
                    );
                }
                plan
            })
            .collect()
    }

    async fn download_missing(&self, targets: &BTreeMap<String, DownloadTarget>) -> (usize, usize) {
        let mut tasks = JoinSet::new();
        for (name, target) in targets {
            if self.cache.contains(name).await {
                continue;
            }
            let source = Arc::clone(&self.source);
            let cache = self.cache.clone();
            let name = name.clone();
            let target = target.clone();
            tasks.spawn(async move {
                let result = fetch_and_store(source.as_ref(), &cache, &name, &target.url).await;
                (name, target, result)
            });
        }

        let mut downloaded = 0;
        let mut failed = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, _, Ok(path))) => {
                    debug!("Cached thumbnail {name}: {}", path.display());
                    downloaded += 1;
                }
                Ok((name, target, Err(e))) => {
                    warn!(
                        "Session {}: failed to cache thumbnail {name} from {}: {e:#}",
                        target.session_id, target.url
                    );
                    failed += 1;
                }
                Err(e) => {
                    warn!("Thumbnail download task failed: {e}");
                    failed += 1;
                }
            }
        }
        (downloaded, failed)
    }
}

async fn fetch_and_store<S: SessionSource>(
    source: &S,
    cache: &ThumbnailCache,
    name: &str,
    url: &str,
) -> Result<PathBuf> {
    let bytes = source.fetch_thumbnail(url).await?;
    cache.store(name, &bytes).await
}

/// Cache name to download source. Sessions sharing a name collapse into one
/// entry; the later session wins.
fn download_targets(
    sessions: &[Session],
    plans: &[Option<ThumbnailPlan>],
) -> BTreeMap<String, DownloadTarget> {
    let mut targets = BTreeMap::new();
    for (session, plan) in sessions.iter().zip(plans) {
        if let Some((name, url)) = plan.as_ref().and_then(ThumbnailPlan::download) {
            targets.insert(
                name.to_string(),
                DownloadTarget {
                    url: url.to_string(),
                    session_id: session.log_id().to_string(),
                },
            );
        }
    }
    targets
}
