#![allow(dead_code)]

use anyhow::{anyhow, Result};
use neosnoize_core::{Session, ThumbnailRef};
use neosnoize_daemon::cache::ThumbnailCache;
use neosnoize_daemon::snapshot::SnapshotWriter;
use neosnoize_daemon::source::SessionSource;
use neosnoize_daemon::sync::SessionSync;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::watch;

pub const PREFIX: &str = "thumbnails/";
pub const ASSETS: &str = "https://assets.test/assets/";

/// In-memory stand-in for the Neos API.
pub struct FakeSource {
    sessions: Mutex<Result<Vec<Session>, String>>,
    assets: Mutex<HashMap<String, Vec<u8>>>,
    downloads: Mutex<Vec<String>>,
    fetches: AtomicUsize,
    release: Option<watch::Receiver<bool>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(Ok(Vec::new())),
            assets: Mutex::new(HashMap::new()),
            downloads: Mutex::new(Vec::new()),
            fetches: AtomicUsize::new(0),
            release: None,
        }
    }

    /// Every `fetch_sessions` call blocks until the returned sender sends
    /// `true`.
    pub fn held() -> (Self, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        let mut source = Self::new();
        source.release = Some(rx);
        (source, tx)
    }

    pub fn set_sessions(&self, value: Value) {
        let sessions: Vec<Session> = serde_json::from_value(value).expect("session array");
        *self.sessions.lock().unwrap() = Ok(sessions);
    }

    pub fn fail_sessions(&self, message: &str) {
        *self.sessions.lock().unwrap() = Err(message.to_string());
    }

    /// Serve `bytes` for the asset `file` under [`ASSETS`].
    pub fn add_asset(&self, file: &str, bytes: &[u8]) {
        self.add_url(&format!("{ASSETS}{file}"), bytes);
    }

    pub fn add_url(&self, url: &str, bytes: &[u8]) {
        self.assets
            .lock()
            .unwrap()
            .insert(url.to_string(), bytes.to_vec());
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl SessionSource for FakeSource {
    async fn fetch_sessions(&self) -> Result<Vec<Session>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(release) = &self.release {
            let mut release = release.clone();
            let _ = release.wait_for(|open| *open).await;
        }
        let result = self.sessions.lock().unwrap().clone();
        result.map_err(|message| anyhow!(message))
    }

    fn resolve_thumbnail(&self, reference: &ThumbnailRef) -> Option<String> {
        match reference {
            ThumbnailRef::Platform { path, .. } => Some(format!("{ASSETS}{path}")),
            ThumbnailRef::Remote(url) => Some(url.clone()),
            _ => None,
        }
    }

    async fn fetch_thumbnail(&self, url: &str) -> Result<Vec<u8>> {
        self.downloads.lock().unwrap().push(url.to_string());
        let asset = self.assets.lock().unwrap().get(url).cloned();
        asset.ok_or_else(|| anyhow!("connection refused: {url}"))
    }
}

/// A sync wired to a temp install root laid out like the defaults.
pub struct Harness {
    pub dir: TempDir,
    pub source: Arc<FakeSource>,
    pub sync: Arc<SessionSync<FakeSource>>,
}

impl Harness {
    pub fn new(source: FakeSource) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let source = Arc::new(source);
        let sync = Arc::new(SessionSync::new(
            Arc::clone(&source),
            ThumbnailCache::new(dir.path().join("html").join("thumbnails")),
            SnapshotWriter::new(dir.path().join("html").join("sessions.json")),
            PREFIX,
        ));
        Self { dir, source, sync }
    }

    pub fn thumbnail_dir(&self) -> PathBuf {
        self.dir.path().join("html").join("thumbnails")
    }

    pub fn cached_files(&self) -> Vec<String> {
        let mut names: Vec<String> = match std::fs::read_dir(self.thumbnail_dir()) {
            Ok(entries) => entries
                .map(|e| e.unwrap().file_name().into_string().unwrap())
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }

    pub fn snapshot(&self) -> Value {
        let raw = std::fs::read_to_string(self.dir.path().join("html").join("sessions.json"))
            .expect("snapshot written");
        serde_json::from_str(&raw).expect("snapshot is json")
    }

    pub fn snapshot_exists(&self) -> bool {
        self.dir.path().join("html").join("sessions.json").exists()
    }
}
