use anyhow::Result;
use neosnoize_api_client::NeosClient;
use neosnoize_core::{Session, ThumbnailRef};
use std::future::Future;

/// Where the sync loop gets sessions and thumbnail bytes from.
pub trait SessionSource: Send + Sync + 'static {
    fn fetch_sessions(&self) -> impl Future<Output = Result<Vec<Session>>> + Send;

    /// Turn a thumbnail reference into a fetchable URL, `None` if it cannot
    /// be fetched.
    fn resolve_thumbnail(&self, reference: &ThumbnailRef) -> Option<String>;

    fn fetch_thumbnail(&self, url: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

impl SessionSource for NeosClient {
    async fn fetch_sessions(&self) -> Result<Vec<Session>> {
        Ok(self.list_sessions().await?)
    }

    fn resolve_thumbnail(&self, reference: &ThumbnailRef) -> Option<String> {
        NeosClient::resolve_thumbnail(self, reference)
    }

    async fn fetch_thumbnail(&self, url: &str) -> Result<Vec<u8>> {
        Ok(self.fetch_asset(url).await?)
    }
}
