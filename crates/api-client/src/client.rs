use std::time::Duration;

use neosnoize_core::{Session, ThumbnailRef};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Typed HTTP client for the Neos session list and asset store.
///
/// Platform asset identifiers (`neosdb:///<file>`) are resolved against the
/// configured asset base URL; plain http(s) thumbnails are fetched as-is.
pub struct NeosClient {
    client: reqwest::Client,
    sessions_url: String,
    assets_url: String,
}

impl NeosClient {
    /// Create a client. `timeout` applies to every request; `None` waits
    /// indefinitely.
    pub fn new(
        sessions_url: &str,
        assets_url: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, ApiError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self::with_client(builder.build()?, sessions_url, assets_url))
    }

    /// Create from an existing `reqwest::Client` (e.g. shared in tests).
    pub fn with_client(client: reqwest::Client, sessions_url: &str, assets_url: &str) -> Self {
        let assets_url = if assets_url.ends_with('/') {
            assets_url.to_string()
        } else {
            format!("{assets_url}/")
        };
        Self {
            client,
            sessions_url: sessions_url.to_string(),
            assets_url,
        }
    }

    pub fn sessions_url(&self) -> &str {
        &self.sessions_url
    }

    pub fn assets_url(&self) -> &str {
        &self.assets_url
    }

    /// GET the active session list.
    pub async fn list_sessions(&self) -> Result<Vec<Session>, ApiError> {
        let resp = self.client.get(&self.sessions_url).send().await?;
        let body = ensure_success(resp).await?.text().await?;
        let sessions: Vec<Session> = serde_json::from_str(&body)?;
        debug!("Fetched {} sessions from {}", sessions.len(), self.sessions_url);
        Ok(sessions)
    }

    /// Map a thumbnail reference to a fetchable URL.
    pub fn resolve_thumbnail(&self, reference: &ThumbnailRef) -> Option<String> {
        match reference {
            ThumbnailRef::Platform { path, .. } => Some(format!("{}{path}", self.assets_url)),
            ThumbnailRef::Remote(url) => Some(url.clone()),
            ThumbnailRef::Empty | ThumbnailRef::Local(_) | ThumbnailRef::Unsupported(_) => None,
        }
    }

    /// GET raw asset bytes.
    pub async fn fetch_asset(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let resp = self.client.get(url).send().await?;
        let bytes = ensure_success(resp).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}

/// Pass 2xx responses through; turn anything else into `ApiError::Status`
/// carrying the body text.
async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let url = resp.url().to_string();
    let body = resp.text().await.unwrap_or_default();
    Err(ApiError::Status {
        url,
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Path, http::StatusCode, routing::get, Json, Router};
    use serde_json::json;

    async fn spawn_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve");
        });
        format!("http://{addr}")
    }

    fn test_router() -> Router {
        Router::new()
            .route(
                "/api/sessions",
                get(|| async {
                    Json(json!([
                        {"sessionId": "S-1", "name": "Hub", "thumbnail": "neosdb:///X.png"},
                        {"sessionId": "S-2", "name": "Quiet"},
                    ]))
                }),
            )
            .route("/api/object", get(|| async { Json(json!({"sessions": []})) }))
            .route(
                "/api/down",
                get(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
            )
            .route(
                "/api/hung",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Json(json!([]))
                }),
            )
            .route(
                "/assets/{name}",
                get(|Path(name): Path<String>| async move { format!("image:{name}").into_bytes() }),
            )
    }

    fn client(base: &str, sessions_path: &str) -> NeosClient {
        NeosClient::new(
            &format!("{base}{sessions_path}"),
            &format!("{base}/assets"),
            Some(Duration::from_secs(5)),
        )
        .expect("client")
    }

    #[test]
    fn resolves_platform_and_remote_references() {
        let api = NeosClient::with_client(
            reqwest::Client::new(),
            "https://api.example.com/api/sessions",
            "https://assets.example.com/assets",
        );
        assert_eq!(api.assets_url(), "https://assets.example.com/assets/");

        let platform = ThumbnailRef::classify(Some("neosdb:///abc.webp"), "thumbnails/");
        assert_eq!(
            api.resolve_thumbnail(&platform).as_deref(),
            Some("https://assets.example.com/assets/abc.webp")
        );

        let remote = ThumbnailRef::classify(Some("https://cdn.example.com/x.jpg"), "thumbnails/");
        assert_eq!(
            api.resolve_thumbnail(&remote).as_deref(),
            Some("https://cdn.example.com/x.jpg")
        );

        let unsupported = ThumbnailRef::classify(Some("ftp://host/x.png"), "thumbnails/");
        assert_eq!(api.resolve_thumbnail(&unsupported), None);
    }

    #[tokio::test]
    async fn lists_sessions_with_passthrough_fields() {
        let base = spawn_server(test_router()).await;
        let sessions = client(&base, "/api/sessions")
            .list_sessions()
            .await
            .expect("list sessions");

        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].id(), Some("S-1"));
        assert_eq!(sessions[0].thumbnail(), Some("neosdb:///X.png"));
        assert_eq!(sessions[1].fields()["name"], "Quiet");
    }

    #[tokio::test]
    async fn non_array_body_is_a_decode_error() {
        let base = spawn_server(test_router()).await;
        let err = client(&base, "/api/object")
            .list_sessions()
            .await
            .expect_err("object body");
        assert!(matches!(err, ApiError::Decode(_)), "unexpected: {err}");
    }

    #[tokio::test]
    async fn error_status_carries_body() {
        let base = spawn_server(test_router()).await;
        let err = client(&base, "/api/down")
            .list_sessions()
            .await
            .expect_err("502");
        match err {
            ApiError::Status { status, body, .. } => {
                assert_eq!(status, 502);
                assert_eq!(body, "upstream down");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn fetches_resolved_asset_bytes() {
        let base = spawn_server(test_router()).await;
        let api = client(&base, "/api/sessions");
        let url = api
            .resolve_thumbnail(&ThumbnailRef::classify(Some("resdb:///X.png"), "thumbnails/"))
            .expect("resolved");

        let bytes = api.fetch_asset(&url).await.expect("fetch asset");
        assert_eq!(bytes, b"image:X.png");
    }

    #[tokio::test]
    async fn missing_asset_is_a_status_error() {
        let base = spawn_server(test_router()).await;
        let err = client(&base, "/api/sessions")
            .fetch_asset(&format!("{base}/nowhere/X.png"))
            .await
            .expect_err("404");
        assert!(matches!(err, ApiError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn hung_endpoint_times_out() {
        let base = spawn_server(test_router()).await;
        let api = NeosClient::new(
            &format!("{base}/api/hung"),
            &format!("{base}/assets"),
            Some(Duration::from_millis(200)),
        )
        .expect("client");

        let started = std::time::Instant::now();
        let err = api.list_sessions().await.expect_err("timeout");
        assert!(started.elapsed() < Duration::from_secs(10));
        match err {
            ApiError::Http(e) => assert!(e.is_timeout(), "not a timeout: {e}"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
