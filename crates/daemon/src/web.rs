use anyhow::{Context, Result};
use axum::Router;
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Static files from `web_root`; any path that is not a file gets
/// `index.html`.
pub fn router(web_root: &Path) -> Router {
    let index_html = web_root.join("index.html");
    Router::new()
        .fallback_service(ServeDir::new(web_root).fallback(ServeFile::new(index_html)))
        .layer(TraceLayer::new_for_http())
}

/// Serve `web_root` on `0.0.0.0:port` until `shutdown` flips to true.
pub async fn serve(web_root: PathBuf, port: u16, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    if !web_root.join("index.html").exists() {
        warn!("No index.html in {}", web_root.display());
    }

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;
    info!("Server is listening at {port}, serving {}", web_root.display());

    axum::serve(listener, router(&web_root))
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await
        .context("Static web server failed")?;

    info!("Static web server stopped");
    Ok(())
}
