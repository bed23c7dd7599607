use anyhow::{Context, Result};
use neosnoize_runtime_config::{load_or_init, NeosNoizeConfig, RuntimePaths};
use std::path::Path;
use tracing::{info, warn};

/// Load, normalize and validate the config, and resolve its paths against
/// the directory holding the config file.
pub fn load_config(path: &Path) -> Result<(NeosNoizeConfig, RuntimePaths)> {
    let loaded = load_or_init(path)
        .with_context(|| format!("Failed to load config at {}", path.display()))?;

    for key in &loaded.stripped_keys {
        warn!("Dropped unknown config key '{key}' from {}", path.display());
    }
    if loaded.written {
        info!("Config written: {}", path.display());
    }

    loaded.config.validate()?;

    let paths = loaded.config.resolve_paths(&loaded.install_root());
    info!(
        "Thumbnails: {}, snapshot: {}",
        paths.thumbnail_dir.display(),
        paths.sessions_file.display()
    );
    Ok((loaded.config, paths))
}
