//! Opening the configured activity database.

use std::sync::Arc;

use anyhow::{Context, Result};
use edutrack_engine::ProgressEngine;
use edutrack_engine::storage::TursoActivityStore;
use tracing::debug;

use crate::config::{ConfigLoader, EdutrackConfig};

/// Open the configured database, creating its directory on first use.
pub async fn open_store(config: &EdutrackConfig) -> Result<Arc<TursoActivityStore>> {
    let path = &config.database.path;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    debug!(path = %path.display(), "opening activity database");
    let store = TursoActivityStore::new_local(path)
        .await
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    Ok(Arc::new(store))
}

/// Load configuration and build an engine over the configured database.
pub async fn open_engine() -> Result<(ProgressEngine, Arc<TursoActivityStore>)> {
    let config = ConfigLoader::load()?;
    let store = open_store(&config).await?;
    let engine = ProgressEngine::with_store(store.clone(), config.engine());
    Ok((engine, store))
}
