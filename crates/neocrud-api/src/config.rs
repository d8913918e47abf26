//! Backend selection and service construction for the binary.

use std::sync::Arc;

use clap::ValueEnum;

use neocrud_core::StoreConfig;
use neocrud_store::{CrudService, GraphClient, MemoryStore, SessionSource};

use crate::error::Result;

/// Which store backs the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// Neo4j over Bolt; requires APOC.
    #[default]
    Neo4j,
    /// In-process graph that lives as long as the process.
    Memory,
}

/// Load store settings from `<file_prefix>.toml` and the environment,
/// with `timeout_ms` (when given) replacing the configured statement timeout.
pub fn load_store_config(file_prefix: &str, timeout_ms: Option<u64>) -> Result<StoreConfig> {
    let mut config = StoreConfig::load(file_prefix)?;
    if let Some(ms) = timeout_ms {
        config.statement_timeout_ms = ms;
    }
    Ok(config)
}

/// Connect the selected backend and wrap it in a [`CrudService`].
pub async fn build_service(kind: StoreKind, config: &StoreConfig) -> Result<CrudService> {
    let source: Arc<dyn SessionSource> = match kind {
        StoreKind::Neo4j => {
            config.validate_credentials()?;
            Arc::new(GraphClient::connect(config).await?)
        }
        StoreKind::Memory => {
            tracing::info!("Using in-memory store");
            Arc::new(MemoryStore::new(config.max_connections as usize))
        }
    };
    Ok(CrudService::from_config(source, config))
}
