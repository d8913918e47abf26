//! Error types for the neocrud-api crate.

use thiserror::Error;

use neocrud_core::config::ConfigError;
use neocrud_core::StoreError;

use crate::resolver::ResolverError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Resolver(#[from] ResolverError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Server task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;
