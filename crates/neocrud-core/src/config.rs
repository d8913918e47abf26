//! Store connection configuration.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`NEOCRUD__NEO4J__URI`, ...)
//! 2. Config file (`<prefix>.toml`, `[neo4j]` section)
//! 3. Legacy `DB_NEO4J_HOST` / `DB_NEO4J_USER` / `DB_NEO4J_PASSWORD` variables
//! 4. Defaults

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config source error: {0}")]
    Source(#[from] config::ConfigError),

    #[error(
        "Missing Neo4j connection details ({}): supply them through NEOCRUD__NEO4J__* or DB_NEO4J_* environment variables or the [neo4j] config section",
        .missing.join(", ")
    )]
    MissingCredentials { missing: Vec<&'static str> },
}

/// Connection settings for the graph store.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_uri")]
    pub uri: String,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default)]
    pub password: String,

    /// Upper bound on concurrently leased sessions.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_fetch_size")]
    pub fetch_size: usize,

    /// Per-operation timeout; 0 disables it.
    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,
}

fn default_uri() -> String {
    "bolt://localhost:7687".to_string()
}

fn default_user() -> String {
    "neo4j".to_string()
}

fn default_max_connections() -> u32 {
    16
}

fn default_fetch_size() -> usize {
    256
}

fn default_statement_timeout_ms() -> u64 {
    30_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            user: default_user(),
            password: String::new(),
            max_connections: default_max_connections(),
            fetch_size: default_fetch_size(),
            statement_timeout_ms: default_statement_timeout_ms(),
        }
    }
}

impl StoreConfig {
    /// Load from `<file_prefix>.toml` and the process environment.
    pub fn load(file_prefix: &str) -> Result<Self, ConfigError> {
        Self::load_with(file_prefix, |var| std::env::var(var).ok())
    }

    /// Like [`StoreConfig::load`], with the legacy variable lookup injected.
    pub fn load_with<F>(file_prefix: &str, legacy_env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("NEOCRUD")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut store = match cfg.get::<StoreConfig>("neo4j") {
            Ok(c) => c,
            Err(config::ConfigError::NotFound(_)) => StoreConfig::default(),
            Err(e) => return Err(e.into()),
        };

        for (key, var) in [
            ("neo4j.uri", "DB_NEO4J_HOST"),
            ("neo4j.user", "DB_NEO4J_USER"),
            ("neo4j.password", "DB_NEO4J_PASSWORD"),
        ] {
            if cfg.get_string(key).is_ok() {
                continue;
            }
            if let Some(value) = legacy_env(var).filter(|v| !v.is_empty()) {
                tracing::debug!(var, "Using legacy Neo4j environment variable");
                match key {
                    "neo4j.uri" => store.uri = value,
                    "neo4j.user" => store.user = value,
                    _ => store.password = value,
                }
            }
        }

        Ok(store)
    }

    /// Neo4j needs host, user and password before a connection is attempted.
    pub fn validate_credentials(&self) -> Result<(), ConfigError> {
        let missing: Vec<&'static str> = [
            ("uri", self.uri.is_empty()),
            ("user", self.user.is_empty()),
            ("password", self.password.is_empty()),
        ]
        .into_iter()
        .filter_map(|(name, empty)| empty.then_some(name))
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingCredentials { missing })
        }
    }

    pub fn statement_timeout(&self) -> Option<Duration> {
        (self.statement_timeout_ms > 0).then(|| Duration::from_millis(self.statement_timeout_ms))
    }
}
