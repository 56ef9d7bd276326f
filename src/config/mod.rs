//! Application configuration management.

use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::dialect::Engine;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host (for log messages only).
    pub host: Option<String>,
    /// Server port.
    pub port: u16,

    /// Driver-interpretable connection string. Required.
    pub connection_string: String,
    /// Which SQL dialect/driver to speak. Inferred from the connection string
    /// scheme unless overridden by `DB_ENGINE`.
    pub engine: Engine,

    /// GraphQL endpoint path, also the [`crate::cache::PathCache`] key.
    pub path: String,
    /// When false, requests must carry a validated principal (checked by the
    /// external auth collaborator, see spec.md §1; the core only reads
    /// `UserContext` once it's been attached to the request).
    pub disable_auth: bool,

    /// Per-request statement timeout.
    pub statement_timeout: Duration,
    /// Optional interval on which the DbModel is rebuilt from the catalog in
    /// the background. `None` disables automatic refresh (manual refresh only).
    pub schema_refresh_poll: Option<Duration>,

    /// Path to an optional TOML file overlaying per-table/model metadata
    /// (`tenant-filter`, `soft-delete`, `raw-sql`, `schema-display`, ...).
    pub metadata_path: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let connection_string = env::var("DATABASE_URL").context("DATABASE_URL is required")?;

        let engine = match env::var("DB_ENGINE").ok() {
            Some(name) => Engine::from_name(&name)
                .with_context(|| format!("unrecognized DB_ENGINE '{name}'"))?,
            None => Engine::infer_from_url(&connection_string)
                .context("could not infer DB_ENGINE from DATABASE_URL; set DB_ENGINE explicitly")?,
        };

        Ok(Self {
            host: env::var("HOST").ok(),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("invalid PORT")?,

            connection_string,
            engine,

            path: env::var("GRAPHQL_PATH").unwrap_or_else(|_| "/graphql".to_string()),
            disable_auth: env::var("DISABLE_AUTH")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),

            statement_timeout: Duration::from_secs(
                env::var("STATEMENT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
            ),
            schema_refresh_poll: env::var("SCHEMA_REFRESH_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs),

            metadata_path: env::var("METADATA_PATH").ok(),
        })
    }
}

/// Per-table and model-level metadata overlay, loaded from TOML (spec.md §4.3 step 4, §6).
///
/// ```toml
/// [model]
/// raw-sql = "disabled"
/// schema-display = "flat"
///
/// [tables.orders]
/// tenant-filter = "tenant_id"
/// soft-delete = "deleted_at"
/// soft-delete-by = "deleted_by"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetadataOverlay {
    #[serde(default, rename = "model")]
    pub model: HashMap<String, String>,
    #[serde(default, rename = "tables")]
    pub tables: HashMap<String, HashMap<String, String>>,
    #[serde(default, rename = "columns")]
    pub columns: HashMap<String, HashMap<String, String>>,
}

impl MetadataOverlay {
    pub fn load(path: &str) -> Result<Self> {
        let text = std::fs::read_to_string(Path::new(path))
            .with_context(|| format!("reading metadata overlay at {path}"))?;
        toml::from_str(&text).with_context(|| format!("parsing metadata overlay at {path}"))
    }

    /// An empty overlay, used when `METADATA_PATH` is unset.
    pub fn empty() -> Self {
        Self::default()
    }
}
