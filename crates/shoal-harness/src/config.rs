use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use shoal_client::ClientConfig;
use shoal_db::DatabaseConfig;
use shoal_server::ServerConfig;
use tracing::Level;

use crate::error::HarnessError;

pub const CONFIG_PATH_ENV: &str = "SHOAL_HARNESS_CONFIG";
pub const LOG_LEVEL_ENV: &str = "SHOAL_LOG";
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub log_level: String,
    /// Objects written per `name` value in each population step.
    pub objects_per_name: usize,
    /// Concurrent writes per population wave.
    pub add_concurrency: usize,
    pub reindex_batch_size: usize,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub client: ClientConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            objects_per_name: 1,
            add_concurrency: 100,
            reindex_batch_size: 100,
            database: DatabaseConfig::default(),
            server: ServerConfig::default(),
            client: ClientConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Load from `$SHOAL_HARNESS_CONFIG` (default `config.json`). A missing
    /// file means defaults. `$SHOAL_LOG` overrides the log level.
    pub fn load() -> Result<Self, HarnessError> {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        let mut config = if path.exists() {
            Self::from_path(&path)?
        } else {
            Self::default()
        };
        if let Ok(level) = std::env::var(LOG_LEVEL_ENV) {
            config.log_level = level;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, HarnessError> {
        let text = std::fs::read_to_string(path).map_err(|source| HarnessError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| HarnessError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), HarnessError> {
        self.max_level()?;
        for (name, value) in [
            ("objects_per_name", self.objects_per_name),
            ("add_concurrency", self.add_concurrency),
            ("reindex_batch_size", self.reindex_batch_size),
        ] {
            if value == 0 {
                return Err(HarnessError::Config(format!("{name} must be at least 1")));
            }
        }
        Ok(())
    }

    pub fn max_level(&self) -> Result<Level, HarnessError> {
        self.log_level
            .parse()
            .map_err(|_| HarnessError::Config(format!("unknown log level {:?}", self.log_level)))
    }
}
