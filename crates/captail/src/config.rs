//! Configuration
//!
//! TOML-based configuration with environment variable overrides. The file
//! path comes from `CAPTAIL_CONFIG`; every option can also be set directly
//! through a `CAPTAIL_*` variable, which wins over the file value.

use crate::error::{Result, TailError};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_server() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_interval() -> f64 {
    0.5
}

fn default_raise_on_missing() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TailConfig {
    /// MongoDB connection string.
    #[serde(default = "default_server")]
    pub server: String,

    /// Collections to tail, each `[database/]collection`.
    #[serde(default)]
    pub collections: Vec<String>,

    /// Empty-poll backoff in seconds.
    #[serde(default = "default_interval")]
    pub interval: f64,

    /// Whether a missing target collection is fatal for its worker.
    #[serde(default = "default_raise_on_missing")]
    pub raise_on_missing: bool,

    /// Optional JSON query document applied to every tailable find.
    /// An unparseable value degrades to the empty filter.
    #[serde(default)]
    pub filter: String,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            collections: Vec::new(),
            interval: default_interval(),
            raise_on_missing: default_raise_on_missing(),
            filter: String::new(),
        }
    }
}

impl TailConfig {
    /// Load configuration: file named by `CAPTAIL_CONFIG` (if set), then
    /// environment overrides, then validation.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var("CAPTAIL_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| TailError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        toml::from_str(&contents)
            .map_err(|e| TailError::Config(format!("failed to parse {}: {}", path.display(), e)))
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(server) = std::env::var("CAPTAIL_SERVER") {
            self.server = server;
        }
        if let Ok(collections) = std::env::var("CAPTAIL_COLLECTIONS") {
            self.collections = collections
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(interval) = std::env::var("CAPTAIL_INTERVAL") {
            if let Ok(parsed) = interval.parse::<f64>() {
                self.interval = parsed;
            }
        }
        if let Ok(raise) = std::env::var("CAPTAIL_RAISE_ON_MISSING") {
            if let Ok(parsed) = raise.parse::<bool>() {
                self.raise_on_missing = parsed;
            }
        }
        if let Ok(filter) = std::env::var("CAPTAIL_FILTER") {
            self.filter = filter;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.collections.is_empty() {
            return Err(TailError::Config(
                "at least one collection must be configured".to_string(),
            ));
        }
        if self.interval < 0.0 || !self.interval.is_finite() {
            return Err(TailError::Config(format!(
                "interval must be a non-negative number, got {}",
                self.interval
            )));
        }
        Ok(())
    }

    /// Parse the configured query filter, falling back to the empty filter
    /// when it is absent or unparseable.
    pub fn parsed_filter(&self) -> bson::Document {
        if self.filter.trim().is_empty() {
            return bson::Document::new();
        }
        match serde_json::from_str::<serde_json::Value>(&self.filter)
            .ok()
            .and_then(|v| bson::to_document(&v).ok())
        {
            Some(doc) => doc,
            None => {
                tracing::warn!(filter = %self.filter, "Unparseable filter, using empty filter");
                bson::Document::new()
            }
        }
    }

    pub fn interval_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.interval)
    }
}
