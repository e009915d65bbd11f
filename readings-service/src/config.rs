use serde::Deserialize;
use std::fs;

use crate::query::LineConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub uri: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

/// Defaults for uploads; command-line flags override them per run.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    #[serde(default)]
    pub relaxed_parsing: bool,
    #[serde(default)]
    pub should_update: bool,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    500
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            relaxed_parsing: false,
            should_update: false,
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub line: LineConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("READINGS_CONFIG").unwrap_or_else(|_| "readings-config.toml".to_string());
        let contents = fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("failed to read config {path}: {e}"))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg = AppConfig::from_toml(
            r#"
            [database]
            uri = "postgres://localhost/readings"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.database.max_connections, 5);
        assert_eq!(cfg.line.max_raw_points, 1440);
        assert!(!cfg.ingest.should_update);
        assert_eq!(cfg.ingest.max_retries, 3);
        assert!(cfg.metrics.is_none());
    }

    #[test]
    fn full_config() {
        let cfg = AppConfig::from_toml(
            r#"
            [database]
            uri = "postgres://db/readings"
            max_connections = 12

            [line]
            max_raw_points = 500

            [ingest]
            relaxed_parsing = true
            should_update = true
            retry_backoff_ms = 50

            [metrics]
            bind_addr = "0.0.0.0:9100"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.database.max_connections, 12);
        assert_eq!(cfg.line.max_raw_points, 500);
        assert!(cfg.ingest.relaxed_parsing && cfg.ingest.should_update);
        assert_eq!(cfg.ingest.retry_backoff_ms, 50);
        assert_eq!(cfg.metrics.unwrap().bind_addr, "0.0.0.0:9100");
    }
}
