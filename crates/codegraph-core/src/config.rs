use std::env;

use anyhow::{Context, Result};
use config as cfg;
use schemars::JsonSchema;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Graph backend endpoint (spec §6.1: `GRAPH_HOST`, `GRAPH_PORT`,
/// `GRAPH_PASSWORD`, `GRAPH_SSL`).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GraphConfig {
    #[serde(default = "GraphConfig::default_host")]
    pub host: String,
    #[serde(default = "GraphConfig::default_port")]
    pub port: u16,
    #[serde(default, skip_serializing)]
    #[schemars(skip)]
    pub password: Option<SecretString>,
    #[serde(default)]
    pub ssl: bool,
    /// SurrealDB namespace; the Tenant Factory derives the per-org
    /// namespace/database pair from this root (see `codegraph-tenant`).
    #[serde(default = "GraphConfig::default_namespace_root")]
    pub namespace_root: String,
}

impl GraphConfig {
    fn default_host() -> String {
        "localhost".to_string()
    }
    fn default_port() -> u16 {
        8000
    }
    fn default_namespace_root() -> String {
        "codegraph".to_string()
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            password: None,
            ssl: false,
            namespace_root: Self::default_namespace_root(),
        }
    }
}

/// Job-queue broker (spec §6.1: `QUEUE_URL`, `WORKER_CONCURRENCY`).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueueConfig {
    #[serde(default = "QueueConfig::default_url")]
    pub url: String,
    #[serde(default = "QueueConfig::default_concurrency")]
    pub worker_concurrency: usize,
}

impl QueueConfig {
    fn default_url() -> String {
        "redis://localhost:6379/0".to_string()
    }
    fn default_concurrency() -> usize {
        2
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            url: Self::default_url(),
            worker_concurrency: Self::default_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CoreSettings {
    #[serde(default = "CoreSettings::default_env")]
    pub env: String,
    #[serde(default = "CoreSettings::default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    /// Temporary clone root for the Job Runner (spec §6.1 `CLONE_DIR`,
    /// §4.9 step 2).
    #[serde(default = "CoreSettings::default_clone_dir")]
    pub clone_dir: String,
    /// Used for links in notifications/PR comments (spec §6.1 `APP_BASE_URL`).
    #[serde(default = "CoreSettings::default_app_base_url")]
    pub app_base_url: String,
}

impl CoreSettings {
    fn default_env() -> String {
        env::var("ENV").unwrap_or_else(|_| "development".to_string())
    }

    fn default_log_level() -> String {
        "info".to_string()
    }

    fn default_clone_dir() -> String {
        "/tmp/analyses".to_string()
    }

    fn default_app_base_url() -> String {
        "http://localhost:3000".to_string()
    }

    /// Load from environment variables only, with the `CODEGRAPH__` prefix
    /// also accepted for structured overrides (e.g.
    /// `CODEGRAPH__QUEUE__WORKER_CONCURRENCY=4`), via the `config` crate's
    /// layered builder.
    pub fn from_env() -> Result<Self> {
        let mut builder = cfg::Config::builder()
            .set_default("env", Self::default_env())?
            .set_default("log_level", Self::default_log_level())?
            .set_default("clone_dir", Self::default_clone_dir())?
            .set_default("app_base_url", Self::default_app_base_url())?;

        if let Ok(v) = env::var("GRAPH_HOST") {
            builder = builder.set_override("graph.host", v)?;
        }
        if let Ok(v) = env::var("GRAPH_PORT") {
            builder = builder.set_override("graph.port", v)?;
        }
        if let Ok(v) = env::var("GRAPH_SSL") {
            builder = builder.set_override("graph.ssl", v)?;
        }
        if let Ok(v) = env::var("QUEUE_URL") {
            builder = builder.set_override("queue.url", v)?;
        }
        if let Ok(v) = env::var("WORKER_CONCURRENCY") {
            builder = builder.set_override("queue.worker_concurrency", v)?;
        }
        if let Ok(v) = env::var("CLONE_DIR") {
            builder = builder.set_override("clone_dir", v)?;
        }
        if let Ok(v) = env::var("APP_BASE_URL") {
            builder = builder.set_override("app_base_url", v)?;
        }
        if let Ok(v) = env::var("LOG_LEVEL") {
            builder = builder.set_override("log_level", v)?;
        }
        if let Ok(v) = env::var("ENV") {
            builder = builder.set_override("env", v)?;
        }

        let mut settings: CoreSettings = builder
            .build()
            .context("building configuration")?
            .try_deserialize()
            .context("deserializing configuration")?;

        if let Ok(pw) = env::var("GRAPH_PASSWORD") {
            settings.graph.password = Some(SecretString::from(pw));
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.graph.host.trim().is_empty(), "graph.host cannot be empty");
        anyhow::ensure!(self.graph.port > 0, "graph.port must be > 0");
        anyhow::ensure!(
            self.queue.worker_concurrency > 0,
            "queue.worker_concurrency must be > 0"
        );
        anyhow::ensure!(!self.clone_dir.trim().is_empty(), "clone_dir cannot be empty");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let settings = CoreSettings {
            env: CoreSettings::default_env(),
            log_level: CoreSettings::default_log_level(),
            graph: GraphConfig::default(),
            queue: QueueConfig::default(),
            clone_dir: CoreSettings::default_clone_dir(),
            app_base_url: CoreSettings::default_app_base_url(),
        };
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn rejects_zero_concurrency() {
        let mut settings = CoreSettings {
            env: "test".into(),
            log_level: "info".into(),
            graph: GraphConfig::default(),
            queue: QueueConfig::default(),
            clone_dir: "/tmp/x".into(),
            app_base_url: "http://x".into(),
        };
        settings.queue.worker_concurrency = 0;
        assert!(settings.validate().is_err());
    }
}
