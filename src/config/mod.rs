//! Configuration module
//!
//! Handles loading and managing configuration.

pub mod env;
pub mod file;
pub mod profile;

pub use env::EnvConfig;
pub use file::ConfigFile;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::harness::{DEFAULT_CONCURRENCY, DEFAULT_REQUESTS};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Default backend ("kv", "document" or "elasticsearch")
    pub default_backend: String,

    /// Harness defaults
    pub harness: HarnessSettings,

    /// In-process store settings (kv and document)
    pub memory: MemorySettings,

    /// Elasticsearch connection
    pub elasticsearch: ElasticsearchConfig,

    /// Directory for stored runs; `~/.contentbench/results` when unset
    pub results_dir: Option<String>,

    /// Append log output to this file instead of stderr
    pub log_file: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_backend: "kv".to_string(),
            harness: HarnessSettings::default(),
            memory: MemorySettings::default(),
            elasticsearch: ElasticsearchConfig::default(),
            results_dir: None,
            log_file: None,
        }
    }
}

impl AppConfig {
    /// Apply environment overrides on top of file values
    pub fn apply_env(&mut self, env: &EnvConfig) {
        if let Some(backend) = &env.backend {
            self.default_backend = backend.clone();
        }
        if let Some(requests) = env.requests {
            self.harness.num_requests = requests;
        }
        if let Some(concurrency) = env.concurrency {
            self.harness.concurrency = concurrency;
        }
        if let Some(url) = &env.es_url {
            self.elasticsearch.url = url.clone();
        }
        if let Some(username) = &env.es_username {
            self.elasticsearch.username = Some(username.clone());
        }
        if let Some(password) = &env.es_password {
            self.elasticsearch.password = Some(password.clone());
        }
        if let Some(verify) = env.es_verify_certs {
            self.elasticsearch.verify_certs = verify;
        }
        if let Some(dir) = &env.results_dir {
            self.results_dir = Some(dir.clone());
        }
        if let Some(log_file) = &env.log_file {
            self.log_file = Some(log_file.clone());
        }
    }

    pub fn validate(&self) -> Result<()> {
        if crate::backend::BackendKind::from_str(&self.default_backend).is_none() {
            bail!("Unknown backend: {}", self.default_backend);
        }
        if self.harness.num_requests == 0 {
            bail!("harness.num_requests must be at least 1");
        }
        if self.harness.concurrency == 0 {
            bail!("harness.concurrency must be at least 1");
        }
        if self.elasticsearch.url.is_empty() {
            bail!("elasticsearch.url must not be empty");
        }
        if self.elasticsearch.password.is_some() && self.elasticsearch.username.is_none() {
            bail!("elasticsearch.password is set without elasticsearch.username");
        }
        Ok(())
    }

    /// Resolved results directory
    pub fn results_dir(&self) -> PathBuf {
        match &self.results_dir {
            Some(dir) => file::expand_path(dir),
            None => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".contentbench")
                .join("results"),
        }
    }
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            num_requests: DEFAULT_REQUESTS,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Harness defaults used when a run does not specify them
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessSettings {
    pub num_requests: usize,
    pub concurrency: usize,
}

/// Settings shared by the in-process stores
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySettings {
    /// Simulated latency per table scan or aggregation, in milliseconds
    pub latency_ms: u64,
}

/// Elasticsearch connection settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElasticsearchConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Verify the server's TLS certificate
    pub verify_certs: bool,
    pub timeout_secs: u64,
    pub trends_index: String,
    pub content_index: String,
    pub shards: u32,
    pub replicas: u32,
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            url: "https://localhost:9200".to_string(),
            username: None,
            password: None,
            verify_certs: true,
            timeout_secs: 30,
            trends_index: "regional_trends".to_string(),
            content_index: "content_v2".to_string(),
            shards: 3,
            replicas: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.default_backend, "kv");
        assert_eq!(config.harness.num_requests, DEFAULT_REQUESTS);
        assert_eq!(config.elasticsearch.timeout_secs, 30);
        assert!(config.elasticsearch.verify_certs);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        let mut config = AppConfig::default();
        config.harness.concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig {
            default_backend: "es".to_string(),
            ..AppConfig::default()
        };
        config.elasticsearch.password = Some("secret".to_string());
        assert!(config.validate().is_err());

        config.default_backend = "cassandra".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_apply_env() {
        let mut config = AppConfig::default();
        let env = EnvConfig {
            requests: Some(500),
            es_url: Some("http://es:9200".to_string()),
            es_verify_certs: Some(false),
            ..EnvConfig::default()
        };

        config.apply_env(&env);
        assert_eq!(config.harness.num_requests, 500);
        assert_eq!(config.harness.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(config.elasticsearch.url, "http://es:9200");
        assert!(!config.elasticsearch.verify_certs);
    }

    #[test]
    fn test_results_dir() {
        let config = AppConfig {
            results_dir: Some("/tmp/bench".to_string()),
            ..AppConfig::default()
        };
        assert_eq!(config.results_dir(), PathBuf::from("/tmp/bench"));

        let config = AppConfig::default();
        assert!(config.results_dir().ends_with(".contentbench/results"));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("harness:\n  concurrency: 20\n").unwrap();
        assert_eq!(config.harness.concurrency, 20);
        assert_eq!(config.harness.num_requests, DEFAULT_REQUESTS);
        assert_eq!(config.elasticsearch.trends_index, "regional_trends");
    }
}
