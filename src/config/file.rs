//! Configuration file management
//!
//! Handles finding, loading, and validating configuration files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::profile::WorkloadProfile;
use super::AppConfig;

/// Configuration file locations (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &[
    "./contentbench.yaml",
    "./contentbench.yml",
    "./.contentbench.yaml",
    "~/.config/contentbench/config.yaml",
    "~/.contentbench.yaml",
];

/// Full configuration file structure
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Version of config file format
    #[serde(default = "default_version")]
    pub version: String,

    /// Application settings
    #[serde(default)]
    pub app: AppConfig,

    /// Workload profiles, in addition to the built-in ones
    #[serde(default)]
    pub workloads: Vec<WorkloadProfile>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            version: default_version(),
            app: AppConfig::default(),
            workloads: Vec::new(),
        }
    }
}

impl ConfigFile {
    /// Find configuration file in standard locations
    pub fn find() -> Option<PathBuf> {
        CONFIG_LOCATIONS
            .iter()
            .map(|location| expand_path(location))
            .find(|path| path.exists())
    }

    /// Load from `path`, or from the first standard location, or defaults
    pub fn resolve(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => Self::load(expand_path(path)),
            None => match Self::find() {
                Some(path) => Self::load(&path),
                None => Ok(Self::default()),
            },
        }
    }

    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create directory: {}", parent.display())
                })?;
            }
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !["1.0"].contains(&self.version.as_str()) {
            anyhow::bail!("Unsupported config version: {}", self.version);
        }

        self.app.validate()?;

        for profile in &self.workloads {
            if profile.to_query().is_none() {
                anyhow::bail!(
                    "Workload '{}' has an invalid query '{}' (region: {:?})",
                    profile.name,
                    profile.query,
                    profile.region
                );
            }
            if profile.num_requests == 0 || profile.concurrency == 0 {
                anyhow::bail!(
                    "Workload '{}' needs at least one request and one caller",
                    profile.name
                );
            }
        }

        Ok(())
    }

    /// Generate example configuration
    pub fn example() -> Self {
        let mut app = AppConfig::default();
        app.elasticsearch.username = Some("elastic".to_string());
        app.elasticsearch.verify_certs = false;
        app.memory.latency_ms = 2;

        Self {
            version: default_version(),
            app,
            workloads: vec![WorkloadProfile::new("smoke", "global")
                .with_load(20, 4)
                .with_description("Quick sanity run")],
        }
    }

    /// Look up a workload, user-defined first, then built-in
    pub fn workload(&self, name: &str) -> Option<WorkloadProfile> {
        self.workloads
            .iter()
            .find(|p| p.name == name)
            .cloned()
            .or_else(|| WorkloadProfile::builtin().into_iter().find(|p| p.name == name))
    }

    /// All workload names, user-defined first
    pub fn workload_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.workloads.iter().map(|p| p.name.clone()).collect();
        for profile in WorkloadProfile::builtin() {
            if !names.contains(&profile.name) {
                names.push(profile.name);
            }
        }
        names
    }
}

/// Expand ~ to home directory
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Check if file is YAML based on extension
fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}
