//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "CONTENTBENCH";

/// Overrides read from `CONTENTBENCH_*` variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// CONTENTBENCH_BACKEND
    pub backend: Option<String>,
    /// CONTENTBENCH_REQUESTS
    pub requests: Option<usize>,
    /// CONTENTBENCH_CONCURRENCY
    pub concurrency: Option<usize>,
    /// CONTENTBENCH_ES_URL
    pub es_url: Option<String>,
    /// CONTENTBENCH_ES_USERNAME
    pub es_username: Option<String>,
    /// CONTENTBENCH_ES_PASSWORD
    pub es_password: Option<String>,
    /// CONTENTBENCH_ES_VERIFY_CERTS
    pub es_verify_certs: Option<bool>,
    /// CONTENTBENCH_CONFIG
    pub config_file: Option<String>,
    /// CONTENTBENCH_RESULTS_DIR
    pub results_dir: Option<String>,
    /// CONTENTBENCH_LOG_FILE
    pub log_file: Option<String>,
    /// CONTENTBENCH_FORMAT
    pub format: Option<String>,
    /// CONTENTBENCH_VERBOSE
    pub verbose: Option<bool>,
    /// CONTENTBENCH_LOG_LEVEL
    pub log_level: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            backend: get_env("BACKEND"),
            requests: get_env_parse("REQUESTS"),
            concurrency: get_env_parse("CONCURRENCY"),
            es_url: get_env("ES_URL"),
            es_username: get_env("ES_USERNAME"),
            es_password: get_env("ES_PASSWORD"),
            es_verify_certs: get_env_bool("ES_VERIFY_CERTS"),
            config_file: get_env("CONFIG"),
            results_dir: get_env("RESULTS_DIR"),
            log_file: get_env("LOG_FILE"),
            format: get_env("FORMAT"),
            verbose: get_env_bool("VERBOSE"),
            log_level: get_env("LOG_LEVEL"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.backend.is_some()
            || self.requests.is_some()
            || self.concurrency.is_some()
            || self.es_url.is_some()
            || self.es_username.is_some()
            || self.es_password.is_some()
            || self.es_verify_certs.is_some()
            || self.config_file.is_some()
            || self.results_dir.is_some()
            || self.log_file.is_some()
            || self.format.is_some()
            || self.verbose.is_some()
            || self.log_level.is_some()
    }

    /// Print current environment configuration; the password is masked
    pub fn print_summary(&self) {
        let masked = self.es_password.as_ref().map(|_| "********");
        println!("Environment Configuration:");
        println!("  {}_BACKEND:         {:?}", ENV_PREFIX, self.backend);
        println!("  {}_REQUESTS:        {:?}", ENV_PREFIX, self.requests);
        println!("  {}_CONCURRENCY:     {:?}", ENV_PREFIX, self.concurrency);
        println!("  {}_ES_URL:          {:?}", ENV_PREFIX, self.es_url);
        println!("  {}_ES_USERNAME:     {:?}", ENV_PREFIX, self.es_username);
        println!("  {}_ES_PASSWORD:     {:?}", ENV_PREFIX, masked);
        println!("  {}_ES_VERIFY_CERTS: {:?}", ENV_PREFIX, self.es_verify_certs);
        println!("  {}_CONFIG:          {:?}", ENV_PREFIX, self.config_file);
        println!("  {}_RESULTS_DIR:     {:?}", ENV_PREFIX, self.results_dir);
        println!("  {}_LOG_FILE:        {:?}", ENV_PREFIX, self.log_file);
        println!("  {}_FORMAT:          {:?}", ENV_PREFIX, self.format);
        println!("  {}_VERBOSE:         {:?}", ENV_PREFIX, self.verbose);
        println!("  {}_LOG_LEVEL:       {:?}", ENV_PREFIX, self.log_level);
    }
}

fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}"))
        .ok()
        .filter(|v| !v.is_empty())
}

fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.parse().ok())
}

fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| {
        matches!(
            v.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "enabled"
        )
    })
}

/// Print all CONTENTBENCH environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_BACKEND          Default backend (kv, document, elasticsearch)");
    println!("  {ENV_PREFIX}_REQUESTS         Default number of requests per run");
    println!("  {ENV_PREFIX}_CONCURRENCY      Default number of concurrent callers");
    println!("  {ENV_PREFIX}_ES_URL           Elasticsearch URL");
    println!("  {ENV_PREFIX}_ES_USERNAME      Elasticsearch user");
    println!("  {ENV_PREFIX}_ES_PASSWORD      Elasticsearch password");
    println!("  {ENV_PREFIX}_ES_VERIFY_CERTS  Verify TLS certificates (true/false)");
    println!("  {ENV_PREFIX}_CONFIG           Path to configuration file");
    println!("  {ENV_PREFIX}_RESULTS_DIR      Directory for stored runs");
    println!("  {ENV_PREFIX}_LOG_FILE         Append logs to this file");
    println!("  {ENV_PREFIX}_FORMAT           Output format (text, json, markdown, csv)");
    println!("  {ENV_PREFIX}_VERBOSE          Enable debug logging (true/false)");
    println!("  {ENV_PREFIX}_LOG_LEVEL        Log level (trace, debug, info, warn, error)");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_ES_URL=https://localhost:9200");
    println!("  export {ENV_PREFIX}_ES_USERNAME=elastic");
    println!("  contentbench run --backend elasticsearch --query global");
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{env, ENV_PREFIX};
    use std::sync::{Mutex, MutexGuard};

    /// Serializes tests that touch process environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Builder for setting environment variables in tests
    #[derive(Default)]
    pub struct EnvBuilder {
        vars: Vec<(String, String)>,
    }

    impl EnvBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn var(mut self, name: &str, value: impl ToString) -> Self {
            self.vars
                .push((format!("{ENV_PREFIX}_{name}"), value.to_string()));
            self
        }

        /// Apply and return guard that restores on drop
        pub fn apply_scoped(self) -> EnvGuard {
            let lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
            let previous = self
                .vars
                .iter()
                .map(|(k, _)| (k.clone(), env::var(k).ok()))
                .collect();

            for (key, value) in self.vars {
                env::set_var(key, value);
            }

            EnvGuard {
                previous,
                _lock: lock,
            }
        }
    }

    /// Guard that restores environment variables on drop
    pub struct EnvGuard {
        previous: Vec<(String, Option<String>)>,
        _lock: MutexGuard<'static, ()>,
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in &self.previous {
                match value {
                    Some(v) => env::set_var(key, v),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
