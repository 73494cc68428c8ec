//! Results storage and retrieval
//!
//! Provides persistent storage for measured runs in JSON format, one
//! directory per store.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::backend::TrendQuery;
use crate::harness::MetricsReport;

/// A measured run as persisted on disk
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredRun {
    /// Unique run ID
    pub id: String,

    /// Store the run measured
    pub store: String,

    /// Query that was measured
    pub query: TrendQuery,

    /// When the run was recorded
    pub recorded_at: DateTime<Utc>,

    /// Harness output
    pub report: MetricsReport,

    /// Environment info
    pub environment: EnvironmentInfo,
}

/// Host the run was measured on
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    pub os: String,
    pub arch: String,
    /// Logical CPUs available to the process
    pub cpus: usize,
    pub tool_version: String,
}

impl Default for EnvironmentInfo {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            cpus: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl StoredRun {
    pub fn new(store: &str, query: TrendQuery, report: MetricsReport) -> Self {
        Self {
            id: generate_run_id(),
            store: store.to_lowercase(),
            query,
            recorded_at: Utc::now(),
            report,
            environment: EnvironmentInfo::default(),
        }
    }

    /// "store/query" key used to group comparable runs
    pub fn key(&self) -> String {
        format!("{}/{}", self.store, self.report.name)
    }
}

/// Generate unique run ID
fn generate_run_id() -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let random: u32 = rand::random::<u32>() % 10000;
    format!("{timestamp}_{random:04}")
}

/// Results storage manager
pub struct ResultsStorage {
    /// Base directory for results
    base_dir: PathBuf,
}

impl ResultsStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn store_dir(&self, store: &str) -> PathBuf {
        self.base_dir.join(store.to_lowercase())
    }

    fn run_path(&self, store: &str, run_id: &str) -> PathBuf {
        self.store_dir(store).join(format!("{run_id}.json"))
    }

    /// Save a run; returns the file written
    pub fn save(&self, run: &StoredRun) -> Result<PathBuf> {
        let store_dir = self.store_dir(&run.store);
        fs::create_dir_all(&store_dir)
            .with_context(|| format!("Failed to create directory: {}", store_dir.display()))?;

        let path = self.run_path(&run.store, &run.id);
        let file = File::create(&path).context("Failed to create results file")?;
        serde_json::to_writer_pretty(BufWriter::new(file), run)
            .context("Failed to write results")?;

        info!("Saved run results to {}", path.display());
        Ok(path)
    }

    pub fn load(&self, store: &str, run_id: &str) -> Result<StoredRun> {
        self.load_from_path(&self.run_path(store, run_id))
    }

    pub fn load_from_path(&self, path: &Path) -> Result<StoredRun> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open results file: {}", path.display()))?;
        let run = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse results: {}", path.display()))?;
        debug!("Loaded run results from {}", path.display());
        Ok(run)
    }

    /// All runs for a store, newest first; unreadable files are skipped
    pub fn load_store(&self, store: &str) -> Result<Vec<StoredRun>> {
        let store_dir = self.store_dir(store);
        if !store_dir.exists() {
            return Ok(Vec::new());
        }

        let mut runs = Vec::new();
        for entry in fs::read_dir(&store_dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                match self.load_from_path(&path) {
                    Ok(run) => runs.push(run),
                    Err(e) => debug!("Skipping {}: {:#}", path.display(), e),
                }
            }
        }

        runs.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(runs)
    }

    /// Every run across all stores, newest first
    pub fn load_all(&self) -> Result<Vec<StoredRun>> {
        let mut runs = Vec::new();
        for store in self.list_stores()? {
            runs.extend(self.load_store(&store)?);
        }
        runs.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(runs)
    }

    /// Stores with at least one directory of results
    pub fn list_stores(&self) -> Result<Vec<String>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut stores = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    stores.push(name.to_string());
                }
            }
        }

        stores.sort();
        Ok(stores)
    }

    /// Brief listing of a store's runs
    pub fn list_runs(&self, store: &str) -> Result<Vec<RunInfo>> {
        Ok(self
            .load_store(store)?
            .into_iter()
            .map(|run| RunInfo {
                id: run.id,
                store: run.store,
                query: run.report.name,
                recorded_at: run.recorded_at,
                throughput: run.report.throughput_queries_per_sec,
                avg_response_time_ms: run.report.avg_response_time_ms,
            })
            .collect())
    }

    /// Newest run for a store
    pub fn latest(&self, store: &str) -> Result<Option<StoredRun>> {
        Ok(self.load_store(store)?.into_iter().next())
    }

    pub fn delete(&self, store: &str, run_id: &str) -> Result<()> {
        let path = self.run_path(store, run_id);
        if path.exists() {
            fs::remove_file(&path)?;
            info!("Deleted results: {}", path.display());
        }
        Ok(())
    }

    pub fn delete_store(&self, store: &str) -> Result<()> {
        let store_dir = self.store_dir(store);
        if store_dir.exists() {
            fs::remove_dir_all(&store_dir)?;
            info!("Deleted all results for store: {store}");
        }
        Ok(())
    }

    /// Export runs to a JSON or CSV file
    pub fn export(&self, runs: &[StoredRun], path: &Path, format: ExportFormat) -> Result<()> {
        match format {
            ExportFormat::Json => {
                let file = File::create(path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                serde_json::to_writer_pretty(BufWriter::new(file), runs)?;
            }
            ExportFormat::Csv => {
                let mut writer = csv::Writer::from_path(path)?;
                writer.write_record([
                    "id",
                    "store",
                    "query",
                    "recorded_at",
                    "total_requests",
                    "concurrent_users",
                    "failed_requests",
                    "total_execution_time_ms",
                    "throughput_queries_per_sec",
                    "avg_response_time_ms",
                    "min_response_time_ms",
                    "max_response_time_ms",
                    "response_time_std_dev_ms",
                    "cpu_utilization_increase",
                    "memory_utilization_increase",
                ])?;

                for run in runs {
                    let r = &run.report;
                    let optional = |v: Option<f64>| v.map(|v| format!("{v:.2}")).unwrap_or_default();
                    writer.write_record([
                        run.id.clone(),
                        run.store.clone(),
                        r.name.clone(),
                        run.recorded_at.to_rfc3339(),
                        r.total_requests.to_string(),
                        r.concurrent_users.to_string(),
                        r.failed_requests.to_string(),
                        format!("{:.2}", r.total_execution_time_ms),
                        format!("{:.2}", r.throughput_queries_per_sec),
                        format!("{:.2}", r.avg_response_time_ms),
                        format!("{:.2}", r.min_response_time_ms),
                        format!("{:.2}", r.max_response_time_ms),
                        format!("{:.2}", r.response_time_std_dev_ms),
                        optional(r.cpu_utilization_increase),
                        optional(r.memory_utilization_increase),
                    ])?;
                }
                writer.flush()?;
            }
        }

        info!("Exported {} runs to {}", runs.len(), path.display());
        Ok(())
    }
}

/// Brief run information
#[derive(Clone, Debug)]
pub struct RunInfo {
    pub id: String,
    pub store: String,
    pub query: String,
    pub recorded_at: DateTime<Utc>,
    pub throughput: f64,
    pub avg_response_time_ms: f64,
}

/// Export format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(ExportFormat::Json),
            "csv" => Some(ExportFormat::Csv),
            _ => None,
        }
    }

    pub fn from_extension(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_str)
    }
}
