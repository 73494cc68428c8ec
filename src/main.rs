//! contentbench - content recommendation store benchmark
//!
//! A CLI tool that measures how fast different stores answer the same
//! content recommendation queries under concurrent load.
//!
//! ## Features
//!
//! - Synthetic dataset of users, content, interactions and regional trends
//! - Regional and global trend queries against an in-process key-value
//!   store, an in-process document store or Elasticsearch
//! - Bounded-concurrency measurement harness with latency statistics,
//!   throughput and host utilization deltas
//! - Stored runs with cross-store comparison
//! - Text, JSON, Markdown and CSV output
//!
//! ## Usage
//!
//! ```bash
//! # Generate a dataset
//! contentbench generate --seed 42 -o dataset.json
//!
//! # Load it into Elasticsearch
//! contentbench load --dataset dataset.json --url https://localhost:9200
//!
//! # Measure the regional query with 20 callers
//! contentbench run --backend kv --query regional --region asia -n 200 -c 20 --save
//!
//! # Compare stores
//! contentbench compare --format markdown
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

mod backend;
mod cli;
mod config;
mod dataset;
mod harness;
mod output;
mod results;
mod utils;

use backend::{
    Backend, BackendKind, DocumentStore, ElasticsearchClient, KeyValueStore, TrendQuery,
};
use cli::Args;
use config::{AppConfig, ConfigFile, EnvConfig};
use dataset::{Dataset, DatasetGenerator, DatasetSize};
use harness::PerformanceHarness;
use output::{ReportFormat, ReportFormatter};
use results::{ExportFormat, ResultsStorage, StoreComparator, StoredRun};
use utils::{init_logger, LogLevel, PhaseTimer};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let env = EnvConfig::load();
    let config_path = args.config.clone().or_else(|| env.config_file.clone());
    let mut file = ConfigFile::resolve(config_path.as_deref())?;
    file.app.apply_env(&env);

    let verbose = args.verbose || env.verbose.unwrap_or(false);
    let env_level = env.log_level.as_deref().map(|l| (l, LogLevel::from_str(l)));
    let level = match env_level {
        _ if verbose => LogLevel::Debug,
        Some((_, Some(level))) => level,
        _ => LogLevel::Info,
    };
    let log_file = args.log_file.clone().or_else(|| file.app.log_file.clone());
    init_logger(level, log_file.as_deref().map(Path::new))?;
    if let Some((name, None)) = env_level {
        warn!("Unknown log level '{}', using {:?}", name, level);
    }

    let color = !args.no_color && std::io::stdout().is_terminal();

    match args.command {
        cli::Command::Generate(generate_args) => {
            generate_dataset(generate_args)?;
        }
        cli::Command::Load(load_args) => {
            load_dataset(load_args, &file.app).await?;
        }
        cli::Command::Run(run_args) => {
            run_query(run_args, &file, env.format.as_deref(), color).await?;
        }
        cli::Command::Compare(compare_args) => {
            compare_stores(compare_args, &file.app, color)?;
        }
        cli::Command::Results(results_args) => {
            show_results(results_args, &file.app, color)?;
        }
        cli::Command::Config(config_args) => {
            manage_config(config_args, &file, &env)?;
        }
    }

    Ok(())
}

fn generate_dataset(args: cli::GenerateArgs) -> Result<()> {
    let mut size = if args.small {
        DatasetSize::small()
    } else {
        DatasetSize::default()
    };
    if let Some(users) = args.users {
        size.users = users;
    }
    if let Some(content) = args.content {
        size.content = content;
    }
    if let Some(interactions) = args.interactions {
        size.interactions = interactions;
    }
    if let Some(recommendations) = args.recommendations {
        size.recommendations = recommendations;
    }
    if let Some(per_region) = args.trends_per_region {
        size.trends_per_region = per_region;
    }

    let mut phases = PhaseTimer::start();
    let dataset = DatasetGenerator::new(args.seed).generate(&size);
    phases.finish("generate");
    dataset.save(&args.output)?;
    phases.finish("write");

    println!("✓ Dataset written to {}", args.output);
    println!("  {}", dataset.format_summary());
    for (label, duration) in phases.phases() {
        println!("  {label}: {:.2}s", duration.as_secs_f64());
    }
    println!("  total: {:.2}s", phases.total().as_secs_f64());
    Ok(())
}

async fn load_dataset(args: cli::LoadArgs, app: &AppConfig) -> Result<()> {
    let mut es_config = app.elasticsearch.clone();
    if let Some(url) = args.url {
        es_config.url = url;
    }

    let dataset = Dataset::load(&args.dataset)?;
    let client = ElasticsearchClient::new(es_config)?;

    match client.health().await {
        Ok(status) => info!("Cluster health: {}", status),
        Err(e) => warn!("Cluster health unavailable: {}", e),
    }

    let mut phases = PhaseTimer::start();
    let summary = client.load_dataset(&dataset, args.recreate).await?;
    let took = phases.finish("load");

    println!(
        "✓ Indexed {} content documents and {} regional trends in {:.2}s",
        summary.content_indexed,
        summary.trends_indexed,
        took.as_secs_f64()
    );
    if !summary.indices_created.is_empty() {
        println!("  Created indices: {}", summary.indices_created.join(", "));
    }
    Ok(())
}

/// Build the backend selected by name
fn build_backend(
    kind: BackendKind,
    app: &AppConfig,
    dataset_path: &str,
    latency_ms: u64,
) -> Result<Backend> {
    if !kind.is_local() {
        let client = ElasticsearchClient::new(app.elasticsearch.clone())?;
        return Ok(Backend::Elasticsearch(client));
    }

    let dataset = Dataset::load(dataset_path).with_context(|| {
        format!(
            "No dataset for the {} store; run `contentbench generate -o {dataset_path}`",
            kind.name()
        )
    })?;
    let latency = Duration::from_millis(latency_ms);
    let backend = match kind {
        BackendKind::Document => {
            Backend::Document(Arc::new(DocumentStore::from_dataset(&dataset)?.with_latency(latency)))
        }
        _ => Backend::KeyValue(Arc::new(KeyValueStore::from_dataset(&dataset).with_latency(latency))),
    };
    Ok(backend)
}

async fn run_query(
    args: cli::RunArgs,
    file: &ConfigFile,
    env_format: Option<&str>,
    color: bool,
) -> Result<()> {
    let app = &file.app;

    let (query, mut requests, mut concurrency) = match &args.profile {
        Some(name) => {
            let profile = file
                .workload(name)
                .ok_or_else(|| anyhow::anyhow!("Unknown workload profile: {name}"))?;
            let query = profile
                .to_query()
                .ok_or_else(|| anyhow::anyhow!("Workload '{name}' has an invalid query"))?;
            (query, profile.num_requests, profile.concurrency)
        }
        None => {
            let query = TrendQuery::parse(&args.query, Some(args.region.as_str()))
                .ok_or_else(|| {
                    anyhow::anyhow!("Unknown query '{}' or region '{}'", args.query, args.region)
                })?;
            (query, app.harness.num_requests, app.harness.concurrency)
        }
    };
    if let Some(n) = args.requests {
        requests = n;
    }
    if let Some(c) = args.concurrency {
        concurrency = c;
    }

    let backend_name = args.backend.as_deref().unwrap_or(&app.default_backend);
    let kind = BackendKind::from_str(backend_name)
        .ok_or_else(|| anyhow::anyhow!("Unknown backend: {backend_name}"))?;
    let latency_ms = args.latency_ms.unwrap_or(app.memory.latency_ms);
    let backend = build_backend(kind, app, &args.dataset, latency_ms)?;

    let format_name = if args.format == "text" {
        env_format.unwrap_or("text")
    } else {
        args.format.as_str()
    };
    let format = ReportFormat::from_str(format_name)
        .ok_or_else(|| anyhow::anyhow!("Unknown output format: {format_name}"))?;
    let formatter = formatter(format, color);

    if args.show_rows {
        let rows = backend.execute(&query).await?;
        println!("{}\n", formatter.format_rows(&rows)?);
    }

    info!(
        "Measuring {} on {} ({} requests, {} concurrent)",
        query,
        kind.name(),
        requests,
        concurrency
    );
    if let (Some(region), BackendKind::KeyValue) = (query.region(), kind) {
        debug!("Serving {} from table {}", region, region.cloud_region());
    }

    let mut harness = PerformanceHarness::new().for_backend(kind.name());
    let report = harness
        .measure(
            backend.query_fn(query.clone()),
            &query.display_name(),
            requests,
            concurrency,
        )
        .await?;
    debug!("Harness finished in state: {}", harness.state());

    println!("{}", formatter.format_report(&report)?);

    if args.save {
        let storage = ResultsStorage::new(app.results_dir());
        let path = storage.save(&StoredRun::new(kind.name(), query, report))?;
        println!("\n✓ Run saved to: {}", path.display());
    }

    Ok(())
}

fn compare_stores(args: cli::CompareArgs, app: &AppConfig, color: bool) -> Result<()> {
    let storage = ResultsStorage::new(app.results_dir());
    let runs = if args.stores.is_empty() {
        storage.load_all()?
    } else {
        let mut runs = Vec::new();
        for store in &args.stores {
            runs.extend(storage.load_store(&store.to_lowercase())?);
        }
        runs
    };

    if runs.is_empty() {
        println!("\nNo stored results found in {}", storage.base_dir().display());
        println!("   Record runs with: contentbench run --backend <store> --save");
        return Ok(());
    }

    let format = ReportFormat::from_str(&args.format)
        .ok_or_else(|| anyhow::anyhow!("Unknown output format: {}", args.format))?;
    let comparison = StoreComparator::compare(&runs);
    println!("{}", formatter(format, color).format_comparison(&comparison)?);
    Ok(())
}

fn show_results(args: cli::ResultsArgs, app: &AppConfig, color: bool) -> Result<()> {
    let storage = ResultsStorage::new(app.results_dir());

    let format = ReportFormat::from_str(&args.format)
        .ok_or_else(|| anyhow::anyhow!("Unknown output format: {}", args.format))?;
    let formatter = formatter(format, color);

    if let Some(store) = args.store.as_deref().map(str::to_lowercase) {
        if let Some(run_id) = &args.delete {
            storage.delete(&store, run_id)?;
            println!("✓ Deleted run {run_id} from {store}");
            return Ok(());
        }
        if args.clear {
            storage.delete_store(&store)?;
            println!("✓ Deleted all results for {store}");
            return Ok(());
        }
        if let Some(run_id) = &args.id {
            let run = storage.load(&store, run_id)?;
            println!("{}", formatter.format_report(&run.report)?);
            return Ok(());
        }
    }

    let stores = match &args.store {
        Some(store) => vec![store.to_lowercase()],
        None => storage.list_stores()?,
    };

    if stores.is_empty() {
        println!("\nNo stored results found in {}", storage.base_dir().display());
        return Ok(());
    }

    let mut all_runs = Vec::new();
    for store in &stores {
        if args.latest {
            match storage.latest(store)? {
                Some(run) => println!("{}\n", formatter.format_report(&run.report)?),
                None => println!("No results found for store: {store}"),
            }
        } else {
            println!("{}", formatter.format_runs(&storage.list_runs(store)?));
        }
        all_runs.extend(storage.load_store(store)?);
    }

    if let Some(export_path) = &args.export {
        let path = PathBuf::from(export_path);
        let export_format = ExportFormat::from_extension(&path).unwrap_or(ExportFormat::Json);
        storage.export(&all_runs, &path, export_format)?;
        println!("\n✓ Results exported to: {}", path.display());
    }

    Ok(())
}

fn formatter(format: ReportFormat, color: bool) -> ReportFormatter {
    let formatter = ReportFormatter::new(format);
    if color {
        formatter
    } else {
        formatter.no_color()
    }
}

fn manage_config(args: cli::ConfigArgs, file: &ConfigFile, env: &EnvConfig) -> Result<()> {
    match args.action {
        cli::ConfigAction::Init { output, force } => {
            let path = Path::new(&output);
            if path.exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {output}. Use --force to overwrite."
                );
            }

            ConfigFile::example().save(path)?;
            println!("✓ Configuration file created: {output}");
            println!("\nEdit the file to customize your settings.");
        }

        cli::ConfigAction::Show => {
            let mut shown = file.clone();
            if shown.app.elasticsearch.password.is_some() {
                shown.app.elasticsearch.password = Some("********".to_string());
            }
            println!("{}", serde_yaml::to_string(&shown)?);
            if env.has_any() {
                env.print_summary();
            }
        }

        cli::ConfigAction::Env => {
            config::env::print_env_help();
        }

        cli::ConfigAction::Validate { path } => match ConfigFile::load(&path) {
            Ok(_) => {
                println!("✓ Configuration file is valid: {path}");
            }
            Err(e) => {
                println!("✗ Configuration file is invalid: {path}");
                println!("  Error: {e:#}");
                return Err(e);
            }
        },

        cli::ConfigAction::Profiles => {
            println!("Workload Profiles:");
            println!("{:-<60}", "");
            for name in file.workload_names() {
                if let Some(profile) = file.workload(&name) {
                    println!(
                        "  {:24} {:>6} requests {:>4} callers  {}",
                        profile.name, profile.num_requests, profile.concurrency, profile.description
                    );
                }
            }
        }
    }

    Ok(())
}
