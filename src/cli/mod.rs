//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};

/// Content recommendation store benchmark
#[derive(Parser, Debug)]
#[command(name = "contentbench")]
#[command(version)]
#[command(about = "Measure query latency and throughput of content recommendation stores")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (YAML or JSON)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Append log output to this file
    #[arg(long, global = true)]
    pub log_file: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a synthetic dataset
    Generate(GenerateArgs),

    /// Load a dataset into Elasticsearch
    Load(LoadArgs),

    /// Measure a query against a store
    Run(RunArgs),

    /// Compare stored runs across stores
    Compare(CompareArgs),

    /// View stored runs
    Results(ResultsArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for generate command
#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// Output file
    #[arg(short, long, default_value = "dataset.json")]
    pub output: String,

    /// Random seed for a reproducible dataset
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Generate a small dataset for quick runs
    #[arg(long)]
    pub small: bool,

    /// Number of users
    #[arg(long)]
    pub users: Option<usize>,

    /// Number of content items
    #[arg(long)]
    pub content: Option<usize>,

    /// Number of interactions
    #[arg(long)]
    pub interactions: Option<usize>,

    /// Number of recommendations
    #[arg(long)]
    pub recommendations: Option<usize>,

    /// Trend documents per region
    #[arg(long)]
    pub trends_per_region: Option<usize>,
}

/// Arguments for load command
#[derive(Parser, Debug)]
pub struct LoadArgs {
    /// Dataset file
    #[arg(short, long, default_value = "dataset.json")]
    pub dataset: String,

    /// Elasticsearch URL (overrides configuration)
    #[arg(long)]
    pub url: Option<String>,

    /// Delete and recreate the indices first
    #[arg(long)]
    pub recreate: bool,
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Store to query (kv, document, elasticsearch)
    #[arg(short, long)]
    pub backend: Option<String>,

    /// Query scope (regional, global)
    #[arg(short, long, default_value = "regional")]
    pub query: String,

    /// Region for regional queries
    #[arg(short, long, default_value = "north-america")]
    pub region: String,

    /// Named workload profile; sets query, region, requests and concurrency
    #[arg(short, long)]
    pub profile: Option<String>,

    /// Dataset for the in-process stores
    #[arg(short, long, default_value = "dataset.json")]
    pub dataset: String,

    /// Number of requests
    #[arg(short = 'n', long)]
    pub requests: Option<usize>,

    /// Number of concurrent callers
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Output format (text, json, json-pretty, markdown, csv)
    #[arg(short, long, default_value = "text")]
    pub format: String,

    /// Save the run to the results directory
    #[arg(short, long)]
    pub save: bool,

    /// Print the rows one query returns before measuring
    #[arg(long)]
    pub show_rows: bool,

    /// Simulated in-process store latency in milliseconds
    #[arg(long)]
    pub latency_ms: Option<u64>,
}

/// Arguments for compare command
#[derive(Parser, Debug)]
pub struct CompareArgs {
    /// Stores to compare (default: every store with results)
    #[arg(short, long, value_delimiter = ',')]
    pub stores: Vec<String>,

    /// Output format (text, json, json-pretty, markdown, csv)
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

/// Arguments for results command
#[derive(Parser, Debug)]
pub struct ResultsArgs {
    /// Filter by store
    #[arg(short, long)]
    pub store: Option<String>,

    /// Show the full report of the latest run
    #[arg(short, long)]
    pub latest: bool,

    /// Output format for --latest
    #[arg(short, long, default_value = "text")]
    pub format: String,

    /// Export runs to a .json or .csv file
    #[arg(short, long)]
    pub export: Option<String>,

    /// Show the full report of one run (requires --store)
    #[arg(long, requires = "store", conflicts_with = "latest")]
    pub id: Option<String>,

    /// Delete one run (requires --store)
    #[arg(long, requires = "store", value_name = "ID")]
    pub delete: Option<String>,

    /// Delete every run of a store (requires --store)
    #[arg(long, requires = "store", conflicts_with = "delete")]
    pub clear: bool,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write an example configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "contentbench.yaml")]
        output: String,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration
    Show,

    /// List environment variables
    Env,

    /// Validate a configuration file
    Validate {
        /// Path to the file
        path: String,
    },

    /// List workload profiles
    Profiles,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args() {
        let args = Args::parse_from([
            "contentbench",
            "run",
            "--backend",
            "document",
            "--query",
            "global",
            "-n",
            "1000",
            "-c",
            "100",
            "--save",
        ]);
        match args.command {
            Command::Run(run) => {
                assert_eq!(run.backend.as_deref(), Some("document"));
                assert_eq!(run.query, "global");
                assert_eq!(run.requests, Some(1000));
                assert_eq!(run.concurrency, Some(100));
                assert!(run.save);
                assert_eq!(run.format, "text");
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_generate_args() {
        let args = Args::parse_from([
            "contentbench",
            "generate",
            "--seed",
            "42",
            "--small",
            "-o",
            "data/small.json",
        ]);
        match args.command {
            Command::Generate(generate) => {
                assert_eq!(generate.seed, Some(42));
                assert!(generate.small);
                assert_eq!(generate.output, "data/small.json");
            }
            _ => panic!("Expected Generate command"),
        }
    }

    #[test]
    fn test_compare_args() {
        let args = Args::parse_from(["contentbench", "compare", "--stores", "kv,elasticsearch"]);
        match args.command {
            Command::Compare(compare) => {
                assert_eq!(compare.stores, vec!["kv", "elasticsearch"]);
            }
            _ => panic!("Expected Compare command"),
        }
    }

    #[test]
    fn test_global_flags() {
        let args = Args::parse_from([
            "contentbench",
            "config",
            "show",
            "--verbose",
            "--log-file",
            "bench.log",
        ]);
        assert!(args.verbose);
        assert_eq!(args.log_file.as_deref(), Some("bench.log"));
        assert!(matches!(
            args.command,
            Command::Config(ConfigArgs {
                action: ConfigAction::Show
            })
        ));
    }

    #[test]
    fn test_results_management_args() {
        let args = Args::parse_from([
            "contentbench",
            "results",
            "--store",
            "kv",
            "--delete",
            "20260101_120000_0001",
            "--no-color",
        ]);
        assert!(args.no_color);
        match args.command {
            Command::Results(results) => {
                assert_eq!(results.store.as_deref(), Some("kv"));
                assert_eq!(results.delete.as_deref(), Some("20260101_120000_0001"));
                assert!(!results.clear);
            }
            _ => panic!("Expected Results command"),
        }
    }

    #[test]
    fn test_results_clear_requires_store() {
        let parsed = Args::try_parse_from(["contentbench", "results", "--clear"]);
        assert!(parsed.is_err());
    }
}
