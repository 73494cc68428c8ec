//! Output formatters for measured runs
//!
//! Provides text, JSON, Markdown and CSV renderings of a metrics report and
//! of a store comparison.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::backend::TrendRow;
use crate::harness::MetricsReport;
use crate::results::{RunInfo, StoreComparison};

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
    JsonPretty,
    Markdown,
    Csv,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "table" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "json-pretty" | "jsonpretty" => Some(ReportFormat::JsonPretty),
            "markdown" | "md" => Some(ReportFormat::Markdown),
            "csv" => Some(ReportFormat::Csv),
            _ => None,
        }
    }
}

/// Report formatter
pub struct ReportFormatter {
    format: ReportFormat,
    colorize: bool,
}

impl ReportFormatter {
    pub fn new(format: ReportFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    fn json<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        let json = match self.format {
            ReportFormat::JsonPretty => serde_json::to_string_pretty(value),
            _ => serde_json::to_string(value),
        };
        json.context("Failed to serialize output")
    }

    fn highlight(&self, text: &str) -> String {
        if self.colorize {
            format!("\x1b[1;32m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    /// Format one metrics report
    pub fn format_report(&self, report: &MetricsReport) -> Result<String> {
        match self.format {
            ReportFormat::Text => Ok(self.format_report_text(report)),
            ReportFormat::Json | ReportFormat::JsonPretty => self.json(report),
            ReportFormat::Markdown => Ok(self.format_report_markdown(report)),
            ReportFormat::Csv => self.format_report_csv(report),
        }
    }

    fn format_report_text(&self, report: &MetricsReport) -> String {
        let rule = "=".repeat(50);
        let mut output = String::new();

        output.push_str(&format!("{rule}\n"));
        output.push_str(&format!("Performance Metrics for: {}\n", report.name));
        if let Some(backend) = &report.backend {
            output.push_str(&format!("Backend: {backend}\n"));
        }
        output.push_str(&format!(
            "Requests: {} ({} concurrent, {} failed)\n",
            report.total_requests, report.concurrent_users, report.failed_requests
        ));
        output.push_str(&format!("{rule}\n"));

        for (description, value, unit) in report.display_rows() {
            output.push_str(&format!("{description:<30}: {value} {unit}\n"));
        }
        output.push_str(&format!(
            "{:<30}: p50={:.2} p95={:.2} p99={:.2} ms\n",
            "Latency Percentiles",
            report.percentiles.p50,
            report.percentiles.p95,
            report.percentiles.p99
        ));
        output.push_str(&rule);
        output
    }

    fn format_report_markdown(&self, report: &MetricsReport) -> String {
        let mut output = format!("## {}\n\n", report.name);
        if let Some(backend) = &report.backend {
            output.push_str(&format!("Backend: `{backend}`\n\n"));
        }
        output.push_str("| Metric | Value | Unit |\n");
        output.push_str("|--------|------:|------|\n");
        for (description, value, unit) in report.display_rows() {
            output.push_str(&format!("| {description} | {value} | {unit} |\n"));
        }
        output.push_str(&format!(
            "| Successful Requests | {} of {} | |\n",
            report.successful_requests, report.total_requests
        ));
        output
    }

    fn format_report_csv(&self, report: &MetricsReport) -> Result<String> {
        let map = report.to_metric_map();
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(std::iter::once("name").chain(map.keys().map(String::as_str)))?;
        writer.write_record(
            std::iter::once(report.name.clone()).chain(map.values().map(|v| format!("{v:.2}"))),
        )?;
        into_string(writer)
    }

    /// Format the rows a query returned
    pub fn format_rows(&self, rows: &[TrendRow]) -> Result<String> {
        let text = match self.format {
            ReportFormat::Json | ReportFormat::JsonPretty => return self.json(rows),
            ReportFormat::Csv => {
                let mut writer = csv::Writer::from_writer(Vec::new());
                for row in rows {
                    writer.serialize(row)?;
                }
                return into_string(writer);
            }
            ReportFormat::Markdown => {
                let mut output = String::from("| # | Title | Type | Views | Likes |\n");
                output.push_str("|--:|-------|------|------:|------:|\n");
                for (i, row) in rows.iter().enumerate() {
                    output.push_str(&format!(
                        "| {} | {} | {} | {} | {} |\n",
                        i + 1,
                        row.content_title,
                        row.content_type.map(|t| t.as_str()).unwrap_or("-"),
                        row.total_views,
                        row.total_likes
                    ));
                }
                output
            }
            ReportFormat::Text => rows
                .iter()
                .enumerate()
                .map(|(i, row)| {
                    format!(
                        "{:2}. {:30} {:12} views={:>6} likes={:>6}",
                        i + 1,
                        row.content_title,
                        row.content_type.map(|t| t.as_str()).unwrap_or("-"),
                        row.total_views,
                        row.total_likes
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"),
        };
        Ok(text)
    }

    /// Format a store comparison
    pub fn format_comparison(&self, comparison: &StoreComparison) -> Result<String> {
        if comparison.is_empty() {
            return match self.format {
                ReportFormat::Json | ReportFormat::JsonPretty => self.json(comparison),
                _ => Ok("No runs to compare".to_string()),
            };
        }

        match self.format {
            ReportFormat::Text => Ok(self.format_comparison_text(comparison)),
            ReportFormat::Json | ReportFormat::JsonPretty => self.json(comparison),
            ReportFormat::Markdown => Ok(self.format_comparison_markdown(comparison)),
            ReportFormat::Csv => self.format_comparison_csv(comparison),
        }
    }

    fn format_comparison_text(&self, comparison: &StoreComparison) -> String {
        let mut output = String::new();

        for query in &comparison.queries {
            output.push_str(&format!("\n{}\n", query.query));
            output.push_str(&format!("{}\n", "-".repeat(88)));
            output.push_str(&format!(
                "{:<16} {:>14} {:>9} {:>12} {:>12} {:>10} {:>8}\n",
                "Store", "Throughput/s", "Relative", "Avg (ms)", "P95 (ms)", "Success", "Rank"
            ));
            for entry in &query.entries {
                let store = format!("{:<16}", entry.store);
                let store = if entry.throughput_rank == 1 {
                    self.highlight(&store)
                } else {
                    store
                };
                let relative = query
                    .relative_throughput(&entry.store)
                    .map(|r| format!("{:.0}%", r * 100.0))
                    .unwrap_or_else(|| "-".to_string());
                output.push_str(&format!(
                    "{} {:>14.2} {:>9} {:>12.2} {:>12.2} {:>9.1}% {:>8}\n",
                    store,
                    entry.throughput_queries_per_sec,
                    relative,
                    entry.avg_response_time_ms,
                    entry.p95_response_time_ms,
                    entry.success_rate * 100.0,
                    entry.throughput_rank
                ));
            }
        }

        if let Some(winner) = comparison.overall_winner() {
            output.push_str(&format!(
                "\nHighest throughput on most queries: {}\n",
                self.highlight(winner)
            ));
        }
        output
    }

    fn format_comparison_markdown(&self, comparison: &StoreComparison) -> String {
        let mut output = String::from("# Store Comparison\n");

        for query in &comparison.queries {
            output.push_str(&format!("\n## {}\n\n", query.query));
            output.push_str("| Rank | Store | Throughput (q/s) | Avg (ms) | P95 (ms) | Std Dev (ms) |\n");
            output.push_str("|-----:|-------|-----------------:|---------:|---------:|-------------:|\n");
            for entry in &query.entries {
                output.push_str(&format!(
                    "| {} | {} | {:.2} | {:.2} | {:.2} | {:.2} |\n",
                    entry.throughput_rank,
                    entry.store,
                    entry.throughput_queries_per_sec,
                    entry.avg_response_time_ms,
                    entry.p95_response_time_ms,
                    entry.response_time_std_dev_ms
                ));
            }
        }
        output
    }

    fn format_comparison_csv(&self, comparison: &StoreComparison) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record([
            "query",
            "store",
            "run_id",
            "throughput_queries_per_sec",
            "avg_response_time_ms",
            "p95_response_time_ms",
            "response_time_std_dev_ms",
            "success_rate",
            "throughput_rank",
            "latency_rank",
        ])?;
        for query in &comparison.queries {
            for e in &query.entries {
                writer.write_record([
                    query.query.clone(),
                    e.store.clone(),
                    e.run_id.clone(),
                    format!("{:.2}", e.throughput_queries_per_sec),
                    format!("{:.2}", e.avg_response_time_ms),
                    format!("{:.2}", e.p95_response_time_ms),
                    format!("{:.2}", e.response_time_std_dev_ms),
                    format!("{:.4}", e.success_rate),
                    e.throughput_rank.to_string(),
                    e.latency_rank.to_string(),
                ])?;
            }
        }
        into_string(writer)
    }

    /// Format a listing of stored runs
    pub fn format_runs(&self, runs: &[RunInfo]) -> String {
        if runs.is_empty() {
            return "No stored runs".to_string();
        }

        let mut output = format!(
            "{:<22} {:<14} {:<32} {:>12} {:>10}\n",
            "ID", "Store", "Query", "Throughput", "Avg (ms)"
        );
        for run in runs {
            output.push_str(&format!(
                "{:<22} {:<14} {:<32} {:>12.2} {:>10.2}\n",
                run.id, run.store, run.query, run.throughput, run.avg_response_time_ms
            ));
        }
        output
    }
}

fn into_string(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV output: {}", e.error()))?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}
