//! Store comparison
//!
//! Lines up the latest run of every store per query and ranks the stores by
//! throughput and by mean latency.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::results::storage::StoredRun;

/// Comparison of stores across every measured query
#[derive(Clone, Debug, Default, Serialize)]
pub struct StoreComparison {
    /// Stores that appear in at least one query
    pub stores: Vec<String>,

    /// Per-query comparison, ordered by query name
    pub queries: Vec<QueryComparison>,

    /// Number of queries each store won on throughput
    pub throughput_wins: BTreeMap<String, u32>,

    /// Number of queries each store won on mean latency
    pub latency_wins: BTreeMap<String, u32>,
}

/// All stores measured on one query
#[derive(Clone, Debug, Serialize)]
pub struct QueryComparison {
    pub query: String,
    /// One entry per store, best throughput first
    pub entries: Vec<ComparisonEntry>,
}

/// One store's latest run of a query
#[derive(Clone, Debug, Serialize)]
pub struct ComparisonEntry {
    pub store: String,
    pub run_id: String,
    pub throughput_queries_per_sec: f64,
    pub avg_response_time_ms: f64,
    pub p95_response_time_ms: f64,
    pub response_time_std_dev_ms: f64,
    pub success_rate: f64,
    /// 1 = highest throughput
    pub throughput_rank: u32,
    /// 1 = lowest mean latency
    pub latency_rank: u32,
}

impl QueryComparison {
    /// Store with the highest throughput
    pub fn highest_throughput(&self) -> Option<&ComparisonEntry> {
        self.entries.iter().find(|e| e.throughput_rank == 1)
    }

    /// Store with the lowest mean latency
    pub fn fastest(&self) -> Option<&ComparisonEntry> {
        self.entries.iter().find(|e| e.latency_rank == 1)
    }

    /// Throughput of `store` relative to the best, as a ratio in (0, 1]
    pub fn relative_throughput(&self, store: &str) -> Option<f64> {
        let best = self.highest_throughput()?.throughput_queries_per_sec;
        let entry = self.entries.iter().find(|e| e.store == store)?;
        (best > 0.0).then(|| entry.throughput_queries_per_sec / best)
    }
}

impl StoreComparison {
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Store with the most throughput wins
    pub fn overall_winner(&self) -> Option<&str> {
        self.throughput_wins
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(store, _)| store.as_str())
    }
}

/// Store comparator
pub struct StoreComparator;

impl StoreComparator {
    /// Compare the latest run per (store, query) pair
    pub fn compare(runs: &[StoredRun]) -> StoreComparison {
        let latest = Self::latest_per_pair(runs);
        if latest.is_empty() {
            return StoreComparison::default();
        }

        let mut by_query: BTreeMap<String, Vec<&StoredRun>> = BTreeMap::new();
        for run in latest.values() {
            by_query
                .entry(run.report.name.clone())
                .or_default()
                .push(run);
        }

        let mut stores = BTreeSet::new();
        let mut throughput_wins = BTreeMap::new();
        let mut latency_wins = BTreeMap::new();

        let queries: Vec<QueryComparison> = by_query
            .into_iter()
            .map(|(query, runs)| {
                let comparison = Self::compare_query(query, &runs);
                for entry in &comparison.entries {
                    stores.insert(entry.store.clone());
                }
                if let Some(best) = comparison.highest_throughput() {
                    *throughput_wins.entry(best.store.clone()).or_insert(0) += 1;
                }
                if let Some(best) = comparison.fastest() {
                    *latency_wins.entry(best.store.clone()).or_insert(0) += 1;
                }
                comparison
            })
            .collect();

        StoreComparison {
            stores: stores.into_iter().collect(),
            queries,
            throughput_wins,
            latency_wins,
        }
    }

    fn latest_per_pair(runs: &[StoredRun]) -> BTreeMap<String, &StoredRun> {
        let mut latest: BTreeMap<String, &StoredRun> = BTreeMap::new();
        for run in runs {
            let key = run.key();
            match latest.get(&key) {
                Some(existing) if existing.recorded_at >= run.recorded_at => {}
                _ => {
                    latest.insert(key, run);
                }
            }
        }
        latest
    }

    fn compare_query(query: String, runs: &[&StoredRun]) -> QueryComparison {
        let mut entries: Vec<ComparisonEntry> = runs
            .iter()
            .map(|run| ComparisonEntry {
                store: run.store.clone(),
                run_id: run.id.clone(),
                throughput_queries_per_sec: run.report.throughput_queries_per_sec,
                avg_response_time_ms: run.report.avg_response_time_ms,
                p95_response_time_ms: run.report.percentiles.p95,
                response_time_std_dev_ms: run.report.response_time_std_dev_ms,
                success_rate: run.report.success_rate(),
                throughput_rank: 0,
                latency_rank: 0,
            })
            .collect();

        // lower latency is better
        entries.sort_by(|a, b| {
            cmp_f64(a.avg_response_time_ms, b.avg_response_time_ms)
                .then_with(|| a.store.cmp(&b.store))
        });
        for (i, entry) in entries.iter_mut().enumerate() {
            entry.latency_rank = i as u32 + 1;
        }

        entries.sort_by(|a, b| {
            cmp_f64(b.throughput_queries_per_sec, a.throughput_queries_per_sec)
                .then_with(|| a.store.cmp(&b.store))
        });
        for (i, entry) in entries.iter_mut().enumerate() {
            entry.throughput_rank = i as u32 + 1;
        }

        QueryComparison { query, entries }
    }
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TrendQuery;
    use crate::dataset::Region;
    use crate::results::storage::fixtures::run;

    fn asia() -> TrendQuery {
        TrendQuery::Regional {
            region: Region::Asia,
        }
    }

    #[test]
    fn test_empty() {
        let comparison = StoreComparator::compare(&[]);
        assert!(comparison.is_empty());
        assert!(comparison.overall_winner().is_none());
    }

    #[test]
    fn test_ranks_by_throughput_and_latency() {
        // kv: 4 requests in 10ms, elasticsearch: 4 requests in 100ms
        let runs = vec![
            run("kv", TrendQuery::Global, &[2.0, 2.0, 3.0, 3.0], 10),
            run("elasticsearch", TrendQuery::Global, &[20.0, 25.0, 30.0, 25.0], 100),
        ];

        let comparison = StoreComparator::compare(&runs);
        assert_eq!(comparison.stores, vec!["elasticsearch", "kv"]);
        assert_eq!(comparison.queries.len(), 1);

        let query = &comparison.queries[0];
        assert_eq!(query.query, "Global Content Query");
        assert_eq!(query.highest_throughput().unwrap().store, "kv");
        assert_eq!(query.fastest().unwrap().store, "kv");
        assert_eq!(query.entries[1].throughput_rank, 2);

        let ratio = query.relative_throughput("elasticsearch").unwrap();
        assert!((ratio - 0.1).abs() < 1e-9);
        assert_eq!(comparison.overall_winner(), Some("kv"));
    }

    #[test]
    fn test_uses_latest_run_per_store() {
        let mut stale = run("kv", asia(), &[50.0], 50);
        stale.recorded_at = stale.recorded_at - chrono::Duration::days(1);
        let fresh = run("kv", asia(), &[1.0], 1);

        let comparison = StoreComparator::compare(&[stale, fresh.clone()]);
        let entries = &comparison.queries[0].entries;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].run_id, fresh.id);
    }

    #[test]
    fn test_queries_counted_separately() {
        let runs = vec![
            run("kv", TrendQuery::Global, &[1.0], 1),
            run("elasticsearch", TrendQuery::Global, &[9.0], 9),
            run("kv", asia(), &[9.0], 9),
            run("elasticsearch", asia(), &[1.0], 1),
        ];

        let comparison = StoreComparator::compare(&runs);
        assert_eq!(comparison.queries.len(), 2);
        assert_eq!(comparison.throughput_wins.get("kv"), Some(&1));
        assert_eq!(comparison.throughput_wins.get("elasticsearch"), Some(&1));
        // ties break alphabetically
        assert_eq!(comparison.overall_winner(), Some("elasticsearch"));
    }
}
