//! In-process key-value store
//!
//! Each cloud region hosts its own regional trends table holding the trends
//! of the region it serves. Content is replicated into every region as a
//! title index. A regional query scans the local table; a global query scans
//! the table of every cloud region and aggregates client-side.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use super::query::{rank_global, rank_regional, TrendRow, GLOBAL_LIMIT, REGIONAL_LIMIT};
use crate::dataset::{ContentType, Dataset, Region, RegionalTrend};

/// Region-partitioned key-value store, keyed by cloud region code
#[derive(Clone, Debug, Default)]
pub struct KeyValueStore {
    tables: BTreeMap<&'static str, Vec<RegionalTrend>>,
    content_types: HashMap<String, ContentType>,
    latency: Option<Duration>,
}

impl KeyValueStore {
    /// Load one trends table per cloud region
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let tables: BTreeMap<_, _> = Region::all()
            .into_iter()
            .map(|region| {
                let trends: Vec<RegionalTrend> = dataset.trends_in(region).cloned().collect();
                debug!("Table {} ({}): {} trends", region.cloud_region(), region, trends.len());
                (region.cloud_region(), trends)
            })
            .collect();

        let mut content_types = HashMap::with_capacity(dataset.content.len());
        for content in &dataset.content {
            content_types
                .entry(content.title.clone())
                .or_insert(content.content_type);
        }

        Self {
            tables,
            content_types,
            latency: None,
        }
    }

    /// Simulated round-trip latency added to every table scan
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency).filter(|d| !d.is_zero());
        self
    }

    /// Trends stored in the table serving `region`
    pub fn partition(&self, region: Region) -> &[RegionalTrend] {
        self.tables
            .get(region.cloud_region())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    async fn scan(&self, region: Region) -> &[RegionalTrend] {
        if let Some(latency) = self.latency {
            sleep(latency).await;
        }
        self.partition(region)
    }

    /// Top trends of one region
    pub async fn regional(&self, region: Region) -> Vec<TrendRow> {
        let trends = self.scan(region).await;
        rank_regional(trends, &self.content_types, REGIONAL_LIMIT)
    }

    /// Top content summed across every region
    pub async fn global(&self) -> Vec<TrendRow> {
        let mut all = Vec::new();
        for region in Region::all() {
            all.extend(self.scan(region).await);
        }
        rank_global(all, &self.content_types, GLOBAL_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{DatasetGenerator, DatasetSize};
    use std::time::Instant;

    fn store() -> (Dataset, KeyValueStore) {
        let dataset = DatasetGenerator::new(Some(42)).generate(&DatasetSize::small());
        let store = KeyValueStore::from_dataset(&dataset);
        (dataset, store)
    }

    #[test]
    fn test_one_table_per_cloud_region() {
        let (dataset, store) = store();

        assert_eq!(store.tables.len(), 4);
        assert!(store.tables.contains_key("ap-south-1"));
        for region in Region::all() {
            let partition = store.partition(region);
            assert_eq!(partition.len(), dataset.trends_in(region).count());
            assert!(partition.iter().all(|t| t.region == region));
        }
    }

    #[test]
    fn test_regional_query() {
        let (_, store) = store();
        let rows = tokio_test::block_on(store.regional(Region::Asia));

        assert_eq!(rows.len(), REGIONAL_LIMIT);
        assert!(rows.windows(2).all(|w| w[0].total_views >= w[1].total_views));
        // every top_content title comes from the content collection
        assert!(rows.iter().all(|r| r.content_type.is_some()));
    }

    #[test]
    fn test_global_query() {
        let (dataset, store) = store();
        let rows = tokio_test::block_on(store.global());

        assert_eq!(rows.len(), GLOBAL_LIMIT);
        let best: u64 = dataset
            .regional_trends
            .iter()
            .filter(|t| t.top_content == rows[0].content_title)
            .map(|t| t.engagement_metrics.total_views)
            .sum();
        assert_eq!(rows[0].total_views, best);
    }

    #[test]
    fn test_empty_partition() {
        let store = KeyValueStore::default();
        assert!(store.partition(Region::Europe).is_empty());
        assert!(tokio_test::block_on(store.regional(Region::Europe)).is_empty());
    }

    #[tokio::test]
    async fn test_simulated_latency() {
        let (_, store) = store();
        let store = store.with_latency(Duration::from_millis(5));

        let start = Instant::now();
        store.global().await;
        // one scan per table
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
