//! Stores under test
//!
//! Each backend answers the same `TrendQuery` set so their measurements are
//! comparable.

mod document;
mod elasticsearch;
mod kv;
mod query;

pub use document::DocumentStore;
pub use elasticsearch::ElasticsearchClient;
pub use kv::KeyValueStore;
pub use query::{TrendQuery, TrendRow};

use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use thiserror::Error;

/// Backend request errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Failed to create client: {0}")]
    Client(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Connection refused to {0}")]
    ConnectionRefused(String),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Bulk indexing into {index} rejected {failed} documents")]
    BulkRejected { index: String, failed: usize },

    #[error("Unknown collection: {0}")]
    UnknownCollection(String),
}

/// Supported backend kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    KeyValue,
    Document,
    Elasticsearch,
}

impl BackendKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "kv" | "key-value" | "keyvalue" | "memory" | "dynamo" | "dynamodb" => {
                Some(BackendKind::KeyValue)
            }
            "document" | "doc" | "mongo" | "mongodb" => Some(BackendKind::Document),
            "elasticsearch" | "es" => Some(BackendKind::Elasticsearch),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::KeyValue => "kv",
            BackendKind::Document => "document",
            BackendKind::Elasticsearch => "elasticsearch",
        }
    }

    /// Stores that answer from an in-process copy of the dataset
    pub fn is_local(&self) -> bool {
        !matches!(self, BackendKind::Elasticsearch)
    }
}

/// A configured store
#[derive(Clone)]
pub enum Backend {
    KeyValue(Arc<KeyValueStore>),
    Document(Arc<DocumentStore>),
    Elasticsearch(ElasticsearchClient),
}

impl Backend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::KeyValue(_) => BackendKind::KeyValue,
            Backend::Document(_) => BackendKind::Document,
            Backend::Elasticsearch(_) => BackendKind::Elasticsearch,
        }
    }

    /// Run one query
    pub async fn execute(&self, query: &TrendQuery) -> Result<Vec<TrendRow>, BackendError> {
        match (self, query) {
            (Backend::KeyValue(store), TrendQuery::Regional { region }) => {
                Ok(store.regional(*region).await)
            }
            (Backend::KeyValue(store), TrendQuery::Global) => Ok(store.global().await),
            (Backend::Document(store), TrendQuery::Regional { region }) => {
                store.regional(*region).await
            }
            (Backend::Document(store), TrendQuery::Global) => store.global().await,
            (Backend::Elasticsearch(client), TrendQuery::Regional { region }) => {
                client.regional(*region).await
            }
            (Backend::Elasticsearch(client), TrendQuery::Global) => client.global().await,
        }
    }

    /// A zero-argument callable issuing `query`, for the measurement harness
    pub fn query_fn(
        &self,
        query: TrendQuery,
    ) -> impl Fn() -> BoxFuture<'static, anyhow::Result<Vec<TrendRow>>> + Send + Sync + 'static
    {
        let backend = self.clone();
        move || {
            let backend = backend.clone();
            let query = query.clone();
            async move { backend.execute(&query).await.map_err(anyhow::Error::from) }.boxed()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Dataset, DatasetGenerator, DatasetSize, Region};
    use crate::harness::{FixedSampler, PerformanceHarness};

    fn dataset() -> Dataset {
        DatasetGenerator::new(Some(21)).generate(&DatasetSize::small())
    }

    fn kv_backend() -> Backend {
        Backend::KeyValue(Arc::new(KeyValueStore::from_dataset(&dataset())))
    }

    fn document_backend() -> Backend {
        Backend::Document(Arc::new(DocumentStore::from_dataset(&dataset()).unwrap()))
    }

    #[test]
    fn test_backend_kind() {
        assert_eq!(BackendKind::from_str("ES"), Some(BackendKind::Elasticsearch));
        assert_eq!(BackendKind::from_str("memory"), Some(BackendKind::KeyValue));
        assert_eq!(BackendKind::from_str("dynamodb"), Some(BackendKind::KeyValue));
        assert_eq!(BackendKind::from_str("mongo"), Some(BackendKind::Document));
        assert_eq!(BackendKind::from_str("cassandra"), None);
        assert!(BackendKind::Document.is_local());
        assert!(!BackendKind::Elasticsearch.is_local());
        assert_eq!(kv_backend().kind().name(), "kv");
        assert_eq!(document_backend().kind().name(), "document");
    }

    #[tokio::test]
    async fn test_execute_dispatch() {
        for backend in [kv_backend(), document_backend()] {
            let rows = backend
                .execute(&TrendQuery::Regional {
                    region: Region::Europe,
                })
                .await
                .unwrap();
            assert_eq!(rows.len(), 10, "{}", backend.kind().name());

            let rows = backend.execute(&TrendQuery::Global).await.unwrap();
            assert!(!rows.is_empty());
            assert!(rows.len() <= 5);
        }
    }

    #[tokio::test]
    async fn test_query_fn_under_harness() {
        let backend = document_backend();
        let query = backend.query_fn(TrendQuery::Global);
        let mut harness = PerformanceHarness::with_sampler(FixedSampler::new(5.0, 40.0));

        let report = harness
            .measure(query, "Global Content Query", 20, 4)
            .await
            .unwrap();
        assert_eq!(report.successful_requests, 20);
        assert_eq!(report.failed_requests, 0);
    }

    #[test]
    fn test_error_display() {
        let err = BackendError::Status {
            status: 404,
            body: "index_not_found_exception".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unexpected status 404: index_not_found_exception"
        );
    }
}
