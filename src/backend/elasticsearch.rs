//! Elasticsearch backend
//!
//! Talks to the REST API directly with reqwest: index creation, NDJSON bulk
//! loading, and the two trend searches.

use reqwest::{Client, Method, RequestBuilder};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

use super::query::{TrendRow, GLOBAL_LIMIT, REGIONAL_LIMIT};
use super::BackendError;
use crate::config::ElasticsearchConfig;
use crate::dataset::{ContentType, Dataset, Region};

/// Documents sent per `_bulk` request
pub const BULK_CHUNK: usize = 500;

/// Result of loading a dataset
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub content_indexed: usize,
    pub trends_indexed: usize,
    pub indices_created: Vec<String>,
}

/// Elasticsearch REST client
#[derive(Clone)]
pub struct ElasticsearchClient {
    client: Client,
    config: ElasticsearchConfig,
}

impl ElasticsearchClient {
    pub fn new(config: ElasticsearchConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!config.verify_certs)
            .build()
            .map_err(|e| BackendError::Client(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn build_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.build_url(path);
        debug!("{} {}", method, url);

        let builder = self.client.request(method, url);
        match &self.config.username {
            Some(user) => builder.basic_auth(user, self.config.password.as_deref()),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, BackendError> {
        builder.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout(self.config.timeout_secs)
            } else if e.is_connect() {
                BackendError::ConnectionRefused(self.config.url.clone())
            } else {
                BackendError::RequestFailed(e.to_string())
            }
        })
    }

    /// Send a request and decode a 2xx JSON body
    async fn send_json(&self, builder: RequestBuilder) -> Result<Value, BackendError> {
        let response = self.send(builder).await?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::RequestFailed(e.to_string()))?;

        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: truncate(&body, 512),
            });
        }

        serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))
    }

    /// Cluster health status ("green", "yellow", "red")
    pub async fn health(&self) -> Result<String, BackendError> {
        let value = self
            .send_json(self.request(Method::GET, "_cluster/health"))
            .await?;
        value["status"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| BackendError::Decode("missing cluster status".to_string()))
    }

    pub async fn index_exists(&self, index: &str) -> Result<bool, BackendError> {
        let response = self.send(self.request(Method::HEAD, index)).await?;
        Ok(response.status().is_success())
    }

    /// Create an index unless it already exists; true when created
    pub async fn create_index(&self, index: &str, body: &Value) -> Result<bool, BackendError> {
        if self.index_exists(index).await? {
            debug!("Index {} already exists", index);
            return Ok(false);
        }

        self.send_json(self.request(Method::PUT, index).json(body))
            .await?;
        info!("Created index {}", index);
        Ok(true)
    }

    pub async fn delete_index(&self, index: &str) -> Result<(), BackendError> {
        if self.index_exists(index).await? {
            self.send_json(self.request(Method::DELETE, index)).await?;
            info!("Deleted index {}", index);
        }
        Ok(())
    }

    /// Index documents in chunks; returns the number indexed
    pub async fn bulk_index<T: Serialize>(
        &self,
        index: &str,
        docs: &[T],
    ) -> Result<usize, BackendError> {
        let mut indexed = 0;

        for chunk in docs.chunks(BULK_CHUNK) {
            let payload = bulk_payload(index, chunk)?;
            let response = self
                .send_json(
                    self.request(Method::POST, "_bulk")
                        .header("Content-Type", "application/x-ndjson")
                        .body(payload),
                )
                .await?;

            let failed = bulk_failures(&response);
            if failed > 0 {
                return Err(BackendError::BulkRejected {
                    index: index.to_string(),
                    failed,
                });
            }
            indexed += chunk.len();
        }

        debug!("Indexed {} documents into {}", indexed, index);
        Ok(indexed)
    }

    /// Create both indices and load content and regional trends
    pub async fn load_dataset(
        &self,
        dataset: &Dataset,
        recreate: bool,
    ) -> Result<LoadSummary, BackendError> {
        let trends_index = self.config.trends_index.clone();
        let content_index = self.config.content_index.clone();

        if recreate {
            self.delete_index(&trends_index).await?;
            self.delete_index(&content_index).await?;
        }

        let mut summary = LoadSummary::default();
        let shards = self.config.shards;
        let replicas = self.config.replicas;

        if self
            .create_index(&content_index, &content_index_body(shards, replicas))
            .await?
        {
            summary.indices_created.push(content_index.clone());
        }
        if self
            .create_index(&trends_index, &trends_index_body(shards, replicas))
            .await?
        {
            summary.indices_created.push(trends_index.clone());
        }

        summary.content_indexed = self.bulk_index(&content_index, &dataset.content).await?;
        summary.trends_indexed = self
            .bulk_index(&trends_index, &dataset.regional_trends)
            .await?;

        // make the documents searchable before the first query
        self.send_json(self.request(Method::POST, &format!("{trends_index},{content_index}/_refresh")))
            .await?;

        Ok(summary)
    }

    async fn search(&self, index: &str, body: &Value) -> Result<Vec<Value>, BackendError> {
        let response = self
            .send_json(self.request(Method::POST, &format!("{index}/_search")).json(body))
            .await?;
        Ok(hit_sources(&response))
    }

    /// Top trends of one region, joined with their content type
    pub async fn regional(&self, region: Region) -> Result<Vec<TrendRow>, BackendError> {
        let hits = self
            .search(&self.config.trends_index, &regional_search_body(region, REGIONAL_LIMIT))
            .await?;
        let mut rows: Vec<TrendRow> = hits.iter().filter_map(trend_row).collect();
        self.join_content_types(&mut rows).await?;
        Ok(rows)
    }

    /// Top trends across every region, joined with their content type
    pub async fn global(&self) -> Result<Vec<TrendRow>, BackendError> {
        let hits = self
            .search(&self.config.trends_index, &global_search_body(GLOBAL_LIMIT))
            .await?;
        let mut rows: Vec<TrendRow> = hits.iter().filter_map(trend_row).collect();
        self.join_content_types(&mut rows).await?;
        Ok(rows)
    }

    /// Look the row titles up in the content index and fill in their type
    async fn join_content_types(&self, rows: &mut [TrendRow]) -> Result<(), BackendError> {
        if rows.is_empty() {
            return Ok(());
        }

        let titles: Vec<&str> = rows.iter().map(|r| r.content_title.as_str()).collect();
        let content = self
            .search(&self.config.content_index, &content_lookup_body(&titles))
            .await?;
        let types = content_types(&content);

        for row in rows.iter_mut() {
            row.content_type = types.get(&row.content_title).copied();
        }
        Ok(())
    }
}

/// Mapping for the regional trends index
pub fn trends_index_body(shards: u32, replicas: u32) -> Value {
    json!({
        "settings": {
            "number_of_shards": shards,
            "number_of_replicas": replicas
        },
        "mappings": {
            "properties": {
                "region": { "type": "keyword" },
                "top_content": { "type": "keyword" },
                "trending_content": { "type": "keyword" },
                "engagement_metrics": {
                    "properties": {
                        "total_views": { "type": "integer" },
                        "total_likes": { "type": "integer" },
                        "total_shares": { "type": "integer" }
                    }
                }
            }
        }
    })
}

/// Mapping for the content index
pub fn content_index_body(shards: u32, replicas: u32) -> Value {
    json!({
        "settings": {
            "number_of_shards": shards,
            "number_of_replicas": replicas
        },
        "mappings": {
            "properties": {
                "content_id": { "type": "keyword" },
                "title": { "type": "keyword" },
                "description": { "type": "text" },
                "type": { "type": "keyword" },
                "genre": { "type": "keyword" },
                "tags": { "type": "keyword" },
                "metadata": {
                    "properties": {
                        "duration": { "type": "keyword" },
                        "actors": { "type": "text" },
                        "release_date": { "type": "date" }
                    }
                }
            }
        }
    })
}

fn engagement_sort() -> Value {
    json!([
        { "engagement_metrics.total_views": { "order": "desc" } },
        { "engagement_metrics.total_likes": { "order": "desc" } }
    ])
}

pub fn regional_search_body(region: Region, size: usize) -> Value {
    json!({
        "size": size,
        "query": {
            "bool": {
                "filter": [
                    { "terms": { "region": [region.name()] } }
                ]
            }
        },
        "sort": engagement_sort(),
        "_source": ["top_content", "engagement_metrics"]
    })
}

pub fn global_search_body(size: usize) -> Value {
    json!({
        "size": size,
        "query": { "match_all": {} },
        "sort": engagement_sort(),
        "_source": ["top_content", "engagement_metrics"]
    })
}

pub fn content_lookup_body(titles: &[&str]) -> Value {
    json!({
        "size": titles.len(),
        "query": {
            "terms": { "title": titles }
        },
        "_source": ["title", "type"]
    })
}

/// NDJSON body for `_bulk`: an index action line per document
pub fn bulk_payload<T: Serialize>(index: &str, docs: &[T]) -> Result<String, BackendError> {
    let action = json!({ "index": { "_index": index } }).to_string();
    let mut payload = String::new();

    for doc in docs {
        let line = serde_json::to_string(doc).map_err(|e| BackendError::Decode(e.to_string()))?;
        payload.push_str(&action);
        payload.push('\n');
        payload.push_str(&line);
        payload.push('\n');
    }

    Ok(payload)
}

/// Number of failed items in a `_bulk` response
fn bulk_failures(response: &Value) -> usize {
    if !response["errors"].as_bool().unwrap_or(false) {
        return 0;
    }
    response["items"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter(|item| item["index"]["error"].is_object())
                .count()
        })
        .unwrap_or(0)
}

fn hit_sources(response: &Value) -> Vec<Value> {
    response["hits"]["hits"]
        .as_array()
        .map(|hits| hits.iter().map(|h| h["_source"].clone()).collect())
        .unwrap_or_default()
}

fn trend_row(source: &Value) -> Option<TrendRow> {
    let metrics = &source["engagement_metrics"];
    Some(TrendRow {
        content_title: source["top_content"].as_str()?.to_string(),
        content_type: None,
        total_views: metrics["total_views"].as_u64().unwrap_or(0),
        total_likes: metrics["total_likes"].as_u64().unwrap_or(0),
    })
}

fn content_types(sources: &[Value]) -> HashMap<String, ContentType> {
    sources
        .iter()
        .filter_map(|s| {
            let title = s["title"].as_str()?.to_string();
            let kind = serde_json::from_value(s["type"].clone()).ok()?;
            Some((title, kind))
        })
        .collect()
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
