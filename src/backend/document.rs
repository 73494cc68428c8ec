//! In-process document store
//!
//! Collections hold JSON documents and are read through aggregation
//! pipelines. The regional and global trend queries are expressed as
//! pipelines of match, sort, lookup, unwind, project, group and limit
//! stages over the `regional_trends` and `content` collections.

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use super::query::{TrendRow, GLOBAL_LIMIT, REGIONAL_LIMIT};
use super::BackendError;
use crate::dataset::{Dataset, Region};

pub const TRENDS_COLLECTION: &str = "regional_trends";
pub const CONTENT_COLLECTION: &str = "content";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// One aggregation stage. Field paths are dotted (`engagement_metrics.total_views`).
#[derive(Clone, Debug, PartialEq)]
pub enum Stage {
    /// Keep documents whose field equals `value`
    Match { field: String, value: Value },
    /// Sort by each key in turn
    Sort(Vec<(String, SortOrder)>),
    /// Attach the foreign documents whose `foreign_field` equals `local_field`
    Lookup {
        from: String,
        local_field: String,
        foreign_field: String,
        as_field: String,
    },
    /// One output document per element of an array field
    Unwind(String),
    /// Reshape into `(output field, source path)` pairs
    Project(Vec<(String, String)>),
    /// Group on `key` into `_id`, summing each `(output field, source path)`
    Group { key: String, sums: Vec<(String, String)> },
    Limit(usize),
}

impl Stage {
    fn matching(field: &str, value: Value) -> Self {
        Stage::Match {
            field: field.to_string(),
            value,
        }
    }

    fn sort(keys: &[(&str, SortOrder)]) -> Self {
        Stage::Sort(keys.iter().map(|(k, o)| (k.to_string(), *o)).collect())
    }

    fn lookup(from: &str, local_field: &str, foreign_field: &str, as_field: &str) -> Self {
        Stage::Lookup {
            from: from.to_string(),
            local_field: local_field.to_string(),
            foreign_field: foreign_field.to_string(),
            as_field: as_field.to_string(),
        }
    }

    fn project(fields: &[(&str, &str)]) -> Self {
        Stage::Project(
            fields
                .iter()
                .map(|(out, path)| (out.to_string(), path.to_string()))
                .collect(),
        )
    }
}

/// Top trends of one region joined with their content type
pub fn regional_pipeline(region: Region, limit: usize) -> Vec<Stage> {
    use SortOrder::*;
    vec![
        Stage::matching("region", json!(region.name())),
        Stage::sort(&[
            ("engagement_metrics.total_views", Descending),
            ("engagement_metrics.total_likes", Descending),
            ("top_content", Ascending),
        ]),
        Stage::lookup(CONTENT_COLLECTION, "top_content", "title", "content_details"),
        Stage::Unwind("content_details".to_string()),
        Stage::project(&[
            ("content_title", "top_content"),
            ("content_type", "content_details.type"),
            ("total_views", "engagement_metrics.total_views"),
            ("total_likes", "engagement_metrics.total_likes"),
        ]),
        Stage::Limit(limit),
    ]
}

/// Top content by views summed over every region
pub fn global_pipeline(limit: usize) -> Vec<Stage> {
    use SortOrder::*;
    vec![
        Stage::Group {
            key: "top_content".to_string(),
            sums: vec![
                ("total_views".to_string(), "engagement_metrics.total_views".to_string()),
                ("total_likes".to_string(), "engagement_metrics.total_likes".to_string()),
            ],
        },
        Stage::sort(&[
            ("total_views", Descending),
            ("total_likes", Descending),
            ("_id", Ascending),
        ]),
        Stage::Limit(limit),
        Stage::lookup(CONTENT_COLLECTION, "_id", "title", "content_details"),
        Stage::Unwind("content_details".to_string()),
        Stage::project(&[
            ("content_title", "_id"),
            ("content_type", "content_details.type"),
            ("total_views", "total_views"),
            ("total_likes", "total_likes"),
        ]),
        // duplicate titles in the content collection unwind into extra rows
        Stage::Limit(limit),
    ]
}

/// Named collections of JSON documents
#[derive(Clone, Debug, Default)]
pub struct DocumentStore {
    collections: HashMap<String, Vec<Value>>,
    latency: Option<Duration>,
}

impl DocumentStore {
    /// Insert the trends and content collections of a dataset
    pub fn from_dataset(dataset: &Dataset) -> Result<Self, BackendError> {
        let mut store = Self::default();
        store.insert_many(TRENDS_COLLECTION, &dataset.regional_trends)?;
        store.insert_many(CONTENT_COLLECTION, &dataset.content)?;
        Ok(store)
    }

    /// Simulated round-trip latency added to every aggregation
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency).filter(|d| !d.is_zero());
        self
    }

    /// Append documents to a collection, creating it if needed
    pub fn insert_many<T: Serialize>(
        &mut self,
        collection: &str,
        documents: &[T],
    ) -> Result<usize, BackendError> {
        let docs = documents
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        let count = docs.len();
        self.collections
            .entry(collection.to_string())
            .or_default()
            .extend(docs);
        debug!("Inserted {} documents into {}", count, collection);
        Ok(count)
    }

    fn collection(&self, name: &str) -> Result<&[Value], BackendError> {
        self.collections
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| BackendError::UnknownCollection(name.to_string()))
    }

    /// Run a pipeline over a collection
    pub async fn aggregate(
        &self,
        collection: &str,
        pipeline: &[Stage],
    ) -> Result<Vec<Value>, BackendError> {
        if let Some(latency) = self.latency {
            sleep(latency).await;
        }

        let mut docs = self.collection(collection)?.to_vec();
        for stage in pipeline {
            docs = self.apply(stage, docs)?;
        }
        Ok(docs)
    }

    fn apply(&self, stage: &Stage, docs: Vec<Value>) -> Result<Vec<Value>, BackendError> {
        let out: Vec<Value> = match stage {
            Stage::Match { field, value } => docs
                .into_iter()
                .filter(|doc| field_value(doc, field) == Some(value))
                .collect(),

            Stage::Sort(keys) => {
                let mut docs = docs;
                docs.sort_by(|a, b| {
                    keys.iter().fold(Ordering::Equal, |ord, (path, order)| {
                        ord.then_with(|| {
                            let cmp = compare_values(field_value(a, path), field_value(b, path));
                            match order {
                                SortOrder::Ascending => cmp,
                                SortOrder::Descending => cmp.reverse(),
                            }
                        })
                    })
                });
                docs
            }

            Stage::Lookup {
                from,
                local_field,
                foreign_field,
                as_field,
            } => {
                let mut index: HashMap<String, Vec<&Value>> = HashMap::new();
                for foreign in self.collection(from)? {
                    if let Some(key) = field_value(foreign, foreign_field) {
                        index.entry(key.to_string()).or_default().push(foreign);
                    }
                }

                docs.into_iter()
                    .map(|mut doc| {
                        let matches: Vec<Value> = field_value(&doc, local_field)
                            .and_then(|key| index.get(&key.to_string()))
                            .map(|found| found.iter().map(|v| (*v).clone()).collect())
                            .unwrap_or_default();
                        if let Value::Object(map) = &mut doc {
                            map.insert(as_field.clone(), Value::Array(matches));
                        }
                        doc
                    })
                    .collect()
            }

            Stage::Unwind(field) => docs
                .into_iter()
                .flat_map(|doc| {
                    let elements = match doc.get(field) {
                        Some(Value::Array(items)) => items.clone(),
                        _ => Vec::new(),
                    };
                    elements.into_iter().map(move |element| {
                        let mut doc = doc.clone();
                        if let Value::Object(map) = &mut doc {
                            map.insert(field.clone(), element);
                        }
                        doc
                    })
                })
                .collect(),

            Stage::Project(fields) => docs
                .iter()
                .map(|doc| {
                    let map: Map<String, Value> = fields
                        .iter()
                        .filter_map(|(out, path)| {
                            field_value(doc, path).map(|v| (out.clone(), v.clone()))
                        })
                        .collect();
                    Value::Object(map)
                })
                .collect(),

            Stage::Group { key, sums } => {
                let mut order: Vec<Value> = Vec::new();
                let mut totals: HashMap<String, Vec<u64>> = HashMap::new();
                for doc in &docs {
                    let Some(id) = field_value(doc, key) else {
                        continue;
                    };
                    let entry = totals.entry(id.to_string()).or_insert_with(|| {
                        order.push(id.clone());
                        vec![0; sums.len()]
                    });
                    for (total, (_, path)) in entry.iter_mut().zip(sums) {
                        *total += field_value(doc, path).and_then(Value::as_u64).unwrap_or(0);
                    }
                }

                order
                    .into_iter()
                    .map(|id| {
                        let mut map = Map::new();
                        let values = totals.remove(&id.to_string()).unwrap_or_default();
                        for ((out, _), total) in sums.iter().zip(values) {
                            map.insert(out.clone(), json!(total));
                        }
                        map.insert("_id".to_string(), id);
                        Value::Object(map)
                    })
                    .collect()
            }

            Stage::Limit(n) => docs.into_iter().take(*n).collect(),
        };
        Ok(out)
    }

    /// Top trends of one region
    pub async fn regional(&self, region: Region) -> Result<Vec<TrendRow>, BackendError> {
        let docs = self
            .aggregate(TRENDS_COLLECTION, &regional_pipeline(region, REGIONAL_LIMIT))
            .await?;
        decode_rows(docs)
    }

    /// Top content summed across every region
    pub async fn global(&self) -> Result<Vec<TrendRow>, BackendError> {
        let docs = self
            .aggregate(TRENDS_COLLECTION, &global_pipeline(GLOBAL_LIMIT))
            .await?;
        decode_rows(docs)
    }
}

fn field_value<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |value, key| value.get(key))
}

/// Missing sorts first, then numbers, then strings
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Number(_)), Some(Value::String(_))) => Ordering::Less,
        (Some(Value::String(_)), Some(Value::Number(_))) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

fn decode_rows(docs: Vec<Value>) -> Result<Vec<TrendRow>, BackendError> {
    docs.into_iter()
        .map(|doc| serde_json::from_value(doc).map_err(|e| BackendError::Decode(e.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::KeyValueStore;
    use crate::dataset::{ContentType, DatasetGenerator, DatasetSize};

    fn docs(values: Vec<Value>) -> DocumentStore {
        let mut store = DocumentStore::default();
        store.insert_many("items", &values).unwrap();
        store
    }

    fn run(store: &DocumentStore, pipeline: &[Stage]) -> Vec<Value> {
        tokio_test::block_on(store.aggregate("items", pipeline)).unwrap()
    }

    #[test]
    fn test_match_sort_limit() {
        let store = docs(vec![
            json!({"region": "Asia", "stats": {"views": 10}, "name": "a"}),
            json!({"region": "Europe", "stats": {"views": 99}, "name": "b"}),
            json!({"region": "Asia", "stats": {"views": 30}, "name": "c"}),
            json!({"region": "Asia", "stats": {"views": 20}, "name": "d"}),
        ]);

        let out = run(
            &store,
            &[
                Stage::matching("region", json!("Asia")),
                Stage::sort(&[("stats.views", SortOrder::Descending)]),
                Stage::Limit(2),
            ],
        );
        let names: Vec<_> = out.iter().map(|d| d["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["c", "d"]);
    }

    #[test]
    fn test_lookup_and_unwind_is_inner_join() {
        let mut store = docs(vec![
            json!({"title": "Known."}),
            json!({"title": "Orphan."}),
        ]);
        store
            .insert_many("meta", &[json!({"name": "Known.", "kind": "movie"})])
            .unwrap();

        let out = run(
            &store,
            &[
                Stage::lookup("meta", "title", "name", "details"),
                Stage::Unwind("details".to_string()),
                Stage::project(&[("title", "title"), ("kind", "details.kind")]),
            ],
        );
        assert_eq!(out, vec![json!({"title": "Known.", "kind": "movie"})]);
    }

    #[test]
    fn test_group_sums_in_first_seen_order() {
        let store = docs(vec![
            json!({"k": "x", "n": 1}),
            json!({"k": "y", "n": 5}),
            json!({"k": "x", "n": 2}),
        ]);

        let out = run(
            &store,
            &[Stage::Group {
                key: "k".to_string(),
                sums: vec![("total".to_string(), "n".to_string())],
            }],
        );
        assert_eq!(
            out,
            vec![json!({"_id": "x", "total": 3}), json!({"_id": "y", "total": 5})]
        );
    }

    #[test]
    fn test_unknown_collection() {
        let store = DocumentStore::default();
        let err = tokio_test::block_on(store.aggregate("missing", &[])).unwrap_err();
        assert_eq!(err, BackendError::UnknownCollection("missing".to_string()));
    }

    #[test]
    fn test_trend_queries_match_key_value_store() {
        let mut dataset = DatasetGenerator::new(Some(5)).generate(&DatasetSize::small());
        // unique titles keep the join one-to-one
        for (i, content) in dataset.content.iter_mut().enumerate() {
            content.title = format!("{} #{i}", content.title);
        }
        let content_titles: Vec<String> = dataset.content.iter().map(|c| c.title.clone()).collect();
        for (i, trend) in dataset.regional_trends.iter_mut().enumerate() {
            trend.top_content = content_titles[i % content_titles.len()].clone();
        }

        let documents = DocumentStore::from_dataset(&dataset).unwrap();
        let kv = KeyValueStore::from_dataset(&dataset);

        let doc_rows = tokio_test::block_on(documents.regional(Region::Europe)).unwrap();
        let kv_rows = tokio_test::block_on(kv.regional(Region::Europe));
        assert_eq!(doc_rows.len(), REGIONAL_LIMIT);
        assert_eq!(doc_rows, kv_rows);

        let doc_rows = tokio_test::block_on(documents.global()).unwrap();
        let kv_rows = tokio_test::block_on(kv.global());
        assert_eq!(doc_rows, kv_rows);
        assert!(doc_rows.iter().all(|r| r.content_type.is_some()));
    }

    #[test]
    fn test_rows_carry_content_type() {
        let dataset = DatasetGenerator::new(Some(8)).generate(&DatasetSize::small());
        let store = DocumentStore::from_dataset(&dataset).unwrap();

        let rows = tokio_test::block_on(store.regional(Region::Asia)).unwrap();
        assert!(!rows.is_empty());
        let known: Vec<ContentType> = ContentType::all().to_vec();
        assert!(rows
            .iter()
            .all(|r| r.content_type.map_or(false, |t| known.contains(&t))));
    }
}
