//! In-process document store
//!
//! Applies the same filter, ordering, cursor and precondition rules as the
//! remote store. Used for local development and as the test backend.

use super::traits::{Cursor, Direction, Document, DocumentStore, Precondition, Query, StoreError};
use super::value::FieldValue;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Default)]
struct Collections {
    docs: HashMap<String, BTreeMap<String, Document>>,
    last_write: Option<DateTime<Utc>>,
}

impl Collections {
    /// Strictly increasing write clock
    fn next_update_time(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let next = match self.last_write {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_write = Some(next);
        next
    }
}

/// Document store held in memory
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

/// Seed file layout
#[derive(Debug, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub products: Vec<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    pub categories: Vec<serde_json::Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document, stamping a fresh update time
    pub async fn insert(&self, collection: &str, mut doc: Document) {
        let mut inner = self.inner.write().await;
        doc.update_time = Some(inner.next_update_time());
        inner
            .docs
            .entry(collection.to_string())
            .or_default()
            .insert(doc.id.clone(), doc);
    }

    /// Insert a document given as a JSON object
    pub async fn insert_json(&self, collection: &str, id: &str, json: serde_json::Value) {
        let fields = match FieldValue::from_json(&json) {
            FieldValue::Map(fields) => fields,
            _ => BTreeMap::new(),
        };
        self.insert(collection, Document::new(id, fields)).await;
    }

    /// Number of documents in a collection
    pub async fn count(&self, collection: &str) -> usize {
        self.inner
            .read()
            .await
            .docs
            .get(collection)
            .map(|c| c.len())
            .unwrap_or(0)
    }

    /// Load products and categories from a JSON seed file.
    ///
    /// Product document ids come from `docId` when present, otherwise from
    /// `id` zero padded to `pad_width` digits. Categories may be plain
    /// strings or objects with a `name`.
    pub async fn load_seed_file(
        &self,
        path: &Path,
        products_collection: &str,
        categories_collection: &str,
        pad_width: usize,
    ) -> Result<usize> {
        let content = tokio::fs::read_to_string(path).await?;
        let seed: Seed = serde_json::from_str(&content)?;
        let mut loaded = 0;

        for (index, product) in seed.products.into_iter().enumerate() {
            let doc_id = match (product.get("docId"), product.get("id")) {
                (Some(serde_json::Value::String(id)), _) => id.clone(),
                (_, Some(serde_json::Value::Number(n))) => {
                    format!("{:0>width$}", n.to_string(), width = pad_width)
                }
                (_, Some(serde_json::Value::String(id))) => id.clone(),
                _ => format!("{:0>width$}", index + 1, width = pad_width),
            };
            self.insert_json(products_collection, &doc_id, serde_json::Value::Object(product))
                .await;
            loaded += 1;
        }

        for (index, category) in seed.categories.into_iter().enumerate() {
            let json = match category {
                serde_json::Value::String(name) => serde_json::json!({ "name": name }),
                other => other,
            };
            self.insert_json(categories_collection, &format!("{:03}", index + 1), json)
                .await;
        }

        info!("Seeded {} products from {}", loaded, path.display());
        Ok(loaded)
    }
}

/// Compare two documents under a query's ordering, including the id tiebreak
fn compare_docs(a: &Document, b: &Document, query: &Query) -> Ordering {
    for order in &query.order_by {
        let ord = match (a.get(&order.field), b.get(&order.field)) {
            (Some(x), Some(y)) => x.compare(y),
            _ => Ordering::Equal,
        };
        let ord = apply_direction(ord, order.direction);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    apply_direction(a.id.cmp(&b.id), query.tiebreak_direction())
}

fn compare_to_cursor(doc: &Document, cursor: &Cursor, query: &Query) -> Ordering {
    for (order, cursor_value) in query.order_by.iter().zip(cursor.values.iter()) {
        let value = doc.get(&order.field).unwrap_or(&FieldValue::Null);
        let ord = apply_direction(value.compare(cursor_value), order.direction);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    apply_direction(doc.id.cmp(&cursor.document_id), query.tiebreak_direction())
}

fn apply_direction(ord: Ordering, direction: Direction) -> Ordering {
    match direction {
        Direction::Ascending => ord,
        Direction::Descending => ord.reverse(),
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn run_query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        let inner = self.inner.read().await;
        let Some(collection) = inner.docs.get(&query.collection) else {
            return Ok(Vec::new());
        };

        let mut docs: Vec<&Document> = collection
            .values()
            .filter(|doc| {
                query.filters.iter().all(|f| {
                    doc.get(&f.field)
                        .map(|v| v.compare(&f.value) == Ordering::Equal)
                        .unwrap_or(false)
                })
            })
            // documents without an ordered field are left out, as remotely
            .filter(|doc| query.order_by.iter().all(|o| doc.fields.contains_key(&o.field)))
            .collect();

        docs.sort_by(|a, b| compare_docs(a, b, query));

        let results: Vec<Document> = docs
            .into_iter()
            .filter(|doc| match &query.start_after {
                Some(cursor) => compare_to_cursor(doc, cursor, query) == Ordering::Greater,
                None => true,
            })
            .take(query.limit.map(|l| l as usize).unwrap_or(usize::MAX))
            .cloned()
            .collect();

        debug!(
            "memory query on {} returned {} documents",
            query.collection,
            results.len()
        );
        Ok(results)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.docs.get(collection).and_then(|c| c.get(id)).cloned())
    }

    async fn array_union(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        values: Vec<FieldValue>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let update_time = inner.next_update_time();
        let doc = inner
            .docs
            .get_mut(collection)
            .and_then(|c| c.get_mut(id))
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", collection, id)))?;

        let mut current = match doc.fields.remove(field) {
            Some(FieldValue::Array(items)) => items,
            _ => Vec::new(),
        };
        for value in values {
            if !current.iter().any(|existing| existing == &value) {
                current.push(value);
            }
        }
        doc.fields.insert(field.to_string(), FieldValue::Array(current));
        doc.update_time = Some(update_time);
        Ok(())
    }

    async fn set_field(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        value: FieldValue,
        precondition: Precondition,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let update_time = inner.next_update_time();
        let doc = inner
            .docs
            .get_mut(collection)
            .and_then(|c| c.get_mut(id))
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", collection, id)))?;

        if let Precondition::UpdatedAt(expected) = precondition {
            if doc.update_time != Some(expected) {
                return Err(StoreError::Conflict(format!(
                    "{}/{} changed since {}",
                    collection, id, expected
                )));
            }
        }

        doc.fields.insert(field.to_string(), value);
        doc.update_time = Some(update_time);
        Ok(())
    }
}
