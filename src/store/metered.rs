//! Store wrapper that feeds the metrics collector

use super::traits::{Document, DocumentStore, Precondition, Query, StoreError};
use super::value::FieldValue;
use crate::metrics::Metrics;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Counts round trips, documents and failures of the wrapped store
pub struct MeteredStore {
    inner: Arc<dyn DocumentStore>,
    metrics: Arc<Metrics>,
}

impl MeteredStore {
    pub fn new(inner: Arc<dyn DocumentStore>, metrics: Arc<Metrics>) -> Self {
        Self { inner, metrics }
    }

    fn record_result<T>(&self, result: &Result<T, StoreError>) {
        match result {
            Err(StoreError::Conflict(_)) => self.metrics.record_conflict(),
            Err(_) => self.metrics.record_store_error(),
            Ok(_) => {}
        }
    }
}

#[async_trait]
impl DocumentStore for MeteredStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn run_query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        let start = Instant::now();
        let result = self.inner.run_query(query).await;
        let elapsed = start.elapsed();

        if let Ok(ref docs) = result {
            self.metrics
                .record_query(&query.collection, docs.len(), elapsed.as_millis() as u64);
            debug!(
                "query on {} (limit {:?}) returned {} documents in {:?}",
                query.collection,
                query.limit,
                docs.len(),
                elapsed
            );
        }
        self.record_result(&result);
        result
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let result = self.inner.get(collection, id).await;
        if let Ok(ref doc) = result {
            self.metrics.record_get(doc.is_some());
        }
        self.record_result(&result);
        result
    }

    async fn array_union(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        values: Vec<FieldValue>,
    ) -> Result<(), StoreError> {
        self.metrics.record_write();
        let result = self.inner.array_union(collection, id, field, values).await;
        self.record_result(&result);
        result
    }

    async fn set_field(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        value: FieldValue,
        precondition: Precondition,
    ) -> Result<(), StoreError> {
        self.metrics.record_write();
        let result = self
            .inner
            .set_field(collection, id, field, value, precondition)
            .await;
        self.record_result(&result);
        result
    }
}
