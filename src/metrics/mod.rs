//! Metrics collection module
//!
//! Tracks store round trips, documents read, review mutations and write
//! conflicts for the `/stats` endpoint.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Kinds of review mutation counted separately
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReviewMutation {
    Add,
    Edit,
    Delete,
}

impl ReviewMutation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewMutation::Add => "add",
            ReviewMutation::Edit => "edit",
            ReviewMutation::Delete => "delete",
        }
    }
}

/// Process-wide counters
pub struct Metrics {
    /// Query round trips
    store_queries: AtomicU64,
    /// Single document reads
    store_gets: AtomicU64,
    /// Documents returned by queries and reads
    documents_read: AtomicU64,
    /// Write round trips
    store_writes: AtomicU64,
    /// Failed store calls of any kind
    store_errors: AtomicU64,
    /// Writes rejected by a precondition
    write_conflicts: AtomicU64,
    /// Queries per collection
    collection_queries: RwLock<HashMap<String, u64>>,
    /// Query latencies, last 100 (ms)
    query_times: RwLock<Vec<u64>>,
    /// Successful review mutations by kind
    review_mutations: RwLock<HashMap<ReviewMutation, u64>>,
}

impl Metrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        Self {
            store_queries: AtomicU64::new(0),
            store_gets: AtomicU64::new(0),
            documents_read: AtomicU64::new(0),
            store_writes: AtomicU64::new(0),
            store_errors: AtomicU64::new(0),
            write_conflicts: AtomicU64::new(0),
            collection_queries: RwLock::new(HashMap::new()),
            query_times: RwLock::new(Vec::new()),
            review_mutations: RwLock::new(HashMap::new()),
        }
    }

    /// Record a finished query round trip
    pub fn record_query(&self, collection: &str, documents: usize, time_ms: u64) {
        self.store_queries.fetch_add(1, Ordering::Relaxed);
        self.documents_read
            .fetch_add(documents as u64, Ordering::Relaxed);

        if let Ok(mut queries) = self.collection_queries.write() {
            *queries.entry(collection.to_string()).or_insert(0) += 1;
        }
        if let Ok(mut times) = self.query_times.write() {
            // Keep last 100 query times
            if times.len() >= 100 {
                times.remove(0);
            }
            times.push(time_ms);
        }
    }

    /// Record a single document read
    pub fn record_get(&self, found: bool) {
        self.store_gets.fetch_add(1, Ordering::Relaxed);
        if found {
            self.documents_read.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_write(&self) {
        self.store_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_error(&self) {
        self.store_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_conflict(&self) {
        self.write_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a review mutation that reached the store
    pub fn record_review(&self, kind: ReviewMutation) {
        if let Ok(mut mutations) = self.review_mutations.write() {
            *mutations.entry(kind).or_insert(0) += 1;
        }
    }

    /// Total query round trips so far
    pub fn total_queries(&self) -> u64 {
        self.store_queries.load(Ordering::Relaxed)
    }

    /// Total documents read so far
    pub fn total_documents_read(&self) -> u64 {
        self.documents_read.load(Ordering::Relaxed)
    }

    /// Average query latency
    pub fn avg_query_time(&self) -> Option<u64> {
        let times = self.query_times.read().ok()?;
        if times.is_empty() {
            None
        } else {
            Some(times.iter().sum::<u64>() / times.len() as u64)
        }
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        let collection_queries = self
            .collection_queries
            .read()
            .map(|q| q.clone())
            .unwrap_or_default();
        let review_mutations = self
            .review_mutations
            .read()
            .map(|m| {
                m.iter()
                    .map(|(kind, count)| (kind.as_str().to_string(), *count))
                    .collect()
            })
            .unwrap_or_default();

        MetricsSnapshot {
            store_queries: self.store_queries.load(Ordering::Relaxed),
            store_gets: self.store_gets.load(Ordering::Relaxed),
            documents_read: self.documents_read.load(Ordering::Relaxed),
            store_writes: self.store_writes.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
            write_conflicts: self.write_conflicts.load(Ordering::Relaxed),
            avg_query_time_ms: self.avg_query_time(),
            collection_queries,
            review_mutations,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable counters for `/stats`
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub store_queries: u64,
    pub store_gets: u64,
    pub documents_read: u64,
    pub store_writes: u64,
    pub store_errors: u64,
    pub write_conflicts: u64,
    pub avg_query_time_ms: Option<u64>,
    pub collection_queries: HashMap<String, u64>,
    pub review_mutations: HashMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let metrics = Metrics::new();

        metrics.record_query("products", 10, 100);
        metrics.record_query("products", 5, 50);
        metrics.record_get(true);
        metrics.record_review(ReviewMutation::Add);

        assert_eq!(metrics.total_queries(), 2);
        assert_eq!(metrics.total_documents_read(), 16);
        assert_eq!(metrics.avg_query_time(), Some(75));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.collection_queries.get("products"), Some(&2));
        assert_eq!(snapshot.review_mutations.get("add"), Some(&1));
    }

    #[test]
    fn test_query_times_window() {
        let metrics = Metrics::new();
        for _ in 0..150 {
            metrics.record_query("products", 0, 10);
        }
        assert_eq!(metrics.query_times.read().unwrap().len(), 100);
    }
}
