//! Document store traits and query types

use super::value::FieldValue;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Errors returned by a document store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("write precondition failed: {0}")]
    Conflict(String),
    #[error("store request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("store returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("malformed store data: {0}")]
    Decode(String),
}

/// A stored document: its id within the collection plus its fields
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: BTreeMap<String, FieldValue>,
    /// Last write time, used as a write precondition
    pub update_time: Option<DateTime<Utc>>,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: BTreeMap<String, FieldValue>) -> Self {
        Self {
            id: id.into(),
            fields,
            update_time: None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Ascending,
    Descending,
}

/// One ordering clause
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Equality filter on a single field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub value: FieldValue,
}

/// Position to resume after: the order-by values of a document plus its id,
/// which breaks ties between equal values.
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    pub values: Vec<FieldValue>,
    pub document_id: String,
}

impl Cursor {
    /// Build a cursor positioned on `doc` for the given ordering
    pub fn from_document(doc: &Document, order_by: &[OrderBy]) -> Self {
        Self {
            values: order_by
                .iter()
                .map(|o| doc.get(&o.field).cloned().unwrap_or(FieldValue::Null))
                .collect(),
            document_id: doc.id.clone(),
        }
    }
}

/// A filtered, ordered, limited query over one collection.
///
/// Clauses compose in a fixed sequence: filter, then order, then cursor and
/// limit.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<FieldFilter>,
    pub order_by: Vec<OrderBy>,
    pub start_after: Option<Cursor>,
    pub limit: Option<u32>,
}

impl Query {
    /// Query every document of a collection
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filters: Vec::new(),
            order_by: Vec::new(),
            start_after: None,
            limit: None,
        }
    }

    /// Add an equality filter
    pub fn filter_eq(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.filters.push(FieldFilter {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Add an ordering clause
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by.push(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    /// Resume after the given cursor
    pub fn start_after(mut self, cursor: Cursor) -> Self {
        self.start_after = Some(cursor);
        self
    }

    /// Cap the number of returned documents
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Direction of the implicit document-id tiebreak
    pub fn tiebreak_direction(&self) -> Direction {
        self.order_by
            .last()
            .map(|o| o.direction)
            .unwrap_or(Direction::Ascending)
    }
}

/// Guard evaluated by the store before applying a write
#[derive(Debug, Clone, PartialEq)]
pub enum Precondition {
    /// The document must exist
    Exists,
    /// The document must not have changed since this update time
    UpdatedAt(DateTime<Utc>),
}

impl Precondition {
    /// Strongest guard available for a document that was just read
    pub fn unchanged_since(doc: &Document) -> Self {
        doc.update_time
            .map(Precondition::UpdatedAt)
            .unwrap_or(Precondition::Exists)
    }
}

/// Remote document collection primitives the storefront relies on
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Run a structured query
    async fn run_query(&self, query: &Query) -> Result<Vec<Document>, StoreError>;

    /// Fetch a single document by id
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Append values to an array field, skipping values already present.
    /// Fails with `NotFound` if the document does not exist.
    async fn array_union(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        values: Vec<FieldValue>,
    ) -> Result<(), StoreError>;

    /// Overwrite a single field, guarded by `precondition`
    async fn set_field(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        value: FieldValue,
        precondition: Precondition,
    ) -> Result<(), StoreError>;
}
