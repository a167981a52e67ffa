//! Product catalog module
//!
//! Listing with category filter, price ordering, cursor pagination and fuzzy
//! title search, plus single product and category lookups.

mod engine;
mod models;
mod query;

pub use engine::{pad_id, Catalog};
pub use models::{rating_value, Product, Review, ReviewSort};
pub use query::{ListParams, ProductQuery, SortOrder};

use crate::store::StoreError;

/// Catalog read failures
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("{0}")]
    Validation(String),
    #[error("product not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}
