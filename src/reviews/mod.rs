//! Review mutation module
//!
//! Reviews live in the `reviews` array of their product document. Adding
//! uses a server-side set-union; editing and deleting rewrite the whole array
//! guarded by the product's last update time, so a concurrent writer causes a
//! conflict instead of a lost update.

mod service;

pub use service::ReviewService;

use crate::store::StoreError;
use serde::Deserialize;

/// Review mutation failures
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("{0}")]
    Validation(String),
    #[error("product not found: {0}")]
    ProductNotFound(String),
    #[error("review not found: {0}")]
    ReviewNotFound(String),
    #[error("review belongs to another user")]
    NotOwner,
    #[error("product was modified concurrently, retry the request")]
    Conflict,
    #[error("malformed review data: {0}")]
    Decode(String),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ReviewError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(_) => ReviewError::Conflict,
            other => ReviewError::Store(other),
        }
    }
}

/// `POST /reviews/add` body
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddReviewRequest {
    pub product_id: Option<String>,
    pub rating: Option<f64>,
    pub comment: Option<String>,
    /// Display name, defaults to the caller's email
    pub reviewer_name: Option<String>,
}

/// `PUT /reviews/edit` body
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditReviewRequest {
    pub product_id: Option<String>,
    pub review_id: Option<String>,
    pub comment: Option<String>,
    pub rating: Option<f64>,
}

/// `DELETE /reviews/delete` body
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteReviewRequest {
    pub product_id: Option<String>,
    pub review_id: Option<String>,
}

/// Empty or whitespace-only strings count as missing
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, ReviewError> {
    present(value).ok_or_else(|| ReviewError::Validation(format!("{} is required", name)))
}
