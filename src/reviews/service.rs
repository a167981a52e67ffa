//! Review add, edit and delete

use super::{
    present, required, AddReviewRequest, DeleteReviewRequest, EditReviewRequest, ReviewError,
};
use crate::auth::Subject;
use crate::catalog::{pad_id, rating_value, Review};
use crate::config::CatalogSettings;
use crate::metrics::{Metrics, ReviewMutation};
use crate::store::{Document, DocumentStore, FieldValue, Precondition, StoreError};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

const REVIEWS_FIELD: &str = "reviews";

/// Applies review mutations on behalf of a verified subject
pub struct ReviewService {
    store: Arc<dyn DocumentStore>,
    settings: CatalogSettings,
    metrics: Arc<Metrics>,
}

impl ReviewService {
    pub fn new(store: Arc<dyn DocumentStore>, settings: CatalogSettings, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            settings,
            metrics,
        }
    }

    fn collection(&self) -> &str {
        &self.settings.products_collection
    }

    /// Append a new review and return it with its generated id
    pub async fn add(&self, subject: &Subject, request: &AddReviewRequest) -> Result<Review, ReviewError> {
        let product_id = pad_id(required(&request.product_id, "productId")?, self.settings.id_pad_width);
        let comment = required(&request.comment, "comment")?;
        let rating = request
            .rating
            .ok_or_else(|| ReviewError::Validation("rating is required".to_string()))?;
        if !rating.is_finite() {
            return Err(ReviewError::Validation("rating must be a number".to_string()));
        }

        let reviewer_name = present(&request.reviewer_name)
            .or(subject.email.as_deref())
            .unwrap_or("Anonymous")
            .to_string();

        let review = Review {
            id: Some(Uuid::new_v4().to_string()),
            product_id: Some(product_id.clone()),
            reviewer_name,
            reviewer_email: subject.email.clone(),
            rating,
            comment: comment.to_string(),
            date: Some(Utc::now()),
            user_id: Some(subject.uid.clone()),
            updated_at: None,
        };

        self.store
            .array_union(
                self.collection(),
                &product_id,
                REVIEWS_FIELD,
                vec![review.to_field_value()],
            )
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => ReviewError::ProductNotFound(product_id.clone()),
                other => other.into(),
            })?;

        self.metrics.record_review(ReviewMutation::Add);
        info!("Review added to product {} by {}", product_id, subject.uid);
        Ok(review)
    }

    /// Change the comment and/or rating of one of the caller's reviews
    pub async fn edit(&self, subject: &Subject, request: &EditReviewRequest) -> Result<Review, ReviewError> {
        let product_id = pad_id(required(&request.product_id, "productId")?, self.settings.id_pad_width);
        let review_id = required(&request.review_id, "reviewId")?;
        let comment = present(&request.comment);
        if comment.is_none() && request.rating.is_none() {
            return Err(ReviewError::Validation(
                "comment or rating is required".to_string(),
            ));
        }
        if request.rating.map(|r| !r.is_finite()).unwrap_or(false) {
            return Err(ReviewError::Validation("rating must be a number".to_string()));
        }

        let doc = self.load_product(&product_id).await?;
        let mut reviews = stored_reviews(&doc);
        let index = find_review(&reviews, review_id)
            .ok_or_else(|| ReviewError::ReviewNotFound(review_id.to_string()))?;
        check_owner(&reviews[index], subject)?;

        if let FieldValue::Map(ref mut fields) = reviews[index] {
            if let Some(comment) = comment {
                fields.insert("comment".to_string(), FieldValue::from(comment));
            }
            if let Some(rating) = request.rating {
                fields.insert("rating".to_string(), rating_value(rating));
            }
            fields.insert("updatedAt".to_string(), FieldValue::Timestamp(Utc::now()));
        }
        let updated = Review::from_field_value(&reviews[index])
            .map_err(|e| ReviewError::Decode(e.to_string()))?;

        self.write_back(&doc, reviews).await?;
        self.metrics.record_review(ReviewMutation::Edit);
        info!("Review {} on product {} updated", review_id, product_id);
        Ok(updated)
    }

    /// Remove one of the caller's reviews. Returns false when no review had
    /// that id, in which case nothing is written.
    pub async fn delete(&self, subject: &Subject, request: &DeleteReviewRequest) -> Result<bool, ReviewError> {
        let product_id = pad_id(required(&request.product_id, "productId")?, self.settings.id_pad_width);
        let review_id = required(&request.review_id, "reviewId")?;

        let doc = self.load_product(&product_id).await?;
        let mut reviews = stored_reviews(&doc);
        let matching: Vec<&FieldValue> = reviews
            .iter()
            .filter(|r| review_id_of(r) == Some(review_id))
            .collect();
        if matching.is_empty() {
            debug!("Review {} not on product {}, nothing to delete", review_id, product_id);
            return Ok(false);
        }
        for review in matching {
            check_owner(review, subject)?;
        }

        reviews.retain(|r| review_id_of(r) != Some(review_id));
        self.write_back(&doc, reviews).await?;
        self.metrics.record_review(ReviewMutation::Delete);
        info!("Review {} on product {} deleted", review_id, product_id);
        Ok(true)
    }

    async fn load_product(&self, product_id: &str) -> Result<Document, ReviewError> {
        self.store
            .get(self.collection(), product_id)
            .await?
            .ok_or_else(|| ReviewError::ProductNotFound(product_id.to_string()))
    }

    /// Rewrite the reviews array unless the product changed since `doc` was read
    async fn write_back(&self, doc: &Document, reviews: Vec<FieldValue>) -> Result<(), ReviewError> {
        let result = self
            .store
            .set_field(
                self.collection(),
                &doc.id,
                REVIEWS_FIELD,
                FieldValue::Array(reviews),
                Precondition::unchanged_since(doc),
            )
            .await;

        match result {
            Err(StoreError::Conflict(reason)) => {
                warn!("Concurrent update on product {}: {}", doc.id, reason);
                Err(ReviewError::Conflict)
            }
            Err(StoreError::NotFound(_)) => Err(ReviewError::ProductNotFound(doc.id.clone())),
            other => other.map_err(ReviewError::from),
        }
    }
}

/// Raw review elements; untouched elements are written back as stored
fn stored_reviews(doc: &Document) -> Vec<FieldValue> {
    doc.get(REVIEWS_FIELD)
        .and_then(|v| v.as_array())
        .map(|items| items.to_vec())
        .unwrap_or_default()
}

fn review_id_of(review: &FieldValue) -> Option<&str> {
    review
        .as_map()
        .and_then(|fields| fields.get("id"))
        .and_then(|id| id.as_str())
}

fn find_review(reviews: &[FieldValue], review_id: &str) -> Option<usize> {
    reviews.iter().position(|r| review_id_of(r) == Some(review_id))
}

/// Reviews without an owner cannot be changed through the API
fn check_owner(review: &FieldValue, subject: &Subject) -> Result<(), ReviewError> {
    let owner = review
        .as_map()
        .and_then(|fields| fields.get("userId"))
        .and_then(|v| v.as_str());
    if owner == Some(subject.uid.as_str()) {
        Ok(())
    } else {
        warn!("{} tried to change a review owned by {:?}", subject.uid, owner);
        Err(ReviewError::NotOwner)
    }
}
