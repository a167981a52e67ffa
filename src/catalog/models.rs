//! Product and review records

use crate::store::{Document, FieldValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A catalog product as returned by the API: the document id followed by
/// every stored field as stored. Only the fields the engine reads have
/// typed accessors.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Product {
    /// Document id
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Product {
    /// Wrap a stored product. The document id wins over any stored `id`
    /// field, which only serves as the default sort key.
    pub fn from_document(doc: &Document) -> Self {
        let fields = doc
            .fields
            .iter()
            .filter(|(k, _)| k.as_str() != "id")
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        Self {
            id: doc.id.clone(),
            fields,
        }
    }

    /// Title used for search; empty when missing or not a string
    pub fn title(&self) -> &str {
        self.fields.get("title").and_then(Value::as_str).unwrap_or("")
    }

    pub fn category(&self) -> Option<&str> {
        self.fields.get("category").and_then(Value::as_str)
    }

    pub fn price(&self) -> Option<f64> {
        self.fields.get("price").and_then(Value::as_f64)
    }

    /// Embedded reviews, raw
    pub fn reviews(&self) -> &[Value] {
        self.fields
            .get("reviews")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Reorder embedded reviews. Elements whose key is missing or unreadable
    /// sort last; ties keep stored order.
    pub fn sort_reviews(&mut self, sort: ReviewSort) {
        let Some(Value::Array(reviews)) = self.fields.get_mut("reviews") else {
            return;
        };
        match sort {
            ReviewSort::Stored => {}
            // newest first
            ReviewSort::Date => reviews.sort_by(|a, b| review_date(b).cmp(&review_date(a))),
            ReviewSort::Rating => reviews.sort_by(|a, b| {
                let (a, b) = (review_rating(a), review_rating(b));
                match (a, b) {
                    (Some(a), Some(b)) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                }
            }),
        }
    }
}

fn review_date(review: &Value) -> Option<DateTime<Utc>> {
    review
        .get("date")
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|d| d.with_timezone(&Utc))
}

fn review_rating(review: &Value) -> Option<f64> {
    review.get("rating").and_then(Value::as_f64)
}

/// A review embedded in a product's `reviews` array
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    /// Server-generated id; seeded reviews may have none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(default)]
    pub reviewer_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer_email: Option<String>,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    /// Subject that wrote the review
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Review {
    /// Store representation, keeping timestamps as timestamps
    pub fn to_field_value(&self) -> FieldValue {
        let mut fields = BTreeMap::new();
        if let Some(ref id) = self.id {
            fields.insert("id".to_string(), FieldValue::from(id.as_str()));
        }
        if let Some(ref product_id) = self.product_id {
            fields.insert("productId".to_string(), FieldValue::from(product_id.as_str()));
        }
        fields.insert(
            "reviewerName".to_string(),
            FieldValue::from(self.reviewer_name.as_str()),
        );
        if let Some(ref email) = self.reviewer_email {
            fields.insert("reviewerEmail".to_string(), FieldValue::from(email.as_str()));
        }
        fields.insert("rating".to_string(), rating_value(self.rating));
        fields.insert("comment".to_string(), FieldValue::from(self.comment.as_str()));
        if let Some(date) = self.date {
            fields.insert("date".to_string(), FieldValue::Timestamp(date));
        }
        if let Some(ref user_id) = self.user_id {
            fields.insert("userId".to_string(), FieldValue::from(user_id.as_str()));
        }
        if let Some(updated_at) = self.updated_at {
            fields.insert("updatedAt".to_string(), FieldValue::Timestamp(updated_at));
        }
        FieldValue::Map(fields)
    }

    /// Decode one stored review element
    pub fn from_field_value(value: &FieldValue) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value.to_json())
    }
}

/// Whole-number ratings stay integers in the store
pub fn rating_value(rating: f64) -> FieldValue {
    if rating.fract() == 0.0 && rating.abs() < i64::MAX as f64 {
        FieldValue::Integer(rating as i64)
    } else {
        FieldValue::Double(rating)
    }
}

/// Ordering applied to embedded reviews on the detail endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReviewSort {
    #[default]
    Stored,
    Date,
    Rating,
}

impl ReviewSort {
    /// Unknown values keep stored order
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("date") => ReviewSort::Date,
            Some("rating") => ReviewSort::Rating,
            _ => ReviewSort::Stored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, json: serde_json::Value) -> Document {
        match FieldValue::from_json(&json) {
            FieldValue::Map(fields) => Document::new(id, fields),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_product_from_document() {
        let d = doc(
            "001",
            json!({
                "id": 1,
                "title": "Essence Mascara",
                "category": "beauty",
                "price": 9.99,
                "stock": 5.0,
                "tags": ["beauty", "mascara"],
                "minimumOrderQuantity": 24,
                "reviews": [{
                    "rating": 2,
                    "comment": "Very unhappy with my purchase!",
                    "date": "2024-05-23T08:56:21.618Z",
                    "reviewerName": "John Doe",
                    "reviewerEmail": "john.doe@x.dummyjson.com"
                }]
            }),
        );

        let product = Product::from_document(&d);
        assert_eq!(product.id, "001");
        assert_eq!(product.title(), "Essence Mascara");
        assert_eq!(product.category(), Some("beauty"));
        assert_eq!(product.price(), Some(9.99));
        assert_eq!(product.reviews().len(), 1);

        let out = serde_json::to_value(&product).unwrap();
        assert_eq!(out["id"], "001");
        assert_eq!(out["stock"], 5.0);
        assert_eq!(out["minimumOrderQuantity"], 24);
        assert_eq!(out["reviews"][0]["reviewerName"], "John Doe");
    }

    #[test]
    fn test_loosely_typed_fields_pass_through() {
        let product = Product::from_document(&doc(
            "002",
            json!({
                "title": 42,
                "tags": "home",
                "price": "cheap",
                "reviews": [{"date": "May 23, 2024", "rating": "five"}]
            }),
        ));
        assert_eq!(product.title(), "");
        assert_eq!(product.price(), None);
        assert_eq!(product.category(), None);

        let out = serde_json::to_value(&product).unwrap();
        assert_eq!(out["tags"], "home");
        assert_eq!(out["price"], "cheap");
        assert_eq!(out["reviews"][0]["date"], "May 23, 2024");
        // absent fields stay absent
        assert!(out.get("category").is_none());
        assert!(out.get("stock").is_none());
        assert!(out.get("rating").is_none());
    }

    #[test]
    fn test_review_store_roundtrip_keeps_timestamp() {
        let review = Review {
            id: Some("r-1".to_string()),
            product_id: Some("001".to_string()),
            reviewer_name: "Ann".to_string(),
            reviewer_email: None,
            rating: 4.0,
            comment: "Nice".to_string(),
            date: Some(Utc::now()),
            user_id: Some("uid-1".to_string()),
            updated_at: None,
        };

        let value = review.to_field_value();
        let fields = value.as_map().unwrap();
        assert!(matches!(fields.get("date"), Some(FieldValue::Timestamp(_))));
        assert_eq!(fields.get("rating"), Some(&FieldValue::Integer(4)));
        assert_eq!(Review::from_field_value(&value).unwrap(), review);
    }

    #[test]
    fn test_sort_reviews() {
        let mut product = Product::from_document(&doc(
            "001",
            json!({"reviews": [
                {"rating": 3, "date": "2024-01-01T00:00:00Z"},
                {"rating": 5, "date": "2023-01-01T00:00:00Z"},
                {"rating": "n/a", "date": "yesterday"},
                {"rating": 1, "date": "2025-01-01T00:00:00Z"}
            ]}),
        ));

        product.sort_reviews(ReviewSort::Date);
        assert_eq!(product.reviews()[0]["rating"], 1);
        assert_eq!(product.reviews()[3]["date"], "yesterday");

        product.sort_reviews(ReviewSort::Rating);
        let ratings: Vec<&Value> = product.reviews().iter().map(|r| &r["rating"]).collect();
        assert_eq!(ratings, vec![&json!(5), &json!(3), &json!(1), &json!("n/a")]);
    }

    #[test]
    fn test_sort_reviews_without_array() {
        let mut product = Product::from_document(&doc("001", json!({"reviews": "none"})));
        product.sort_reviews(ReviewSort::Rating);
        assert!(product.reviews().is_empty());
    }

    #[test]
    fn test_review_sort_parse() {
        assert_eq!(ReviewSort::parse(Some("Rating")), ReviewSort::Rating);
        assert_eq!(ReviewSort::parse(Some("date")), ReviewSort::Date);
        assert_eq!(ReviewSort::parse(Some("price")), ReviewSort::Stored);
        assert_eq!(ReviewSort::parse(None), ReviewSort::Stored);
    }
}
