//! HTTP request handlers

use super::error::ApiError;
use super::extract::Authenticated;
use super::state::AppState;
use crate::catalog::{ListParams, Product, ProductQuery, ReviewSort};
use crate::reviews::{AddReviewRequest, DeleteReviewRequest, EditReviewRequest};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

/// Query parameters for product detail
#[derive(Debug, Default, Deserialize)]
pub struct ProductParams {
    /// `date` or `rating`
    #[serde(rename = "reviewSort")]
    pub review_sort: Option<String>,
}

/// Sign-up and login body
#[derive(Debug, Default, Deserialize)]
pub struct CredentialsRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl CredentialsRequest {
    fn fields(&self) -> Result<(&str, &str), ApiError> {
        let email = self.email.as_deref().map(str::trim).unwrap_or_default();
        let password = self.password.as_deref().unwrap_or_default();
        if email.is_empty() || password.is_empty() {
            return Err(ApiError::BadRequest(
                "email and password are required".to_string(),
            ));
        }
        Ok((email, password))
    }
}

/// Product listing handler
pub async fn list_products(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let Query(params) = params?;
    let query = ProductQuery::from_params(&params, state.catalog.settings())?;
    let products = state.catalog.list_products(&query).await?;
    Ok(Json(products))
}

/// Product detail handler
pub async fn get_product(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
    params: Result<Query<ProductParams>, QueryRejection>,
) -> Result<Json<Product>, ApiError> {
    let Path(id) = id?;
    let Query(params) = params?;
    let sort = ReviewSort::parse(params.review_sort.as_deref());
    let product = state.catalog.get_product(&id, sort).await?;
    Ok(Json(product))
}

/// Category names
pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.catalog.categories().await?))
}

pub async fn add_review(
    State(state): State<AppState>,
    Authenticated(subject): Authenticated,
    payload: Result<Json<AddReviewRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let review = state.reviews.add(&subject, &request).await?;
    Ok(Json(json!({
        "message": "Review added successfully to the product",
        "review": review,
    })))
}

pub async fn edit_review(
    State(state): State<AppState>,
    Authenticated(subject): Authenticated,
    payload: Result<Json<EditReviewRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let review = state.reviews.edit(&subject, &request).await?;
    Ok(Json(json!({
        "message": "Review updated",
        "review": review,
    })))
}

/// Deleting an unknown review id succeeds without changing anything
pub async fn delete_review(
    State(state): State<AppState>,
    Authenticated(subject): Authenticated,
    payload: Result<Json<DeleteReviewRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let deleted = state.reviews.delete(&subject, &request).await?;
    Ok(Json(json!({
        "message": "Review deleted successfully from the product",
        "deleted": deleted,
    })))
}

pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let (email, password) = request.fields()?;
    let session = state.accounts.sign_up(email, password).await?;
    tracing::info!("Account created: {}", session.uid);
    Ok(Json(session))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let (email, password) = request.fields()?;
    let session = state.accounts.sign_in(email, password).await?;
    Ok(Json(session))
}

/// Echo the verified caller
pub async fn me(Authenticated(subject): Authenticated) -> impl IntoResponse {
    Json(json!({
        "message": "Access granted",
        "uid": subject.uid,
    }))
}

/// Stats handler
pub async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "version": crate::VERSION,
        "backend": state.settings.backend.kind,
        "metrics": state.metrics.snapshot(),
    }))
}

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": crate::VERSION,
    }))
}

/// Known path, wrong method
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// Unknown path
pub async fn not_found() -> ApiError {
    ApiError::NotFound("Not found".to_string())
}
