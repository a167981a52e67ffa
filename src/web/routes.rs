//! Route definitions

use super::handlers;
use super::state::AppState;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = if state.settings.server.permissive_cors {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };
    let timeout = request_timeout(state.settings.server.request_timeout);

    Router::new()
        // Catalog
        .route(
            "/products",
            get(handlers::list_products).fallback(handlers::method_not_allowed),
        )
        .route(
            "/products/:id",
            get(handlers::get_product).fallback(handlers::method_not_allowed),
        )
        .route(
            "/categories",
            get(handlers::categories).fallback(handlers::method_not_allowed),
        )
        // Reviews
        .route(
            "/reviews/add",
            post(handlers::add_review).fallback(handlers::method_not_allowed),
        )
        .route(
            "/reviews/edit",
            put(handlers::edit_review).fallback(handlers::method_not_allowed),
        )
        .route(
            "/reviews/delete",
            delete(handlers::delete_review).fallback(handlers::method_not_allowed),
        )
        // Accounts
        .route(
            "/auth/signup",
            post(handlers::signup).fallback(handlers::method_not_allowed),
        )
        .route(
            "/auth/login",
            post(handlers::login).fallback(handlers::method_not_allowed),
        )
        .route(
            "/auth/me",
            get(handlers::me).fallback(handlers::method_not_allowed),
        )
        // Operations
        .route(
            "/health",
            get(handlers::health).fallback(handlers::method_not_allowed),
        )
        .route(
            "/stats",
            get(handlers::stats).fallback(handlers::method_not_allowed),
        )
        .fallback(handlers::not_found)
        // Add middleware
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Add state
        .with_state(state)
}

/// Server-side limit per request; non-finite or huge values mean no practical limit
fn request_timeout(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.max(0.001)).unwrap_or(Duration::MAX)
}
