//! Web server module
//!
//! Provides the JSON HTTP API of the storefront.

mod error;
mod extract;
mod handlers;
mod routes;
mod state;

pub use error::ApiError;
pub use extract::Authenticated;
pub use routes::create_router;
pub use state::AppState;
