//! Storefront: product catalog, reviews and accounts over a managed backend
//!
//! Products, categories and their embedded reviews live in a remote document
//! store; credentials are verified by a remote identity provider. Both are
//! reached through traits so an in-memory backend can stand in for local
//! runs and tests.

pub mod auth;
pub mod catalog;
pub mod config;
pub mod metrics;
pub mod network;
pub mod reviews;
pub mod search;
pub mod store;
pub mod web;

pub use catalog::{Catalog, Product, Review};
pub use config::Settings;
pub use store::DocumentStore;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default timeout for outbound backend requests in seconds
pub const DEFAULT_TIMEOUT: u64 = 5;
