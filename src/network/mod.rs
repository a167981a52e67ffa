//! HTTP networking module
//!
//! Provides the outbound HTTP client shared by the store and identity clients.

mod client;

pub use client::HttpClient;
