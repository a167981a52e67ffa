//! Fuzzy search module
//!
//! Narrows and re-ranks an already fetched list of products by approximate
//! title match.

mod fuzzy;

pub use fuzzy::{FuzzyMatcher, Match};
