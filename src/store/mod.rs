//! Document store module
//!
//! Defines the `DocumentStore` trait the catalog and review services talk to,
//! the query and value model it speaks, and two implementations: the
//! Firestore REST client and an in-memory store.

mod firestore;
mod memory;
mod metered;
mod traits;
mod value;

pub use firestore::FirestoreStore;
pub use memory::{MemoryStore, Seed};
pub use metered::MeteredStore;
pub use traits::*;
pub use value::FieldValue;
