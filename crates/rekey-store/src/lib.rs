//! Document store client for Rekey.
//!
//! Migrations talk to the backing store through the [`DocumentStore`]
//! trait: a full-collection scan, a bounded "field is one of" batch query,
//! and an atomic multi-document batch commit. Two implementations:
//!
//! - [`HttpStore`]: reqwest client over the store's JSON REST surface
//! - [`MemoryStore`]: in-memory fake for tests

mod client;
mod error;
mod memory;
mod types;

use async_trait::async_trait;

pub use client::HttpStore;
pub use error::StoreError;
pub use memory::MemoryStore;
pub use types::{Document, DocumentUpdate, get_path, set_path};

/// Contract the migrations consume from the backing store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Full-collection scan: every document with its key and field data.
    async fn list_all(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    /// Batch query: documents whose `field` equals one of `values`.
    ///
    /// The store bounds how many values one call may carry; callers chunk
    /// to their configured batch size.
    async fn query_in(
        &self,
        collection: &str,
        field: &str,
        values: &[String],
    ) -> Result<Vec<Document>, StoreError>;

    /// Atomic multi-document batch write, committed in one call.
    ///
    /// Returns the number of documents written. An empty write set is an
    /// invalid request.
    async fn commit(&self, writes: Vec<DocumentUpdate>) -> Result<usize, StoreError>;
}
