//! External collaborators: the record store and the blob store.
//!
//! Both are hosted services reached over HTTPS. The rest of the crate only
//! sees the two traits below, so repositories and the upload service can be
//! exercised against [`MemoryStore`] in tests and against [`RestStore`] in
//! production.
//!
//! | Trait | Operations | Production impl |
//! |---|---|---|
//! | [`ContentStore`] | select, insert, update-by-id, delete-by-id, upsert | PostgREST (`/rest/v1`) |
//! | [`BlobStore`] | upload (no overwrite), public URL, remove | Storage API (`/storage/v1`) |
//!
//! Rows travel as `serde_json::Value` objects; typing happens in the
//! repositories. No call is retried and no timeout is applied unless the
//! HTTP client was built with one.

pub mod memory;
pub mod query;
pub mod rest;

pub use memory::MemoryStore;
pub use query::Query;
pub use rest::RestStore;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The backend answered with a non-2xx status.
    #[error("Backend error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// The blob store refused to overwrite an existing object.
    #[error("Object already exists: {0}")]
    AlreadyExists(String),
    /// Backend unreachable or refusing work (also used for injected failures).
    #[error("{0}")]
    Unavailable(String),
}

/// Table-oriented record store.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Rows matching `query`, in query order.
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, StoreError>;

    /// Insert one or more rows; returns them as stored (with ids).
    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, StoreError>;

    /// Merge `patch` into the row with this id. Returns the updated rows,
    /// empty when no row matched.
    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<Vec<Value>, StoreError>;

    /// Delete the row with this id; returns how many rows were removed.
    async fn delete(&self, table: &str, id: &str) -> Result<usize, StoreError>;

    /// Insert-or-merge keyed by `on_conflict`, in a single request.
    async fn upsert(
        &self,
        table: &str,
        rows: Vec<Value>,
        on_conflict: &str,
    ) -> Result<Vec<Value>, StoreError>;

    /// Whether a multi-row upsert is applied as one atomic statement.
    fn supports_bulk_upsert(&self) -> bool {
        true
    }
}

/// Bucket-oriented object storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `bytes` under `key`. Fails if the key already exists.
    /// Returns the stored key.
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StoreError>;

    /// Public URL for an object. Pure string building; never fails.
    fn public_url(&self, bucket: &str, key: &str) -> String;

    async fn remove(&self, bucket: &str, keys: &[String]) -> Result<(), StoreError>;
}

/// Public URL layout shared by both store implementations.
pub(crate) fn public_object_url(base_url: &str, bucket: &str, key: &str) -> String {
    format!(
        "{}/storage/v1/object/public/{}/{}",
        base_url.trim_end_matches('/'),
        bucket,
        key
    )
}
