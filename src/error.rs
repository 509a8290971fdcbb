//! Error taxonomy for content operations.
//!
//! Every repository method and upload call returns [`ContentError`]. The
//! variant tells the operator what went wrong and, more importantly, whether
//! anything reached the backend:
//!
//! | Variant | Raised when | Backend touched? |
//! |---|---|---|
//! | `Validation` | a precondition failed (file type/size, required field) | no |
//! | `Fetch` | reading from the content store failed | read only |
//! | `Persistence` | writing to the content store failed | maybe |
//! | `Upload` | writing to the blob store failed | maybe |
//! | `NotFound` | a mutation targeted an id the store doesn't have | yes |
//! | `Decode` / `Encoding` | image preparation failed | no |
//! | `Superseded` | a newer reorder started before this one finished writing | partially |

use crate::imaging::BackendError;
use crate::store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("{0}")]
    Validation(String),
    #[error("Failed to load {table}: {source}")]
    Fetch {
        table: &'static str,
        #[source]
        source: StoreError,
    },
    #[error("Failed to save to {table}: {source}")]
    Persistence {
        table: &'static str,
        #[source]
        source: StoreError,
    },
    #[error("Blob store request failed: {0}")]
    Upload(#[source] StoreError),
    #[error("No {table} record with id {id}")]
    NotFound { table: &'static str, id: String },
    #[error("Could not read image: {0}")]
    Decode(String),
    #[error("Could not re-encode image: {0}")]
    Encoding(String),
    #[error("Reorder superseded after {written} of {total} writes")]
    Superseded { written: usize, total: usize },
}

impl ContentError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    pub fn fetch(table: &'static str, source: impl Into<StoreError>) -> Self {
        Self::Fetch {
            table,
            source: source.into(),
        }
    }

    pub fn persistence(table: &'static str, source: impl Into<StoreError>) -> Self {
        Self::Persistence {
            table,
            source: source.into(),
        }
    }

    pub fn not_found(table: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            table,
            id: id.into(),
        }
    }

    /// True when the failure happened before any network call.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Decode(_) | Self::Encoding(_)
        )
    }
}

impl From<BackendError> for ContentError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Decode(msg) => Self::Decode(msg),
            BackendError::Encoding(msg) => Self::Encoding(msg),
        }
    }
}

pub type ContentResult<T> = Result<T, ContentError>;
