//! Link store errors.

use thiserror::Error;

/// Errors returned by [`LinkStore`](super::LinkStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The link exists and belongs to someone else.
    #[error("link {key:?} is owned by someone else")]
    Ownership { key: String },

    /// A stored link could not be decoded.
    #[error("malformed link under key {key:?}")]
    Corruption {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A link could not be encoded for storage.
    #[error("failed to encode link: {0}")]
    Encode(#[source] serde_json::Error),

    /// Backend failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// True for refusals caused by the caller rather than by the store.
    pub fn is_ownership(&self) -> bool {
        matches!(self, StoreError::Ownership { .. })
    }
}
