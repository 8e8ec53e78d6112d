//! Error types for the object store client.

/// Errors surfaced by [`ObjectStoreClient`](crate::ObjectStoreClient) implementations.
#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
    /// The requested key does not exist in the bucket.
    #[error("object not found: {key}")]
    NotFound { key: String },

    /// Any other failure reported by the backend (network, auth, protocol).
    #[error("object store error: {0}")]
    Backend(#[from] object_store::Error),

    /// The key cannot be expressed as a store path (empty or `.`/`..`
    /// segments, control characters).
    #[error("invalid object key {key:?}: {source}")]
    InvalidKey {
        key: String,
        #[source]
        source: object_store::path::Error,
    },

    /// A request argument the store cannot accept.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The backend could not be constructed from its configuration.
    #[error("invalid object store configuration: {0}")]
    Config(String),
}

impl ObjectStoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ObjectStoreError::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, ObjectStoreError>;
