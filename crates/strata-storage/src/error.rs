//! Storage error types.

/// Errors from the import file store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The backing object store rejected the request.
    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    /// Backend selected but missing required settings.
    #[error("storage not configured: {0}")]
    NotConfigured(String),

    /// The backend cannot hand out download URLs.
    #[error("download URLs are not supported by the {backend} backend")]
    SigningUnsupported {
        /// Backend name as written in config.
        backend: &'static str,
    },

    /// Object names are single path segments.
    #[error("invalid object name: {0:?}")]
    InvalidName(String),

    /// Local directory setup failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Whether the store reported the object as absent.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::ObjectStore(object_store::Error::NotFound { .. }))
    }
}
