//! Domain error types for the registry core.
//!
//! [`RegistryError`] is the single error enum returned by every [`crate::store`]
//! operation. Backend adapters (see the `registry-storage` crate) convert
//! their own error types into [`RegistryError::StorageUnavailable`] at the
//! boundary so that callers only ever branch on these variants.

/// Domain error type for registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The requested registry, package, or version does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A create operation targeted an identity that already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A version create targeted a version string that already exists for
    /// the package (versions are immutable once created).
    #[error("version is immutable and already exists: {0}")]
    ImmutabilityViolation(String),

    /// A version's partition range overlaps an existing version of the same
    /// package.
    #[error("partition range [{start}, {end}] overlaps an existing version of {package}")]
    PartitionOverlap {
        /// The package whose versions overlap.
        package: String,
        /// Start of the rejected range.
        start: u8,
        /// End of the rejected range.
        end: u8,
    },

    /// A field failed validation.
    #[error("validation failed for field `{field}`: {message}")]
    Validation {
        /// The field that failed validation.
        field: String,
        /// A human-readable description of the failure.
        message: String,
    },

    /// The storage backend could not durably persist or load the model.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The backend requires credentials that were not supplied.
    #[error("a token is required for this storage backend")]
    TokenRequired,

    /// The storage location or configuration is invalid.
    #[error("invalid storage configuration: {0}")]
    InvalidConfig(String),

    /// An unexpected internal error.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
