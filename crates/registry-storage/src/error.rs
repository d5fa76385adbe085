//! Categorized backend errors.
//!
//! Every backend wraps its underlying failures in a [`BackendError`] so that
//! operators get a category and operation alongside the message, then
//! converts it into [`RegistryError::StorageUnavailable`] (or
//! [`RegistryError::TokenRequired`]/[`RegistryError::InvalidConfig`] for
//! startup-time failures) at the [`crate::Backend`] boundary.

use registry_core::RegistryError;

/// Coarse classification of a backend failure, used to pick an
/// operator-facing hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Credentials were rejected or insufficient.
    Authentication,
    /// The network could not be reached (DNS, connect, timeout).
    Network,
    /// The backend reported a storage-level failure (missing bucket/object,
    /// internal server error, malformed data).
    Storage,
}

/// The operation that was being attempted when a backend error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Reading the persisted model.
    Load,
    /// Writing the persisted model.
    Persist,
    /// Establishing the backend connection at startup.
    Connect,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Operation::Load => "load",
            Operation::Persist => "persist",
            Operation::Connect => "connect",
        })
    }
}

/// A categorized backend failure.
#[derive(Debug, thiserror::Error)]
#[error("{operation} failed ({category:?}): {message}{}", hint.as_deref().map(|h| format!(" ({h})")).unwrap_or_default())]
pub struct BackendError {
    /// What kind of failure this was.
    pub category: ErrorCategory,
    /// Which operation failed.
    pub operation: Operation,
    /// The underlying message.
    pub message: String,
    /// An optional operator-facing hint (e.g. registry-specific auth advice).
    pub hint: Option<String>,
}

impl BackendError {
    /// Construct a new categorized error.
    #[must_use]
    pub fn new(category: ErrorCategory, operation: Operation, message: impl Into<String>) -> Self {
        Self {
            category,
            operation,
            message: message.into(),
            hint: None,
        }
    }

    /// Attach an operator-facing hint.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<BackendError> for RegistryError {
    fn from(err: BackendError) -> Self {
        RegistryError::StorageUnavailable(err.to_string())
    }
}
