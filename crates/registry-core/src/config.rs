//! Configuration for the registry store.
//!
//! The core only takes two inputs: a storage location URI and an optional
//! opaque token. Both may be supplied programmatically or loaded from
//! environment variables via [`RegistryConfig::from_env`].

use serde::{Deserialize, Serialize};

/// Configuration for a registry store instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryConfig {
    /// Storage backend location, e.g. `file:///var/lib/registry/state.json`,
    /// `oci://ghcr.io/acme/registry-state`, or `s3://bucket/key`.
    pub storage_uri: String,
    /// Opaque credential passed to the backend. Required for the OCI
    /// backend, optional for S3, ignored (with a warning) for the file
    /// backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_token: Option<String>,
}

impl RegistryConfig {
    /// Construct a configuration from an explicit URI and token.
    #[must_use]
    pub fn new(storage_uri: impl Into<String>, storage_token: Option<String>) -> Self {
        Self {
            storage_uri: storage_uri.into(),
            storage_token,
        }
    }

    /// Load configuration from environment variables
    /// (`REGISTRY_STORAGE_URI`, `REGISTRY_STORAGE_TOKEN`).
    #[must_use]
    pub fn from_env() -> Self {
        let storage_uri = std::env::var("REGISTRY_STORAGE_URI").unwrap_or_default();
        let storage_token = std::env::var("REGISTRY_STORAGE_TOKEN").ok();
        Self {
            storage_uri,
            storage_token,
        }
    }
}
