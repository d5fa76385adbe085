//! Pluggable persistence backends for the command launcher package
//! registry: local filesystem, OCI artifact registries, and S3-compatible
//! object stores, all behind [`registry_core::Backend`].
//!
//! Use [`factory::open`] to construct the right backend from a
//! [`registry_core::RegistryConfig`]'s storage URI.

pub mod error;
pub mod factory;
pub mod file;
pub mod oci;
pub mod s3;
pub mod uri;

pub use error::BackendError;
pub use factory::open;
pub use file::FileBackend;
pub use oci::OciBackend;
pub use s3::S3Backend;
pub use uri::{Scheme, StorageUri};
