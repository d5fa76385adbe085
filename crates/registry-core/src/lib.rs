//! Domain model, validation, and the in-memory store for the command
//! launcher package registry.
//!
//! This crate provides the foundational building blocks shared across the
//! registry's storage backends and HTTP layer: the registry/package/version
//! data model, field validators, the single lock-guarded store with its
//! validate-mutate-persist-rollback mutation template, and the client index
//! projector. Concrete persistence backends (file, OCI, S3) implement the
//! [`store::Backend`] trait from the `registry-storage` crate.

pub mod config;
pub mod error;
pub mod index;
pub mod model;
pub mod store;
pub mod validation;

pub use config::RegistryConfig;
pub use error::{RegistryError, RegistryResult};
pub use model::{IndexEntry, Package, Registry, RootContainer, Version};
pub use store::{Backend, RegistryStore, Store};
