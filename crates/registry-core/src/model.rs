//! Domain entities for the package registry: registries, packages, and
//! immutable versions, plus the root container that owns them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single immutable release of a package.
///
/// Versions are never updated once created; see
/// [`crate::error::RegistryError::ImmutabilityViolation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    /// Denormalized owning package name, copied into index entries.
    pub name: String,
    /// Semantic version string, e.g. `1.2.3` or `1.2.3-rc.1`.
    pub version: String,
    /// Content checksum in the form `sha256:<64 lowercase hex chars>`.
    pub checksum: String,
    /// Download location; must be `http` or `https`.
    pub url: String,
    /// Inclusive lower bound of the partition range, in `[0, 9]`.
    pub start_partition: u8,
    /// Inclusive upper bound of the partition range, in `[0, 9]`.
    pub end_partition: u8,
}

/// A named tool whose releases are [`Version`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    /// Package name, unique within its owning registry.
    pub name: String,
    /// Free-text description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Opaque list of maintainer identifiers (e.g. emails).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub maintainers: Vec<String>,
    /// Arbitrary string key/value metadata.
    #[serde(
        rename = "custom_values",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub custom_values: BTreeMap<String, String>,
    /// Versions of this package, keyed by version string.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub versions: BTreeMap<String, Version>,
}

/// A top-level namespace containing [`Package`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registry {
    /// Registry name, unique across the root container.
    pub name: String,
    /// Free-text description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Opaque list of admin identifiers (e.g. emails).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub admins: Vec<String>,
    /// Arbitrary string key/value metadata.
    #[serde(
        rename = "custom_values",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub custom_values: BTreeMap<String, String>,
    /// Packages owned by this registry, keyed by package name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub packages: BTreeMap<String, Package>,
}

/// The root of the model: every registry, keyed by name.
///
/// This is the single unit the persistence backends serialize as one opaque
/// blob (see `registry-storage`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootContainer {
    /// Registries, keyed by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub registries: BTreeMap<String, Registry>,
}

/// A single flattened entry in a registry's client-visible index.
///
/// Projected from a [`Version`] by [`crate::index::project_index`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    /// Owning package name.
    pub name: String,
    /// Version string.
    pub version: String,
    /// Content checksum.
    pub checksum: String,
    /// Download URL.
    pub url: String,
    /// Inclusive lower partition bound.
    pub start_partition: u8,
    /// Inclusive upper partition bound.
    pub end_partition: u8,
}

impl From<&Version> for IndexEntry {
    fn from(v: &Version) -> Self {
        Self {
            name: v.name.clone(),
            version: v.version.clone(),
            checksum: v.checksum.clone(),
            url: v.url.clone(),
            start_partition: v.start_partition,
            end_partition: v.end_partition,
        }
    }
}
