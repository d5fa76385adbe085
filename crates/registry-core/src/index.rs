//! Projection of a [`Registry`](crate::model::Registry) into its
//! client-visible index document.

use crate::model::{IndexEntry, Registry};

/// Flatten every version of every package in `registry` into a single
/// unordered sequence of [`IndexEntry`].
#[must_use]
pub fn project_index(registry: &Registry) -> Vec<IndexEntry> {
    registry
        .packages
        .values()
        .flat_map(|package| package.versions.values().map(IndexEntry::from))
        .collect()
}
