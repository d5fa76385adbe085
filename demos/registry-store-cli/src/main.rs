//! Command-line demonstration of the registry store.
//!
//! Exercises [`registry_core::RegistryStore`] against whatever backend
//! `REGISTRY_STORAGE_URI` selects, without any HTTP routing, auth, or rate
//! limiting layered on top.
//!
//! # Usage
//!
//! ```text
//! REGISTRY_STORAGE_URI=file:///tmp/registry.json registry-store-cli create-registry build
//! REGISTRY_STORAGE_URI=file:///tmp/registry.json registry-store-cli create-package build hotfix
//! REGISTRY_STORAGE_URI=file:///tmp/registry.json registry-store-cli create-version build hotfix 1.0.0 <checksum> <url> 0 9
//! REGISTRY_STORAGE_URI=file:///tmp/registry.json registry-store-cli index build
//! ```

use anyhow::{Context, Result, bail};
use registry_core::{Package, RegistryConfig, RegistryStore, Registry, Store, Version};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn open_store() -> Result<Store> {
    let config = RegistryConfig::from_env();
    if config.storage_uri.is_empty() {
        bail!("REGISTRY_STORAGE_URI must be set");
    }
    let backend = registry_storage::open(&config).context("failed to open storage backend")?;
    Ok(Store::open(backend)?)
}

fn main() -> Result<()> {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        bail!(
            "usage: registry-store-cli <create-registry|create-package|create-version|index|list-registries> ..."
        );
    };

    let store = open_store()?;

    match command.as_str() {
        "create-registry" => {
            let [name] = rest else {
                bail!("usage: create-registry <name>");
            };
            store.create_registry(Registry {
                name: name.clone(),
                ..Default::default()
            })?;
            info!(registry = %name, "created");
        }
        "create-package" => {
            let [registry, name] = rest else {
                bail!("usage: create-package <registry> <name>");
            };
            store.create_package(
                registry,
                Package {
                    name: name.clone(),
                    ..Default::default()
                },
            )?;
            info!(registry = %registry, package = %name, "created");
        }
        "create-version" => {
            let [registry, package, version, checksum, url, start, end] = rest else {
                bail!(
                    "usage: create-version <registry> <package> <version> <checksum> <url> <start-partition> <end-partition>"
                );
            };
            store.create_version(
                registry,
                package,
                Version {
                    name: package.clone(),
                    version: version.clone(),
                    checksum: checksum.clone(),
                    url: url.clone(),
                    start_partition: start.parse().context("invalid start partition")?,
                    end_partition: end.parse().context("invalid end partition")?,
                },
            )?;
            info!(registry = %registry, package = %package, version = %version, "created");
        }
        "index" => {
            let [registry] = rest else {
                bail!("usage: index <registry>");
            };
            let index = store.get_registry_index(registry)?;
            println!("{}", serde_json::to_string_pretty(&index)?);
        }
        "list-registries" => {
            for registry in store.list_registries() {
                println!("{}", registry.name);
            }
        }
        other => bail!("unknown command: {other}"),
    }

    store.close();
    Ok(())
}
