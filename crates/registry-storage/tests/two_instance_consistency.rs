//! Two independent `Store` instances opened against the same file backend
//! location observe bit-identical state after a write on one side.

use registry_core::{Package, Registry, RegistryStore, Store, Version};
use registry_storage::FileBackend;

#[test]
fn test_second_instance_sees_first_instances_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    let store_a = Store::open(Box::new(FileBackend::open(&path, None).unwrap())).unwrap();
    store_a
        .create_registry(Registry {
            name: "build".to_owned(),
            ..Default::default()
        })
        .unwrap();
    store_a
        .create_package(
            "build",
            Package {
                name: "hotfix".to_owned(),
                ..Default::default()
            },
        )
        .unwrap();
    store_a
        .create_version(
            "build",
            "hotfix",
            Version {
                name: "hotfix".to_owned(),
                version: "1.0.0".to_owned(),
                checksum: format!("sha256:{}", "0".repeat(64)),
                url: "https://example.com/hotfix-1.0.0.zip".to_owned(),
                start_partition: 0,
                end_partition: 9,
            },
        )
        .unwrap();
    store_a.close();

    let store_b = Store::open(Box::new(FileBackend::open(&path, None).unwrap())).unwrap();

    let registries_a: Vec<_> = store_a.list_registries();
    let registries_b: Vec<_> = store_b.list_registries();
    assert_eq!(registries_a, registries_b);

    let index_a = store_a.get_registry_index("build").unwrap();
    let index_b = store_b.get_registry_index("build").unwrap();
    assert_eq!(index_a, index_b);
    assert_eq!(index_b.len(), 1);
    assert_eq!(index_b[0].version, "1.0.0");
}
