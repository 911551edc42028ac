use modgraph_core::identity::{ModuleIdentity, ModuleVersionId};
use modgraph_core::lockfile::{LockState, LockedModule};

#[test]
fn round_trip_serialize_deserialize() {
    let lock = LockState {
        module: vec![LockedModule {
            group: "org.example".to_string(),
            name: "core".to_string(),
            version: "1.9.0".to_string(),
        }],
    };

    let serialized = lock.to_string_pretty().unwrap();
    let deserialized: LockState = toml::from_str(&serialized).unwrap();

    assert_eq!(deserialized.module, lock.module);
}

#[test]
fn empty_lock_state_serializes_deserializes() {
    let lock = LockState::default();
    let serialized = lock.to_string_pretty().unwrap();
    let deserialized: LockState = toml::from_str(&serialized).unwrap();
    assert!(deserialized.is_empty());
}

#[test]
fn from_versions_sorts_and_dedups() {
    let ids = [
        ModuleVersionId::new("org", "b", "1.0"),
        ModuleVersionId::new("org", "a", "2.0"),
        ModuleVersionId::new("org", "b", "1.0"),
    ];
    let lock = LockState::from_versions(ids.iter());
    assert_eq!(lock.module.len(), 2);
    assert_eq!(lock.module[0].name, "a");
    assert_eq!(
        lock.locked_version(&ModuleIdentity::new("org", "b")),
        Some("1.0")
    );
    assert_eq!(lock.locked_version(&ModuleIdentity::new("org", "c")), None);
}

#[test]
fn locked_module_selector() {
    let m = LockedModule {
        group: "org".into(),
        name: "a".into(),
        version: "1.0".into(),
    };
    assert_eq!(m.selector().to_string(), "org:a:1.0");
    assert_eq!(m.id(), ModuleVersionId::new("org", "a", "1.0"));
}

#[test]
fn from_path_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("modgraph.lock");
    std::fs::write(
        &path,
        "[[module]]\ngroup = \"org\"\nname = \"a\"\nversion = \"1.0\"\n",
    )
    .unwrap();
    let lock = LockState::from_path(&path).unwrap();
    assert_eq!(lock.module.len(), 1);
}
