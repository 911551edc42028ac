use modgraph_core::catalog::ModuleCatalog;
use modgraph_core::identity::{ComponentId, ComponentSelector, ModuleIdentity, ModuleVersionId};

const CATALOG: &str = r#"
[root]
id = "com.example:app:1.0"
dependencies = [
    "org:a:1.0",
    ":lib",
    { module = "org:b", version = "2.0", force = true, reason = "security" },
]

[[component]]
id = "com.example:lib:1.0"
project = ":lib"

[[component]]
id = "org:a:1.0"
dependencies = [{ module = "org:b:1.0", excludes = [{ group = "org.x" }] }]

[[component]]
id = "org:b:1.0"
status = "integration"

[[component]]
id = "org:b:2.0"

[[component.variant]]
name = "api"
attributes = { usage = "api" }
capabilities = ["org:b-api"]

[[component.variant]]
name = "runtime"
attributes = { usage = "runtime" }
dependencies = ["org:c:1.+"]
"#;

#[test]
fn parses_root_as_project() {
    let catalog = ModuleCatalog::parse_toml(CATALOG).unwrap();
    let root = catalog.root();
    assert_eq!(root.id, ComponentId::project(":"));
    assert_eq!(root.variants.len(), 1);
    let deps = &root.variants[0].dependencies;
    assert_eq!(deps.len(), 3);
    assert_eq!(deps[1].selector, ComponentSelector::project(":lib"));
    assert!(deps[2].force);
    assert_eq!(deps[2].reason.as_deref(), Some("security"));
}

#[test]
fn lookup_by_module_and_project() {
    let catalog = ModuleCatalog::parse_toml(CATALOG).unwrap();
    let b1 = catalog
        .module(&ModuleVersionId::new("org", "b", "1.0"))
        .unwrap();
    assert!(!b1.is_release());
    assert!(catalog.project(":lib").unwrap().is_project());
    assert!(catalog.project(":").is_some());
    assert!(catalog.project(":missing").is_none());
}

#[test]
fn variants_and_capabilities() {
    let catalog = ModuleCatalog::parse_toml(CATALOG).unwrap();
    let b2 = catalog
        .module(&ModuleVersionId::new("org", "b", "2.0"))
        .unwrap();
    assert_eq!(b2.variants.len(), 2);
    assert_eq!(b2.variants[0].capabilities[0].to_string(), "org:b-api");
    assert_eq!(b2.variant("runtime").unwrap().dependencies.len(), 1);
}

#[test]
fn versions_in_declaration_order() {
    let catalog = ModuleCatalog::parse_toml(CATALOG).unwrap();
    assert_eq!(
        catalog.versions_of(&ModuleIdentity::new("org", "b")),
        vec!["1.0".to_string(), "2.0".to_string()]
    );
}

#[test]
fn duplicate_component_is_an_error() {
    let toml = r#"
[root]
id = "g:app:1"

[[component]]
id = "org:a:1.0"

[[component]]
id = "org:a:1.0"
"#;
    let err = ModuleCatalog::parse_toml(toml).unwrap_err();
    assert!(err.to_string().contains("Duplicate component"));
}

#[test]
fn invalid_dependency_is_an_error() {
    let toml = r#"
[root]
id = "g:app:1"
dependencies = ["not-a-coordinate"]
"#;
    assert!(ModuleCatalog::parse_toml(toml).is_err());
}
