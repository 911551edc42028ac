use std::sync::Arc;

use modgraph_core::catalog::ModuleCatalog;
use modgraph_core::config::{ResolutionConfig, SerializationMode};
use modgraph_resolver::resolver::{DependencyResolver, ResolverResults};
use modgraph_resolver::serial::{read_graph, BinaryData, BuildTreeRegistry};
use modgraph_util::errors::ModgraphError;

const CATALOG: &str = r#"
[root]
id = "com.example:app:1.0"
dependencies = [
    { module = "org:x:1.0", variant = "api" },
    "org:y:1.0",
    "org:gone:1.0",
    { module = "org:z:2.0", constraint = true },
]

[[component]]
id = "org:y:1.0"
repository = "central"
dependencies = [{ module = "org:x:1.0", variant = "runtime" }, "org:z:1.0"]

[[component]]
id = "org:x:1.0"

[[component.variant]]
name = "api"
attributes = { usage = "api", jvm = 17 }
capabilities = ["org:x-api:1.0"]

[[component.variant]]
name = "runtime"
attributes = { usage = "runtime", jvm = 17 }

[[component]]
id = "org:z:1.0"
adhoc = true

[[component]]
id = "org:z:2.0"
adhoc = true
"#;

fn resolve_with(config: ResolutionConfig, registry: Option<Arc<BuildTreeRegistry>>) -> ResolverResults {
    let catalog = ModuleCatalog::parse_toml(CATALOG).unwrap();
    let mut resolver = DependencyResolver::new(&catalog, config);
    if let Some(registry) = registry {
        resolver = resolver.with_registry(registry);
    }
    resolver.resolve(catalog.root()).unwrap()
}

fn complete() -> ResolutionConfig {
    ResolutionConfig {
        serialization: SerializationMode::Complete,
        ..ResolutionConfig::default()
    }
}

#[test]
fn complete_stream_round_trips() {
    let results = resolve_with(complete(), None);
    let decoded = read_graph(results.stream.data(), None).unwrap();
    assert_eq!(decoded, results.graph);
    assert_eq!(decoded.unresolved().len(), 1);
}

#[test]
fn available_variants_survive_the_stream() {
    let config = ResolutionConfig {
        return_all_variants: true,
        ..complete()
    };
    let results = resolve_with(config, None);
    let decoded = results.stream.graph().unwrap();
    assert_eq!(*decoded, results.graph);
    let x = decoded
        .components()
        .find(|c| c.module().name == "x")
        .unwrap();
    assert_eq!(x.available_variants.as_ref().map(Vec::len), Some(2));
}

#[test]
fn reference_stream_round_trips_through_the_registry() {
    let registry = Arc::new(BuildTreeRegistry::new());
    let results = resolve_with(ResolutionConfig::default(), Some(Arc::clone(&registry)));
    assert!(!registry.is_empty());

    let decoded = read_graph(results.stream.data(), Some(registry)).unwrap();
    assert_eq!(decoded, results.graph);
}

#[test]
fn reference_stream_is_smaller() {
    let registry = Arc::new(BuildTreeRegistry::new());
    let by_reference = resolve_with(ResolutionConfig::default(), Some(registry));
    let in_full = resolve_with(complete(), None);
    assert!(by_reference.stream.data().len() < in_full.stream.data().len());
}

#[test]
fn registry_is_shared_across_resolutions() {
    let registry = Arc::new(BuildTreeRegistry::new());
    let first = resolve_with(ResolutionConfig::default(), Some(Arc::clone(&registry)));
    let registered = registry.len();
    // root, x and y; adhoc z is always written in full
    assert_eq!(registered, 3);

    let second = resolve_with(ResolutionConfig::default(), Some(Arc::clone(&registry)));
    assert_eq!(registry.len(), registered);
    assert_eq!(first.stream.data().to_vec().unwrap(), second.stream.data().to_vec().unwrap());
}

#[test]
fn reference_stream_needs_its_registry() {
    let registry = Arc::new(BuildTreeRegistry::new());
    let results = resolve_with(ResolutionConfig::default(), Some(registry));

    let err = read_graph(results.stream.data(), None).unwrap_err();
    assert!(matches!(err, ModgraphError::Corrupt { .. }), "{err}");

    let unrelated = Arc::new(BuildTreeRegistry::new());
    let err = read_graph(results.stream.data(), Some(unrelated)).unwrap_err();
    assert!(matches!(err, ModgraphError::Corrupt { .. }), "{err}");
}

#[test]
fn truncated_stream_is_corrupt() {
    let results = resolve_with(complete(), None);
    let bytes = results.stream.data().to_vec().unwrap();
    for cut in [1, bytes.len() / 2, bytes.len() - 1] {
        let data = BinaryData::from_bytes(bytes[..cut].to_vec());
        let err = read_graph(&data, None).unwrap_err();
        assert!(matches!(err, ModgraphError::Corrupt { .. }), "cut at {cut}: {err}");
    }
}

#[test]
fn unknown_format_version_is_corrupt() {
    let err = read_graph(&BinaryData::from_bytes(vec![7]), None).unwrap_err();
    assert!(err.to_string().contains("format version 7"));
}

#[test]
fn unknown_record_tag_is_corrupt() {
    let err = read_graph(&BinaryData::from_bytes(vec![1, 42]), None).unwrap_err();
    assert!(err.to_string().contains("unknown record tag 42"));
}

#[test]
fn lazy_graph_is_decoded_once() {
    let results = resolve_with(complete(), None);
    let first = results.stream.graph().unwrap();
    let second = results.stream.graph().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn concurrent_readers_share_the_decoded_graph() {
    let results = resolve_with(complete(), None);
    let graphs: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4).map(|_| scope.spawn(|| results.stream.graph().unwrap())).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(graphs.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}

#[test]
fn graph_serializes_to_json() {
    let results = resolve_with(complete(), None);
    let json = serde_json::to_value(&results.graph).unwrap();
    assert!(json.get("components").is_some());
}
