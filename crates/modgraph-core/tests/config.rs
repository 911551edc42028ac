use modgraph_core::config::{ConflictStrategy, ResolutionConfig, SerializationMode};
use modgraph_core::identity::{ComponentSelector, ModuleIdentity};
use modgraph_core::metadata::PatternMatcher;

#[test]
fn test_defaults_from_empty_toml() {
    let config = ResolutionConfig::parse_toml("").unwrap();
    assert_eq!(config.conflict_strategy, ConflictStrategy::Latest);
    assert!(config.prefer_projects);
    assert!(!config.return_all_variants);
    assert_eq!(config.serialization, SerializationMode::Auto);
    assert!(config.force.is_empty());
}

#[test]
fn test_default_impl_matches_empty_toml() {
    let config = ResolutionConfig::default();
    assert!(config.prefer_projects);
    assert!(config.substitution.is_empty());
}

#[test]
fn test_full_config() {
    let toml = r#"
conflict-strategy = "strict"
prefer-projects = false
return-all-variants = true
serialization = "complete"
force = ["org:a:1.0"]
reject = ["org:b:2.0"]

[[substitution]]
from = "org:old"
to = "org:new:3.0"
reason = "renamed"

[[substitution]]
from = "org:lib:1.0"
to = ":lib"

[capabilities]
"org:logging" = "org:logback"

[[exclude]]
group = "org.unwanted"

[[exclude]]
module = "*-legacy"
matcher = "glob"
"#;
    let config = ResolutionConfig::parse_toml(toml).unwrap();
    assert_eq!(config.conflict_strategy, ConflictStrategy::Strict);
    assert!(!config.prefer_projects);
    assert!(config.return_all_variants);
    assert_eq!(config.serialization, SerializationMode::Complete);

    let forced = config.forced_versions().unwrap();
    assert_eq!(forced[0].to_string(), "org:a:1.0");

    let rules = config.substitution_rules().unwrap();
    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0].from, ModuleIdentity::new("org", "old"));
    assert_eq!(rules[0].from_version, None);
    assert_eq!(rules[0].reason.as_deref(), Some("renamed"));
    assert_eq!(rules[1].from_version.as_deref(), Some("1.0"));
    assert_eq!(rules[1].to, ComponentSelector::project(":lib"));

    let prefs = config.capability_preferences().unwrap();
    assert_eq!(
        prefs.get(&ModuleIdentity::new("org", "logging")),
        Some(&ModuleIdentity::new("org", "logback"))
    );

    assert_eq!(config.exclude.len(), 2);
    assert_eq!(config.exclude[1].matcher, PatternMatcher::Glob);
}

#[test]
fn test_invalid_force_entry_is_rejected() {
    let err = ResolutionConfig::parse_toml(r#"force = ["org:a"]"#).unwrap_err();
    assert!(err.to_string().contains("Configuration error"));
}

#[test]
fn test_invalid_strategy_is_rejected() {
    assert!(ResolutionConfig::parse_toml(r#"conflict-strategy = "newest""#).is_err());
}

#[test]
fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("resolution.toml");
    std::fs::write(&path, "return-all-variants = true\n").unwrap();
    let config = ResolutionConfig::load(&path).unwrap();
    assert!(config.return_all_variants);
}

#[test]
fn test_load_missing_file_errors() {
    let dir = tempfile::tempdir().unwrap();
    assert!(ResolutionConfig::load(&dir.path().join("nope.toml")).is_err());
}
