pub mod ops_insight;
pub mod ops_replay;
pub mod ops_resolve;

use std::path::Path;

use modgraph_core::config::ResolutionConfig;

/// Load the resolution config at `path`; no path or a missing file means defaults.
pub fn load_config(path: Option<&Path>) -> miette::Result<ResolutionConfig> {
    match path {
        Some(path) if path.is_file() => ResolutionConfig::load(path),
        Some(path) => {
            tracing::warn!("No resolution config at {}, using defaults", path.display());
            Ok(ResolutionConfig::default())
        }
        None => Ok(ResolutionConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modgraph_core::config::ConflictStrategy;

    #[test]
    fn missing_config_means_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = load_config(Some(&tmp.path().join("resolution.toml"))).unwrap();
        assert_eq!(config.conflict_strategy, ConflictStrategy::Latest);
        assert!(config.prefer_projects);
    }

    #[test]
    fn config_file_is_read() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("resolution.toml");
        std::fs::write(&path, "conflict-strategy = \"strict\"\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.conflict_strategy, ConflictStrategy::Strict);
    }
}
