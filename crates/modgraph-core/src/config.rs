use modgraph_util::errors::ModgraphError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::identity::{ComponentSelector, ModuleIdentity, ModuleVersionId};
use crate::metadata::ExcludeRule;

/// Resolution settings loaded from a `resolution.toml` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResolutionConfig {
    #[serde(default)]
    pub conflict_strategy: ConflictStrategy,

    #[serde(default = "default_prefer_projects")]
    pub prefer_projects: bool,

    #[serde(default)]
    pub return_all_variants: bool,

    #[serde(default)]
    pub serialization: SerializationMode,

    /// `group:name:version` entries forced for the whole graph.
    #[serde(default)]
    pub force: Vec<String>,

    /// `group:name:version` entries that may never be selected.
    #[serde(default)]
    pub reject: Vec<String>,

    #[serde(default)]
    pub substitution: Vec<SubstitutionEntry>,

    /// Capability `group:name` to the preferred provider `group:module`.
    #[serde(default)]
    pub capabilities: BTreeMap<String, String>,

    /// Exclude rules applied to every edge in the graph.
    #[serde(default)]
    pub exclude: Vec<ExcludeRule>,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            conflict_strategy: ConflictStrategy::default(),
            prefer_projects: default_prefer_projects(),
            return_all_variants: false,
            serialization: SerializationMode::default(),
            force: Vec::new(),
            reject: Vec::new(),
            substitution: Vec::new(),
            capabilities: BTreeMap::new(),
            exclude: Vec::new(),
        }
    }
}

fn default_prefer_projects() -> bool {
    true
}

/// How version conflicts are settled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictStrategy {
    #[default]
    Latest,
    Strict,
}

/// How components are written into the serialized result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializationMode {
    /// Share component state across the build tree where possible.
    #[default]
    Auto,
    /// Always write every component in full.
    Complete,
}

/// Raw `[[substitution]]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubstitutionEntry {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// A validated substitution rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionRule {
    pub from: ModuleIdentity,
    /// When set, only requests for this exact version are substituted.
    pub from_version: Option<String>,
    pub to: ComponentSelector,
    pub reason: Option<String>,
}

impl ResolutionConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> miette::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ModgraphError::Config {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;
        Self::parse_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse_toml(content: &str) -> miette::Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ModgraphError::Config {
            message: format!("Failed to parse resolution config: {e}"),
        })?;
        config.forced_versions()?;
        config.rejected_versions()?;
        config.substitution_rules()?;
        config.capability_preferences()?;
        Ok(config)
    }

    pub fn forced_versions(&self) -> Result<Vec<ModuleVersionId>, ModgraphError> {
        parse_coordinates(&self.force, "force")
    }

    pub fn rejected_versions(&self) -> Result<Vec<ModuleVersionId>, ModgraphError> {
        parse_coordinates(&self.reject, "reject")
    }

    pub fn substitution_rules(&self) -> Result<Vec<SubstitutionRule>, ModgraphError> {
        self.substitution
            .iter()
            .map(|entry| {
                let (from, from_version) = if let Some(id) = ModuleVersionId::parse(&entry.from) {
                    (id.module, Some(id.version))
                } else if let Some(module) = ModuleIdentity::parse(&entry.from) {
                    (module, None)
                } else {
                    return Err(ModgraphError::Config {
                        message: format!("Invalid substitution source '{}'", entry.from),
                    });
                };
                let to = ComponentSelector::parse(&entry.to).ok_or_else(|| ModgraphError::Config {
                    message: format!(
                        "Invalid substitution target '{}': expected group:name:version or :project-path",
                        entry.to
                    ),
                })?;
                Ok(SubstitutionRule {
                    from,
                    from_version,
                    to,
                    reason: entry.reason.clone(),
                })
            })
            .collect()
    }

    pub fn capability_preferences(
        &self,
    ) -> Result<BTreeMap<ModuleIdentity, ModuleIdentity>, ModgraphError> {
        self.capabilities
            .iter()
            .map(|(cap, winner)| {
                let cap_id = ModuleIdentity::parse(cap).ok_or_else(|| ModgraphError::Config {
                    message: format!("Invalid capability '{cap}': expected group:name"),
                })?;
                let winner_id = ModuleIdentity::parse(winner).ok_or_else(|| ModgraphError::Config {
                    message: format!("Invalid capability provider '{winner}': expected group:module"),
                })?;
                Ok((cap_id, winner_id))
            })
            .collect()
    }
}

fn parse_coordinates(entries: &[String], key: &str) -> Result<Vec<ModuleVersionId>, ModgraphError> {
    entries
        .iter()
        .map(|s| {
            ModuleVersionId::parse(s).ok_or_else(|| ModgraphError::Config {
                message: format!("Invalid '{key}' entry '{s}': expected group:name:version"),
            })
        })
        .collect()
}
