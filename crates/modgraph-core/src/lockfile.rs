use modgraph_util::errors::ModgraphError;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::identity::{ComponentSelector, ModuleIdentity, ModuleVersionId};

/// Dependency lock state: the exact versions a previous resolution chose.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LockState {
    #[serde(default)]
    pub module: Vec<LockedModule>,
}

/// A single locked module version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedModule {
    pub group: String,
    pub name: String,
    pub version: String,
}

impl LockedModule {
    pub fn id(&self) -> ModuleVersionId {
        ModuleVersionId::new(self.group.clone(), self.name.clone(), self.version.clone())
    }

    /// Selector used for the locking pseudo-edge attached to the root.
    pub fn selector(&self) -> ComponentSelector {
        ComponentSelector::module(self.group.clone(), self.name.clone(), self.version.clone())
    }
}

impl LockState {
    /// Load and parse a lock file from the given path.
    pub fn from_path(path: &Path) -> miette::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ModgraphError::Config {
            message: format!("Failed to read lock file: {e}"),
        })?;
        toml::from_str(&content).map_err(|e| {
            ModgraphError::Config {
                message: format!("Failed to parse lock file: {e}"),
            }
            .into()
        })
    }

    /// Build a lock state from resolved module versions, sorted for stable output.
    pub fn from_versions<'a>(ids: impl IntoIterator<Item = &'a ModuleVersionId>) -> Self {
        let mut module: Vec<LockedModule> = ids
            .into_iter()
            .map(|id| LockedModule {
                group: id.group().to_string(),
                name: id.name().to_string(),
                version: id.version.clone(),
            })
            .collect();
        module.sort_by(|a, b| (&a.group, &a.name, &a.version).cmp(&(&b.group, &b.name, &b.version)));
        module.dedup();
        Self { module }
    }

    pub fn locked_version(&self, module: &ModuleIdentity) -> Option<&str> {
        self.module
            .iter()
            .find(|m| m.group == module.group && m.name == module.name)
            .map(|m| m.version.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.module.is_empty()
    }

    /// Serialize the lock state to a pretty-printed TOML string.
    pub fn to_string_pretty(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
