//! Identities of modules, components, selectors and capabilities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A `(group, name)` pair. Conflicts are detected per module identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleIdentity {
    pub group: String,
    pub name: String,
}

impl ModuleIdentity {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
        }
    }

    /// Parse `"group:name"`.
    pub fn parse(s: &str) -> Option<Self> {
        let (group, name) = s.split_once(':')?;
        if group.is_empty() || name.is_empty() || name.contains(':') {
            return None;
        }
        Some(Self::new(group, name))
    }
}

impl fmt::Display for ModuleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.name)
    }
}

/// A module identity plus a concrete version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleVersionId {
    pub module: ModuleIdentity,
    pub version: String,
}

impl ModuleVersionId {
    pub fn new(group: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            module: ModuleIdentity::new(group, name),
            version: version.into(),
        }
    }

    /// Parse `"group:name:version"`.
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() == 3 && parts.iter().all(|p| !p.is_empty()) {
            Some(Self::new(parts[0], parts[1], parts[2]))
        } else {
            None
        }
    }

    pub fn group(&self) -> &str {
        &self.module.group
    }

    pub fn name(&self) -> &str {
        &self.module.name
    }
}

impl fmt::Display for ModuleVersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.version)
    }
}

/// Identifies a component: either an external module version or a project
/// of some build in the build tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComponentId {
    Module(ModuleVersionId),
    Project { build: String, path: String },
}

impl ComponentId {
    pub fn project(path: impl Into<String>) -> Self {
        Self::Project {
            build: ":".to_string(),
            path: path.into(),
        }
    }

    pub fn is_project(&self) -> bool {
        matches!(self, Self::Project { .. })
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Module(id) => write!(f, "{id}"),
            Self::Project { build, path } if build == ":" => write!(f, "project {path}"),
            Self::Project { build, path } => write!(f, "project {build}{path}"),
        }
    }
}

/// What a dependency asks for, before substitution and version selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComponentSelector {
    Module {
        module: ModuleIdentity,
        version: String,
    },
    Project {
        build: String,
        path: String,
    },
}

impl ComponentSelector {
    pub fn module(group: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self::Module {
            module: ModuleIdentity::new(group, name),
            version: version.into(),
        }
    }

    pub fn project(path: impl Into<String>) -> Self {
        Self::Project {
            build: ":".to_string(),
            path: path.into(),
        }
    }

    /// Parse `"group:name:version"` or a project path starting with `:`.
    pub fn parse(s: &str) -> Option<Self> {
        if s.starts_with(':') {
            return Some(Self::project(s));
        }
        ModuleVersionId::parse(s).map(|id| Self::Module {
            module: id.module,
            version: id.version,
        })
    }

    /// The module this selector targets, when it is a module selector.
    pub fn target_module(&self) -> Option<&ModuleIdentity> {
        match self {
            Self::Module { module, .. } => Some(module),
            Self::Project { .. } => None,
        }
    }

    pub fn version(&self) -> Option<&str> {
        match self {
            Self::Module { version, .. } => Some(version),
            Self::Project { .. } => None,
        }
    }
}

impl fmt::Display for ComponentSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Module { module, version } => write!(f, "{module}:{version}"),
            Self::Project { build, path } if build == ":" => write!(f, "project {path}"),
            Self::Project { build, path } => write!(f, "project {build}{path}"),
        }
    }
}

/// A capability provided by a variant. Two components providing the same
/// capability `group:name` cannot both be on the graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Capability {
    pub group: String,
    pub name: String,
    pub version: Option<String>,
}

impl Capability {
    pub fn new(group: impl Into<String>, name: impl Into<String>, version: Option<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            version,
        }
    }

    /// Parse `"group:name"` or `"group:name:version"`.
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        match parts.as_slice() {
            [g, n] if !g.is_empty() && !n.is_empty() => Some(Self::new(*g, *n, None)),
            [g, n, v] if !g.is_empty() && !n.is_empty() && !v.is_empty() => {
                Some(Self::new(*g, *n, Some(v.to_string())))
            }
            _ => None,
        }
    }

    /// The implicit capability every component provides for its own module.
    pub fn implicit(id: &ModuleVersionId) -> Self {
        Self::new(id.group(), id.name(), Some(id.version.clone()))
    }

    /// The `group:name` key capability conflicts are detected on.
    pub fn id(&self) -> ModuleIdentity {
        ModuleIdentity::new(self.group.clone(), self.name.clone())
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}:{}:{v}", self.group, self.name),
            None => write!(f, "{}:{}", self.group, self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_module_identity() {
        let id = ModuleIdentity::parse("org.example:lib").unwrap();
        assert_eq!(id.group, "org.example");
        assert_eq!(id.name, "lib");
        assert!(ModuleIdentity::parse("org.example").is_none());
        assert!(ModuleIdentity::parse("a:b:c").is_none());
    }

    #[test]
    fn parse_selector_forms() {
        let s = ComponentSelector::parse("org:a:1.0").unwrap();
        assert_eq!(s.to_string(), "org:a:1.0");
        assert_eq!(s.target_module(), Some(&ModuleIdentity::new("org", "a")));

        let p = ComponentSelector::parse(":lib").unwrap();
        assert_eq!(p.to_string(), "project :lib");
        assert!(p.target_module().is_none());
    }

    #[test]
    fn capability_parse_and_implicit() {
        let c = Capability::parse("org:logging").unwrap();
        assert_eq!(c.version, None);
        let implicit = Capability::implicit(&ModuleVersionId::new("org", "a", "2.0"));
        assert_eq!(implicit.to_string(), "org:a:2.0");
        assert_eq!(implicit.id(), ModuleIdentity::new("org", "a"));
    }

    #[test]
    fn component_id_display() {
        assert_eq!(ComponentId::project(":app").to_string(), "project :app");
        let other = ComponentId::Project {
            build: ":included".into(),
            path: ":lib".into(),
        };
        assert_eq!(other.to_string(), "project :included:lib");
    }
}
