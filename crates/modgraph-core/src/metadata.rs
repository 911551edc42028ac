//! Component metadata as seen by the resolver: variants, their
//! dependencies, capabilities and exclude rules.

use crate::attributes::AttributeContainer;
use crate::identity::{Capability, ComponentId, ComponentSelector, ModuleVersionId};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const STATUS_RELEASE: &str = "release";
pub const STATUS_INTEGRATION: &str = "integration";

/// Everything the resolver knows about one component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentMetadata {
    pub id: ComponentId,
    pub module_version: ModuleVersionId,
    pub status: String,
    pub repository: Option<String>,
    /// Adhoc components are never shared across resolutions and are always
    /// serialized in full.
    pub adhoc: bool,
    pub variants: Vec<VariantMetadata>,
}

impl ComponentMetadata {
    pub fn is_project(&self) -> bool {
        self.id.is_project()
    }

    pub fn variant(&self, name: &str) -> Option<&VariantMetadata> {
        self.variants.iter().find(|v| v.name == name)
    }

    pub fn is_release(&self) -> bool {
        self.status == STATUS_RELEASE
    }
}

/// A named, attribute-tagged flavour of a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantMetadata {
    pub name: String,
    pub attributes: AttributeContainer,
    /// Declared capabilities. Empty means the implicit module capability only.
    pub capabilities: Vec<Capability>,
    pub dependencies: Vec<DependencyMetadata>,
    pub excludes: Vec<ExcludeRule>,
    pub transitive: bool,
}

impl VariantMetadata {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: AttributeContainer::empty(),
            capabilities: Vec::new(),
            dependencies: Vec::new(),
            excludes: Vec::new(),
            transitive: true,
        }
    }

    /// The owner's implicit capability followed by the declared ones.
    pub fn effective_capabilities(&self, owner: &ModuleVersionId) -> Vec<Capability> {
        let implicit = Capability::implicit(owner);
        let mut capabilities = vec![implicit.clone()];
        capabilities.extend(self.capabilities.iter().filter(|c| **c != implicit).cloned());
        capabilities
    }
}

/// One declared dependency of a variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyMetadata {
    pub selector: ComponentSelector,
    pub force: bool,
    /// Constraints only apply once some hard edge pulls the module in.
    pub constraint: bool,
    /// Strict versions pin the module for the whole subgraph below.
    pub strict: bool,
    pub transitive: bool,
    pub excludes: Vec<ExcludeRule>,
    pub requested_variant: Option<String>,
    pub requested_attributes: AttributeContainer,
    pub reason: Option<String>,
}

impl DependencyMetadata {
    pub fn new(selector: ComponentSelector) -> Self {
        Self {
            selector,
            force: false,
            constraint: false,
            strict: false,
            transitive: true,
            excludes: Vec::new(),
            requested_variant: None,
            requested_attributes: AttributeContainer::empty(),
            reason: None,
        }
    }

    pub fn module(group: &str, name: &str, version: &str) -> Self {
        Self::new(ComponentSelector::module(group, name, version))
    }

    pub fn project(path: &str) -> Self {
        Self::new(ComponentSelector::project(path))
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    pub fn as_constraint(mut self) -> Self {
        self.constraint = true;
        self
    }

    pub fn strictly(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn non_transitive(mut self) -> Self {
        self.transitive = false;
        self
    }

    pub fn excluding(mut self, rule: ExcludeRule) -> Self {
        self.excludes.push(rule);
        self
    }

    pub fn with_variant(mut self, name: &str) -> Self {
        self.requested_variant = Some(name.to_string());
        self
    }

    pub fn with_attributes(mut self, attributes: AttributeContainer) -> Self {
        self.requested_attributes = attributes;
        self
    }
}

/// How exclude rule patterns are matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternMatcher {
    #[default]
    Exact,
    Glob,
}

/// An exclude rule. A missing field matches anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExcludeRule {
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub artifact: Option<String>,
    #[serde(default, rename = "type")]
    pub artifact_type: Option<String>,
    #[serde(default, rename = "ext")]
    pub extension: Option<String>,
    #[serde(default)]
    pub matcher: PatternMatcher,
}

impl ExcludeRule {
    pub fn module(group: &str, module: &str) -> Self {
        Self {
            group: Some(group.to_string()),
            module: Some(module.to_string()),
            ..Self::default()
        }
    }

    pub fn group(group: &str) -> Self {
        Self {
            group: Some(group.to_string()),
            ..Self::default()
        }
    }

    pub fn module_name(module: &str) -> Self {
        Self {
            module: Some(module.to_string()),
            ..Self::default()
        }
    }

    pub fn artifact(name: &str, artifact_type: Option<&str>, extension: Option<&str>) -> Self {
        Self {
            artifact: Some(name.to_string()),
            artifact_type: artifact_type.map(str::to_string),
            extension: extension.map(str::to_string),
            ..Self::default()
        }
    }

    pub fn glob(mut self) -> Self {
        self.matcher = PatternMatcher::Glob;
        self
    }

    /// True when the rule carries any artifact-level pattern.
    pub fn targets_artifacts(&self) -> bool {
        self.artifact.is_some() || self.artifact_type.is_some() || self.extension.is_some()
    }
}

impl fmt::Display for ExcludeRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let part = |p: &Option<String>| p.clone().unwrap_or_else(|| "*".to_string());
        write!(f, "{}:{}", part(&self.group), part(&self.module))?;
        if self.targets_artifacts() {
            write!(
                f,
                ":{}:{}@{}",
                part(&self.artifact),
                part(&self.artifact_type),
                part(&self.extension)
            )?;
        }
        Ok(())
    }
}

/// An artifact as checked by artifact-level exclusions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactName {
    pub name: String,
    pub artifact_type: String,
    pub extension: String,
}

impl ArtifactName {
    pub fn new(name: &str, artifact_type: &str, extension: &str) -> Self {
        Self {
            name: name.to_string(),
            artifact_type: artifact_type.to_string(),
            extension: extension.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclude_rule_display() {
        assert_eq!(ExcludeRule::module("org", "a").to_string(), "org:a");
        assert_eq!(ExcludeRule::group("org").to_string(), "org:*");
        assert_eq!(
            ExcludeRule::artifact("a", None, Some("jar")).to_string(),
            "*:*:a:*@jar"
        );
    }

    #[test]
    fn implicit_capability_when_none_declared() {
        let owner = ModuleVersionId::new("org", "a", "1.0");
        let v = VariantMetadata::named("default");
        assert_eq!(v.effective_capabilities(&owner), vec![Capability::implicit(&owner)]);
    }

    #[test]
    fn declared_capabilities_follow_the_implicit_one() {
        let owner = ModuleVersionId::new("org", "a", "1.0");
        let mut v = VariantMetadata::named("default");
        v.capabilities = vec![Capability::new("org", "logging", None), Capability::implicit(&owner)];
        let caps = v.effective_capabilities(&owner);
        assert_eq!(caps.len(), 2);
        assert_eq!(caps[0], Capability::implicit(&owner));
        assert_eq!(caps[1].name, "logging");
    }

    #[test]
    fn dependency_builders() {
        let d = DependencyMetadata::module("org", "a", "1.0")
            .forced()
            .strictly()
            .with_variant("runtime");
        assert!(d.force && d.strict && d.transitive && !d.constraint);
        assert_eq!(d.requested_variant.as_deref(), Some("runtime"));
    }
}
