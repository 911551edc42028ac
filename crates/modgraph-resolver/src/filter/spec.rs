//! Atomic exclude specs compiled from exclude rules.

use globset::{Glob, GlobMatcher};
use modgraph_core::identity::ModuleIdentity;
use modgraph_core::metadata::{ArtifactName, ExcludeRule, PatternMatcher};
use modgraph_util::errors::ModgraphError;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// One atomic exclusion. A set of these rejects a module when any of them
/// excludes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExcludeSpec {
    ExcludeAll,
    Group(String),
    ModuleName(String),
    ModuleId(ModuleIdentity),
    /// Glob rules and anything with an artifact part.
    Pattern(PatternSpec),
}

impl ExcludeSpec {
    /// Compile a rule into its most specific spec shape.
    pub fn from_rule(rule: &ExcludeRule) -> Result<Self, ModgraphError> {
        for (field, value) in [
            ("group", &rule.group),
            ("module", &rule.module),
            ("artifact", &rule.artifact),
            ("type", &rule.artifact_type),
            ("ext", &rule.extension),
        ] {
            if matches!(value.as_deref(), Some(v) if v.trim().is_empty()) {
                return Err(ModgraphError::Filter {
                    message: format!("empty '{field}' pattern in exclude rule {rule}"),
                });
            }
        }

        if rule.matcher == PatternMatcher::Glob || rule.targets_artifacts() {
            return Ok(Self::Pattern(PatternSpec::compile(rule)?));
        }

        let group = rule.group.as_deref().filter(|g| *g != "*");
        let module = rule.module.as_deref().filter(|m| *m != "*");
        Ok(match (group, module) {
            (None, None) => Self::ExcludeAll,
            (Some(g), None) => Self::Group(g.to_string()),
            (None, Some(m)) => Self::ModuleName(m.to_string()),
            (Some(g), Some(m)) => Self::ModuleId(ModuleIdentity::new(g, m)),
        })
    }

    pub fn excludes_module(&self, module: &ModuleIdentity) -> bool {
        match self {
            Self::ExcludeAll => true,
            Self::Group(g) => &module.group == g,
            Self::ModuleName(n) => &module.name == n,
            Self::ModuleId(id) => id == module,
            Self::Pattern(p) => p.excludes_module(module),
        }
    }

    /// Only artifact-level patterns exclude individual artifacts.
    pub fn excludes_artifact(&self, module: &ModuleIdentity, artifact: &ArtifactName) -> bool {
        match self {
            Self::Pattern(p) => p.excludes_artifact(module, artifact),
            _ => false,
        }
    }

    /// True when the spec can reject whole modules.
    pub fn is_module_level(&self) -> bool {
        match self {
            Self::Pattern(p) => !p.rule.targets_artifacts(),
            _ => true,
        }
    }

    pub fn is_pattern(&self) -> bool {
        matches!(self, Self::Pattern(_))
    }

    /// The spec matching exactly what both `self` and `other` match.
    ///
    /// `None` when the pair cannot be expressed as one atomic spec,
    /// `Some(None)` when nothing can match both.
    pub fn intersect(&self, other: &ExcludeSpec) -> Option<Option<ExcludeSpec>> {
        if self == other {
            return Some(Some(self.clone()));
        }
        if self.is_pattern() || other.is_pattern() {
            return None;
        }
        use ExcludeSpec::*;
        let merged = match (self, other) {
            (ExcludeAll, x) | (x, ExcludeAll) => Some(x.clone()),
            (Group(g), ModuleName(n)) | (ModuleName(n), Group(g)) => {
                Some(ModuleId(ModuleIdentity::new(g.clone(), n.clone())))
            }
            (Group(g), ModuleId(id)) | (ModuleId(id), Group(g)) => {
                (&id.group == g).then(|| ModuleId(id.clone()))
            }
            (ModuleName(n), ModuleId(id)) | (ModuleId(id), ModuleName(n)) => {
                (&id.name == n).then(|| ModuleId(id.clone()))
            }
            // Distinct values of the same shape never overlap.
            _ => None,
        };
        Some(merged)
    }
}

impl fmt::Display for ExcludeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExcludeAll => f.write_str("*:*"),
            Self::Group(g) => write!(f, "{g}:*"),
            Self::ModuleName(n) => write!(f, "*:{n}"),
            Self::ModuleId(id) => write!(f, "{id}"),
            Self::Pattern(p) => write!(f, "{}", p.rule),
        }
    }
}

/// A compiled pattern rule. Identity, ordering and hashing follow the
/// source rule.
#[derive(Debug, Clone)]
pub struct PatternSpec {
    rule: ExcludeRule,
    compiled: Arc<CompiledRule>,
}

#[derive(Debug)]
struct CompiledRule {
    group: Matcher,
    module: Matcher,
    artifact: Matcher,
    artifact_type: Matcher,
    extension: Matcher,
}

#[derive(Debug)]
enum Matcher {
    Any,
    Exact(String),
    Glob(GlobMatcher),
}

impl Matcher {
    fn compile(pattern: Option<&str>, kind: PatternMatcher) -> Result<Self, ModgraphError> {
        let Some(p) = pattern else {
            return Ok(Self::Any);
        };
        if p == "*" {
            return Ok(Self::Any);
        }
        match kind {
            PatternMatcher::Exact => Ok(Self::Exact(p.to_string())),
            PatternMatcher::Glob => Glob::new(p)
                .map(|g| Self::Glob(g.compile_matcher()))
                .map_err(|e| ModgraphError::Filter {
                    message: format!("invalid glob '{p}': {e}"),
                }),
        }
    }

    fn matches(&self, value: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(s) => s == value,
            Self::Glob(g) => g.is_match(value),
        }
    }
}

impl PatternSpec {
    fn compile(rule: &ExcludeRule) -> Result<Self, ModgraphError> {
        let kind = rule.matcher;
        let compiled = CompiledRule {
            group: Matcher::compile(rule.group.as_deref(), kind)?,
            module: Matcher::compile(rule.module.as_deref(), kind)?,
            artifact: Matcher::compile(rule.artifact.as_deref(), kind)?,
            artifact_type: Matcher::compile(rule.artifact_type.as_deref(), kind)?,
            extension: Matcher::compile(rule.extension.as_deref(), kind)?,
        };
        Ok(Self {
            rule: rule.clone(),
            compiled: Arc::new(compiled),
        })
    }

    pub fn rule(&self) -> &ExcludeRule {
        &self.rule
    }

    fn matches_module(&self, module: &ModuleIdentity) -> bool {
        self.compiled.group.matches(&module.group) && self.compiled.module.matches(&module.name)
    }

    fn excludes_module(&self, module: &ModuleIdentity) -> bool {
        !self.rule.targets_artifacts() && self.matches_module(module)
    }

    fn excludes_artifact(&self, module: &ModuleIdentity, artifact: &ArtifactName) -> bool {
        self.rule.targets_artifacts()
            && self.matches_module(module)
            && self.compiled.artifact.matches(&artifact.name)
            && self.compiled.artifact_type.matches(&artifact.artifact_type)
            && self.compiled.extension.matches(&artifact.extension)
    }
}

impl PartialEq for PatternSpec {
    fn eq(&self, other: &Self) -> bool {
        self.rule == other.rule
    }
}

impl Eq for PatternSpec {}

impl Hash for PatternSpec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rule.hash(state);
    }
}

impl PartialOrd for PatternSpec {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PatternSpec {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rule.cmp(&other.rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(g: &str, n: &str) -> ModuleIdentity {
        ModuleIdentity::new(g, n)
    }

    #[test]
    fn rule_shapes() {
        assert_eq!(
            ExcludeSpec::from_rule(&ExcludeRule::module("org", "a")).unwrap(),
            ExcludeSpec::ModuleId(id("org", "a"))
        );
        assert_eq!(
            ExcludeSpec::from_rule(&ExcludeRule::group("org")).unwrap(),
            ExcludeSpec::Group("org".into())
        );
        assert_eq!(
            ExcludeSpec::from_rule(&ExcludeRule::module_name("a")).unwrap(),
            ExcludeSpec::ModuleName("a".into())
        );
        assert_eq!(
            ExcludeSpec::from_rule(&ExcludeRule::default()).unwrap(),
            ExcludeSpec::ExcludeAll
        );
        assert!(ExcludeSpec::from_rule(&ExcludeRule::group("org").glob())
            .unwrap()
            .is_pattern());
    }

    #[test]
    fn empty_pattern_is_rejected() {
        let err = ExcludeSpec::from_rule(&ExcludeRule::group("")).unwrap_err();
        assert!(err.to_string().contains("empty 'group' pattern"));
    }

    #[test]
    fn invalid_glob_is_rejected() {
        assert!(ExcludeSpec::from_rule(&ExcludeRule::group("org[").glob()).is_err());
    }

    #[test]
    fn glob_matching() {
        let spec = ExcludeSpec::from_rule(&ExcludeRule::module_name("*-legacy").glob()).unwrap();
        assert!(spec.excludes_module(&id("org", "io-legacy")));
        assert!(!spec.excludes_module(&id("org", "io")));
    }

    #[test]
    fn artifact_rules_leave_modules_alone() {
        let spec =
            ExcludeSpec::from_rule(&ExcludeRule::artifact("a", None, Some("zip"))).unwrap();
        assert!(!spec.is_module_level());
        assert!(!spec.excludes_module(&id("org", "a")));
        assert!(spec.excludes_artifact(&id("org", "a"), &ArtifactName::new("a", "zip", "zip")));
        assert!(!spec.excludes_artifact(&id("org", "a"), &ArtifactName::new("a", "jar", "jar")));
    }

    #[test]
    fn pairwise_intersection() {
        let g = ExcludeSpec::Group("org".into());
        let n = ExcludeSpec::ModuleName("a".into());
        assert_eq!(
            g.intersect(&n),
            Some(Some(ExcludeSpec::ModuleId(id("org", "a"))))
        );
        assert_eq!(
            ExcludeSpec::Group("x".into()).intersect(&ExcludeSpec::Group("y".into())),
            Some(None)
        );
        assert_eq!(ExcludeSpec::ExcludeAll.intersect(&g), Some(Some(g.clone())));
        let p = ExcludeSpec::from_rule(&ExcludeRule::group("o*").glob()).unwrap();
        assert_eq!(p.intersect(&g), None);
    }
}
