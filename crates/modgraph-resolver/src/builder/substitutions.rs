//! Rewriting of requested selectors before identity resolution.

use modgraph_core::config::{ResolutionConfig, SubstitutionRule};
use modgraph_core::identity::{ComponentSelector, ModuleIdentity};
use modgraph_core::reason::{SelectionCause, SelectionDescriptor};
use modgraph_util::errors::ModgraphError;
use std::collections::{BTreeMap, HashMap};

/// A selector after substitution, with the causes the rewrite contributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutedSelector {
    pub selector: ComponentSelector,
    pub causes: Vec<SelectionDescriptor>,
}

/// Substitution rules, configured forced versions and inherited pins.
#[derive(Debug, Clone, Default)]
pub struct DependencySubstitutions {
    rules: Vec<SubstitutionRule>,
    forced: HashMap<ModuleIdentity, String>,
}

impl DependencySubstitutions {
    pub fn from_config(config: &ResolutionConfig) -> Result<Self, ModgraphError> {
        let forced = config
            .forced_versions()?
            .into_iter()
            .map(|id| (id.module, id.version))
            .collect();
        Ok(Self {
            rules: config.substitution_rules()?,
            forced,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.forced.is_empty()
    }

    /// Apply the first matching rule, then forced versions, then pins
    /// inherited from strict ancestors. Later steps see the output of
    /// earlier ones.
    pub fn apply(
        &self,
        requested: &ComponentSelector,
        pins: &BTreeMap<ModuleIdentity, String>,
    ) -> SubstitutedSelector {
        let mut selector = requested.clone();
        let mut causes = Vec::new();

        if let Some(rule) = self.rules.iter().find(|r| rule_matches(r, &selector)) {
            let cause = if matches!(rule.to, ComponentSelector::Project { .. }) {
                SelectionCause::CompositeBuild
            } else {
                SelectionCause::SelectedByRule
            };
            causes.push(match &rule.reason {
                Some(reason) => SelectionDescriptor::with_description(cause, reason.clone()),
                None => SelectionDescriptor::new(cause),
            });
            selector = rule.to.clone();
        }

        if let ComponentSelector::Module { module, version } = &mut selector {
            if let Some(forced) = self.forced.get(module) {
                *version = forced.clone();
                causes.push(SelectionDescriptor::new(SelectionCause::Forced));
            } else if let Some(pinned) = pins.get(module) {
                if version != pinned {
                    *version = pinned.clone();
                    causes.push(SelectionDescriptor::with_description(
                        SelectionCause::ByAncestor,
                        format!("strictly {pinned} by ancestor"),
                    ));
                }
            }
        }

        SubstitutedSelector { selector, causes }
    }
}

fn rule_matches(rule: &SubstitutionRule, selector: &ComponentSelector) -> bool {
    match selector {
        ComponentSelector::Module { module, version } => {
            &rule.from == module && rule.from_version.as_ref().map_or(true, |v| v == version)
        }
        ComponentSelector::Project { .. } => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn substitutions(toml: &str) -> DependencySubstitutions {
        let config = ResolutionConfig::parse_toml(toml).unwrap();
        DependencySubstitutions::from_config(&config).unwrap()
    }

    #[test]
    fn module_rule_is_selected_by_rule() {
        let subs = substitutions(
            r#"
[[substitution]]
from = "org:old"
to = "org:new:2.0"
reason = "renamed"
"#,
        );
        let out = subs.apply(&ComponentSelector::module("org", "old", "1.0"), &BTreeMap::new());
        assert_eq!(out.selector, ComponentSelector::module("org", "new", "2.0"));
        assert_eq!(out.causes[0].cause, SelectionCause::SelectedByRule);
        assert_eq!(out.causes[0].description(), "renamed");
    }

    #[test]
    fn project_rule_is_composite_build() {
        let subs = substitutions(
            r#"
[[substitution]]
from = "org:lib:1.0"
to = ":lib"
"#,
        );
        let out = subs.apply(&ComponentSelector::module("org", "lib", "1.0"), &BTreeMap::new());
        assert_eq!(out.selector, ComponentSelector::project(":lib"));
        assert_eq!(out.causes[0].cause, SelectionCause::CompositeBuild);

        let untouched = subs.apply(&ComponentSelector::module("org", "lib", "2.0"), &BTreeMap::new());
        assert!(untouched.causes.is_empty());
    }

    #[test]
    fn forced_wins_over_pins() {
        let subs = substitutions("force = [\"org:a:3.0\"]");
        let mut pins = BTreeMap::new();
        pins.insert(ModuleIdentity::new("org", "a"), "1.0".to_string());
        pins.insert(ModuleIdentity::new("org", "b"), "1.0".to_string());

        let a = subs.apply(&ComponentSelector::module("org", "a", "2.0"), &pins);
        assert_eq!(a.selector.version(), Some("3.0"));
        assert_eq!(a.causes[0].cause, SelectionCause::Forced);

        let b = subs.apply(&ComponentSelector::module("org", "b", "2.0"), &pins);
        assert_eq!(b.selector.version(), Some("1.0"));
        assert_eq!(b.causes[0].cause, SelectionCause::ByAncestor);
    }
}
