//! Module resolution filters: the exclusion predicate algebra used to prune
//! edges during graph traversal.
//!
//! Filters are immutable and cheap to clone. `union` and `intersect` merge
//! exclude-rule-backed terms when the result is still a single set of
//! atomic specs, and otherwise wrap their operands in a composite. Merging
//! only changes the shape of a filter, never which modules it accepts.

mod exclusions;
mod spec;

pub use exclusions::ModuleExclusions;
pub use spec::{ExcludeSpec, PatternSpec};

use modgraph_core::identity::ModuleIdentity;
use modgraph_core::metadata::{ArtifactName, ExcludeRule};
use modgraph_util::errors::ModgraphError;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleResolutionFilter(Arc<FilterKind>);

#[derive(Debug, PartialEq, Eq, Hash)]
enum FilterKind {
    AcceptAll,
    /// Rejects anything matched by any of the specs. Never empty.
    ExcludeRuleBacked(BTreeSet<ExcludeSpec>),
    /// Accepts anything accepted by any member. Members are never unions.
    Union(Vec<ModuleResolutionFilter>),
    /// Accepts what every member accepts. Members are never intersections.
    Intersect(Vec<ModuleResolutionFilter>),
}

impl ModuleResolutionFilter {
    fn new(kind: FilterKind) -> Self {
        Self(Arc::new(kind))
    }

    pub fn accept_all() -> Self {
        Self::new(FilterKind::AcceptAll)
    }

    pub fn exclude_all() -> Self {
        Self::from_specs([ExcludeSpec::ExcludeAll])
    }

    /// A filter rejecting anything matched by any spec. No specs accepts all.
    pub fn from_specs(specs: impl IntoIterator<Item = ExcludeSpec>) -> Self {
        let specs: BTreeSet<ExcludeSpec> = specs.into_iter().collect();
        if specs.is_empty() {
            Self::accept_all()
        } else {
            Self::new(FilterKind::ExcludeRuleBacked(specs))
        }
    }

    /// Compile exclude rules. Malformed rules fail here, before traversal.
    pub fn from_rules(rules: &[ExcludeRule]) -> Result<Self, ModgraphError> {
        let specs = rules
            .iter()
            .map(ExcludeSpec::from_rule)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_specs(specs))
    }

    pub fn is_accept_all(&self) -> bool {
        matches!(*self.0, FilterKind::AcceptAll)
    }

    pub fn accepts(&self, module: &ModuleIdentity) -> bool {
        match &*self.0 {
            FilterKind::AcceptAll => true,
            FilterKind::ExcludeRuleBacked(specs) => !specs.iter().any(|s| s.excludes_module(module)),
            FilterKind::Union(members) => members.iter().any(|m| m.accepts(module)),
            FilterKind::Intersect(members) => members.iter().all(|m| m.accepts(module)),
        }
    }

    pub fn accepts_artifact(&self, module: &ModuleIdentity, artifact: &ArtifactName) -> bool {
        match &*self.0 {
            FilterKind::AcceptAll => true,
            FilterKind::ExcludeRuleBacked(specs) => {
                !specs.iter().any(|s| s.excludes_artifact(module, artifact))
            }
            FilterKind::Union(members) => members.iter().any(|m| m.accepts_artifact(module, artifact)),
            FilterKind::Intersect(members) => {
                members.iter().all(|m| m.accepts_artifact(module, artifact))
            }
        }
    }

    /// Accepts anything either filter accepts.
    pub fn union(&self, other: &ModuleResolutionFilter) -> ModuleResolutionFilter {
        if self.is_accept_all() || other.is_accept_all() {
            return Self::accept_all();
        }
        if self == other {
            return self.clone();
        }

        let mut members: Vec<ModuleResolutionFilter> = Vec::new();
        for candidate in self.union_members().into_iter().chain(other.union_members()) {
            merge_union_member(&mut members, candidate);
        }
        if members.iter().any(|m| m.is_accept_all()) {
            return Self::accept_all();
        }
        if members.len() == 1 {
            return members.remove(0);
        }
        Self::new(FilterKind::Union(members))
    }

    /// Accepts only what both filters accept.
    pub fn intersect(&self, other: &ModuleResolutionFilter) -> ModuleResolutionFilter {
        if self.is_accept_all() {
            return other.clone();
        }
        if other.is_accept_all() || self == other {
            return self.clone();
        }
        if let (FilterKind::ExcludeRuleBacked(a), FilterKind::ExcludeRuleBacked(b)) = (&*self.0, &*other.0) {
            return Self::from_specs(a.iter().chain(b.iter()).cloned());
        }

        let mut specs: BTreeSet<ExcludeSpec> = BTreeSet::new();
        let mut others: Vec<ModuleResolutionFilter> = Vec::new();
        for member in self.intersect_members().into_iter().chain(other.intersect_members()) {
            match &*member.0 {
                FilterKind::ExcludeRuleBacked(s) => specs.extend(s.iter().cloned()),
                FilterKind::AcceptAll => {}
                _ => {
                    if !others.contains(&member) {
                        others.push(member);
                    }
                }
            }
        }
        let mut members = Vec::with_capacity(others.len() + 1);
        if !specs.is_empty() {
            members.push(Self::from_specs(specs));
        }
        members.extend(others);
        match members.len() {
            0 => Self::accept_all(),
            1 => members.remove(0),
            _ => Self::new(FilterKind::Intersect(members)),
        }
    }

    /// True only when both filters provably accept the same modules.
    /// A `false` answer may be wrong; a `true` answer never is.
    pub fn accepts_same_modules_as(&self, other: &ModuleResolutionFilter) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        match (&*self.0, &*other.0) {
            (FilterKind::AcceptAll, FilterKind::AcceptAll) => true,
            (FilterKind::AcceptAll, FilterKind::ExcludeRuleBacked(s))
            | (FilterKind::ExcludeRuleBacked(s), FilterKind::AcceptAll) => {
                !s.iter().any(|spec| spec.is_module_level())
            }
            (FilterKind::ExcludeRuleBacked(a), FilterKind::ExcludeRuleBacked(b)) => {
                let module_level = |s: &BTreeSet<ExcludeSpec>| -> BTreeSet<ExcludeSpec> {
                    s.iter().filter(|spec| spec.is_module_level()).cloned().collect()
                };
                module_level(a) == module_level(b)
            }
            (FilterKind::Union(a), FilterKind::Union(b))
            | (FilterKind::Intersect(a), FilterKind::Intersect(b)) => {
                covers(a, b) && covers(b, a)
            }
            _ => false,
        }
    }

    fn union_members(&self) -> Vec<ModuleResolutionFilter> {
        match &*self.0 {
            FilterKind::Union(members) => members.clone(),
            _ => vec![self.clone()],
        }
    }

    fn intersect_members(&self) -> Vec<ModuleResolutionFilter> {
        match &*self.0 {
            FilterKind::Intersect(members) => members.clone(),
            _ => vec![self.clone()],
        }
    }

    /// Address of the shared filter body, used as a memoization key.
    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

fn covers(a: &[ModuleResolutionFilter], b: &[ModuleResolutionFilter]) -> bool {
    a.iter().all(|x| b.iter().any(|y| x.accepts_same_modules_as(y)))
}

/// Add `candidate` to a union, merging it with the first member it can be
/// merged with.
fn merge_union_member(members: &mut Vec<ModuleResolutionFilter>, candidate: ModuleResolutionFilter) {
    for i in 0..members.len() {
        if let Some(merged) = try_merge_union(&members[i], &candidate) {
            members.remove(i);
            merge_union_member(members, merged);
            return;
        }
    }
    members.push(candidate);
}

/// Union of two exclude-rule-backed filters as a single one: a module is
/// rejected only when some spec from each side rejects it, so the result
/// holds the pairwise intersections of the specs.
fn try_merge_union(
    a: &ModuleResolutionFilter,
    b: &ModuleResolutionFilter,
) -> Option<ModuleResolutionFilter> {
    if a == b {
        return Some(a.clone());
    }
    let (FilterKind::ExcludeRuleBacked(left), FilterKind::ExcludeRuleBacked(right)) = (&*a.0, &*b.0) else {
        return None;
    };
    if left.iter().chain(right.iter()).any(ExcludeSpec::is_pattern) {
        return None;
    }
    let mut merged = BTreeSet::new();
    for l in left {
        for r in right {
            match l.intersect(r) {
                Some(Some(spec)) => {
                    merged.insert(spec);
                }
                Some(None) => {}
                None => return None,
            }
        }
    }
    Some(ModuleResolutionFilter::from_specs(merged))
}

impl fmt::Display for ModuleResolutionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: impl Iterator<Item = T>) -> fmt::Result {
            for (i, item) in items.enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{item}")?;
            }
            Ok(())
        }
        match &*self.0 {
            FilterKind::AcceptAll => f.write_str("accept-all"),
            FilterKind::ExcludeRuleBacked(specs) => {
                f.write_str("excludes(")?;
                join(f, specs.iter())?;
                f.write_str(")")
            }
            FilterKind::Union(members) => {
                f.write_str("union(")?;
                join(f, members.iter())?;
                f.write_str(")")
            }
            FilterKind::Intersect(members) => {
                f.write_str("intersect(")?;
                join(f, members.iter())?;
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(g: &str, n: &str) -> ModuleIdentity {
        ModuleIdentity::new(g, n)
    }

    fn group(g: &str) -> ModuleResolutionFilter {
        ModuleResolutionFilter::from_specs([ExcludeSpec::Group(g.into())])
    }

    fn name(n: &str) -> ModuleResolutionFilter {
        ModuleResolutionFilter::from_specs([ExcludeSpec::ModuleName(n.into())])
    }

    #[test]
    fn union_of_group_and_name_merges_to_module_id() {
        let u = group("org").union(&name("a"));
        assert_eq!(
            u,
            ModuleResolutionFilter::from_specs([ExcludeSpec::ModuleId(id("org", "a"))])
        );
        assert!(!u.accepts(&id("org", "a")));
        assert!(u.accepts(&id("org", "b")));
        assert!(u.accepts(&id("com", "a")));
    }

    #[test]
    fn union_of_disjoint_groups_accepts_all() {
        assert!(group("x").union(&group("y")).is_accept_all());
    }

    #[test]
    fn union_with_exclude_all_is_the_other() {
        let f = group("org");
        assert_eq!(ModuleResolutionFilter::exclude_all().union(&f), f);
    }

    #[test]
    fn unmergeable_union_wraps() {
        let glob = ModuleResolutionFilter::from_rules(&[ExcludeRule::group("o*").glob()]).unwrap();
        let u = glob.union(&group("org"));
        assert!(u.to_string().starts_with("union("));
        assert!(!u.accepts(&id("org", "a")));
        assert!(u.accepts(&id("other", "a")));
    }

    #[test]
    fn intersection_of_exclude_sets_is_set_union() {
        let i = group("x").intersect(&name("a"));
        assert_eq!(
            i,
            ModuleResolutionFilter::from_specs([
                ExcludeSpec::Group("x".into()),
                ExcludeSpec::ModuleName("a".into())
            ])
        );
        assert!(!i.accepts(&id("x", "b")));
        assert!(!i.accepts(&id("y", "a")));
        assert!(i.accepts(&id("y", "b")));
    }

    #[test]
    fn accept_all_identities() {
        let f = group("org");
        let all = ModuleResolutionFilter::accept_all();
        assert_eq!(all.intersect(&f), f);
        assert!(all.union(&f).is_accept_all());
    }

    #[test]
    fn same_modules_ignores_artifact_rules() {
        let plain = group("org");
        let with_artifact = ModuleResolutionFilter::from_rules(&[
            ExcludeRule::group("org"),
            ExcludeRule::artifact("a", None, Some("zip")),
        ])
        .unwrap();
        assert!(plain.accepts_same_modules_as(&with_artifact));
        assert!(!plain.accepts_same_modules_as(&group("com")));
        assert!(plain.accepts_same_modules_as(&plain.clone()));
    }

    #[test]
    fn malformed_rule_fails_construction() {
        assert!(ModuleResolutionFilter::from_rules(&[ExcludeRule::module_name(" ")]).is_err());
    }
}
