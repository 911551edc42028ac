//! Conflict resolution: narrowing the candidates claiming one module (or
//! one capability) down to a single winner.
//!
//! Policies compose by wrapping. Each layer either settles the details or
//! hands them, unchanged, to the policy it wraps.

mod capabilities;
mod report;

pub use capabilities::CapabilityPreferences;
pub use report::{ConflictReport, VersionConflict};

use modgraph_core::config::ConflictStrategy;
use modgraph_core::identity::{ComponentId, ModuleIdentity, ModuleVersionId};
use modgraph_core::metadata::ComponentMetadata;
use modgraph_core::reason::{ComponentSelectionReason, SelectionCause, SelectionDescriptor};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::version::{default_comparator, Version, VersionComparator};

/// What the resolver chain sees of a candidate component.
pub trait ComponentResolutionState {
    fn id(&self) -> &ComponentId;
    fn module_version(&self) -> &ModuleVersionId;
    /// `None` when metadata could not be resolved.
    fn metadata(&self) -> Option<&ComponentMetadata>;
    fn selection_reason(&self) -> &ComponentSelectionReason;
    fn is_rejected(&self) -> bool;

    fn version(&self) -> &str {
        &self.module_version().version
    }

    fn is_project(&self) -> bool {
        self.id().is_project()
    }

    fn is_forced(&self) -> bool {
        self.selection_reason().is_forced()
    }
}

/// What a conflict is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConflictSubject {
    Module(ModuleIdentity),
    Capability(ModuleIdentity),
}

impl fmt::Display for ConflictSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Module(m) => write!(f, "{m}"),
            Self::Capability(c) => write!(f, "capability {c}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictOutcome {
    /// Index into the candidates, plus causes to add to the winner.
    Selected {
        index: usize,
        causes: Vec<SelectionDescriptor>,
    },
    Failed(String),
}

/// One conflict, passed through a policy chain.
pub struct ConflictResolverDetails<'a, S: ComponentResolutionState> {
    subject: ConflictSubject,
    candidates: Vec<&'a S>,
    participants: Vec<ModuleIdentity>,
    outcome: Option<ConflictOutcome>,
}

impl<'a, S: ComponentResolutionState> ConflictResolverDetails<'a, S> {
    pub fn new(subject: ConflictSubject, candidates: Vec<&'a S>) -> Self {
        let mut participants: Vec<ModuleIdentity> = Vec::new();
        for c in &candidates {
            let module = &c.module_version().module;
            if !participants.contains(module) {
                participants.push(module.clone());
            }
        }
        Self {
            subject,
            candidates,
            participants,
            outcome: None,
        }
    }

    pub fn subject(&self) -> &ConflictSubject {
        &self.subject
    }

    pub fn candidates(&self) -> &[&'a S] {
        &self.candidates
    }

    pub fn participants(&self) -> &[ModuleIdentity] {
        &self.participants
    }

    pub fn select(&mut self, index: usize) {
        self.outcome = Some(ConflictOutcome::Selected {
            index,
            causes: Vec::new(),
        });
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.outcome = Some(ConflictOutcome::Failed(message.into()));
    }

    pub fn is_resolved(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn outcome(&self) -> Option<&ConflictOutcome> {
        self.outcome.as_ref()
    }

    pub fn into_outcome(self) -> Option<ConflictOutcome> {
        self.outcome
    }

    pub fn selected(&self) -> Option<&'a S> {
        match &self.outcome {
            Some(ConflictOutcome::Selected { index, .. }) => self.candidates.get(*index).copied(),
            _ => None,
        }
    }

    /// Record an extra cause for the winner. Ignored unless a winner exists.
    pub fn add_cause(&mut self, descriptor: SelectionDescriptor) {
        if let Some(ConflictOutcome::Selected { causes, .. }) = &mut self.outcome {
            if !causes.contains(&descriptor) {
                causes.push(descriptor);
            }
        }
    }

    /// Run `policy` over a subset of the candidates and map its outcome back.
    fn delegate_subset(&mut self, indices: &[usize], policy: &ConflictPolicy) {
        let mut sub = ConflictResolverDetails {
            subject: self.subject.clone(),
            candidates: indices.iter().map(|&i| self.candidates[i]).collect(),
            participants: self.participants.clone(),
            outcome: None,
        };
        policy.resolve(&mut sub);
        self.outcome = sub.outcome.map(|o| match o {
            ConflictOutcome::Selected { index, causes } => ConflictOutcome::Selected {
                index: indices[index],
                causes,
            },
            failed => failed,
        });
    }
}

/// The conflict policies and their wrappers.
#[derive(Clone)]
pub enum ConflictPolicy {
    /// Highest base version; then unqualified or release status; then highest.
    Latest(Arc<dyn VersionComparator>),
    /// Any conflict is an error.
    Strict,
    /// Capability conflicts need a configured preferred provider.
    Capabilities(CapabilityPreferences),
    /// Forced candidates win.
    DirectForcing(Box<ConflictPolicy>),
    /// Project candidates win over external modules.
    ProjectPreferred(Box<ConflictPolicy>),
    /// Adds a conflict resolution cause to the winner.
    WithSelectionReason(Box<ConflictPolicy>),
}

impl fmt::Debug for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest(_) => f.write_str("Latest"),
            Self::Strict => f.write_str("Strict"),
            Self::Capabilities(p) => f.debug_tuple("Capabilities").field(p).finish(),
            Self::DirectForcing(d) => f.debug_tuple("DirectForcing").field(d).finish(),
            Self::ProjectPreferred(d) => f.debug_tuple("ProjectPreferred").field(d).finish(),
            Self::WithSelectionReason(d) => f.debug_tuple("WithSelectionReason").field(d).finish(),
        }
    }
}

impl ConflictPolicy {
    pub fn latest() -> Self {
        Self::Latest(default_comparator())
    }

    /// The chain used for module version conflicts.
    pub fn module_chain(strategy: ConflictStrategy, prefer_projects: bool) -> Self {
        let base = match strategy {
            ConflictStrategy::Latest => Self::latest(),
            ConflictStrategy::Strict => Self::Strict,
        };
        let base = if prefer_projects {
            Self::ProjectPreferred(Box::new(base))
        } else {
            base
        };
        Self::WithSelectionReason(Box::new(Self::DirectForcing(Box::new(base))))
    }

    /// The chain used for capability conflicts.
    pub fn capability_chain(preferences: CapabilityPreferences) -> Self {
        Self::WithSelectionReason(Box::new(Self::Capabilities(preferences)))
    }

    pub fn resolve<S: ComponentResolutionState>(&self, details: &mut ConflictResolverDetails<'_, S>) {
        if details.candidates.is_empty() {
            details.fail(format!("no candidates for {}", details.subject));
            return;
        }
        match self {
            Self::Latest(comparator) => resolve_latest(comparator.as_ref(), details),
            Self::Strict => resolve_strict(details),
            Self::Capabilities(preferences) => preferences.resolve(details),
            Self::DirectForcing(delegate) => {
                let forced: Vec<usize> = indices_where(details, |c| c.is_forced());
                match forced.len() {
                    0 => delegate.resolve(details),
                    1 => details.select(forced[0]),
                    _ => details.delegate_subset(&forced, delegate),
                }
            }
            Self::ProjectPreferred(delegate) => {
                let projects: Vec<usize> = indices_where(details, |c| c.is_project());
                match projects.len() {
                    0 => delegate.resolve(details),
                    1 => details.select(projects[0]),
                    _ => details.delegate_subset(&projects, delegate),
                }
            }
            Self::WithSelectionReason(delegate) => {
                delegate.resolve(details);
                let description = match details.subject() {
                    ConflictSubject::Module(_) => None,
                    ConflictSubject::Capability(cap) => Some(format!("On capability {cap}")),
                };
                let descriptor = match description {
                    Some(d) => SelectionDescriptor::with_description(SelectionCause::ConflictResolution, d),
                    None => SelectionDescriptor::new(SelectionCause::ConflictResolution),
                };
                details.add_cause(descriptor);
            }
        }
    }
}

fn indices_where<S: ComponentResolutionState>(
    details: &ConflictResolverDetails<'_, S>,
    pred: impl Fn(&S) -> bool,
) -> Vec<usize> {
    details
        .candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| pred(c))
        .map(|(i, _)| i)
        .collect()
}

fn resolve_latest<S: ComponentResolutionState>(
    comparator: &dyn VersionComparator,
    details: &mut ConflictResolverDetails<'_, S>,
) {
    let bases: Vec<String> = details
        .candidates
        .iter()
        .map(|c| Version::parse(c.version()).base_version().original)
        .collect();

    let mut max_base = &bases[0];
    for base in &bases[1..] {
        if comparator.compare(base, max_base) == Ordering::Greater {
            max_base = base;
        }
    }
    let mut group: Vec<usize> = (0..bases.len())
        .filter(|&i| comparator.compare(&bases[i], max_base) == Ordering::Equal)
        .collect();
    if group.len() == 1 {
        details.select(group[0]);
        return;
    }

    // Highest first; equal versions keep discovery order.
    group.sort_by(|&a, &b| {
        comparator.compare(details.candidates[b].version(), details.candidates[a].version())
    });
    for &i in &group {
        let candidate = details.candidates[i];
        if !Version::parse(candidate.version()).is_qualified() {
            details.select(i);
            return;
        }
        if candidate.metadata().is_some_and(|m| m.is_release()) {
            details.select(i);
            return;
        }
    }
    details.select(group[0]);
}

fn resolve_strict<S: ComponentResolutionState>(details: &mut ConflictResolverDetails<'_, S>) {
    if details.candidates.len() == 1 {
        details.select(0);
        return;
    }
    let versions: Vec<String> = details
        .candidates
        .iter()
        .map(|c| c.id().to_string())
        .collect();
    details.fail(format!(
        "A conflict was found between the following modules: {}",
        versions.join(", ")
    ));
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use modgraph_core::metadata::STATUS_INTEGRATION;

    /// A bare candidate for exercising policies without a graph.
    pub(crate) struct TestCandidate {
        pub id: ComponentId,
        pub module_version: ModuleVersionId,
        pub metadata: Option<ComponentMetadata>,
        pub reason: ComponentSelectionReason,
    }

    impl TestCandidate {
        pub fn module(group: &str, name: &str, version: &str) -> Self {
            let mv = ModuleVersionId::new(group, name, version);
            Self {
                id: ComponentId::Module(mv.clone()),
                metadata: Some(ComponentMetadata {
                    id: ComponentId::Module(mv.clone()),
                    module_version: mv.clone(),
                    status: "release".into(),
                    repository: None,
                    adhoc: false,
                    variants: Vec::new(),
                }),
                module_version: mv,
                reason: ComponentSelectionReason::requested(),
            }
        }

        pub fn project(path: &str, group: &str, name: &str, version: &str) -> Self {
            let mut c = Self::module(group, name, version);
            c.id = ComponentId::project(path);
            c
        }

        pub fn with_status(mut self, status: &str) -> Self {
            if let Some(m) = self.metadata.as_mut() {
                m.status = status.to_string();
            }
            self
        }

        pub fn forced(mut self) -> Self {
            self.reason.add_cause(SelectionCause::Forced);
            self
        }
    }

    impl ComponentResolutionState for TestCandidate {
        fn id(&self) -> &ComponentId {
            &self.id
        }
        fn module_version(&self) -> &ModuleVersionId {
            &self.module_version
        }
        fn metadata(&self) -> Option<&ComponentMetadata> {
            self.metadata.as_ref()
        }
        fn selection_reason(&self) -> &ComponentSelectionReason {
            &self.reason
        }
        fn is_rejected(&self) -> bool {
            false
        }
    }

    fn resolve_with(policy: &ConflictPolicy, candidates: &[TestCandidate]) -> Option<ConflictOutcome> {
        let subject = ConflictSubject::Module(candidates[0].module_version.module.clone());
        let mut details = ConflictResolverDetails::new(subject, candidates.iter().collect());
        policy.resolve(&mut details);
        details.into_outcome()
    }

    fn selected_version(policy: &ConflictPolicy, candidates: &[TestCandidate]) -> String {
        match resolve_with(policy, candidates) {
            Some(ConflictOutcome::Selected { index, .. }) => candidates[index].version().to_string(),
            other => panic!("expected a selection, got {other:?}"),
        }
    }

    #[test]
    fn latest_prefers_unqualified_at_highest_base() {
        let candidates = [
            TestCandidate::module("org", "a", "1.0"),
            TestCandidate::module("org", "a", "2.0-beta"),
            TestCandidate::module("org", "a", "2.0"),
        ];
        assert_eq!(selected_version(&ConflictPolicy::latest(), &candidates), "2.0");
    }

    #[test]
    fn latest_prefers_release_status_among_qualified() {
        let candidates = [
            TestCandidate::module("org", "a", "2.0-rc2").with_status(STATUS_INTEGRATION),
            TestCandidate::module("org", "a", "2.0-rc1"),
            TestCandidate::module("org", "a", "1.0"),
        ];
        assert_eq!(selected_version(&ConflictPolicy::latest(), &candidates), "2.0-rc1");
    }

    #[test]
    fn latest_falls_back_to_highest() {
        let candidates = [
            TestCandidate::module("org", "a", "2.0-rc1").with_status(STATUS_INTEGRATION),
            TestCandidate::module("org", "a", "2.0-rc2").with_status(STATUS_INTEGRATION),
        ];
        assert_eq!(selected_version(&ConflictPolicy::latest(), &candidates), "2.0-rc2");
    }

    #[test]
    fn strict_fails_on_multiple_candidates() {
        let candidates = [
            TestCandidate::module("org", "a", "1.0"),
            TestCandidate::module("org", "a", "2.0"),
        ];
        match resolve_with(&ConflictPolicy::Strict, &candidates) {
            Some(ConflictOutcome::Failed(msg)) => assert!(msg.contains("org:a:1.0")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn project_candidate_wins_regardless_of_version() {
        let candidates = [
            TestCandidate::module("com.example", "lib", "9.0"),
            TestCandidate::project(":lib", "com.example", "lib", "1.0"),
            TestCandidate::module("com.example", "lib", "10.0"),
        ];
        let policy = ConflictPolicy::ProjectPreferred(Box::new(ConflictPolicy::latest()));
        assert_eq!(selected_version(&policy, &candidates), "1.0");
    }

    #[test]
    fn forced_candidate_wins() {
        let candidates = [
            TestCandidate::module("org", "a", "1.0").forced(),
            TestCandidate::module("org", "a", "2.0"),
        ];
        let policy = ConflictPolicy::module_chain(ConflictStrategy::Latest, true);
        assert_eq!(selected_version(&policy, &candidates), "1.0");
    }

    #[test]
    fn multiple_forced_delegate_among_themselves() {
        let candidates = [
            TestCandidate::module("org", "a", "3.0"),
            TestCandidate::module("org", "a", "1.0").forced(),
            TestCandidate::module("org", "a", "2.0").forced(),
        ];
        let policy = ConflictPolicy::DirectForcing(Box::new(ConflictPolicy::latest()));
        assert_eq!(selected_version(&policy, &candidates), "2.0");
    }

    #[test]
    fn reason_wrapper_adds_conflict_resolution() {
        let candidates = [
            TestCandidate::module("org", "a", "1.0"),
            TestCandidate::module("org", "a", "2.0"),
        ];
        let policy = ConflictPolicy::module_chain(ConflictStrategy::Latest, false);
        match resolve_with(&policy, &candidates) {
            Some(ConflictOutcome::Selected { index, causes }) => {
                assert_eq!(index, 1);
                assert_eq!(causes, vec![SelectionDescriptor::new(SelectionCause::ConflictResolution)]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn reason_wrapper_leaves_failures_alone() {
        let candidates = [
            TestCandidate::module("org", "a", "1.0"),
            TestCandidate::module("org", "a", "2.0"),
        ];
        let policy = ConflictPolicy::module_chain(ConflictStrategy::Strict, false);
        assert!(matches!(
            resolve_with(&policy, &candidates),
            Some(ConflictOutcome::Failed(_))
        ));
    }
}
