use modgraph_core::identity::ModuleIdentity;
use std::collections::BTreeMap;

use super::{ComponentResolutionState, ConflictResolverDetails, ConflictSubject};

/// Preferred providers per capability, from the `[capabilities]` table.
#[derive(Debug, Clone, Default)]
pub struct CapabilityPreferences {
    preferred: BTreeMap<ModuleIdentity, ModuleIdentity>,
}

impl CapabilityPreferences {
    pub fn new(preferred: BTreeMap<ModuleIdentity, ModuleIdentity>) -> Self {
        Self { preferred }
    }

    pub fn preferred_for(&self, capability: &ModuleIdentity) -> Option<&ModuleIdentity> {
        self.preferred.get(capability)
    }

    pub(super) fn resolve<S: ComponentResolutionState>(&self, details: &mut ConflictResolverDetails<'_, S>) {
        let ConflictSubject::Capability(capability) = details.subject().clone() else {
            // Version conflicts are not ours to settle.
            return;
        };
        if details.participants().len() < 2 {
            details.select(0);
            return;
        }
        if let Some(winner) = self.preferred.get(&capability) {
            if let Some(index) = details
                .candidates()
                .iter()
                .position(|c| &c.module_version().module == winner)
            {
                details.select(index);
                return;
            }
        }
        let providers: Vec<String> = details
            .candidates()
            .iter()
            .map(|c| c.module_version().to_string())
            .collect();
        details.fail(format!(
            "Cannot select module with conflict on capability '{capability}' also provided by [{}]; \
             declare a preferred provider in [capabilities]",
            providers.join(", ")
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::tests::TestCandidate;
    use crate::conflict::{ConflictOutcome, ConflictPolicy};

    fn details<'a>(cap: &ModuleIdentity, candidates: &'a [TestCandidate]) -> ConflictResolverDetails<'a, TestCandidate> {
        ConflictResolverDetails::new(ConflictSubject::Capability(cap.clone()), candidates.iter().collect())
    }

    #[test]
    fn ambiguous_capability_fails() {
        let cap = ModuleIdentity::new("org", "logging");
        let candidates = [
            TestCandidate::module("org", "log4j", "1.0"),
            TestCandidate::module("org", "logback", "1.0"),
        ];
        let mut d = details(&cap, &candidates);
        ConflictPolicy::capability_chain(CapabilityPreferences::default()).resolve(&mut d);
        match d.into_outcome() {
            Some(ConflictOutcome::Failed(msg)) => {
                assert!(msg.contains("capability 'org:logging'"));
                assert!(msg.contains("org:log4j:1.0"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn preferred_provider_wins_with_reason() {
        let cap = ModuleIdentity::new("org", "logging");
        let candidates = [
            TestCandidate::module("org", "log4j", "1.0"),
            TestCandidate::module("org", "logback", "1.0"),
        ];
        let mut prefs = BTreeMap::new();
        prefs.insert(cap.clone(), ModuleIdentity::new("org", "logback"));
        let mut d = details(&cap, &candidates);
        ConflictPolicy::capability_chain(CapabilityPreferences::new(prefs)).resolve(&mut d);
        match d.into_outcome() {
            Some(ConflictOutcome::Selected { index, causes }) => {
                assert_eq!(index, 1);
                assert_eq!(causes[0].description(), "On capability org:logging");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
