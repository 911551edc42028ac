//! Component states shared by reference across the resolutions of one
//! build tree.

use dashmap::DashMap;
use modgraph_core::attributes::AttributeContainer;
use modgraph_core::identity::{Capability, ComponentId, ModuleVersionId};
use modgraph_util::errors::ModgraphError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The graph-independent part of a component: identity and variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentGraphState {
    pub component_id: ComponentId,
    pub module_version: ModuleVersionId,
    pub variants: Vec<VariantGraphState>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantGraphState {
    pub name: String,
    pub attributes: AttributeContainer,
    pub capabilities: Vec<Capability>,
}

/// Instance-id map for component states that outlive any single read.
///
/// Entries are only ever added. Ids are assigned per [`ComponentId`] the
/// first time a component is registered; later registrations return the
/// existing id and keep the existing state.
#[derive(Debug, Default)]
pub struct BuildTreeRegistry {
    ids: DashMap<ComponentId, u64>,
    states: DashMap<u64, Arc<ComponentGraphState>>,
    next_id: AtomicU64,
}

impl BuildTreeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, state: ComponentGraphState) -> u64 {
        let id = *self
            .ids
            .entry(state.component_id.clone())
            .or_insert_with(|| self.next_id.fetch_add(1, Ordering::Relaxed));
        self.states.entry(id).or_insert_with(|| Arc::new(state));
        id
    }

    pub fn get(&self, instance_id: u64) -> Result<Arc<ComponentGraphState>, ModgraphError> {
        self.states
            .get(&instance_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ModgraphError::corrupt(format!("no component state with instance id {instance_id}")))
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(version: &str) -> ComponentGraphState {
        let mv = ModuleVersionId::new("org", "a", version);
        ComponentGraphState {
            component_id: ComponentId::Module(mv.clone()),
            module_version: mv,
            variants: vec![VariantGraphState {
                name: "default".into(),
                attributes: AttributeContainer::empty(),
                capabilities: Vec::new(),
            }],
        }
    }

    #[test]
    fn same_component_registers_once() {
        let registry = BuildTreeRegistry::new();
        let first = registry.register(state("1.0"));
        let second = registry.register(state("1.0"));
        let other = registry.register(state("2.0"));
        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn unknown_instance_is_corrupt() {
        let registry = BuildTreeRegistry::new();
        assert!(matches!(registry.get(9), Err(ModgraphError::Corrupt { .. })));
    }

    #[test]
    fn concurrent_registration_agrees_on_ids() {
        let registry = Arc::new(BuildTreeRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.register(state("1.0")))
            })
            .collect();
        let ids: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(registry.len(), 1);
    }
}
