//! Arena-allocated mutable state of one resolution.
//!
//! Everything is referenced by index into the builder's vectors, never by
//! shared pointer.

use modgraph_core::identity::{ComponentId, ComponentSelector, ModuleIdentity, ModuleVersionId};
use modgraph_core::metadata::{ComponentMetadata, DependencyMetadata};
use modgraph_core::reason::ComponentSelectionReason;
use std::collections::{BTreeMap, BTreeSet};

use crate::cache::MetadataLookup;
use crate::conflict::ComponentResolutionState;
use crate::failure::ModuleResolveFailure;
use crate::filter::ModuleResolutionFilter;
use crate::result::VariantId;

pub(crate) type ModuleIdx = usize;
pub(crate) type ComponentIdx = usize;
pub(crate) type NodeIdx = usize;
pub(crate) type EdgeIdx = usize;

/// Versions pinned by strict ancestors.
pub(crate) type Pins = BTreeMap<ModuleIdentity, String>;

/// All candidates and edges for one module identity.
#[derive(Debug)]
pub(crate) struct ModuleResolveState {
    pub id: ModuleIdentity,
    /// Candidate components in discovery order.
    pub components: Vec<ComponentIdx>,
    /// Live edges whose target is this module.
    pub edges: Vec<EdgeIdx>,
    pub selected: Option<ComponentIdx>,
    /// Candidates the current selection was chosen among.
    pub settled: BTreeSet<ComponentIdx>,
    pub conflict_queued: bool,
    /// Times the selection moved from one candidate to another.
    pub selection_changes: usize,
    /// Set when a capability conflict handed this module's edges to another.
    pub replaced_by: Option<ModuleIdx>,
}

impl ModuleResolveState {
    pub fn new(id: ModuleIdentity) -> Self {
        Self {
            id,
            components: Vec::new(),
            edges: Vec::new(),
            selected: None,
            settled: BTreeSet::new(),
            conflict_queued: false,
            selection_changes: 0,
            replaced_by: None,
        }
    }
}

/// One candidate version of a module.
#[derive(Debug)]
pub(crate) struct ComponentState {
    pub module: ModuleIdx,
    pub id: ComponentId,
    pub module_version: ModuleVersionId,
    pub lookup: MetadataLookup,
    pub reason: ComponentSelectionReason,
    pub rejected: bool,
    /// Graph-wide ids, parallel to the metadata's variants.
    pub variant_ids: Vec<VariantId>,
    /// Node per variant index, created on first use.
    pub nodes: Vec<Option<NodeIdx>>,
}

impl ComponentState {
    pub fn found(&self) -> Option<&ComponentMetadata> {
        match &self.lookup {
            MetadataLookup::Found(metadata) => Some(metadata.as_ref()),
            _ => None,
        }
    }

    pub fn live_nodes(&self) -> impl Iterator<Item = NodeIdx> + '_ {
        self.nodes.iter().flatten().copied()
    }
}

impl ComponentResolutionState for ComponentState {
    fn id(&self) -> &ComponentId {
        &self.id
    }

    fn module_version(&self) -> &ModuleVersionId {
        &self.module_version
    }

    fn metadata(&self) -> Option<&ComponentMetadata> {
        self.found()
    }

    fn selection_reason(&self) -> &ComponentSelectionReason {
        &self.reason
    }

    fn is_rejected(&self) -> bool {
        self.rejected
    }
}

/// What a node's outgoing edges were last built from.
#[derive(Debug, Clone)]
pub(crate) struct VisitKey {
    /// `None` when no incoming path is transitive.
    pub filter: Option<ModuleResolutionFilter>,
    pub pins: Pins,
}

impl VisitKey {
    pub fn same_as(&self, other: &VisitKey) -> bool {
        let filters_match = match (&self.filter, &other.filter) {
            (None, None) => true,
            (Some(a), Some(b)) => a.accepts_same_modules_as(b),
            _ => false,
        };
        filters_match && self.pins == other.pins
    }
}

/// One variant of one component, in the graph while it has incoming edges.
#[derive(Debug)]
pub(crate) struct NodeState {
    pub component: ComponentIdx,
    pub variant: usize,
    pub root: bool,
    pub incoming: Vec<EdgeIdx>,
    pub outgoing: Vec<EdgeIdx>,
    pub visited: Option<VisitKey>,
    pub queued: bool,
}

impl NodeState {
    pub fn is_active(&self) -> bool {
        self.root || !self.incoming.is_empty()
    }
}

/// One declared dependency of one node.
#[derive(Debug)]
pub(crate) struct EdgeState {
    pub from: NodeIdx,
    /// Index of the dependency within the source variant.
    pub dep_index: usize,
    pub dependency: DependencyMetadata,
    /// The selector after substitution.
    pub selector: ComponentSelector,
    pub module: Option<ModuleIdx>,
    pub candidate: Option<ComponentIdx>,
    /// The selector could not be turned into a candidate.
    pub selection_failure: Option<ModuleResolveFailure>,
    /// The selected component had no usable variant for this edge.
    pub attach_failure: Option<ModuleResolveFailure>,
    pub target_node: Option<NodeIdx>,
    /// Filter and pins handed to the target. `None` for non-transitive edges.
    pub carried: Option<(ModuleResolutionFilter, Pins)>,
    pub live: bool,
}

impl EdgeState {
    pub fn is_constraint(&self) -> bool {
        self.dependency.constraint
    }

    pub fn failure(&self) -> Option<&ModuleResolveFailure> {
        self.selection_failure.as_ref().or(self.attach_failure.as_ref())
    }

    /// Whether this edge wants to attach to a node of its module's selection.
    pub fn is_attachable(&self) -> bool {
        self.live && !self.is_constraint() && self.selection_failure.is_none() && self.candidate.is_some()
    }
}

/// Keep only pins every incoming path agrees on.
pub(crate) fn intersect_pins(a: Pins, b: &Pins) -> Pins {
    a.into_iter().filter(|(m, v)| b.get(m) == Some(v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pins_keep_agreement_only() {
        let a: Pins = [
            (ModuleIdentity::new("org", "a"), "1.0".to_string()),
            (ModuleIdentity::new("org", "b"), "1.0".to_string()),
        ]
        .into_iter()
        .collect();
        let b: Pins = [
            (ModuleIdentity::new("org", "a"), "1.0".to_string()),
            (ModuleIdentity::new("org", "b"), "2.0".to_string()),
        ]
        .into_iter()
        .collect();
        let both = intersect_pins(a, &b);
        assert_eq!(both.len(), 1);
        assert_eq!(both.get(&ModuleIdentity::new("org", "a")).map(String::as_str), Some("1.0"));
    }

    #[test]
    fn visit_keys_compare_filters_by_modules() {
        let key = |filter| VisitKey {
            filter,
            pins: Pins::new(),
        };
        assert!(key(None).same_as(&key(None)));
        assert!(key(Some(ModuleResolutionFilter::accept_all())).same_as(&key(Some(ModuleResolutionFilter::accept_all()))));
        assert!(!key(None).same_as(&key(Some(ModuleResolutionFilter::accept_all()))));
    }
}
