//! The immutable resolved graph and the visitor protocol that assembles it.

mod assembler;

pub use assembler::ResolutionResultGraphBuilder;

use modgraph_core::attributes::AttributeContainer;
use modgraph_core::identity::{Capability, ComponentId, ComponentSelector, ModuleIdentity, ModuleVersionId};
use modgraph_core::reason::ComponentSelectionReason;
use modgraph_util::errors::ModgraphError;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::failure::ModuleResolveFailure;

/// Stable numeric id of a component within one resolved graph.
pub type ResultId = u64;
/// Id of a variant within one resolved graph.
pub type VariantId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedVariantResult {
    pub id: VariantId,
    pub owner: ComponentId,
    pub name: String,
    pub attributes: AttributeContainer,
    pub capabilities: Vec<Capability>,
}

/// One outgoing edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DependencyResult {
    /// `selected_variant` is `None` for constraints, which never attach to a variant.
    Resolved {
        requested: ComponentSelector,
        from_variant: Option<VariantId>,
        selected: ResultId,
        selected_variant: Option<VariantId>,
        constraint: bool,
    },
    Unresolved {
        requested: ComponentSelector,
        from_variant: Option<VariantId>,
        failure: ModuleResolveFailure,
        constraint: bool,
    },
}

impl DependencyResult {
    pub fn requested(&self) -> &ComponentSelector {
        match self {
            Self::Resolved { requested, .. } | Self::Unresolved { requested, .. } => requested,
        }
    }

    pub fn from_variant(&self) -> Option<VariantId> {
        match self {
            Self::Resolved { from_variant, .. } | Self::Unresolved { from_variant, .. } => *from_variant,
        }
    }

    pub fn is_constraint(&self) -> bool {
        match self {
            Self::Resolved { constraint, .. } | Self::Unresolved { constraint, .. } => *constraint,
        }
    }

    pub fn selected(&self) -> Option<ResultId> {
        match self {
            Self::Resolved { selected, .. } => Some(*selected),
            Self::Unresolved { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<&ModuleResolveFailure> {
        match self {
            Self::Unresolved { failure, .. } => Some(failure),
            Self::Resolved { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedComponentResult {
    pub id: ResultId,
    pub component_id: ComponentId,
    pub module_version: ModuleVersionId,
    pub reason: ComponentSelectionReason,
    pub repository: Option<String>,
    /// Variants actually traversed, in first-visit order.
    pub selected_variants: Vec<ResolvedVariantResult>,
    /// Every variant of the component, when requested.
    pub available_variants: Option<Vec<ResolvedVariantResult>>,
    pub dependencies: Vec<DependencyResult>,
}

impl ResolvedComponentResult {
    pub fn module(&self) -> &ModuleIdentity {
        &self.module_version.module
    }

    pub fn variant(&self, id: VariantId) -> Option<&ResolvedVariantResult> {
        self.selected_variants.iter().find(|v| v.id == id)
    }

    pub fn dependencies_for_variant(&self, id: VariantId) -> impl Iterator<Item = &DependencyResult> {
        self.dependencies
            .iter()
            .filter(move |d| d.from_variant() == Some(id))
    }
}

/// A fully assembled graph. Every edge target exists in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedGraph {
    root: ResultId,
    components: BTreeMap<ResultId, ResolvedComponentResult>,
}

impl ResolvedGraph {
    /// Callers guarantee `root` and every edge target are present.
    pub(crate) fn new(root: ResultId, components: BTreeMap<ResultId, ResolvedComponentResult>) -> Self {
        Self { root, components }
    }

    pub fn root_id(&self) -> ResultId {
        self.root
    }

    pub fn root(&self) -> &ResolvedComponentResult {
        &self.components[&self.root]
    }

    pub fn component(&self, id: ResultId) -> Option<&ResolvedComponentResult> {
        self.components.get(&id)
    }

    pub fn components(&self) -> impl Iterator<Item = &ResolvedComponentResult> {
        self.components.values()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.components.values().map(|c| c.dependencies.len()).sum()
    }

    pub fn find_module(&self, module: &ModuleIdentity) -> Option<&ResolvedComponentResult> {
        self.components.values().find(|c| c.module() == module)
    }

    /// Components with an edge to `id`, with that edge.
    pub fn dependents_of(&self, id: ResultId) -> Vec<(&ResolvedComponentResult, &DependencyResult)> {
        self.components
            .values()
            .flat_map(|c| c.dependencies.iter().map(move |d| (c, d)))
            .filter(|(_, d)| d.selected() == Some(id))
            .collect()
    }

    /// Every failed edge, with its source component.
    pub fn unresolved(&self) -> Vec<(&ResolvedComponentResult, &ModuleResolveFailure)> {
        self.components
            .values()
            .flat_map(|c| c.dependencies.iter().filter_map(move |d| d.failure().map(|f| (c, f))))
            .collect()
    }
}

/// Receives a resolved graph one component and one edge batch at a time.
///
/// Each component visit is `start_visit_component`, then details, then
/// any number of selected variants, optionally the full variant list, then
/// `end_visit_component`. The same component may be visited again later to
/// contribute further variants.
pub trait ResolvedGraphVisitor {
    fn start_visit_component(
        &mut self,
        id: ResultId,
        reason: &ComponentSelectionReason,
        repository: Option<&str>,
    ) -> Result<(), ModgraphError>;

    fn visit_component_details(
        &mut self,
        component_id: &ComponentId,
        module_version: &ModuleVersionId,
    ) -> Result<(), ModgraphError>;

    fn visit_selected_variant(&mut self, variant: &ResolvedVariantResult) -> Result<(), ModgraphError>;

    fn visit_component_variants(&mut self, variants: &[ResolvedVariantResult]) -> Result<(), ModgraphError>;

    fn end_visit_component(&mut self) -> Result<(), ModgraphError>;

    fn visit_dependencies(&mut self, from: ResultId, dependencies: &[DependencyResult]) -> Result<(), ModgraphError>;
}
