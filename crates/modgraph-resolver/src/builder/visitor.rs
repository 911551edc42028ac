//! What the graph builder reports once traversal is complete.

use modgraph_core::identity::{ComponentId, ModuleVersionId};
use modgraph_core::reason::ComponentSelectionReason;
use modgraph_util::errors::ModgraphError;

use crate::result::{
    DependencyResult, ResolutionResultGraphBuilder, ResolvedGraph, ResolvedGraphVisitor, ResolvedVariantResult,
    ResultId, VariantId,
};
use crate::serial::{ComponentGraphState, VariantGraphState};

/// A selected component, as handed to graph visitors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphComponent {
    pub result_id: ResultId,
    pub component_id: ComponentId,
    pub module_version: ModuleVersionId,
    pub reason: ComponentSelectionReason,
    pub repository: Option<String>,
    pub adhoc: bool,
    /// Every variant of the component, with graph-wide ids.
    pub variants: Vec<ResolvedVariantResult>,
    /// Whether consumers should see all variants, not just selected ones.
    pub include_available: bool,
}

impl GraphComponent {
    pub fn variant(&self, id: VariantId) -> Option<&ResolvedVariantResult> {
        self.variants.iter().find(|v| v.id == id)
    }

    pub fn variant_index(&self, id: VariantId) -> Option<usize> {
        self.variants.iter().position(|v| v.id == id)
    }

    pub fn available_variants(&self) -> Option<&[ResolvedVariantResult]> {
        self.include_available.then_some(self.variants.as_slice())
    }

    /// The part of this component that does not depend on the graph.
    pub fn graph_state(&self) -> ComponentGraphState {
        ComponentGraphState {
            component_id: self.component_id.clone(),
            module_version: self.module_version.clone(),
            variants: self
                .variants
                .iter()
                .map(|v| VariantGraphState {
                    name: v.name.clone(),
                    attributes: v.attributes.clone(),
                    capabilities: v.capabilities.clone(),
                })
                .collect(),
        }
    }
}

/// Receives the final graph.
///
/// Nodes are visited first, consumers before their dependencies, one call
/// per traversed variant. Edge batches follow, one per component in the
/// same order. `finish` is called last.
pub trait DependencyGraphVisitor {
    fn start(&mut self, _root: &GraphComponent) -> Result<(), ModgraphError> {
        Ok(())
    }

    fn visit_node(&mut self, component: &GraphComponent, variant: VariantId) -> Result<(), ModgraphError>;

    fn visit_edges(&mut self, from: &GraphComponent, edges: &[DependencyResult]) -> Result<(), ModgraphError>;

    /// `locking_failures` become extra edges of the root.
    fn finish(&mut self, root: &GraphComponent, locking_failures: &[DependencyResult]) -> Result<(), ModgraphError>;
}

/// Builds the in-memory [`ResolvedGraph`].
#[derive(Debug)]
pub struct ResolvedGraphCollector {
    builder: Option<ResolutionResultGraphBuilder>,
    graph: Option<ResolvedGraph>,
}

impl ResolvedGraphCollector {
    pub fn new() -> Self {
        Self {
            builder: Some(ResolutionResultGraphBuilder::new()),
            graph: None,
        }
    }

    pub fn into_graph(self) -> Result<ResolvedGraph, ModgraphError> {
        self.graph
            .ok_or_else(|| ModgraphError::Resolution {
                message: "graph collection never finished".into(),
            })
    }

    fn builder(&mut self) -> Result<&mut ResolutionResultGraphBuilder, ModgraphError> {
        self.builder.as_mut().ok_or_else(|| ModgraphError::Resolution {
            message: "graph collection already finished".into(),
        })
    }
}

impl Default for ResolvedGraphCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl DependencyGraphVisitor for ResolvedGraphCollector {
    fn visit_node(&mut self, component: &GraphComponent, variant: VariantId) -> Result<(), ModgraphError> {
        let selected = component.variant(variant).cloned().ok_or_else(|| ModgraphError::Resolution {
            message: format!("{} has no variant {variant}", component.component_id),
        })?;
        let builder = self.builder()?;
        builder.start_visit_component(component.result_id, &component.reason, component.repository.as_deref())?;
        builder.visit_component_details(&component.component_id, &component.module_version)?;
        builder.visit_selected_variant(&selected)?;
        if let Some(all) = component.available_variants() {
            builder.visit_component_variants(all)?;
        }
        builder.end_visit_component()
    }

    fn visit_edges(&mut self, from: &GraphComponent, edges: &[DependencyResult]) -> Result<(), ModgraphError> {
        self.builder()?.visit_dependencies(from.result_id, edges)
    }

    fn finish(&mut self, root: &GraphComponent, locking_failures: &[DependencyResult]) -> Result<(), ModgraphError> {
        let builder = self.builder.take().ok_or_else(|| ModgraphError::Resolution {
            message: "graph collection already finished".into(),
        })?;
        self.graph = Some(builder.complete(root.result_id, locking_failures.to_vec())?);
        Ok(())
    }
}

/// Forwards every callback to several visitors, in order.
pub struct CompositeGraphVisitor<'a> {
    visitors: Vec<&'a mut dyn DependencyGraphVisitor>,
}

impl<'a> CompositeGraphVisitor<'a> {
    pub fn new(visitors: Vec<&'a mut dyn DependencyGraphVisitor>) -> Self {
        Self { visitors }
    }
}

impl DependencyGraphVisitor for CompositeGraphVisitor<'_> {
    fn start(&mut self, root: &GraphComponent) -> Result<(), ModgraphError> {
        self.visitors.iter_mut().try_for_each(|v| v.start(root))
    }

    fn visit_node(&mut self, component: &GraphComponent, variant: VariantId) -> Result<(), ModgraphError> {
        self.visitors.iter_mut().try_for_each(|v| v.visit_node(component, variant))
    }

    fn visit_edges(&mut self, from: &GraphComponent, edges: &[DependencyResult]) -> Result<(), ModgraphError> {
        self.visitors.iter_mut().try_for_each(|v| v.visit_edges(from, edges))
    }

    fn finish(&mut self, root: &GraphComponent, locking_failures: &[DependencyResult]) -> Result<(), ModgraphError> {
        self.visitors.iter_mut().try_for_each(|v| v.finish(root, locking_failures))
    }
}
