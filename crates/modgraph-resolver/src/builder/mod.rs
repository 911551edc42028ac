//! Graph traversal: turns declared dependencies into one selected
//! component per module.
//!
//! Nodes are visited breadth-first in discovery order. When the queue
//! drains, pending module conflicts are settled one at a time, then
//! capability conflicts, and traversal resumes with whatever the new
//! selections pull in. A losing candidate keeps its arena slot and cached
//! metadata, so selecting it again later costs no provider calls.

mod state;
mod substitutions;
mod visitor;

pub use substitutions::{DependencySubstitutions, SubstitutedSelector};
pub use visitor::{CompositeGraphVisitor, DependencyGraphVisitor, GraphComponent, ResolvedGraphCollector};

use modgraph_core::config::ResolutionConfig;
use modgraph_core::identity::{Capability, ComponentId, ComponentSelector, ModuleIdentity, ModuleVersionId};
use modgraph_core::lockfile::LockState;
use modgraph_core::metadata::{ComponentMetadata, DependencyMetadata};
use modgraph_core::reason::{ComponentSelectionReason, SelectionCause, SelectionDescriptor};
use modgraph_util::errors::ModgraphError;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use self::state::{
    intersect_pins, ComponentIdx, ComponentState, EdgeIdx, EdgeState, ModuleIdx, ModuleResolveState, NodeIdx,
    NodeState, Pins, VisitKey,
};
use crate::cache::{MetadataCache, MetadataLookup};
use crate::conflict::{
    CapabilityPreferences, ConflictOutcome, ConflictPolicy, ConflictReport, ConflictResolverDetails, ConflictSubject,
    VersionConflict,
};
use crate::failure::{FailureKind, ModuleResolveFailure};
use crate::filter::{ModuleExclusions, ModuleResolutionFilter};
use crate::provider::MetadataProvider;
use crate::result::{DependencyResult, ResolvedVariantResult, VariantId};
use crate::version::{default_comparator, VersionComparator, VersionSelector};

/// Dependency paths shown per conflict candidate.
const MAX_PATHS: usize = 8;

/// Selection changes a module may make before only upgrades are accepted.
const MAX_SELECTION_CHANGES: usize = 1000;

/// What a finished traversal reports besides the graph itself.
#[derive(Debug, Clone, Default)]
pub struct BuildOutcome {
    pub conflicts: ConflictReport,
    pub locking_failures: Vec<DependencyResult>,
    pub metadata_fetches: usize,
}

/// Single-use traversal state for one resolution.
pub struct DependencyGraphBuilder<'p> {
    cache: MetadataCache<'p>,
    substitutions: DependencySubstitutions,
    module_chain: ConflictPolicy,
    capability_chain: ConflictPolicy,
    exclusions: ModuleExclusions,
    global_filter: ModuleResolutionFilter,
    rejected: HashSet<ModuleVersionId>,
    comparator: Arc<dyn VersionComparator>,
    return_all_variants: bool,
    prefer_projects: bool,
    lock: Option<LockState>,

    modules: Vec<ModuleResolveState>,
    module_index: HashMap<ModuleIdentity, ModuleIdx>,
    components: Vec<ComponentState>,
    component_index: HashMap<ComponentId, ComponentIdx>,
    nodes: Vec<NodeState>,
    edges: Vec<EdgeState>,
    queue: VecDeque<NodeIdx>,
    conflicts: VecDeque<ModuleIdx>,
    root_module: ModuleIdx,
    next_variant_id: VariantId,
    /// Every decided conflict with its winner, filtered at emission.
    decisions: Vec<(ComponentIdx, VersionConflict)>,
}

impl<'p> DependencyGraphBuilder<'p> {
    /// Configuration errors, including malformed global excludes, fail here.
    pub fn new(provider: &'p dyn MetadataProvider, config: &ResolutionConfig) -> Result<Self, ModgraphError> {
        let mut exclusions = ModuleExclusions::new();
        let global_filter = exclusions.exclude_any(&config.exclude)?;
        Ok(Self {
            cache: MetadataCache::new(provider),
            substitutions: DependencySubstitutions::from_config(config)?,
            module_chain: ConflictPolicy::module_chain(config.conflict_strategy, config.prefer_projects),
            capability_chain: ConflictPolicy::capability_chain(CapabilityPreferences::new(
                config.capability_preferences()?,
            )),
            exclusions,
            global_filter,
            rejected: config.rejected_versions()?.into_iter().collect(),
            comparator: default_comparator(),
            return_all_variants: config.return_all_variants,
            prefer_projects: config.prefer_projects,
            lock: None,
            modules: Vec::new(),
            module_index: HashMap::new(),
            components: Vec::new(),
            component_index: HashMap::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
            queue: VecDeque::new(),
            conflicts: VecDeque::new(),
            root_module: 0,
            next_variant_id: 1,
            decisions: Vec::new(),
        })
    }

    /// Validate the result against a lock state once traversal finishes.
    pub fn with_lock(mut self, lock: LockState) -> Self {
        self.lock = Some(lock);
        self
    }

    /// Traverse from `root` and report the final graph to `visitor`.
    pub fn resolve(
        mut self,
        root: ComponentMetadata,
        visitor: &mut dyn DependencyGraphVisitor,
    ) -> Result<BuildOutcome, ModgraphError> {
        if root.variants.is_empty() {
            return Err(ModgraphError::Resolution {
                message: format!("Root component {} declares no variants", root.module_version),
            });
        }
        tracing::debug!("Resolving dependency graph of {}", root.module_version);
        let root_node = self.add_root(root);
        self.traverse()?;

        let (locking_failures, conflicts) = self.emit(root_node, visitor)?;
        tracing::debug!(
            "Resolved {} nodes, {} conflicts, {} metadata lookups",
            self.nodes.iter().filter(|n| n.is_active()).count(),
            conflicts.len(),
            self.cache.fetches()
        );
        Ok(BuildOutcome {
            conflicts,
            locking_failures,
            metadata_fetches: self.cache.fetches(),
        })
    }

    fn add_root(&mut self, root: ComponentMetadata) -> NodeIdx {
        let module = self.module_for(&root.module_version.module);
        self.root_module = module;
        let metadata = Arc::new(root);
        let component = self.add_component(
            module,
            metadata.id.clone(),
            metadata.module_version.clone(),
            MetadataLookup::Found(Arc::clone(&metadata)),
        );
        self.components[component].reason = ComponentSelectionReason::root();
        self.modules[module].selected = Some(component);
        self.modules[module].settled.insert(component);
        let node = self.node_for(component, 0);
        self.nodes[node].root = true;
        self.enqueue(node);
        node
    }

    fn traverse(&mut self) -> Result<(), ModgraphError> {
        loop {
            while let Some(node) = self.queue.pop_front() {
                self.nodes[node].queued = false;
                if self.nodes[node].is_active() {
                    self.visit_node(node)?;
                }
            }
            if let Some(module) = self.conflicts.pop_front() {
                self.resolve_module_conflict(module)?;
                continue;
            }
            if let Some((capability, providers)) = self.next_capability_conflict() {
                self.resolve_capability_conflict(capability, providers)?;
                continue;
            }
            return Ok(());
        }
    }

    // ----------------------------------------------------------------
    // Arena helpers
    // ----------------------------------------------------------------

    fn module_for(&mut self, id: &ModuleIdentity) -> ModuleIdx {
        if let Some(&idx) = self.module_index.get(id) {
            return idx;
        }
        let idx = self.modules.len();
        self.modules.push(ModuleResolveState::new(id.clone()));
        self.module_index.insert(id.clone(), idx);
        idx
    }

    fn add_component(
        &mut self,
        module: ModuleIdx,
        id: ComponentId,
        module_version: ModuleVersionId,
        lookup: MetadataLookup,
    ) -> ComponentIdx {
        let variant_count = match &lookup {
            MetadataLookup::Found(m) => m.variants.len(),
            _ => 0,
        };
        let variant_ids: Vec<VariantId> = (0..variant_count as u64).map(|i| self.next_variant_id + i).collect();
        self.next_variant_id += variant_count as u64;

        let idx = self.components.len();
        self.components.push(ComponentState {
            module,
            rejected: self.rejected.contains(&module_version),
            id: id.clone(),
            module_version,
            lookup,
            reason: ComponentSelectionReason::new(),
            variant_ids,
            nodes: vec![None; variant_count],
        });
        self.component_index.insert(id, idx);
        self.modules[module].components.push(idx);
        idx
    }

    fn module_component(&mut self, module: ModuleIdx, id: &ModuleVersionId) -> ComponentIdx {
        let key = ComponentId::Module(id.clone());
        if let Some(&idx) = self.component_index.get(&key) {
            return idx;
        }
        let lookup = self.cache.module(id);
        self.add_component(module, key, id.clone(), lookup)
    }

    fn node_for(&mut self, component: ComponentIdx, variant: usize) -> NodeIdx {
        if let Some(node) = self.components[component].nodes[variant] {
            return node;
        }
        let idx = self.nodes.len();
        self.nodes.push(NodeState {
            component,
            variant,
            root: false,
            incoming: Vec::new(),
            outgoing: Vec::new(),
            visited: None,
            queued: false,
        });
        self.components[component].nodes[variant] = Some(idx);
        idx
    }

    fn enqueue(&mut self, node: NodeIdx) {
        if !self.nodes[node].queued {
            self.nodes[node].queued = true;
            self.queue.push_back(node);
        }
    }

    fn root_component(&self) -> ComponentIdx {
        self.modules[self.root_module].selected.unwrap_or_default()
    }

    fn canonical_module(&self, mut module: ModuleIdx) -> ModuleIdx {
        while let Some(next) = self.modules[module].replaced_by {
            module = next;
        }
        module
    }

    // ----------------------------------------------------------------
    // Visiting nodes
    // ----------------------------------------------------------------

    fn visit_node(&mut self, node: NodeIdx) -> Result<(), ModgraphError> {
        let component = self.nodes[node].component;
        let MetadataLookup::Found(metadata) = &self.components[component].lookup else {
            return Ok(());
        };
        let metadata = Arc::clone(metadata);
        let variant = &metadata.variants[self.nodes[node].variant];

        let key = if self.nodes[node].root {
            let own = self.exclusions.exclude_any(&variant.excludes)?;
            VisitKey {
                filter: Some(self.exclusions.intersect(&self.global_filter, &own)),
                pins: Pins::new(),
            }
        } else {
            let mut filter: Option<ModuleResolutionFilter> = None;
            let mut pins: Option<Pins> = None;
            for &e in &self.nodes[node].incoming {
                if let Some((carried_filter, carried_pins)) = &self.edges[e].carried {
                    filter = Some(match filter {
                        None => carried_filter.clone(),
                        Some(acc) => self.exclusions.union(&acc, carried_filter),
                    });
                    pins = Some(match pins {
                        None => carried_pins.clone(),
                        Some(acc) => intersect_pins(acc, carried_pins),
                    });
                }
            }
            let filter = match filter {
                Some(f) if variant.transitive => {
                    let own = self.exclusions.exclude_any(&variant.excludes)?;
                    Some(self.exclusions.intersect(&f, &own))
                }
                _ => None,
            };
            VisitKey {
                filter,
                pins: pins.unwrap_or_default(),
            }
        };

        if let Some(previous) = &self.nodes[node].visited {
            if previous.same_as(&key) {
                return Ok(());
            }
        }
        tracing::debug!(
            "Visiting {} ({})",
            self.components[component].module_version,
            variant.name
        );

        let mut previous: BTreeMap<usize, EdgeIdx> = self
            .nodes[node]
            .outgoing
            .iter()
            .map(|&e| (self.edges[e].dep_index, e))
            .collect();
        let mut outgoing = Vec::new();
        let mut touched = VecDeque::new();

        if let Some(filter) = &key.filter {
            let mut carried_pins = key.pins.clone();
            for dep in variant.dependencies.iter().filter(|d| d.strict) {
                if let ComponentSelector::Module { module, version } = &dep.selector {
                    carried_pins.entry(module.clone()).or_insert_with(|| version.clone());
                }
            }
            for (index, dep) in variant.dependencies.iter().enumerate() {
                let substituted = self.substitutions.apply(&dep.selector, &key.pins);
                let carried = if dep.transitive {
                    let own = self.exclusions.exclude_any(&dep.excludes)?;
                    Some((self.exclusions.intersect(filter, &own), carried_pins.clone()))
                } else {
                    None
                };

                if let Some(existing) = previous.remove(&index) {
                    if self.edges[existing].selector == substituted.selector
                        && self.edge_target_accepted(existing, filter)
                    {
                        self.edges[existing].carried = carried;
                        if let Some(target) = self.edges[existing].target_node {
                            self.enqueue(target);
                        }
                        outgoing.push(existing);
                        continue;
                    }
                    previous.insert(index, existing);
                }

                if let Some(edge) = self.create_edge(node, index, dep, substituted, filter, carried) {
                    if let Some(module) = self.edges[edge].module {
                        touched.push_back(module);
                    }
                    outgoing.push(edge);
                }
            }
        }

        self.nodes[node].outgoing = outgoing;
        self.nodes[node].visited = Some(key);
        self.settle(&mut touched);
        for (_, stale) in previous {
            self.remove_edge(stale, &mut touched);
        }
        self.settle(&mut touched);
        Ok(())
    }

    fn edge_target_accepted(&self, edge: EdgeIdx, filter: &ModuleResolutionFilter) -> bool {
        match self.edges[edge].module {
            Some(module) => filter.accepts(&self.modules[module].id),
            None => true,
        }
    }

    fn create_edge(
        &mut self,
        from: NodeIdx,
        dep_index: usize,
        dep: &DependencyMetadata,
        substituted: SubstitutedSelector,
        filter: &ModuleResolutionFilter,
        carried: Option<(ModuleResolutionFilter, Pins)>,
    ) -> Option<EdgeIdx> {
        let mut causes = vec![match (&dep.reason, dep.constraint) {
            (_, true) => SelectionDescriptor::new(SelectionCause::Constraint),
            (Some(reason), false) => SelectionDescriptor::with_description(SelectionCause::Requested, reason.clone()),
            (None, false) => SelectionDescriptor::new(SelectionCause::Requested),
        }];
        if dep.force {
            causes.push(SelectionDescriptor::new(SelectionCause::Forced));
        }
        causes.extend(substituted.causes.iter().cloned());

        let target: Result<(ModuleIdx, ComponentIdx), (Option<ModuleIdx>, ModuleResolveFailure)> =
            match &substituted.selector {
                ComponentSelector::Module { module, version } => {
                    if !filter.accepts(module) {
                        tracing::debug!("{} is excluded from {}", substituted.selector, self.describe_node(from));
                        return None;
                    }
                    let module_idx = self.module_for(module);
                    if module_idx == self.root_module {
                        let root = self.root_component();
                        let selector = substituted.selector.clone();
                        return self.push_edge(from, dep_index, dep, selector, Ok((module_idx, root)), causes, carried);
                    }
                    match self.select_version(module_idx, &substituted.selector, module, version) {
                        Ok((component, extra)) => {
                            causes.extend(extra);
                            Ok((module_idx, component))
                        }
                        Err(failure) => Err((Some(module_idx), failure)),
                    }
                }
                ComponentSelector::Project { path, .. } => match self.cache.project(path) {
                    MetadataLookup::Found(metadata) => {
                        let module = metadata.module_version.module.clone();
                        if !filter.accepts(&module) {
                            tracing::debug!("{} is excluded from {}", substituted.selector, self.describe_node(from));
                            return None;
                        }
                        let module_idx = self.module_for(&module);
                        let component = match self.component_index.get(&metadata.id) {
                            Some(&idx) => idx,
                            None => self.add_component(
                                module_idx,
                                metadata.id.clone(),
                                metadata.module_version.clone(),
                                MetadataLookup::Found(Arc::clone(&metadata)),
                            ),
                        };
                        Ok((module_idx, component))
                    }
                    MetadataLookup::Missing => Err((
                        None,
                        ModuleResolveFailure::new(
                            substituted.selector.clone(),
                            FailureKind::NotFound,
                            format!("Project '{path}' not found."),
                        ),
                    )),
                    MetadataLookup::Failed(chain) => Err((None, {
                        let mut failure = ModuleResolveFailure::new(
                            substituted.selector.clone(),
                            FailureKind::MetadataError,
                            format!("Could not resolve {}.", substituted.selector),
                        );
                        failure.causes = chain;
                        failure
                    })),
                },
            };

        self.push_edge(from, dep_index, dep, substituted.selector, target, causes, carried)
    }

    #[allow(clippy::too_many_arguments)]
    fn push_edge(
        &mut self,
        from: NodeIdx,
        dep_index: usize,
        dep: &DependencyMetadata,
        selector: ComponentSelector,
        target: Result<(ModuleIdx, ComponentIdx), (Option<ModuleIdx>, ModuleResolveFailure)>,
        causes: Vec<SelectionDescriptor>,
        carried: Option<(ModuleResolutionFilter, Pins)>,
    ) -> Option<EdgeIdx> {
        let edge = self.edges.len();
        let (module, candidate, selection_failure) = match target {
            Ok((module, component)) => {
                let module = self.canonical_module(module);
                let candidate = match self.modules[module].selected {
                    Some(selected) if self.components[component].module != module => selected,
                    _ => component,
                };
                for cause in causes {
                    self.components[candidate].reason.add(cause);
                }
                (Some(module), Some(candidate), None)
            }
            Err((module, failure)) => {
                tracing::debug!("Unresolved {}: {}", selector, failure.message);
                (module, None, Some(failure))
            }
        };
        self.edges.push(EdgeState {
            from,
            dep_index,
            dependency: dep.clone(),
            selector,
            module,
            candidate,
            selection_failure,
            attach_failure: None,
            target_node: None,
            carried,
            live: true,
        });
        if let Some(module) = module {
            self.modules[module].edges.push(edge);
        }
        Some(edge)
    }

    /// Pick the candidate component a module selector asks for.
    fn select_version(
        &mut self,
        module_idx: ModuleIdx,
        selector: &ComponentSelector,
        module: &ModuleIdentity,
        requested: &str,
    ) -> Result<(ComponentIdx, Vec<SelectionDescriptor>), ModuleResolveFailure> {
        let version_selector = VersionSelector::parse(requested);
        if !version_selector.is_dynamic() {
            let id = ModuleVersionId {
                module: module.clone(),
                version: requested.to_string(),
            };
            return Ok((self.module_component(module_idx, &id), Vec::new()));
        }

        let versions = self.cache.versions(module).map_err(|chain| {
            let mut failure = ModuleResolveFailure::new(
                selector.clone(),
                FailureKind::MetadataError,
                format!("Could not list versions of {module}."),
            );
            failure.causes = chain;
            failure
        })?;

        let mut best: Option<&String> = None;
        let mut skipped = Vec::new();
        for version in versions.iter() {
            let id = ModuleVersionId {
                module: module.clone(),
                version: version.clone(),
            };
            let status = if version_selector.requires_status() {
                match self.cache.module(&id) {
                    MetadataLookup::Found(m) => Some(m.status.clone()),
                    _ => None,
                }
            } else {
                None
            };
            if !version_selector.accepts(version, status.as_deref()) {
                continue;
            }
            if self.rejected.contains(&id) {
                skipped.push(version.clone());
                continue;
            }
            if best.map_or(true, |b| self.comparator.compare(version, b) == Ordering::Greater) {
                best = Some(version);
            }
        }

        let Some(best) = best else {
            let message = if skipped.is_empty() {
                format!("Could not find any version that matches {selector}.")
            } else {
                format!(
                    "Every version of {module} matching {requested} is rejected: {}",
                    skipped.join(", ")
                )
            };
            return Err(ModuleResolveFailure::new(
                selector.clone(),
                FailureKind::NoMatchingVersion,
                message,
            ));
        };
        let id = ModuleVersionId {
            module: module.clone(),
            version: best.clone(),
        };
        let mut causes = Vec::new();
        if !skipped.is_empty() {
            causes.push(SelectionDescriptor::with_description(
                SelectionCause::Rejection,
                format!("rejected {}", skipped.join(", ")),
            ));
        }
        Ok((self.module_component(module_idx, &id), causes))
    }

    // ----------------------------------------------------------------
    // Selection
    // ----------------------------------------------------------------

    fn settle(&mut self, touched: &mut VecDeque<ModuleIdx>) {
        while let Some(module) = touched.pop_front() {
            self.reevaluate(module, touched);
        }
    }

    /// Distinct candidates of live edges, in discovery order. Rejected
    /// candidates only count when nothing else is left.
    fn candidates(&self, module: ModuleIdx) -> Vec<ComponentIdx> {
        let all: BTreeSet<ComponentIdx> = self.modules[module]
            .edges
            .iter()
            .filter(|&&e| self.edges[e].live)
            .filter_map(|&e| self.edges[e].candidate)
            .collect();
        let accepted: Vec<ComponentIdx> = all.iter().copied().filter(|&c| !self.components[c].rejected).collect();
        if accepted.is_empty() {
            all.into_iter().collect()
        } else {
            accepted
        }
    }

    fn has_hard_edges(&self, module: ModuleIdx) -> bool {
        self.modules[module]
            .edges
            .iter()
            .any(|&e| self.edges[e].is_attachable())
    }

    fn reevaluate(&mut self, module: ModuleIdx, touched: &mut VecDeque<ModuleIdx>) {
        if module == self.root_module {
            self.attach_pending(module);
            return;
        }
        if self.modules[module].replaced_by.is_some() {
            return;
        }
        if !self.has_hard_edges(module) {
            if let Some(selected) = self.modules[module].selected.take() {
                tracing::debug!("Deselecting {}", self.components[selected].module_version);
                self.modules[module].settled.clear();
                self.deselect_component(selected, touched);
            }
            return;
        }
        let candidates = self.candidates(module);
        let state = &self.modules[module];
        if let Some(selected) = state.selected {
            let kept = candidates.contains(&selected) || state.selection_changes > MAX_SELECTION_CHANGES;
            if kept && candidates.iter().all(|c| state.settled.contains(c)) {
                self.attach_pending(module);
                return;
            }
        }
        if candidates.len() == 1 {
            self.select(module, candidates[0], &candidates, touched);
        } else if !self.modules[module].conflict_queued {
            tracing::debug!(
                "Found conflict on {} between {}",
                self.modules[module].id,
                self.describe_candidates(&candidates)
            );
            self.modules[module].conflict_queued = true;
            self.conflicts.push_back(module);
        }
    }

    fn select(
        &mut self,
        module: ModuleIdx,
        component: ComponentIdx,
        candidates: &[ComponentIdx],
        touched: &mut VecDeque<ModuleIdx>,
    ) {
        let previous = self.modules[module].selected;
        if let Some(current) = previous.filter(|&c| c != component) {
            if self.skip_selection_change(module, current, component) {
                self.modules[module].settled.extend(candidates.iter().copied());
                self.attach_pending(module);
                return;
            }
        }
        self.modules[module].settled = candidates.iter().copied().collect();
        if previous != Some(component) {
            if let Some(old) = previous {
                self.deselect_component(old, touched);
            }
            tracing::debug!("Selected {}", self.components[component].module_version);
            self.modules[module].selected = Some(component);
        }
        self.attach_pending(module);
    }

    /// Count a selection change. Once a module has changed too often to
    /// settle, only upgrades are let through and the highest version stays.
    fn skip_selection_change(&mut self, module: ModuleIdx, current: ComponentIdx, next: ComponentIdx) -> bool {
        let state = &mut self.modules[module];
        state.selection_changes += 1;
        if state.selection_changes <= MAX_SELECTION_CHANGES {
            return false;
        }
        if state.selection_changes == MAX_SELECTION_CHANGES + 1 {
            tracing::warn!(
                "Selection of {} did not stabilize after {MAX_SELECTION_CHANGES} changes; keeping the highest version",
                state.id
            );
        }
        if self.prefer_projects && self.components[next].id.is_project() {
            return false;
        }
        let next_version = &self.components[next].module_version.version;
        let current_version = &self.components[current].module_version.version;
        self.comparator.compare(next_version, current_version) != Ordering::Greater
    }

    fn attach_pending(&mut self, module: ModuleIdx) {
        let Some(selected) = self.modules[module].selected else {
            return;
        };
        let pending: Vec<EdgeIdx> = self.modules[module]
            .edges
            .iter()
            .copied()
            .filter(|&e| {
                let edge = &self.edges[e];
                edge.is_attachable() && edge.target_node.is_none() && edge.attach_failure.is_none()
            })
            .collect();
        for edge in pending {
            self.attach_edge(edge, selected);
        }
    }

    fn attach_edge(&mut self, edge: EdgeIdx, component: ComponentIdx) {
        match self.variant_for(edge, component) {
            Ok(variant) => {
                let node = self.node_for(component, variant);
                self.nodes[node].incoming.push(edge);
                self.edges[edge].target_node = Some(node);
                self.enqueue(node);
            }
            Err(failure) => {
                tracing::debug!("Unresolved {}: {}", self.edges[edge].selector, failure.message);
                self.edges[edge].attach_failure = Some(failure);
            }
        }
    }

    fn variant_for(&self, edge: EdgeIdx, component: ComponentIdx) -> Result<usize, ModuleResolveFailure> {
        let state = &self.components[component];
        let dep = &self.edges[edge].dependency;
        let selector = self.edges[edge].selector.clone();
        let id = &state.module_version;
        if state.rejected {
            return Err(ModuleResolveFailure::new(
                selector,
                FailureKind::Rejected,
                format!("Module '{id}' has been rejected."),
            ));
        }
        let metadata = match &state.lookup {
            MetadataLookup::Found(m) => m,
            MetadataLookup::Missing => {
                return Err(ModuleResolveFailure::new(
                    selector,
                    FailureKind::NotFound,
                    format!("Could not find {id}."),
                ))
            }
            MetadataLookup::Failed(chain) => {
                let mut failure = ModuleResolveFailure::new(
                    selector,
                    FailureKind::MetadataError,
                    format!("Could not resolve {id}."),
                );
                failure.causes = chain.clone();
                return Err(failure);
            }
        };
        if let Some(name) = &dep.requested_variant {
            return metadata.variants.iter().position(|v| &v.name == name).ok_or_else(|| {
                ModuleResolveFailure::new(
                    selector,
                    FailureKind::NoMatchingVariant,
                    format!("No variant named '{name}' in {id}."),
                )
            });
        }
        if !dep.requested_attributes.is_empty() {
            let matching: Vec<usize> = metadata
                .variants
                .iter()
                .enumerate()
                .filter(|(_, v)| v.attributes.satisfies(&dep.requested_attributes))
                .map(|(i, _)| i)
                .collect();
            return match matching.as_slice() {
                [] => Err(ModuleResolveFailure::new(
                    selector,
                    FailureKind::NoMatchingVariant,
                    format!("No variant of {id} matches {}.", dep.requested_attributes),
                )),
                [single] => Ok(*single),
                many => {
                    let names: Vec<&str> = many.iter().map(|&i| metadata.variants[i].name.as_str()).collect();
                    Err(ModuleResolveFailure::new(
                        selector,
                        FailureKind::AmbiguousVariant,
                        format!(
                            "Several variants of {id} match {}: {}",
                            dep.requested_attributes,
                            names.join(", ")
                        ),
                    ))
                }
            };
        }
        if metadata.variants.is_empty() {
            return Err(ModuleResolveFailure::new(
                selector,
                FailureKind::NoMatchingVariant,
                format!("{id} declares no variants."),
            ));
        }
        Ok(0)
    }

    fn deselect_component(&mut self, component: ComponentIdx, touched: &mut VecDeque<ModuleIdx>) {
        let module = self.components[component].module;
        let module_edges = self.modules[module].edges.clone();
        for e in module_edges {
            self.edges[e].attach_failure = None;
        }
        let nodes: Vec<NodeIdx> = self.components[component].live_nodes().collect();
        for node in nodes {
            if self.nodes[node].root {
                continue;
            }
            for e in std::mem::take(&mut self.nodes[node].incoming) {
                self.edges[e].target_node = None;
            }
            self.deactivate(node, touched);
        }
    }

    fn deactivate(&mut self, node: NodeIdx, touched: &mut VecDeque<ModuleIdx>) {
        self.nodes[node].visited = None;
        for e in std::mem::take(&mut self.nodes[node].outgoing) {
            self.remove_edge(e, touched);
        }
    }

    fn remove_edge(&mut self, edge: EdgeIdx, touched: &mut VecDeque<ModuleIdx>) {
        self.edges[edge].live = false;
        if let Some(node) = self.edges[edge].target_node.take() {
            self.nodes[node].incoming.retain(|&e| e != edge);
            if self.nodes[node].is_active() {
                self.enqueue(node);
            } else {
                self.deactivate(node, touched);
            }
        }
        if let Some(module) = self.edges[edge].module {
            self.modules[module].edges.retain(|&e| e != edge);
            touched.push_back(module);
        }
    }

    // ----------------------------------------------------------------
    // Conflicts
    // ----------------------------------------------------------------

    fn resolve_module_conflict(&mut self, module: ModuleIdx) -> Result<(), ModgraphError> {
        self.modules[module].conflict_queued = false;
        let mut touched = VecDeque::new();
        if self.modules[module].replaced_by.is_some() || !self.has_hard_edges(module) {
            touched.push_back(module);
            self.settle(&mut touched);
            return Ok(());
        }
        let candidates = self.candidates(module);
        if candidates.len() < 2 {
            touched.push_back(module);
            self.settle(&mut touched);
            return Ok(());
        }

        let subject = ConflictSubject::Module(self.modules[module].id.clone());
        let outcome = {
            let states: Vec<&ComponentState> = candidates.iter().map(|&c| &self.components[c]).collect();
            let mut details = ConflictResolverDetails::new(subject.clone(), states);
            self.module_chain.resolve(&mut details);
            details.into_outcome()
        };
        let winner = self.apply_outcome(&subject, &candidates, outcome)?;
        self.select(module, winner, &candidates, &mut touched);
        self.settle(&mut touched);
        Ok(())
    }

    /// The first capability, in identity order, provided by several modules.
    fn next_capability_conflict(&self) -> Option<(ModuleIdentity, Vec<ModuleIdx>)> {
        let mut providers: BTreeMap<ModuleIdentity, Vec<ModuleIdx>> = BTreeMap::new();
        for (module_idx, module) in self.modules.iter().enumerate() {
            if module.replaced_by.is_some() {
                continue;
            }
            let Some(selected) = module.selected else {
                continue;
            };
            let component = &self.components[selected];
            let Some(metadata) = component.found() else {
                continue;
            };
            let mut capabilities: BTreeSet<ModuleIdentity> = BTreeSet::new();
            for node in component.live_nodes() {
                if !self.nodes[node].is_active() {
                    continue;
                }
                let variant = &metadata.variants[self.nodes[node].variant];
                capabilities.extend(
                    variant
                        .effective_capabilities(&component.module_version)
                        .iter()
                        .map(Capability::id),
                );
            }
            for capability in capabilities {
                providers.entry(capability).or_default().push(module_idx);
            }
        }
        providers.into_iter().find(|(_, modules)| modules.len() > 1)
    }

    fn resolve_capability_conflict(
        &mut self,
        capability: ModuleIdentity,
        providers: Vec<ModuleIdx>,
    ) -> Result<(), ModgraphError> {
        tracing::debug!("Found conflict on capability {capability}");
        let candidates: Vec<ComponentIdx> = providers
            .iter()
            .filter_map(|&m| self.modules[m].selected)
            .collect();
        let subject = ConflictSubject::Capability(capability);
        let outcome = {
            let states: Vec<&ComponentState> = candidates.iter().map(|&c| &self.components[c]).collect();
            let mut details = ConflictResolverDetails::new(subject.clone(), states);
            self.capability_chain.resolve(&mut details);
            details.into_outcome()
        };
        let winner = self.apply_outcome(&subject, &candidates, outcome)?;
        let winner_module = self.components[winner].module;

        let mut touched = VecDeque::new();
        for &loser in &candidates {
            let loser_module = self.components[loser].module;
            if loser_module != winner_module {
                self.replace_module(loser_module, winner_module, &mut touched);
            }
        }
        touched.push_back(winner_module);
        self.settle(&mut touched);
        Ok(())
    }

    fn replace_module(&mut self, loser: ModuleIdx, winner: ModuleIdx, touched: &mut VecDeque<ModuleIdx>) {
        tracing::debug!("Replacing {} with {}", self.modules[loser].id, self.modules[winner].id);
        self.modules[loser].replaced_by = Some(winner);
        if let Some(selected) = self.modules[loser].selected.take() {
            self.deselect_component(selected, touched);
        }
        let winner_selected = self.modules[winner].selected;
        for e in std::mem::take(&mut self.modules[loser].edges) {
            self.edges[e].module = Some(winner);
            if self.edges[e].candidate.is_some() {
                self.edges[e].candidate = winner_selected.or(self.edges[e].candidate);
            }
            self.modules[winner].edges.push(e);
        }
    }

    /// Record a settled conflict, or turn a failed one into an error.
    fn apply_outcome(
        &mut self,
        subject: &ConflictSubject,
        candidates: &[ComponentIdx],
        outcome: Option<ConflictOutcome>,
    ) -> Result<ComponentIdx, ModgraphError> {
        match outcome {
            Some(ConflictOutcome::Selected { index, causes }) => {
                let winner = candidates[index];
                for cause in causes {
                    self.components[winner].reason.add(cause);
                }
                let (module, selected) = match subject {
                    ConflictSubject::Module(m) | ConflictSubject::Capability(m) => {
                        (m.clone(), self.components[winner].module_version.to_string())
                    }
                };
                tracing::debug!("Conflict on {subject} resolved to {selected}");
                let conflict = VersionConflict {
                    module,
                    candidates: candidates
                        .iter()
                        .map(|&c| match subject {
                            ConflictSubject::Module(_) => self.components[c].module_version.version.clone(),
                            ConflictSubject::Capability(_) => self.components[c].module_version.to_string(),
                        })
                        .collect(),
                    selected: match subject {
                        ConflictSubject::Module(_) => self.components[winner].module_version.version.clone(),
                        ConflictSubject::Capability(_) => selected,
                    },
                    reason: self.components[winner].reason.to_string(),
                };
                self.decisions
                    .retain(|(_, c)| !(c.module == conflict.module && c.candidates == conflict.candidates));
                self.decisions.push((winner, conflict));
                Ok(winner)
            }
            Some(ConflictOutcome::Failed(message)) => {
                let mut rendered = message;
                for &candidate in candidates {
                    rendered.push_str(&format!("\n  {}", self.components[candidate].module_version));
                    for path in self.dependency_paths(candidate) {
                        rendered.push_str(&format!("\n    {path}"));
                    }
                }
                tracing::warn!("Conflict on {subject} could not be resolved");
                Err(ModgraphError::Conflict {
                    module: subject.to_string(),
                    message: rendered,
                })
            }
            None => Err(ModgraphError::Resolution {
                message: format!("Conflict on {subject} was left unresolved"),
            }),
        }
    }

    /// Paths from the root to `component`, following live edges back
    /// through their sources. Each path visits a component at most once.
    fn dependency_paths(&self, component: ComponentIdx) -> Vec<String> {
        let mut dependents: HashMap<ComponentIdx, Vec<ComponentIdx>> = HashMap::new();
        for edge in self.edges.iter().filter(|e| e.live) {
            let Some(candidate) = edge.candidate else {
                continue;
            };
            let source = self.nodes[edge.from].component;
            let entry = dependents.entry(candidate).or_default();
            if !entry.contains(&source) {
                entry.push(source);
            }
        }

        let mut paths = Vec::new();
        let mut stack = vec![vec![component]];
        while let Some(path) = stack.pop() {
            if paths.len() >= MAX_PATHS {
                break;
            }
            let Some(&head) = path.last() else {
                continue;
            };
            if self.components[head].module == self.root_module {
                let rendered: Vec<String> = path
                    .iter()
                    .rev()
                    .map(|&c| self.components[c].module_version.to_string())
                    .collect();
                paths.push(rendered.join(" --> "));
                continue;
            }
            for &source in dependents.get(&head).into_iter().flatten().rev() {
                if !path.contains(&source) {
                    let mut longer = path.clone();
                    longer.push(source);
                    stack.push(longer);
                }
            }
        }
        paths
    }

    fn describe_candidates(&self, candidates: &[ComponentIdx]) -> String {
        candidates
            .iter()
            .map(|&c| self.components[c].module_version.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn describe_node(&self, node: NodeIdx) -> String {
        self.components[self.nodes[node].component].module_version.to_string()
    }

    // ----------------------------------------------------------------
    // Reporting the final graph
    // ----------------------------------------------------------------

    fn emit(
        &self,
        root: NodeIdx,
        visitor: &mut dyn DependencyGraphVisitor,
    ) -> Result<(Vec<DependencyResult>, ConflictReport), ModgraphError> {
        let mut node_order = vec![root];
        let mut seen: HashSet<NodeIdx> = HashSet::from([root]);
        let mut cursor = 0;
        while cursor < node_order.len() {
            let node = node_order[cursor];
            cursor += 1;
            for &e in &self.nodes[node].outgoing {
                if let Some(target) = self.edges[e].target_node {
                    if seen.insert(target) {
                        node_order.push(target);
                    }
                }
            }
        }

        let mut component_order: Vec<ComponentIdx> = Vec::new();
        for &node in &node_order {
            let component = self.nodes[node].component;
            if !component_order.contains(&component) {
                component_order.push(component);
            }
        }
        let included: HashSet<ComponentIdx> = component_order.iter().copied().collect();
        let graph_components: HashMap<ComponentIdx, GraphComponent> = component_order
            .iter()
            .map(|&c| (c, self.graph_component(c)))
            .collect();

        let root_component = &graph_components[&self.nodes[root].component];
        visitor.start(root_component)?;
        for &node in &node_order {
            let state = &self.nodes[node];
            let component = &self.components[state.component];
            visitor.visit_node(&graph_components[&state.component], component.variant_ids[state.variant])?;
        }
        for &component in &component_order {
            let mut results = Vec::new();
            for node in self.components[component].live_nodes() {
                if !seen.contains(&node) {
                    continue;
                }
                let from_variant = self.components[component].variant_ids[self.nodes[node].variant];
                for &e in &self.nodes[node].outgoing {
                    if let Some(result) = self.dependency_result(e, from_variant, &included) {
                        results.push(result);
                    }
                }
            }
            visitor.visit_edges(&graph_components[&component], &results)?;
        }

        let locking_failures = self.locking_failures(&component_order);
        visitor.finish(root_component, &locking_failures)?;
        Ok((locking_failures, self.conflict_report(&included)))
    }

    /// Conflicts whose winner made it into the final graph. A decision
    /// undone by later churn is dropped with its winner.
    fn conflict_report(&self, included: &HashSet<ComponentIdx>) -> ConflictReport {
        let mut report = ConflictReport::new();
        for (winner, conflict) in &self.decisions {
            if included.contains(winner) {
                report.add(conflict.clone());
            } else {
                tracing::debug!("Dropping conflict on {} decided for {}", conflict.module, conflict.selected);
            }
        }
        report
    }

    fn graph_component(&self, component: ComponentIdx) -> GraphComponent {
        let state = &self.components[component];
        let (repository, adhoc, variants) = match state.found() {
            Some(metadata) => (
                metadata.repository.clone(),
                metadata.adhoc,
                metadata
                    .variants
                    .iter()
                    .zip(&state.variant_ids)
                    .map(|(v, &id)| ResolvedVariantResult {
                        id,
                        owner: state.id.clone(),
                        name: v.name.clone(),
                        attributes: v.attributes.clone(),
                        capabilities: v.effective_capabilities(&state.module_version),
                    })
                    .collect(),
            ),
            None => (None, false, Vec::new()),
        };
        GraphComponent {
            result_id: component as u64 + 1,
            component_id: state.id.clone(),
            module_version: state.module_version.clone(),
            reason: state.reason.clone(),
            repository,
            adhoc,
            variants,
            include_available: self.return_all_variants,
        }
    }

    fn dependency_result(
        &self,
        edge: EdgeIdx,
        from_variant: VariantId,
        included: &HashSet<ComponentIdx>,
    ) -> Option<DependencyResult> {
        let state = &self.edges[edge];
        let requested = state.dependency.selector.clone();
        let constraint = state.is_constraint();
        if let Some(failure) = state.failure() {
            return Some(DependencyResult::Unresolved {
                requested,
                from_variant: Some(from_variant),
                failure: failure.clone(),
                constraint,
            });
        }
        if constraint {
            // Constraints only show up once something else pulled the module in.
            let selected = state.module.and_then(|m| self.modules[m].selected)?;
            if !included.contains(&selected) {
                return None;
            }
            return Some(DependencyResult::Resolved {
                requested,
                from_variant: Some(from_variant),
                selected: selected as u64 + 1,
                selected_variant: None,
                constraint: true,
            });
        }
        match state.target_node {
            Some(node) => {
                let target = &self.nodes[node];
                Some(DependencyResult::Resolved {
                    requested,
                    from_variant: Some(from_variant),
                    selected: target.component as u64 + 1,
                    selected_variant: Some(self.components[target.component].variant_ids[target.variant]),
                    constraint: false,
                })
            }
            None => Some(DependencyResult::Unresolved {
                requested: requested.clone(),
                from_variant: Some(from_variant),
                failure: ModuleResolveFailure::new(
                    state.selector.clone(),
                    FailureKind::NoMatchingVersion,
                    format!("Could not resolve {}.", state.selector),
                ),
                constraint: false,
            }),
        }
    }

    fn locking_failures(&self, included: &[ComponentIdx]) -> Vec<DependencyResult> {
        let Some(lock) = &self.lock else {
            return Vec::new();
        };
        let resolved: Vec<&ModuleVersionId> = included
            .iter()
            .skip(1)
            .filter(|&&c| !self.components[c].id.is_project())
            .map(|&c| &self.components[c].module_version)
            .collect();

        let mut failures = Vec::new();
        for locked in &lock.module {
            let id = locked.id();
            if !resolved.contains(&&id) {
                failures.push(lock_failure(
                    locked.selector(),
                    format!("Did not resolve '{id}' which is part of the dependency lock state"),
                ));
            }
        }
        for id in resolved {
            if lock.locked_version(&id.module) != Some(id.version.as_str()) {
                failures.push(lock_failure(
                    ComponentSelector::module(id.group(), id.name(), id.version.clone()),
                    format!("Resolved '{id}' which is not part of the dependency lock state"),
                ));
            }
        }
        if !failures.is_empty() {
            tracing::debug!("Dependency lock state is out of date: {} mismatches", failures.len());
        }
        failures
    }
}

fn lock_failure(selector: ComponentSelector, message: String) -> DependencyResult {
    DependencyResult::Unresolved {
        requested: selector.clone(),
        from_variant: None,
        failure: ModuleResolveFailure::new(selector, FailureKind::LockOutOfDate, message),
        constraint: false,
    }
}
