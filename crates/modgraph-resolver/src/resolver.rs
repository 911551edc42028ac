//! Resolution entry point: runs the graph builder once and hands back both
//! the assembled graph and its serialized stream.

use std::sync::Arc;

use modgraph_core::config::{ResolutionConfig, SerializationMode};
use modgraph_core::lockfile::LockState;
use modgraph_core::metadata::ComponentMetadata;

use crate::builder::{CompositeGraphVisitor, DependencyGraphBuilder, DependencyGraphVisitor, ResolvedGraphCollector};
use crate::conflict::ConflictReport;
use crate::failure::ModuleResolveFailure;
use crate::provider::MetadataProvider;
use crate::result::{DependencyResult, ResolvedComponentResult, ResolvedGraph};
use crate::serial::{BinaryStore, BuildTreeRegistry, StreamingResolutionResult, StreamingResolutionResultBuilder};

/// The output of one resolution.
#[derive(Debug)]
pub struct ResolverResults {
    pub graph: ResolvedGraph,
    pub stream: StreamingResolutionResult,
    pub conflicts: ConflictReport,
    /// Lock mismatches; also attached to the root of `graph`.
    pub locking_failures: Vec<DependencyResult>,
    pub metadata_fetches: usize,
}

impl ResolverResults {
    /// Every failed edge in the graph, locking failures included.
    pub fn failures(&self) -> Vec<(&ResolvedComponentResult, &ModuleResolveFailure)> {
        self.graph.unresolved()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures().is_empty()
    }
}

/// Resolves a root component against a metadata provider.
pub struct DependencyResolver<'p> {
    provider: &'p dyn MetadataProvider,
    config: ResolutionConfig,
    lock: Option<LockState>,
    registry: Option<Arc<BuildTreeRegistry>>,
    spill_to_disk: bool,
}

impl<'p> DependencyResolver<'p> {
    pub fn new(provider: &'p dyn MetadataProvider, config: ResolutionConfig) -> Self {
        Self {
            provider,
            config,
            lock: None,
            registry: None,
            spill_to_disk: false,
        }
    }

    /// Check the result against a dependency lock state.
    pub fn with_lock(mut self, lock: LockState) -> Self {
        self.lock = Some(lock);
        self
    }

    /// Share component state with other resolutions of the same build tree.
    pub fn with_registry(mut self, registry: Arc<BuildTreeRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Write the result stream to a temporary file instead of memory.
    pub fn spill_to_disk(mut self, enabled: bool) -> Self {
        self.spill_to_disk = enabled;
        self
    }

    pub fn config(&self) -> &ResolutionConfig {
        &self.config
    }

    pub fn resolve(&self, root: &ComponentMetadata) -> miette::Result<ResolverResults> {
        let mut builder = DependencyGraphBuilder::new(self.provider, &self.config)?;
        if let Some(lock) = &self.lock {
            builder = builder.with_lock(lock.clone());
        }

        let store = if self.spill_to_disk {
            BinaryStore::temp_file()?
        } else {
            BinaryStore::in_memory()
        };
        let registry = match self.config.serialization {
            SerializationMode::Complete => None,
            SerializationMode::Auto => self.registry.clone(),
        };
        let mut collector = ResolvedGraphCollector::new();
        let mut stream = StreamingResolutionResultBuilder::new(store, self.config.serialization, registry)?;

        let outcome = {
            let targets: Vec<&mut dyn DependencyGraphVisitor> = vec![&mut collector, &mut stream];
            let mut visitors = CompositeGraphVisitor::new(targets);
            builder.resolve(root.clone(), &mut visitors)?
        };
        let graph = collector.into_graph()?;
        tracing::info!(
            "Resolved {} components with {} conflicts",
            graph.len(),
            outcome.conflicts.len()
        );

        Ok(ResolverResults {
            graph,
            stream: stream.into_result()?,
            conflicts: outcome.conflicts,
            locking_failures: outcome.locking_failures,
            metadata_fetches: outcome.metadata_fetches,
        })
    }
}
