//! The streamed resolution result: a forward-only sequence of tagged
//! records, replayed into the graph assembler on read.
//!
//! Layout: a format version, then records `(tag, payload)`. Each component
//! is written once, the first time the edge pass reaches it. A dependency
//! record batches every outgoing edge of one component. The root record
//! comes last and completes the graph.

use modgraph_core::config::SerializationMode;
use modgraph_util::errors::ModgraphError;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::io::{Read, Write};
use std::sync::Arc;

use super::codec::{Decoder, Encoder};
use super::component::{ComponentResultReader, ComponentResultWriter};
use super::dedup::{SelectorReader, SelectorWriter};
use super::ids;
use super::registry::BuildTreeRegistry;
use super::store::{BinaryData, BinaryStore};
use crate::builder::{DependencyGraphVisitor, GraphComponent};
use crate::result::{
    DependencyResult, ResolutionResultGraphBuilder, ResolvedGraph, ResolvedGraphVisitor, ResultId, VariantId,
};

const FORMAT_VERSION: u32 = 1;

const ROOT: u8 = 1;
const COMPONENT: u8 = 2;
const DEPENDENCY: u8 = 5;

const EDGE_RESOLVED: u8 = 0;
const EDGE_UNRESOLVED: u8 = 1;

/// Writes the graph into a [`BinaryStore`] as the builder reports it.
pub struct StreamingResolutionResultBuilder {
    store: Option<BinaryStore>,
    registry: Option<Arc<BuildTreeRegistry>>,
    components: ComponentResultWriter,
    selectors: SelectorWriter,
    visited: BTreeMap<ResultId, (GraphComponent, Vec<VariantId>)>,
    written: HashSet<ResultId>,
    data: Option<BinaryData>,
}

impl StreamingResolutionResultBuilder {
    pub fn new(
        mut store: BinaryStore,
        mode: SerializationMode,
        registry: Option<Arc<BuildTreeRegistry>>,
    ) -> Result<Self, ModgraphError> {
        store.encoder().write_small_int(FORMAT_VERSION)?;
        Ok(Self {
            store: Some(store),
            components: ComponentResultWriter::new(mode, registry.clone()),
            registry,
            selectors: SelectorWriter::selectors(),
            visited: BTreeMap::new(),
            written: HashSet::new(),
            data: None,
        })
    }

    /// The finished result. Fails unless the graph visit has finished.
    pub fn into_result(self) -> Result<StreamingResolutionResult, ModgraphError> {
        let data = self.data.ok_or_else(|| ModgraphError::Resolution {
            message: "resolution result stream was never completed".into(),
        })?;
        Ok(StreamingResolutionResult::new(data, self.registry))
    }

    fn write_component(&mut self, id: ResultId) -> Result<(), ModgraphError> {
        if !self.written.insert(id) {
            return Ok(());
        }
        let (component, selected) = self
            .visited
            .get(&id)
            .ok_or_else(|| ModgraphError::Resolution {
                message: format!("edges reported for unvisited component {id}"),
            })?;
        let enc = open_store(&mut self.store)?.encoder();
        enc.write_byte(COMPONENT)?;
        self.components.write(enc, component, selected)
    }
}

fn open_store(store: &mut Option<BinaryStore>) -> Result<&mut BinaryStore, ModgraphError> {
    store.as_mut().ok_or_else(|| ModgraphError::Resolution {
        message: "resolution result stream already completed".into(),
    })
}

fn write_edges<W: Write>(
    enc: &mut Encoder<W>,
    selectors: &mut SelectorWriter,
    edges: &[DependencyResult],
) -> Result<(), ModgraphError> {
    enc.write_small_long(edges.len() as u64)?;
    for edge in edges {
        match edge {
            DependencyResult::Resolved {
                requested,
                from_variant,
                selected,
                selected_variant,
                constraint,
            } => {
                enc.write_byte(EDGE_RESOLVED)?;
                selectors.write_selector(enc, requested)?;
                write_optional_id(enc, *from_variant)?;
                enc.write_boolean(*constraint)?;
                enc.write_small_long(*selected)?;
                write_optional_id(enc, *selected_variant)?;
            }
            DependencyResult::Unresolved {
                requested,
                from_variant,
                failure,
                constraint,
            } => {
                enc.write_byte(EDGE_UNRESOLVED)?;
                selectors.write_selector(enc, requested)?;
                write_optional_id(enc, *from_variant)?;
                enc.write_boolean(*constraint)?;
                ids::write_failure(enc, failure)?;
            }
        }
    }
    Ok(())
}

fn write_optional_id<W: Write>(enc: &mut Encoder<W>, id: Option<u64>) -> Result<(), ModgraphError> {
    match id {
        Some(id) => {
            enc.write_boolean(true)?;
            enc.write_small_long(id)
        }
        None => enc.write_boolean(false),
    }
}

fn read_optional_id<R: Read>(dec: &mut Decoder<R>) -> Result<Option<u64>, ModgraphError> {
    if dec.read_boolean()? {
        dec.read_small_long().map(Some)
    } else {
        Ok(None)
    }
}

fn read_edges<R: Read>(dec: &mut Decoder<R>, selectors: &mut SelectorReader) -> Result<Vec<DependencyResult>, ModgraphError> {
    let count = dec.read_small_long()?;
    let mut edges = Vec::new();
    for _ in 0..count {
        let kind = dec.read_byte()?;
        let requested = selectors.read_selector(dec)?;
        let from_variant = read_optional_id(dec)?;
        let constraint = dec.read_boolean()?;
        let edge = match kind {
            EDGE_RESOLVED => DependencyResult::Resolved {
                requested,
                from_variant,
                constraint,
                selected: dec.read_small_long()?,
                selected_variant: read_optional_id(dec)?,
            },
            EDGE_UNRESOLVED => DependencyResult::Unresolved {
                requested,
                from_variant,
                constraint,
                failure: ids::read_failure(dec)?,
            },
            other => return Err(ModgraphError::corrupt(format!("unknown dependency kind {other}"))),
        };
        edges.push(edge);
    }
    Ok(edges)
}

impl DependencyGraphVisitor for StreamingResolutionResultBuilder {
    fn visit_node(&mut self, component: &GraphComponent, variant: VariantId) -> Result<(), ModgraphError> {
        let (_, selected) = self
            .visited
            .entry(component.result_id)
            .or_insert_with(|| (component.clone(), Vec::new()));
        if !selected.contains(&variant) {
            selected.push(variant);
        }
        Ok(())
    }

    fn visit_edges(&mut self, from: &GraphComponent, edges: &[DependencyResult]) -> Result<(), ModgraphError> {
        self.write_component(from.result_id)?;
        if edges.is_empty() {
            return Ok(());
        }
        let enc = open_store(&mut self.store)?.encoder();
        enc.write_byte(DEPENDENCY)?;
        enc.write_small_long(from.result_id)?;
        write_edges(enc, &mut self.selectors, edges)
    }

    fn finish(&mut self, root: &GraphComponent, locking_failures: &[DependencyResult]) -> Result<(), ModgraphError> {
        let leftovers: Vec<ResultId> = self
            .visited
            .keys()
            .filter(|id| !self.written.contains(id))
            .copied()
            .collect();
        for id in leftovers {
            self.write_component(id)?;
        }

        let enc = open_store(&mut self.store)?.encoder();
        enc.write_byte(ROOT)?;
        enc.write_small_long(root.result_id)?;
        write_edges(enc, &mut self.selectors, locking_failures)?;

        if let Some(store) = self.store.take() {
            let data = store.done()?;
            tracing::debug!(
                "Serialized {} components into {} bytes",
                self.written.len(),
                data.len()
            );
            self.data = Some(data);
        }
        Ok(())
    }
}

/// Decode a stream into a graph.
pub fn read_graph(data: &BinaryData, registry: Option<Arc<BuildTreeRegistry>>) -> Result<ResolvedGraph, ModgraphError> {
    let mut dec = data.decoder()?;
    let version = dec.read_small_int()?;
    if version != FORMAT_VERSION {
        return Err(ModgraphError::corrupt(format!("unsupported stream format version {version}")));
    }
    let mut components = ComponentResultReader::new(registry);
    let mut selectors = SelectorReader::selectors();
    let mut builder = ResolutionResultGraphBuilder::new();
    loop {
        let tag = dec
            .try_read_byte()?
            .ok_or_else(|| ModgraphError::corrupt("stream ended before the root record"))?;
        match tag {
            COMPONENT => components.read(&mut dec, &mut builder)?,
            DEPENDENCY => {
                let from = dec.read_small_long()?;
                let edges = read_edges(&mut dec, &mut selectors)?;
                builder.visit_dependencies(from, &edges)?;
            }
            ROOT => {
                let root = dec.read_small_long()?;
                let failures = read_edges(&mut dec, &mut selectors)?;
                return builder.complete(root, failures);
            }
            other => return Err(ModgraphError::corrupt(format!("unknown record tag {other}"))),
        }
    }
}

/// A serialized resolution result whose graph is decoded on first use.
///
/// Concurrent callers of [`graph`](Self::graph) wait for the first decode
/// instead of repeating it.
pub struct StreamingResolutionResult {
    data: BinaryData,
    registry: Option<Arc<BuildTreeRegistry>>,
    graph: Mutex<Option<Arc<ResolvedGraph>>>,
}

impl StreamingResolutionResult {
    pub fn new(data: BinaryData, registry: Option<Arc<BuildTreeRegistry>>) -> Self {
        Self {
            data,
            registry,
            graph: Mutex::new(None),
        }
    }

    pub fn data(&self) -> &BinaryData {
        &self.data
    }

    pub fn graph(&self) -> Result<Arc<ResolvedGraph>, ModgraphError> {
        let mut slot = self.graph.lock();
        if let Some(graph) = slot.as_ref() {
            return Ok(Arc::clone(graph));
        }
        let graph = Arc::new(read_graph(&self.data, self.registry.clone())?);
        tracing::debug!("Decoded resolution result with {} components", graph.len());
        *slot = Some(Arc::clone(&graph));
        Ok(graph)
    }
}

impl std::fmt::Debug for StreamingResolutionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingResolutionResult")
            .field("data", &self.data)
            .field("decoded", &self.graph.lock().is_some())
            .finish()
    }
}
