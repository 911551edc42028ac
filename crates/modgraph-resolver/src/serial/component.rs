//! Component payloads, in one of two shapes chosen per component.
//!
//! The complete shape carries identity, variants, attributes and
//! capabilities inline. The build-tree shape carries only an instance id
//! into a [`BuildTreeRegistry`] plus the graph-specific parts, and is only
//! valid while that registry lives.

use modgraph_core::config::SerializationMode;
use modgraph_core::identity::ComponentId;
use modgraph_util::errors::ModgraphError;
use std::io::{Read, Write};
use std::sync::Arc;

use super::codec::{Decoder, Encoder};
use super::dedup::{AttributesReader, AttributesWriter};
use super::ids;
use super::registry::BuildTreeRegistry;
use crate::builder::GraphComponent;
use crate::result::{ResolvedGraphVisitor, ResolvedVariantResult, VariantId};

const COMPLETE: u8 = 0;
const THIS_BUILD_TREE_ONLY: u8 = 1;

/// Writes component payloads. Holds per-stream dedup state.
pub struct ComponentResultWriter {
    mode: SerializationMode,
    registry: Option<Arc<BuildTreeRegistry>>,
    attributes: AttributesWriter,
}

impl ComponentResultWriter {
    /// Without a registry every component is written in full.
    pub fn new(mode: SerializationMode, registry: Option<Arc<BuildTreeRegistry>>) -> Self {
        Self {
            mode,
            registry,
            attributes: AttributesWriter::attributes(),
        }
    }

    fn reference_registry(&self, component: &GraphComponent) -> Option<Arc<BuildTreeRegistry>> {
        if component.adhoc || self.mode == SerializationMode::Complete {
            return None;
        }
        self.registry.clone()
    }

    pub fn write<W: Write>(
        &mut self,
        enc: &mut Encoder<W>,
        component: &GraphComponent,
        selected: &[VariantId],
    ) -> Result<(), ModgraphError> {
        match self.reference_registry(component) {
            Some(registry) => {
                let instance = registry.register(component.graph_state());
                enc.write_byte(THIS_BUILD_TREE_ONLY)?;
                enc.write_small_long(component.result_id)?;
                enc.write_small_long(instance)?;
                ids::write_reason(enc, &component.reason)?;
                enc.write_nullable_string(component.repository.as_deref())?;
                enc.write_small_long(selected.len() as u64)?;
                for &variant in selected {
                    write_variant_ref(enc, component, variant)?;
                }
                match component.available_variants() {
                    Some(all) => {
                        enc.write_boolean(true)?;
                        enc.write_small_long(all.len() as u64)?;
                        for v in all {
                            write_variant_ref(enc, component, v.id)?;
                        }
                    }
                    None => enc.write_boolean(false)?,
                }
            }
            None => {
                enc.write_byte(COMPLETE)?;
                enc.write_small_long(component.result_id)?;
                ids::write_reason(enc, &component.reason)?;
                enc.write_nullable_string(component.repository.as_deref())?;
                ids::write_component_id(enc, &component.component_id)?;
                ids::write_module_version(enc, &component.module_version)?;
                enc.write_small_long(selected.len() as u64)?;
                for &variant in selected {
                    let v = component.variant(variant).ok_or_else(|| unknown_variant(component, variant))?;
                    self.write_variant(enc, v)?;
                }
                match component.available_variants() {
                    Some(all) => {
                        enc.write_boolean(true)?;
                        enc.write_small_long(all.len() as u64)?;
                        for v in all {
                            self.write_variant(enc, v)?;
                        }
                    }
                    None => enc.write_boolean(false)?,
                }
            }
        }
        Ok(())
    }

    fn write_variant<W: Write>(&mut self, enc: &mut Encoder<W>, variant: &ResolvedVariantResult) -> Result<(), ModgraphError> {
        enc.write_small_long(variant.id)?;
        enc.write_string(&variant.name)?;
        self.attributes.write_attributes(enc, &variant.attributes)?;
        enc.write_small_long(variant.capabilities.len() as u64)?;
        for capability in &variant.capabilities {
            ids::write_capability(enc, capability)?;
        }
        Ok(())
    }
}

fn unknown_variant(component: &GraphComponent, variant: VariantId) -> ModgraphError {
    ModgraphError::Resolution {
        message: format!("{} has no variant {variant}", component.component_id),
    }
}

fn write_variant_ref<W: Write>(
    enc: &mut Encoder<W>,
    component: &GraphComponent,
    variant: VariantId,
) -> Result<(), ModgraphError> {
    let index = component
        .variant_index(variant)
        .ok_or_else(|| unknown_variant(component, variant))?;
    enc.write_small_long(variant)?;
    enc.write_small_long(index as u64)
}

/// Reads component payloads and replays them into a visitor.
pub struct ComponentResultReader {
    registry: Option<Arc<BuildTreeRegistry>>,
    attributes: AttributesReader,
}

impl ComponentResultReader {
    pub fn new(registry: Option<Arc<BuildTreeRegistry>>) -> Self {
        Self {
            registry,
            attributes: AttributesReader::attributes(),
        }
    }

    pub fn read<R: Read>(
        &mut self,
        dec: &mut Decoder<R>,
        visitor: &mut dyn ResolvedGraphVisitor,
    ) -> Result<(), ModgraphError> {
        match dec.read_byte()? {
            COMPLETE => self.read_complete(dec, visitor),
            THIS_BUILD_TREE_ONLY => self.read_reference(dec, visitor),
            other => Err(ModgraphError::corrupt(format!("unknown component payload kind {other}"))),
        }
    }

    fn read_complete<R: Read>(
        &mut self,
        dec: &mut Decoder<R>,
        visitor: &mut dyn ResolvedGraphVisitor,
    ) -> Result<(), ModgraphError> {
        let result_id = dec.read_small_long()?;
        let reason = ids::read_reason(dec)?;
        let repository = dec.read_nullable_string()?;
        let component_id = ids::read_component_id(dec)?;
        let module_version = ids::read_module_version(dec)?;

        visitor.start_visit_component(result_id, &reason, repository.as_deref())?;
        visitor.visit_component_details(&component_id, &module_version)?;
        let count = dec.read_small_long()?;
        for _ in 0..count {
            let variant = self.read_variant(dec, &component_id)?;
            visitor.visit_selected_variant(&variant)?;
        }
        if dec.read_boolean()? {
            let count = dec.read_small_long()?;
            let mut all = Vec::new();
            for _ in 0..count {
                all.push(self.read_variant(dec, &component_id)?);
            }
            visitor.visit_component_variants(&all)?;
        }
        visitor.end_visit_component()
    }

    fn read_variant<R: Read>(&mut self, dec: &mut Decoder<R>, owner: &ComponentId) -> Result<ResolvedVariantResult, ModgraphError> {
        let id = dec.read_small_long()?;
        let name = dec.read_string()?;
        let attributes = self.attributes.read_attributes(dec)?;
        let count = dec.read_small_long()?;
        let mut capabilities = Vec::new();
        for _ in 0..count {
            capabilities.push(ids::read_capability(dec)?);
        }
        Ok(ResolvedVariantResult {
            id,
            owner: owner.clone(),
            name,
            attributes,
            capabilities,
        })
    }

    fn read_reference<R: Read>(
        &mut self,
        dec: &mut Decoder<R>,
        visitor: &mut dyn ResolvedGraphVisitor,
    ) -> Result<(), ModgraphError> {
        let registry = self
            .registry
            .as_deref()
            .ok_or_else(|| ModgraphError::corrupt("build-tree reference read without a build-tree registry"))?;
        let result_id = dec.read_small_long()?;
        let instance = dec.read_small_long()?;
        let state = registry.get(instance)?;
        let reason = ids::read_reason(dec)?;
        let repository = dec.read_nullable_string()?;

        let resolve = |dec: &mut Decoder<R>| -> Result<ResolvedVariantResult, ModgraphError> {
            let id = dec.read_small_long()?;
            let index = dec.read_small_long()?;
            let v = usize::try_from(index)
                .ok()
                .and_then(|i| state.variants.get(i))
                .ok_or_else(|| {
                    ModgraphError::corrupt(format!("{} has no variant at index {index}", state.component_id))
                })?;
            Ok(ResolvedVariantResult {
                id,
                owner: state.component_id.clone(),
                name: v.name.clone(),
                attributes: v.attributes.clone(),
                capabilities: v.capabilities.clone(),
            })
        };

        visitor.start_visit_component(result_id, &reason, repository.as_deref())?;
        visitor.visit_component_details(&state.component_id, &state.module_version)?;
        let count = dec.read_small_long()?;
        for _ in 0..count {
            visitor.visit_selected_variant(&resolve(dec)?)?;
        }
        if dec.read_boolean()? {
            let count = dec.read_small_long()?;
            let mut all = Vec::new();
            for _ in 0..count {
                all.push(resolve(dec)?);
            }
            visitor.visit_component_variants(&all)?;
        }
        visitor.end_visit_component()
    }
}
