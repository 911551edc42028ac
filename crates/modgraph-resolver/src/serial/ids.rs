//! Stateless serializers for identifiers, reasons and failures.
//!
//! These hold no per-stream state and may be shared freely between
//! concurrent serializations.

use modgraph_core::attributes::{AttributeContainer, AttributeValue};
use modgraph_core::identity::{Capability, ComponentId, ComponentSelector, ModuleIdentity, ModuleVersionId};
use modgraph_core::reason::{ComponentSelectionReason, SelectionCause, SelectionDescriptor};
use modgraph_util::errors::ModgraphError;
use std::io::{Read, Write};

use super::codec::{Decoder, Encoder};
use crate::failure::{FailureKind, ModuleResolveFailure};

const COMPONENT_MODULE: u8 = 0;
const COMPONENT_PROJECT: u8 = 1;

const SELECTOR_MODULE: u8 = 0;
const SELECTOR_PROJECT: u8 = 1;

const VALUE_BOOL: u8 = 0;
const VALUE_INT: u8 = 1;
const VALUE_STRING: u8 = 2;

pub fn write_module_version<W: Write>(enc: &mut Encoder<W>, id: &ModuleVersionId) -> Result<(), ModgraphError> {
    enc.write_string(id.group())?;
    enc.write_string(id.name())?;
    enc.write_string(&id.version)
}

pub fn read_module_version<R: Read>(dec: &mut Decoder<R>) -> Result<ModuleVersionId, ModgraphError> {
    let group = dec.read_string()?;
    let name = dec.read_string()?;
    let version = dec.read_string()?;
    Ok(ModuleVersionId::new(group, name, version))
}

pub fn write_component_id<W: Write>(enc: &mut Encoder<W>, id: &ComponentId) -> Result<(), ModgraphError> {
    match id {
        ComponentId::Module(mv) => {
            enc.write_byte(COMPONENT_MODULE)?;
            write_module_version(enc, mv)
        }
        ComponentId::Project { build, path } => {
            enc.write_byte(COMPONENT_PROJECT)?;
            enc.write_string(build)?;
            enc.write_string(path)
        }
    }
}

pub fn read_component_id<R: Read>(dec: &mut Decoder<R>) -> Result<ComponentId, ModgraphError> {
    match dec.read_byte()? {
        COMPONENT_MODULE => Ok(ComponentId::Module(read_module_version(dec)?)),
        COMPONENT_PROJECT => {
            let build = dec.read_string()?;
            let path = dec.read_string()?;
            Ok(ComponentId::Project { build, path })
        }
        other => Err(ModgraphError::corrupt(format!("unknown component id kind {other}"))),
    }
}

pub fn write_selector<W: Write>(enc: &mut Encoder<W>, selector: &ComponentSelector) -> Result<(), ModgraphError> {
    match selector {
        ComponentSelector::Module { module, version } => {
            enc.write_byte(SELECTOR_MODULE)?;
            enc.write_string(&module.group)?;
            enc.write_string(&module.name)?;
            enc.write_string(version)
        }
        ComponentSelector::Project { build, path } => {
            enc.write_byte(SELECTOR_PROJECT)?;
            enc.write_string(build)?;
            enc.write_string(path)
        }
    }
}

pub fn read_selector<R: Read>(dec: &mut Decoder<R>) -> Result<ComponentSelector, ModgraphError> {
    match dec.read_byte()? {
        SELECTOR_MODULE => {
            let group = dec.read_string()?;
            let name = dec.read_string()?;
            let version = dec.read_string()?;
            Ok(ComponentSelector::Module {
                module: ModuleIdentity::new(group, name),
                version,
            })
        }
        SELECTOR_PROJECT => {
            let build = dec.read_string()?;
            let path = dec.read_string()?;
            Ok(ComponentSelector::Project { build, path })
        }
        other => Err(ModgraphError::corrupt(format!("unknown selector kind {other}"))),
    }
}

pub fn write_attributes<W: Write>(enc: &mut Encoder<W>, attributes: &AttributeContainer) -> Result<(), ModgraphError> {
    enc.write_small_long(attributes.len() as u64)?;
    for (key, value) in attributes.iter() {
        enc.write_string(key)?;
        match value {
            AttributeValue::Bool(b) => {
                enc.write_byte(VALUE_BOOL)?;
                enc.write_boolean(*b)?;
            }
            AttributeValue::Int(i) => {
                enc.write_byte(VALUE_INT)?;
                enc.write_signed_long(*i)?;
            }
            AttributeValue::String(s) => {
                enc.write_byte(VALUE_STRING)?;
                enc.write_string(s)?;
            }
        }
    }
    Ok(())
}

pub fn read_attributes<R: Read>(dec: &mut Decoder<R>) -> Result<AttributeContainer, ModgraphError> {
    let count = dec.read_small_long()?;
    let mut entries = Vec::new();
    for _ in 0..count {
        let key = dec.read_string()?;
        let value = match dec.read_byte()? {
            VALUE_BOOL => AttributeValue::Bool(dec.read_boolean()?),
            VALUE_INT => AttributeValue::Int(dec.read_signed_long()?),
            VALUE_STRING => AttributeValue::String(dec.read_string()?),
            other => return Err(ModgraphError::corrupt(format!("unknown attribute value kind {other}"))),
        };
        entries.push((key, value));
    }
    Ok(entries.into_iter().collect())
}

pub fn write_capability<W: Write>(enc: &mut Encoder<W>, capability: &Capability) -> Result<(), ModgraphError> {
    enc.write_string(&capability.group)?;
    enc.write_string(&capability.name)?;
    enc.write_nullable_string(capability.version.as_deref())
}

pub fn read_capability<R: Read>(dec: &mut Decoder<R>) -> Result<Capability, ModgraphError> {
    let group = dec.read_string()?;
    let name = dec.read_string()?;
    let version = dec.read_nullable_string()?;
    Ok(Capability::new(group, name, version))
}

pub fn write_reason<W: Write>(enc: &mut Encoder<W>, reason: &ComponentSelectionReason) -> Result<(), ModgraphError> {
    let descriptors = reason.descriptors();
    enc.write_small_long(descriptors.len() as u64)?;
    for d in descriptors {
        enc.write_byte(d.cause.tag())?;
        enc.write_nullable_string(d.description.as_deref())?;
    }
    Ok(())
}

pub fn read_reason<R: Read>(dec: &mut Decoder<R>) -> Result<ComponentSelectionReason, ModgraphError> {
    let count = dec.read_small_long()?;
    let mut reason = ComponentSelectionReason::new();
    for _ in 0..count {
        let tag = dec.read_byte()?;
        let cause = SelectionCause::from_tag(tag)
            .ok_or_else(|| ModgraphError::corrupt(format!("unknown selection cause {tag}")))?;
        let descriptor = match dec.read_nullable_string()? {
            Some(description) => SelectionDescriptor::with_description(cause, description),
            None => SelectionDescriptor::new(cause),
        };
        reason.add(descriptor);
    }
    Ok(reason)
}

/// Failures carry their own selector in full; they are rare enough not to
/// need deduplication.
pub fn write_failure<W: Write>(enc: &mut Encoder<W>, failure: &ModuleResolveFailure) -> Result<(), ModgraphError> {
    write_selector(enc, &failure.selector)?;
    enc.write_byte(failure.kind.tag())?;
    enc.write_string(&failure.message)?;
    enc.write_small_long(failure.causes.len() as u64)?;
    for cause in &failure.causes {
        enc.write_string(cause)?;
    }
    Ok(())
}

pub fn read_failure<R: Read>(dec: &mut Decoder<R>) -> Result<ModuleResolveFailure, ModgraphError> {
    let selector = read_selector(dec)?;
    let tag = dec.read_byte()?;
    let kind = FailureKind::from_tag(tag).ok_or_else(|| ModgraphError::corrupt(format!("unknown failure kind {tag}")))?;
    let message = dec.read_string()?;
    let count = dec.read_small_long()?;
    let mut causes = Vec::new();
    for _ in 0..count {
        causes.push(dec.read_string()?);
    }
    Ok(ModuleResolveFailure {
        selector,
        kind,
        message,
        causes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_keeps_order_and_descriptions() {
        let mut reason = ComponentSelectionReason::requested();
        reason.add(SelectionDescriptor::with_description(SelectionCause::SelectedByRule, "moved to new coordinates"));
        reason.add_cause(SelectionCause::ConflictResolution);

        let mut enc = Encoder::new(Vec::new());
        write_reason(&mut enc, &reason).unwrap();
        let bytes = enc.into_inner();
        let decoded = read_reason(&mut Decoder::new(bytes.as_slice())).unwrap();
        assert_eq!(decoded, reason);
        assert_eq!(decoded.to_string(), reason.to_string());
    }

    #[test]
    fn unknown_cause_is_corrupt() {
        let bytes = [1u8, 200, 0];
        let err = read_reason(&mut Decoder::new(&bytes[..])).unwrap_err();
        assert!(matches!(err, ModgraphError::Corrupt { .. }));
    }

    #[test]
    fn project_ids_keep_build_path() {
        let id = ComponentId::project(":lib");
        let mut enc = Encoder::new(Vec::new());
        write_component_id(&mut enc, &id).unwrap();
        let bytes = enc.into_inner();
        assert_eq!(read_component_id(&mut Decoder::new(bytes.as_slice())).unwrap(), id);
    }
}
