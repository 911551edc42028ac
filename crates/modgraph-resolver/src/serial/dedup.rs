//! Per-stream deduplication of repeated values.
//!
//! The writer keeps a value → index map and the reader a parallel list. An
//! index equal to the current list length announces a new value, which
//! follows inline. These serializers are stateful: use one pair per stream.

use modgraph_core::attributes::AttributeContainer;
use modgraph_core::identity::ComponentSelector;
use modgraph_util::errors::ModgraphError;
use std::collections::HashMap;
use std::hash::Hash;
use std::io::{Read, Write};

use super::codec::{Decoder, Encoder};
use super::ids;

type WriteFn<T, W> = fn(&mut Encoder<W>, &T) -> Result<(), ModgraphError>;
type ReadFn<T, R> = fn(&mut Decoder<R>) -> Result<T, ModgraphError>;

pub struct DedupWriter<T> {
    seen: HashMap<T, u32>,
}

impl<T: Clone + Eq + Hash> DedupWriter<T> {
    fn new() -> Self {
        Self { seen: HashMap::new() }
    }

    fn write<W: Write>(&mut self, enc: &mut Encoder<W>, value: &T, write: WriteFn<T, W>) -> Result<(), ModgraphError> {
        if let Some(&index) = self.seen.get(value) {
            return enc.write_small_int(index);
        }
        let index = self.seen.len() as u32;
        self.seen.insert(value.clone(), index);
        enc.write_small_int(index)?;
        write(enc, value)
    }

    /// Distinct values written so far.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

pub struct DedupReader<T> {
    values: Vec<T>,
}

impl<T: Clone> DedupReader<T> {
    fn new() -> Self {
        Self { values: Vec::new() }
    }

    fn read<R: Read>(&mut self, dec: &mut Decoder<R>, read: ReadFn<T, R>, what: &str) -> Result<T, ModgraphError> {
        let index = dec.read_small_int()? as usize;
        match index.cmp(&self.values.len()) {
            std::cmp::Ordering::Less => Ok(self.values[index].clone()),
            std::cmp::Ordering::Equal => {
                let value = read(dec)?;
                self.values.push(value.clone());
                Ok(value)
            }
            std::cmp::Ordering::Greater => Err(ModgraphError::corrupt(format!(
                "{what} reference {index} ahead of the {} values read so far",
                self.values.len()
            ))),
        }
    }
}

pub type SelectorWriter = DedupWriter<ComponentSelector>;
pub type SelectorReader = DedupReader<ComponentSelector>;
pub type AttributesWriter = DedupWriter<AttributeContainer>;
pub type AttributesReader = DedupReader<AttributeContainer>;

impl SelectorWriter {
    pub fn selectors() -> Self {
        Self::new()
    }

    pub fn write_selector<W: Write>(&mut self, enc: &mut Encoder<W>, selector: &ComponentSelector) -> Result<(), ModgraphError> {
        self.write(enc, selector, ids::write_selector::<W>)
    }
}

impl SelectorReader {
    pub fn selectors() -> Self {
        Self::new()
    }

    pub fn read_selector<R: Read>(&mut self, dec: &mut Decoder<R>) -> Result<ComponentSelector, ModgraphError> {
        self.read(dec, ids::read_selector::<R>, "selector")
    }
}

impl AttributesWriter {
    pub fn attributes() -> Self {
        Self::new()
    }

    pub fn write_attributes<W: Write>(&mut self, enc: &mut Encoder<W>, attributes: &AttributeContainer) -> Result<(), ModgraphError> {
        self.write(enc, attributes, ids::write_attributes::<W>)
    }
}

impl AttributesReader {
    pub fn attributes() -> Self {
        Self::new()
    }

    pub fn read_attributes<R: Read>(&mut self, dec: &mut Decoder<R>) -> Result<AttributeContainer, ModgraphError> {
        self.read(dec, ids::read_attributes::<R>, "attribute container")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_selectors_are_written_once() {
        let a = ComponentSelector::module("org", "a", "1.0");
        let b = ComponentSelector::project(":lib");

        let mut writer = SelectorWriter::selectors();
        let mut enc = Encoder::new(Vec::new());
        for s in [&a, &b, &a, &a, &b] {
            writer.write_selector(&mut enc, s).unwrap();
        }
        assert_eq!(writer.len(), 2);
        let bytes = enc.into_inner();

        let mut reader = SelectorReader::selectors();
        let mut dec = Decoder::new(bytes.as_slice());
        let read: Vec<_> = (0..5).map(|_| reader.read_selector(&mut dec).unwrap()).collect();
        assert_eq!(read, vec![a.clone(), b.clone(), a.clone(), a, b]);
    }

    #[test]
    fn dedup_shrinks_the_stream() {
        let attrs = AttributeContainer::empty()
            .with("org.gradle.usage", "java-runtime")
            .with("org.gradle.category", "library");
        let mut writer = AttributesWriter::attributes();
        let mut enc = Encoder::new(Vec::new());
        writer.write_attributes(&mut enc, &attrs).unwrap();
        let first = enc.into_inner().len();

        let mut enc = Encoder::new(Vec::new());
        writer.write_attributes(&mut enc, &attrs).unwrap();
        assert_eq!(enc.into_inner().len(), 1);
        assert!(first > 1);
    }

    #[test]
    fn forward_reference_is_corrupt() {
        let mut reader = AttributesReader::attributes();
        let err = reader.read_attributes(&mut Decoder::new(&[3u8][..])).unwrap_err();
        assert!(matches!(err, ModgraphError::Corrupt { .. }));
    }
}
