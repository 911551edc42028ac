//! Byte storage behind a streamed resolution result: one write phase,
//! then any number of reads.

use modgraph_util::errors::ModgraphError;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::sync::Arc;
use tempfile::NamedTempFile;

use super::codec::{Decoder, Encoder};

enum Sink {
    Memory(Vec<u8>),
    File { file: NamedTempFile, written: u64 },
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Sink::Memory(v) => v.write(buf),
            Sink::File { file, written } => {
                let n = file.write(buf)?;
                *written += n as u64;
                Ok(n)
            }
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Sink::Memory(_) => Ok(()),
            Sink::File { file, .. } => file.flush(),
        }
    }
}

/// Append-only write side.
pub struct BinaryStore {
    encoder: Encoder<Sink>,
}

impl BinaryStore {
    pub fn in_memory() -> Self {
        Self {
            encoder: Encoder::new(Sink::Memory(Vec::new())),
        }
    }

    /// Backed by a temporary file, removed once the store and every
    /// [`BinaryData`] read from it are dropped.
    pub fn temp_file() -> Result<Self, ModgraphError> {
        Ok(Self {
            encoder: Encoder::new(Sink::File {
                file: NamedTempFile::new()?,
                written: 0,
            }),
        })
    }

    pub fn encoder(&mut self) -> &mut Encoder<impl Write> {
        &mut self.encoder
    }

    /// End the write phase.
    pub fn done(self) -> Result<BinaryData, ModgraphError> {
        let mut encoder = self.encoder;
        encoder.flush()?;
        let backing = match encoder.into_inner() {
            Sink::Memory(v) => Backing::Memory(Arc::from(v)),
            Sink::File { file, written } => Backing::File {
                file: Arc::new(file),
                len: written,
            },
        };
        let data = BinaryData { backing };
        tracing::debug!("Binary store closed with {} bytes", data.len());
        Ok(data)
    }
}

#[derive(Clone)]
enum Backing {
    Memory(Arc<[u8]>),
    File { file: Arc<NamedTempFile>, len: u64 },
}

/// Read side. Cheap to clone; every decoder starts at the beginning.
///
/// File-backed data stays on disk; each reader opens its own handle.
#[derive(Clone)]
pub struct BinaryData {
    backing: Backing,
}

impl BinaryData {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            backing: Backing::Memory(Arc::from(bytes)),
        }
    }

    /// A fresh reader positioned at the first byte.
    pub fn reader(&self) -> Result<DataReader<'_>, ModgraphError> {
        Ok(match &self.backing {
            Backing::Memory(bytes) => DataReader::Memory(bytes),
            Backing::File { file, .. } => DataReader::File(BufReader::new(file.reopen()?)),
        })
    }

    pub fn decoder(&self) -> Result<Decoder<DataReader<'_>>, ModgraphError> {
        Ok(Decoder::new(self.reader()?))
    }

    /// Copy the whole stream into `out`.
    pub fn write_to(&self, out: &mut impl Write) -> Result<u64, ModgraphError> {
        let mut reader = self.reader()?;
        Ok(std::io::copy(&mut reader, out)?)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, ModgraphError> {
        let mut bytes = Vec::with_capacity(self.len());
        self.write_to(&mut bytes)?;
        Ok(bytes)
    }

    pub fn is_on_disk(&self) -> bool {
        matches!(self.backing, Backing::File { .. })
    }

    pub fn len(&self) -> usize {
        match &self.backing {
            Backing::Memory(bytes) => bytes.len(),
            Backing::File { len, .. } => *len as usize,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for BinaryData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let place = if self.is_on_disk() { "file" } else { "memory" };
        write!(f, "BinaryData({} bytes in {place})", self.len())
    }
}

/// Reader over a [`BinaryData`].
pub enum DataReader<'a> {
    Memory(&'a [u8]),
    File(BufReader<File>),
}

impl Read for DataReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            DataReader::Memory(bytes) => bytes.read(buf),
            DataReader::File(reader) => reader.read(buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(mut store: BinaryStore) -> BinaryData {
        store.encoder().write_string("hello").unwrap();
        store.encoder().write_small_int(42).unwrap();
        let data = store.done().unwrap();
        for _ in 0..2 {
            let mut dec = data.decoder().unwrap();
            assert_eq!(dec.read_string().unwrap(), "hello");
            assert_eq!(dec.read_small_int().unwrap(), 42);
        }
        data
    }

    #[test]
    fn memory_store_rereads() {
        let data = exercise(BinaryStore::in_memory());
        assert!(!data.is_on_disk());
    }

    #[test]
    fn file_store_reads_from_disk() {
        let data = exercise(BinaryStore::temp_file().unwrap());
        assert!(data.is_on_disk());
        let bytes = data.to_vec().unwrap();
        assert_eq!(bytes.len(), data.len());
        assert_eq!(BinaryData::from_bytes(bytes.clone()).to_vec().unwrap(), bytes);
    }

    #[test]
    fn clones_read_independently() {
        let data = exercise(BinaryStore::temp_file().unwrap());
        let copy = data.clone();
        let mut first = data.decoder().unwrap();
        assert_eq!(first.read_string().unwrap(), "hello");
        let mut second = copy.decoder().unwrap();
        assert_eq!(second.read_string().unwrap(), "hello");
        assert_eq!(first.read_small_int().unwrap(), 42);
    }
}
