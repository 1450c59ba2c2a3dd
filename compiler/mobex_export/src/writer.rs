//! Container records.
//!
//! [`RecordWriter`] is the contract the packager writes through: named byte
//! records plus a minimum-format-version accumulator. [`MemoryArchive`] is
//! an in-memory implementation, used by tests and by callers that stream
//! the container out themselves.

use std::io;

use rustc_hash::FxHashMap;

/// Destination of an export.
///
/// All records of one export go through a single writer, in order.
pub trait RecordWriter {
    /// Write record `name`. `compress` is a hint; writers may ignore it.
    fn write_record(&mut self, name: &str, data: &[u8], compress: bool) -> io::Result<()>;

    /// Raise the container's minimum format version to at least `version`.
    fn set_min_version(&mut self, version: u64);
}

/// One written record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub name: String,
    pub data: Vec<u8>,
    pub compress: bool,
}

/// A container held in memory, records in write order.
#[derive(Debug, Default)]
pub struct MemoryArchive {
    records: Vec<Record>,
    index: FxHashMap<String, usize>,
    min_version: u64,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn record(&self, name: &str) -> Option<&Record> {
        self.index.get(name).map(|&i| &self.records[i])
    }

    /// Contents of record `name`.
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.record(name).map(|record| record.data.as_slice())
    }

    /// Record names in write order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|record| record.name.as_str())
    }

    #[inline]
    pub fn min_version(&self) -> u64 {
        self.min_version
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordWriter for MemoryArchive {
    fn write_record(&mut self, name: &str, data: &[u8], compress: bool) -> io::Result<()> {
        if self.index.contains_key(name) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("record `{name}` already written"),
            ));
        }
        self.index.insert(name.to_owned(), self.records.len());
        self.records.push(Record {
            name: name.to_owned(),
            data: data.to_vec(),
            compress,
        });
        Ok(())
    }

    fn set_min_version(&mut self, version: u64) {
        self.min_version = self.min_version.max(version);
    }
}
