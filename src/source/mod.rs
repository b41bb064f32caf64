//! Source collaborators: where records come from.
//!
//! A [`Source`] yields [`Document`]s lazily; each document yields its
//! [`Record`]s lazily. Sources are restartable by calling
//! [`Source::documents`] again.

use anyhow::Result;

use crate::Record;

pub mod directory;
pub mod generate;

pub use directory::{DirectoryDocument, DirectorySource};

/// The records of one document.
///
/// There are 2 layers of [`anyhow::Result`]s here. The outer layer
/// accounts for errors that arise while opening the document.
/// The inner layer accounts for errors that occur while reading
/// individual records.
pub type RecordIter<'a> = Result<Box<dyn Iterator<Item = Result<Record>> + 'a>>;

/// One source document. Documents are moved into worker tasks.
pub trait Document: Send + 'static {
    /// A name that locates the document in error reports.
    fn name(&self) -> String;

    fn records(&self) -> RecordIter<'_>;
}

/// A finite sequence of documents.
pub trait Source {
    type Doc: Document;

    fn documents(&self) -> Box<dyn Iterator<Item = Self::Doc> + '_>;
}

/// A document held in memory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InMemoryDocument {
    pub name: String,
    pub records: Vec<Record>,
}

impl InMemoryDocument {
    pub fn new(name: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            name: name.into(),
            records,
        }
    }
}

impl Document for InMemoryDocument {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn records(&self) -> RecordIter<'_> {
        Ok(Box::new(self.records.iter().cloned().map(Ok)))
    }
}

/// A source over documents held in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemorySource {
    docs: Vec<InMemoryDocument>,
}

impl InMemorySource {
    pub fn new(docs: Vec<InMemoryDocument>) -> Self {
        Self { docs }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

impl Source for InMemorySource {
    type Doc = InMemoryDocument;

    fn documents(&self) -> Box<dyn Iterator<Item = InMemoryDocument> + '_> {
        Box::new(self.docs.iter().cloned())
    }
}
