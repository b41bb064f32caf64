//! Documents stored as JSON Lines files in one directory.
//!
//! Each `*.jsonl` file is a document; each non-empty line is one JSON
//! encoded [`Record`].

use anyhow::{Context, Result};
use glob::{glob, Pattern};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::warn;

use super::{Document, RecordIter, Source};
use crate::Record;

pub const DOCUMENT_EXT: &str = "jsonl";

/// File name of the `index`-th document.
pub fn document_name(index: usize) -> String {
    format!("{:03}.{}", index, DOCUMENT_EXT)
}

#[derive(Clone, Debug)]
pub struct DirectorySource {
    files: Vec<PathBuf>,
}

impl DirectorySource {
    /// List the documents in `dir`, sorted by file name. Entries that
    /// cannot be read are logged and skipped.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let dir_str = dir
            .to_str()
            .with_context(|| format!("non UTF-8 path {}", dir.display()))?;
        let pattern = Path::new(&Pattern::escape(dir_str)).join(format!("*.{}", DOCUMENT_EXT));
        let pattern = pattern
            .to_str()
            .with_context(|| format!("non UTF-8 path {}", dir.display()))?;
        let mut files = Vec::new();
        for entry in glob(pattern)? {
            match entry {
                Ok(path) => files.push(path),
                Err(err) => warn!("skipping unreadable document: {err}"),
            }
        }
        files.sort();
        Ok(Self { files })
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

impl Source for DirectorySource {
    type Doc = DirectoryDocument;

    fn documents(&self) -> Box<dyn Iterator<Item = DirectoryDocument> + '_> {
        Box::new(self.files.iter().map(|path| DirectoryDocument { path: path.clone() }))
    }
}

#[derive(Clone, Debug)]
pub struct DirectoryDocument {
    path: PathBuf,
}

impl DirectoryDocument {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Document for DirectoryDocument {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn records(&self) -> RecordIter<'_> {
        let file = File::open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        let iter = BufReader::new(file)
            .lines()
            .enumerate()
            .filter(|(_, line)| !matches!(line, Ok(l) if l.trim().is_empty()))
            .map(|(i, line)| {
                let line = line?;
                serde_json::from_str::<Record>(&line)
                    .with_context(|| format!("malformed record on line {}", i + 1))
            });
        Ok(Box::new(iter))
    }
}
