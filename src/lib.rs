//! A single-host MapReduce (tree) engine.
//!
//! Source records are mapped in parallel batches into line artifacts keyed by
//! destination, regrouped by key, and merged through a binary reduce tree
//! until exactly one artifact per destination key remains. Intermediate data
//! lives in an [`artifact::ArtifactStore`] on local disk; all work runs on a
//! bounded [`pool::WorkerPool`].

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod artifact;
pub mod cmd;
pub mod config;
pub mod error;
pub mod mapper;
pub mod partition;
pub mod pipeline;
pub mod placement;
pub mod pool;
pub mod reducer;
pub mod source;
pub mod utils;
pub mod workload;

/////////////////////////////////////////////////////////////////////////////
// Pipeline data types
/////////////////////////////////////////////////////////////////////////////

/// Name of a logical output stream, e.g. `id_level.csv`.
pub type DestinationKey = String;

/// One serialized, newline-terminated record fragment.
///
/// Lines are [`Bytes`], so moving them between maps is cheap.
pub type Line = Bytes;

/// Lines produced for each destination key, in production order.
pub type KeyedLines = BTreeMap<DestinationKey, Vec<Line>>;

/// The result of one mapper or reducer task: a single artifact per key.
pub type Mapping = BTreeMap<DestinationKey, artifact::Artifact>;

/// One semantic unit read from a source document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// The record identifier.
    pub id: String,
    /// A numeric level attached to the record.
    pub level: i64,
    /// Names of the objects the record carries.
    #[serde(default)]
    pub objects: Vec<String>,
}

impl Record {
    /// Construct a record from its parts.
    pub fn new(id: impl Into<String>, level: i64, objects: Vec<String>) -> Self {
        Self {
            id: id.into(),
            level,
            objects,
        }
    }
}
