//! Converts workload names to record transforms.
//!
//! # Example
//!
//! To get the default transform:
//! ```
//! # use anyhow::Result;
//! use mrtree::workload;
//! # fn main() -> Result<()> {
//! let objects = workload::named("objects")?;
//! assert_eq!(objects.keys, &[workload::objects::ID_LEVEL_KEY, workload::objects::ID_OBJECT_KEY]);
//! # Ok(())
//! # }
//! ```

use anyhow::{bail, Result};

use crate::{KeyedLines, Record};

pub mod objects;

/// The output of a transform: the lines one record contributes per key.
pub type MapOutput = Result<KeyedLines>;

/// A pure, deterministic transform of one record.
pub type MapFn = fn(record: &Record) -> MapOutput;

/// A named record transform and the destination keys it may produce.
#[derive(Copy, Clone, Debug)]
pub struct Workload {
    pub name: &'static str,
    pub map_fn: MapFn,
    pub keys: &'static [&'static str],
}

impl Workload {
    /// Apply the transform to one record.
    #[inline]
    pub fn apply(&self, record: &Record) -> MapOutput {
        (self.map_fn)(record)
    }
}

/// Name of the workload used when none is configured.
pub const DEFAULT_WORKLOAD: &str = "objects";

/// Gets the [`Workload`] named `name`.
///
/// Returns [`None`] if no workload with the given name was found.
pub fn try_named(name: &str) -> Option<Workload> {
    match name {
        "objects" => Some(Workload {
            name: "objects",
            map_fn: objects::map,
            keys: objects::KEYS,
        }),
        "objects-quoted" => Some(Workload {
            name: "objects-quoted",
            map_fn: objects::map_quoted,
            keys: objects::KEYS,
        }),
        _ => None,
    }
}

/// Gets the [`Workload`] named `name`.
///
/// Returns an [`anyhow::Error`] if no workload with the given name was found.
pub fn named(name: &str) -> Result<Workload> {
    match try_named(name) {
        Some(workload) => Ok(workload),
        None => bail!("No workload named `{}` found.", name),
    }
}
