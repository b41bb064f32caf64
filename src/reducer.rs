//! Reduce stage: concatenates one key's artifacts into a new artifact.

use std::io;
use tracing::{debug, warn};

use crate::artifact::{Artifact, ArtifactStore};
use crate::error::{TaskContext, TaskError, TaskFailure};
use crate::{DestinationKey, Mapping};

/// Append the bytes of every input, in order, to a new artifact and dispose
/// each input once it has been copied. Returns `{key: output}`.
///
/// A single input is adopted under a fresh name instead of being copied.
/// On failure the partial output and the remaining inputs are disposed.
pub fn reduce(
    store: &ArtifactStore,
    key: &str,
    inputs: Vec<Artifact>,
) -> Result<Mapping, TaskError> {
    let merged = if inputs.len() == 1 {
        adopt(store, inputs)
    } else {
        concat(store, inputs)
    };
    let output = merged.map_err(TaskError::io(key))?;

    let mut mapping = Mapping::new();
    mapping.insert(key.to_string(), output);
    Ok(mapping)
}

/// Task-boundary wrapper around [`reduce`] used by the pipeline. `round` is
/// `None` for the final pass.
pub fn reduce_task(
    store: &ArtifactStore,
    round: Option<u32>,
    key: DestinationKey,
    inputs: Vec<Artifact>,
) -> Result<Mapping, TaskFailure> {
    debug!(key = %key, ?round, fan_in = inputs.len(), "reduce task starting");
    reduce(store, &key, inputs)
        .map_err(|error| TaskFailure::new(TaskContext::Key { round, key }, error))
}

fn adopt(store: &ArtifactStore, mut inputs: Vec<Artifact>) -> io::Result<Artifact> {
    match inputs.pop() {
        Some(input) => store.rename(input),
        None => store.create()?.finish(),
    }
}

fn concat(store: &ArtifactStore, inputs: Vec<Artifact>) -> io::Result<Artifact> {
    let mut writer = store.create()?;
    let mut pending = inputs.into_iter();
    while let Some(input) = pending.next() {
        let copied = store
            .open_reader(&input)
            .and_then(|mut reader| io::copy(&mut reader, &mut writer));
        let disposed = store.dispose(input);
        if let Err(err) = copied.and(disposed) {
            abandon(store, pending);
            return Err(err);
        }
    }
    writer.finish()
}

fn abandon(store: &ArtifactStore, inputs: impl Iterator<Item = Artifact>) {
    for input in inputs {
        if let Err(err) = store.dispose(input) {
            warn!("failed to dispose input artifact: {err}");
        }
    }
}
