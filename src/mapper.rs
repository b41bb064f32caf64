//! Map stage: turns a batch of documents into one artifact per key.

use anyhow::Context;
use tracing::{debug, warn};

use crate::artifact::ArtifactStore;
use crate::error::{TaskContext, TaskError, TaskFailure};
use crate::source::Document;
use crate::workload::Workload;
use crate::{KeyedLines, Mapping};

/// Apply `workload` to every record in `batch`, merge the lines by key in
/// record order, and write one artifact per key.
///
/// On any failure the artifacts this call already wrote are disposed, so a
/// failed batch leaves nothing behind.
pub fn map_batch<D: Document>(
    store: &ArtifactStore,
    workload: &Workload,
    batch: &[D],
) -> Result<Mapping, TaskError> {
    let mut merged = KeyedLines::new();
    for doc in batch {
        let read_error = |source: anyhow::Error| TaskError::SourceRead {
            document: doc.name(),
            source,
        };
        for record in doc.records().map_err(read_error)? {
            let lines = record
                .and_then(|record| {
                    workload
                        .apply(&record)
                        .with_context(|| format!("transform failed for record `{}`", record.id))
                })
                .map_err(read_error)?;
            for (key, mut lines) in lines {
                merged.entry(key).or_default().append(&mut lines);
            }
        }
    }

    let mut mapping = Mapping::new();
    for (key, lines) in merged {
        match store.write_lines(&lines) {
            Ok(artifact) => {
                mapping.insert(key, artifact);
            }
            Err(source) => {
                discard(store, mapping);
                return Err(TaskError::ArtifactIo { key, source });
            }
        }
    }
    Ok(mapping)
}

/// Task-boundary wrapper around [`map_batch`] used by the pipeline.
pub fn map_task<D: Document>(
    store: &ArtifactStore,
    workload: &Workload,
    index: usize,
    batch: Vec<D>,
) -> Result<Mapping, TaskFailure> {
    debug!(batch = index, documents = batch.len(), "map task starting");
    map_batch(store, workload, &batch)
        .map_err(|error| TaskFailure::new(TaskContext::Batch { index }, error))
}

/// Dispose every artifact of `mapping`, logging instead of failing.
pub(crate) fn discard(store: &ArtifactStore, mapping: Mapping) {
    for (key, artifact) in mapping {
        if let Err(err) = store.dispose(artifact) {
            warn!(key = %key, "failed to dispose artifact: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{InMemoryDocument, RecordIter};
    use crate::workload::{self, objects};
    use crate::Record;
    use std::fs;

    struct BrokenDocument;

    impl Document for BrokenDocument {
        fn name(&self) -> String {
            "broken".into()
        }

        fn records(&self) -> RecordIter<'_> {
            Ok(Box::new(
                vec![
                    Ok(Record::new("ok", 1, vec![])),
                    Err(anyhow::anyhow!("truncated")),
                ]
                .into_iter(),
            ))
        }
    }

    fn read(store: &ArtifactStore, mapping: &Mapping, key: &str) -> String {
        String::from_utf8(store.read(&mapping[key]).unwrap()).unwrap()
    }

    #[test]
    fn merges_records_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let objects_wl = workload::named("objects").unwrap();
        let batch = vec![
            InMemoryDocument::new(
                "d0",
                vec![
                    Record::new("a1", 5, vec!["o1".into(), "o2".into()]),
                    Record::new("a2", 9, vec!["o3".into()]),
                ],
            ),
            InMemoryDocument::new("d1", vec![Record::new("a3", 1, vec![])]),
        ];

        let mapping = map_batch(&store, &objects_wl, &batch).unwrap();
        assert_eq!(mapping.len(), 2);
        assert_eq!(read(&store, &mapping, objects::ID_LEVEL_KEY), "a1,5\na2,9\na3,1\n");
        assert_eq!(
            read(&store, &mapping, objects::ID_OBJECT_KEY),
            "a1,o1\na1,o2\na2,o3\n"
        );
        assert_eq!(store.live_count(), 2);
    }

    #[test]
    fn empty_batch_maps_to_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let wl = workload::named("objects").unwrap();
        let mapping = map_batch::<InMemoryDocument>(&store, &wl, &[]).unwrap();
        assert!(mapping.is_empty());
    }

    #[test]
    fn bad_record_fails_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let wl = workload::named("objects").unwrap();

        let failure = map_task(&store, &wl, 3, vec![BrokenDocument]).unwrap_err();
        assert_eq!(failure.context, TaskContext::Batch { index: 3 });
        match failure.error {
            TaskError::SourceRead { document, .. } => assert_eq!(document, "broken"),
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(store.live_count(), 0);
    }

    #[test]
    fn write_failure_disposes_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path().join("scratch")).unwrap();
        fs::remove_dir_all(store.root()).unwrap();
        let wl = workload::named("objects").unwrap();
        let batch = vec![InMemoryDocument::new("d0", vec![Record::new("a1", 5, vec![])])];

        let err = map_batch(&store, &wl, &batch).unwrap_err();
        assert!(matches!(err, TaskError::ArtifactIo { .. }));
        assert_eq!(store.live_count(), 0);
    }
}
