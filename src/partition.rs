//! Regrouping of task results by destination key.
//!
//! A [`Partition`] maps each key to the artifacts waiting to be merged for
//! it. Keys iterate in sorted order; each key's list keeps insertion order.
//! Nothing here touches the disk.

use std::collections::btree_map;
use std::collections::BTreeMap;

use crate::artifact::Artifact;
use crate::utils::divide;
use crate::{DestinationKey, Mapping};

#[derive(Debug, Default)]
pub struct Partition {
    groups: BTreeMap<DestinationKey, Vec<Artifact>>,
}

impl Partition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one artifact to `key`'s list.
    pub fn push(&mut self, key: DestinationKey, artifact: Artifact) {
        self.groups.entry(key).or_default().push(artifact);
    }

    /// Append every entry of a task result.
    pub fn absorb(&mut self, mapping: Mapping) {
        for (key, artifact) in mapping {
            self.push(key, artifact);
        }
    }

    /// Append every list of `other`, key by key.
    pub fn merge(&mut self, other: Partition) {
        for (key, mut artifacts) in other.groups {
            self.groups.entry(key).or_default().append(&mut artifacts);
        }
    }

    pub fn get(&self, key: &str) -> Option<&[Artifact]> {
        self.groups.get(key).map(Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &DestinationKey> {
        self.groups.keys()
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of artifacts across all keys.
    pub fn artifact_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Deal every key's list into `n` partitions of contiguous, roughly
    /// equal slices. A key appears in as many partitions as it has
    /// artifacts, up to `n`; empty lists are never produced.
    pub fn split(self, n: usize) -> Vec<Partition> {
        let mut parts = (0..n).map(|_| Partition::new()).collect::<Vec<_>>();
        for (key, artifacts) in self.groups {
            for (part, slice) in parts.iter_mut().zip(divide(artifacts, n)) {
                if !slice.is_empty() {
                    part.groups.insert(key.clone(), slice);
                }
            }
        }
        parts
    }
}

impl IntoIterator for Partition {
    type Item = (DestinationKey, Vec<Artifact>);
    type IntoIter = btree_map::IntoIter<DestinationKey, Vec<Artifact>>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.into_iter()
    }
}

impl FromIterator<Mapping> for Partition {
    fn from_iter<I: IntoIterator<Item = Mapping>>(iter: I) -> Self {
        partition(iter)
    }
}

/// Group task results by key. Every key of every input appears in the
/// output with its artifacts in input order.
pub fn partition<I: IntoIterator<Item = Mapping>>(mappings: I) -> Partition {
    let mut out = Partition::new();
    for mapping in mappings {
        out.absorb(mapping);
    }
    out
}

/// Split `mappings` positionally into `n` roughly equal groups and
/// partition each group on its own.
pub fn divide_and_partition(mappings: Vec<Mapping>, n: usize) -> Vec<Partition> {
    divide(mappings, n).into_iter().map(partition).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactStore;
    use bytes::Bytes;
    use uuid::Uuid;

    struct Fixture {
        _dir: tempfile::TempDir,
        store: ArtifactStore,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let store = ArtifactStore::open(dir.path()).unwrap();
            Self { _dir: dir, store }
        }

        fn artifact(&self) -> Artifact {
            self.store.write_lines(&[Bytes::from_static(b"x\n")]).unwrap()
        }

        fn mapping(&self, keys: &[&str]) -> (Mapping, Vec<(String, Uuid)>) {
            let mut mapping = Mapping::new();
            let mut ids = Vec::new();
            for key in keys {
                let artifact = self.artifact();
                ids.push((key.to_string(), artifact.id()));
                mapping.insert(key.to_string(), artifact);
            }
            (mapping, ids)
        }
    }

    fn ids(partition: &Partition, key: &str) -> Vec<Uuid> {
        partition
            .get(key)
            .map(|list| list.iter().map(Artifact::id).collect())
            .unwrap_or_default()
    }

    #[test]
    fn keeps_every_key_in_input_order() {
        let fx = Fixture::new();
        let (m0, id0) = fx.mapping(&["a", "b"]);
        let (m1, id1) = fx.mapping(&["b"]);
        let (m2, id2) = fx.mapping(&["c", "a"]);

        let part = partition(vec![m0, m1, m2]);
        assert_eq!(part.keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);

        let expect = |key: &str| {
            id0.iter()
                .chain(&id1)
                .chain(&id2)
                .filter(|(k, _)| k == key)
                .map(|(_, id)| *id)
                .collect::<Vec<_>>()
        };
        for key in ["a", "b", "c"] {
            assert_eq!(ids(&part, key), expect(key), "key {key}");
        }
        assert_eq!(part.artifact_count(), 5);
    }

    #[test]
    fn empty_inputs_give_empty_partition() {
        let part = partition(Vec::<Mapping>::new());
        assert!(part.is_empty());
        let part: Partition = vec![Mapping::new(), Mapping::new()].into_iter().collect();
        assert!(part.is_empty());
    }

    #[test]
    fn merge_appends_lists() {
        let fx = Fixture::new();
        let (m0, id0) = fx.mapping(&["a"]);
        let (m1, id1) = fx.mapping(&["a", "b"]);
        let mut left = partition(vec![m0]);
        left.merge(partition(vec![m1]));

        assert_eq!(ids(&left, "a"), vec![id0[0].1, id1[0].1]);
        assert_eq!(ids(&left, "b"), vec![id1[1].1]);
    }

    #[test]
    fn split_halves_fan_in() {
        let fx = Fixture::new();
        let mut part = Partition::new();
        let a = (0..4).map(|_| fx.artifact()).collect::<Vec<_>>();
        let a_ids = a.iter().map(Artifact::id).collect::<Vec<_>>();
        for artifact in a {
            part.push("a".into(), artifact);
        }
        part.push("b".into(), fx.artifact());

        let parts = part.split(2);
        assert_eq!(parts.len(), 2);
        assert_eq!(ids(&parts[0], "a"), a_ids[..2].to_vec());
        assert_eq!(ids(&parts[1], "a"), a_ids[2..].to_vec());
        assert_eq!(parts[0].get("b").map(<[Artifact]>::len), Some(1));
        assert!(parts[1].get("b").is_none());
    }

    #[test]
    fn divide_and_partition_spreads_results() {
        let fx = Fixture::new();
        let mappings = (0..5).map(|_| fx.mapping(&["k"]).0).collect::<Vec<_>>();
        let parts = divide_and_partition(mappings, 4);
        let sizes = parts
            .iter()
            .map(|p| p.get("k").map_or(0, <[Artifact]>::len))
            .collect::<Vec<_>>();
        assert_eq!(sizes, vec![2, 1, 1, 1]);
    }
}
