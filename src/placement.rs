//! Output placement: moves final artifacts to `<dest>/<key>`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::artifact::ArtifactStore;
use crate::{DestinationKey, Mapping};

/// What happened to one final artifact.
#[derive(Debug)]
pub struct Placement {
    pub key: DestinationKey,
    pub result: io::Result<PathBuf>,
}

impl Placement {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Move every artifact of `outputs` to `dest.join(key)`, replacing any file
/// already there. The store gives up ownership of each artifact first, so a
/// failed move leaves the bytes in the scratch directory.
pub fn place_all(
    store: &ArtifactStore,
    outputs: Mapping,
    dest: impl AsRef<Path>,
) -> Vec<Placement> {
    let dest = dest.as_ref();
    outputs
        .into_iter()
        .map(|(key, artifact)| {
            let from = store.release(artifact);
            let to = dest.join(&key);
            let result = move_file(&from, &to).map(|()| to);
            match &result {
                Ok(to) => info!(key = %key, path = %to.display(), "placed output"),
                Err(err) => warn!(key = %key, "failed to place output: {err}"),
            }
            Placement { key, result }
        })
        .collect()
}

/// Rename `from` to `to`, falling back to copy and remove when they are on
/// different filesystems.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn moves_each_key_to_its_own_file() {
        let scratch = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(scratch.path()).unwrap();

        let mut outputs = Mapping::new();
        outputs.insert(
            "id_level.csv".into(),
            store.write_lines(&[Bytes::from_static(b"a1,5\n")]).unwrap(),
        );
        outputs.insert(
            "id_object.csv".into(),
            store.write_lines(&[Bytes::from_static(b"a1,o1\n")]).unwrap(),
        );

        let placed = place_all(&store, outputs, dest.path().join("out"));
        assert!(placed.iter().all(Placement::is_ok));
        assert_eq!(
            fs::read_to_string(dest.path().join("out/id_level.csv")).unwrap(),
            "a1,5\n"
        );
        assert_eq!(
            fs::read_to_string(dest.path().join("out/id_object.csv")).unwrap(),
            "a1,o1\n"
        );
        assert_eq!(store.live_count(), 0);
        assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn replaces_existing_output() {
        let scratch = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(scratch.path()).unwrap();
        fs::write(dest.path().join("k"), "stale\n").unwrap();

        let mut outputs = Mapping::new();
        outputs.insert("k".into(), store.write_lines(&[Bytes::from_static(b"fresh\n")]).unwrap());
        let placed = place_all(&store, outputs, dest.path());

        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].key, "k");
        assert_eq!(fs::read_to_string(dest.path().join("k")).unwrap(), "fresh\n");
    }
}
