//! Temporary on-disk byte containers for intermediate lines.
//!
//! Every [`Artifact`] is a uniquely named file under the store's root. A
//! handle is not `Clone`: it moves from the task that produced it to the task
//! that consumes it, and the consumer hands it back through
//! [`ArtifactStore::dispose`] (or [`ArtifactStore::release`] for final
//! placement). The store keeps a registry of live artifacts so the disposal
//! invariant can be checked at any point.

use dashmap::DashMap;
use fnv::FnvBuildHasher;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::Line;

const ARTIFACT_EXT: &str = "part";

/// Handle to one live artifact.
#[derive(Debug, PartialEq, Eq)]
pub struct Artifact {
    id: Uuid,
    path: PathBuf,
}

impl Artifact {
    /// The unique id of this artifact.
    #[inline]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Location of the artifact's bytes.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Owns a namespace (a directory) of artifacts and their disposal.
#[derive(Debug)]
pub struct ArtifactStore {
    root: PathBuf,
    live: DashMap<Uuid, PathBuf, FnvBuildHasher>,
    /// Remove `root` when the store is dropped.
    scoped: bool,
}

impl ArtifactStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    ///
    /// The directory is left in place when the store is dropped.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            live: DashMap::with_hasher(FnvBuildHasher::default()),
            scoped: false,
        })
    }

    /// Create a fresh run directory under `parent` that is removed, together
    /// with any artifact still in it, when the store is dropped.
    pub fn scoped(parent: impl AsRef<Path>) -> io::Result<Self> {
        let root = parent.as_ref().join(format!("mrt-{}", Uuid::new_v4()));
        let mut store = Self::open(root)?;
        store.scoped = true;
        Ok(store)
    }

    /// Keep the root directory after drop even if the store is scoped.
    pub fn keep(mut self) -> Self {
        self.scoped = false;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of artifacts created and not yet disposed or released.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn is_live(&self, artifact: &Artifact) -> bool {
        self.live.contains_key(&artifact.id)
    }

    /// Start a new artifact. The artifact only becomes visible to other
    /// tasks once [`ArtifactWriter::finish`] returns it.
    pub fn create(&self) -> io::Result<ArtifactWriter<'_>> {
        let id = Uuid::new_v4();
        let path = self.root.join(format!("{id}.{ARTIFACT_EXT}"));
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        self.live.insert(id, path.clone());
        Ok(ArtifactWriter {
            store: self,
            artifact: Some(Artifact { id, path }),
            out: BufWriter::new(file),
        })
    }

    /// Write `lines` back to back into a new artifact.
    pub fn write_lines(&self, lines: &[Line]) -> io::Result<Artifact> {
        let mut writer = self.create()?;
        for line in lines {
            writer.write_all(line)?;
        }
        writer.finish()
    }

    pub fn open_reader(&self, artifact: &Artifact) -> io::Result<File> {
        File::open(&artifact.path)
    }

    /// Read the whole artifact into memory.
    pub fn read(&self, artifact: &Artifact) -> io::Result<Vec<u8>> {
        fs::read(&artifact.path)
    }

    /// Move `artifact` to a fresh name, invalidating the old handle.
    pub fn rename(&self, artifact: Artifact) -> io::Result<Artifact> {
        let id = Uuid::new_v4();
        let path = self.root.join(format!("{id}.{ARTIFACT_EXT}"));
        if let Err(err) = fs::rename(&artifact.path, &path) {
            // The handle is consumed either way.
            if let Err(cleanup) = self.dispose(artifact) {
                warn!("failed to remove artifact after failed rename: {cleanup}");
            }
            return Err(err);
        }
        self.forget(&artifact);
        self.live.insert(id, path.clone());
        Ok(Artifact { id, path })
    }

    /// Delete the artifact's bytes and invalidate the handle. The handle is
    /// gone even when the delete fails.
    pub fn dispose(&self, artifact: Artifact) -> io::Result<()> {
        self.forget(&artifact);
        fs::remove_file(&artifact.path)?;
        debug!(artifact = %artifact.id, "disposed");
        Ok(())
    }

    /// Give up ownership of `artifact` to an outside collaborator and return
    /// the path of its bytes. The store no longer tracks it.
    pub fn release(&self, artifact: Artifact) -> PathBuf {
        self.forget(&artifact);
        artifact.path
    }

    fn forget(&self, artifact: &Artifact) {
        let removed = self.live.remove(&artifact.id);
        debug_assert!(
            removed.is_some(),
            "artifact {} is not live (disposed twice?)",
            artifact.id
        );
    }
}

impl Drop for ArtifactStore {
    fn drop(&mut self) {
        if !self.scoped {
            return;
        }
        if !self.live.is_empty() {
            debug!(
                root = %self.root.display(),
                abandoned = self.live.len(),
                "removing abandoned artifacts"
            );
        }
        if let Err(err) = fs::remove_dir_all(&self.root) {
            warn!(root = %self.root.display(), "failed to remove scratch directory: {err}");
        }
    }
}

/// An artifact being written. Dropping it without calling
/// [`finish`](ArtifactWriter::finish) deletes the partial file.
pub struct ArtifactWriter<'a> {
    store: &'a ArtifactStore,
    artifact: Option<Artifact>,
    out: BufWriter<File>,
}

impl ArtifactWriter<'_> {
    /// Flush the bytes to disk and hand out the finished artifact.
    pub fn finish(mut self) -> io::Result<Artifact> {
        self.out.flush()?;
        // Only `finish` and `drop` take the handle.
        match self.artifact.take() {
            Some(artifact) => Ok(artifact),
            None => Err(io::Error::other("artifact writer already finished")),
        }
    }
}

impl Write for ArtifactWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.out.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

impl Drop for ArtifactWriter<'_> {
    fn drop(&mut self) {
        if let Some(artifact) = self.artifact.take() {
            if let Err(err) = self.store.dispose(artifact) {
                warn!("failed to remove unfinished artifact: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::io::Read;

    fn lines(items: &[&str]) -> Vec<Line> {
        items.iter().map(|s| Bytes::from(s.to_string())).collect()
    }

    #[test]
    fn write_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let artifact = store.write_lines(&lines(&["a,1\n", "b,2\n"])).unwrap();

        assert!(artifact.path().starts_with(dir.path()));
        assert_eq!(store.read(&artifact).unwrap(), b"a,1\nb,2\n");
        assert_eq!(store.live_count(), 1);

        let mut buf = String::new();
        store
            .open_reader(&artifact)
            .unwrap()
            .read_to_string(&mut buf)
            .unwrap();
        assert_eq!(buf, "a,1\nb,2\n");
    }

    #[test]
    fn names_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let a = store.write_lines(&[]).unwrap();
        let b = store.write_lines(&[]).unwrap();
        assert_ne!(a.id(), b.id());
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn dispose_removes_bytes_and_registration() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let artifact = store.write_lines(&lines(&["x\n"])).unwrap();
        let path = artifact.path().to_path_buf();

        store.dispose(artifact).unwrap();
        assert!(!path.exists());
        assert_eq!(store.live_count(), 0);
    }

    #[test]
    fn unfinished_writer_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        {
            let mut writer = store.create().unwrap();
            writer.write_all(b"partial").unwrap();
        }
        assert_eq!(store.live_count(), 0);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn rename_hands_out_a_new_handle() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let old = store.write_lines(&lines(&["k\n"])).unwrap();
        let old_path = old.path().to_path_buf();
        let old_id = old.id();

        let new = store.rename(old).unwrap();
        assert_ne!(new.id(), old_id);
        assert!(!old_path.exists());
        assert_eq!(store.read(&new).unwrap(), b"k\n");
        assert_eq!(store.live_count(), 1);
    }

    #[test]
    fn failed_rename_still_consumes_the_handle() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let artifact = store.write_lines(&lines(&["gone\n"])).unwrap();
        fs::remove_file(artifact.path()).unwrap();

        assert!(store.rename(artifact).is_err());
        assert_eq!(store.live_count(), 0);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn release_stops_tracking_but_keeps_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let artifact = store.write_lines(&lines(&["keep\n"])).unwrap();
        let path = store.release(artifact);
        assert!(path.exists());
        assert_eq!(store.live_count(), 0);
    }

    #[test]
    fn scoped_store_cleans_up_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let root = {
            let store = ArtifactStore::scoped(dir.path()).unwrap();
            let _abandoned = store.write_lines(&lines(&["lost\n"])).unwrap();
            store.root().to_path_buf()
        };
        assert!(!root.exists());
    }

    #[test]
    fn kept_scoped_store_survives_drop() {
        let dir = tempfile::tempdir().unwrap();
        let root = {
            let store = ArtifactStore::scoped(dir.path()).unwrap().keep();
            store.root().to_path_buf()
        };
        assert!(root.exists());
    }
}
