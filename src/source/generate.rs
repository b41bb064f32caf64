//! Synthetic documents for exercising the pipeline.

use anyhow::{Context, Result};
use rand::Rng;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use super::directory::document_name;
use crate::Record;

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const NAME_LEN: usize = 10;

/// A random string of ASCII letters.
pub fn random_name<R: Rng>(rng: &mut R) -> String {
    (0..NAME_LEN)
        .map(|_| LETTERS[rng.random_range(0..LETTERS.len())] as char)
        .collect()
}

/// A record with a random id, a level in `1..=100` and 1 to 10 objects.
pub fn random_record<R: Rng>(rng: &mut R) -> Record {
    let id = random_name(rng);
    let level = rng.random_range(1..=100);
    let objects = (0..rng.random_range(1..=10))
        .map(|_| random_name(rng))
        .collect();
    Record { id, level, objects }
}

/// Write `documents` files of `records_per_doc` random records each into
/// `dir`, returning their paths.
pub fn generate<R: Rng>(
    dir: impl AsRef<Path>,
    documents: usize,
    records_per_doc: usize,
    rng: &mut R,
) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let mut paths = Vec::with_capacity(documents);
    for index in 0..documents {
        let path = dir.join(document_name(index));
        let file =
            File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
        let mut out = BufWriter::new(file);
        for _ in 0..records_per_doc {
            serde_json::to_writer(&mut out, &random_record(rng))?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        paths.push(path);
    }
    info!(dir = %dir.display(), documents, records_per_doc, "generated documents");
    Ok(paths)
}
