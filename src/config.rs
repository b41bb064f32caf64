//! Run configuration.
//!
//! Values are layered: [`PipelineConfig::default`], then an optional JSON
//! file, then `MRT_*` environment variables, then explicit CLI flags.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::utils::{default_pool_size, is_truthy, parse_env_value};
use crate::workload::{self, DEFAULT_WORKLOAD};

// Environment variable names
pub const ENV_POOL_SIZE: &str = "MRT_POOL_SIZE";
pub const ENV_BATCH_SIZE: &str = "MRT_BATCH_SIZE";
pub const ENV_REDUCE_DEPTH: &str = "MRT_REDUCE_DEPTH";
pub const ENV_KEEP_INTERMEDIATES: &str = "MRT_KEEP_INTERMEDIATES";

pub const DEFAULT_BATCH_SIZE: usize = 4;
pub const DEFAULT_REDUCE_DEPTH: u32 = 4;
/// Deepest reduce tree accepted; the first round has `2^depth` partitions.
pub const MAX_REDUCE_DEPTH: u32 = 16;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Maximum number of tasks running at once.
    pub pool_size: usize,
    /// Documents per map task.
    pub batch_size: usize,
    /// Number of halving reduce rounds before the final pass.
    pub reduce_depth: u32,
    /// Name of the record transform, see [`workload::named`].
    pub workload: String,
    /// Leave the scratch directory in place after the run.
    pub keep_intermediates: bool,
    /// Parent of the run's scratch directory; the OS temp dir if unset.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            batch_size: DEFAULT_BATCH_SIZE,
            reduce_depth: DEFAULT_REDUCE_DEPTH,
            workload: DEFAULT_WORKLOAD.to_string(),
            keep_intermediates: false,
            scratch_dir: None,
        }
    }
}

impl PipelineConfig {
    /// Read a JSON config file. Missing fields keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    /// Override fields from `MRT_*` environment variables that are set.
    /// Fails on a value that does not parse.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    /// Override fields from variables looked up through `var`.
    pub fn apply_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(n) = parse_env_value(ENV_POOL_SIZE, var(ENV_POOL_SIZE))? {
            self.pool_size = n;
        }
        if let Some(n) = parse_env_value(ENV_BATCH_SIZE, var(ENV_BATCH_SIZE))? {
            self.batch_size = n;
        }
        if let Some(n) = parse_env_value(ENV_REDUCE_DEPTH, var(ENV_REDUCE_DEPTH))? {
            self.reduce_depth = n;
        }
        if var(ENV_KEEP_INTERMEDIATES).is_some_and(|v| is_truthy(&v)) {
            self.keep_intermediates = true;
        }
        Ok(self)
    }

    pub fn scratch_parent(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.pool_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "pool size must be at least 1".into(),
            ));
        }
        if self.batch_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "batch size must be at least 1".into(),
            ));
        }
        if !(1..=MAX_REDUCE_DEPTH).contains(&self.reduce_depth) {
            return Err(PipelineError::InvalidConfig(format!(
                "reduce depth must be between 1 and {MAX_REDUCE_DEPTH}, got {}",
                self.reduce_depth
            )));
        }
        if workload::try_named(&self.workload).is_none() {
            return Err(PipelineError::UnknownWorkload(self.workload.clone()));
        }
        Ok(())
    }
}
