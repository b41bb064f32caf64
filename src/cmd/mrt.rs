use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::PipelineConfig;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write synthetic source documents
    Generate {
        /// Directory the documents are written to
        #[arg(short, long, default_value = "/tmp/data")]
        files_path: PathBuf,

        /// Number of documents
        #[arg(short, long, default_value_t = 50)]
        num_docs: usize,

        /// Records per document
        #[arg(short, long, default_value_t = 10)]
        records_per_doc: usize,
    },
    /// Run the pipeline over every document in a directory
    Process {
        /// Directory holding the source documents
        #[arg(short, long, default_value = "/tmp/data")]
        files_path: PathBuf,

        /// Directory the final outputs are moved to, one file per key
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// JSON config file; flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Maximum number of tasks running at once
        #[arg(short, long)]
        pool_size: Option<usize>,

        /// Documents per map task
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Number of halving reduce rounds
        #[arg(short, long)]
        reduce_depth: Option<u32>,

        /// Record transform to apply
        #[arg(short, long)]
        workload: Option<String>,

        /// Keep the scratch directory after the run
        #[arg(short, long)]
        keep_intermediates: bool,
    },
}

/// Options of the `process` command, after layering.
#[derive(Debug)]
pub struct ProcessJob {
    pub files_path: PathBuf,
    pub output_dir: PathBuf,
    pub config: PipelineConfig,
}

impl Commands {
    /// Build the run configuration for `process`: defaults, then the config
    /// file, then the environment, then flags. Returns `None` for other
    /// commands.
    pub fn process_job(self) -> Result<Option<ProcessJob>> {
        let Commands::Process {
            files_path,
            output_dir,
            config,
            pool_size,
            batch_size,
            reduce_depth,
            workload,
            keep_intermediates,
        } = self
        else {
            return Ok(None);
        };

        let mut config = match config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        }
        .apply_env()?;
        if let Some(n) = pool_size {
            config.pool_size = n;
        }
        if let Some(n) = batch_size {
            config.batch_size = n;
        }
        if let Some(n) = reduce_depth {
            config.reduce_depth = n;
        }
        if let Some(name) = workload {
            config.workload = name;
        }
        config.keep_intermediates |= keep_intermediates;
        config.validate()?;

        Ok(Some(ProcessJob {
            files_path,
            output_dir,
            config,
        }))
    }
}
