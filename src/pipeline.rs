//! The pipeline orchestrator.
//!
//! Drives `map → partition → (reduce → partition)* → reduce` over a
//! [`WorkerPool`]. The first partitioning step divides the map results into
//! `2^depth` partitions; every reduce round merges each (key, artifacts)
//! pair of every partition, then regroups the results into half as many
//! partitions, so each key's fan-in halves per round. A final pass over the
//! single remaining partition leaves one artifact per key.
//!
//! The orchestrator itself does no mapping or reducing; it only submits
//! tasks and waits for their results.

use itertools::Itertools;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::artifact::ArtifactStore;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, TaskContext, TaskError, TaskFailure};
use crate::partition::{divide_and_partition, partition, Partition};
use crate::pool::{TaskSet, WorkerPool};
use crate::source::Source;
use crate::workload::{self, Workload};
use crate::{mapper, reducer, Mapping};

type TaskResult = Result<Mapping, TaskFailure>;

/// Where a run currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Mapping,
    PartitioningAfterMap,
    /// Reduce round `K`, counting down from the tree depth to 1.
    Reducing(u32),
    /// Regrouping the results of round `K` into `2^(K-1)` partitions.
    Partitioning(u32),
    FinalReducing,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Mapping => write!(f, "mapping"),
            Stage::PartitioningAfterMap => write!(f, "partitioning after map"),
            Stage::Reducing(round) => write!(f, "reduce round {round}"),
            Stage::Partitioning(round) => write!(f, "partitioning round {round}"),
            Stage::FinalReducing => write!(f, "final reduce"),
            Stage::Done => write!(f, "done"),
        }
    }
}

/// Outcome of one run.
#[derive(Debug)]
pub struct RunReport {
    /// One final artifact per surviving key. The caller owns them.
    pub outputs: Mapping,
    /// Every task failure, in the order they were observed.
    pub failures: Vec<TaskFailure>,
    pub documents: usize,
    pub batches: usize,
}

impl RunReport {
    /// No output at all: the input was empty or every map task failed.
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Some task failed, so outputs may be missing keys or lines.
    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty()
    }

    /// The final outputs, or [`PipelineError::EmptyResult`] if there are
    /// none.
    pub fn into_outputs(self) -> Result<Mapping, PipelineError> {
        if self.outputs.is_empty() {
            Err(PipelineError::EmptyResult {
                failures: self.failures,
            })
        } else {
            Ok(self.outputs)
        }
    }
}

pub struct Pipeline {
    pool: WorkerPool,
    store: Arc<ArtifactStore>,
    workload: Workload,
    batch_size: usize,
    reduce_depth: u32,
    stage: Stage,
}

impl Pipeline {
    /// A pipeline running on `pool` and keeping intermediates in `store`.
    pub fn new(
        config: &PipelineConfig,
        pool: WorkerPool,
        store: Arc<ArtifactStore>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let workload = workload::try_named(&config.workload)
            .ok_or_else(|| PipelineError::UnknownWorkload(config.workload.clone()))?;
        Ok(Self {
            pool,
            store,
            workload,
            batch_size: config.batch_size,
            reduce_depth: config.reduce_depth,
            stage: Stage::Mapping,
        })
    }

    /// A pipeline with its own pool and a run-scoped scratch store.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let store = ArtifactStore::scoped(config.scratch_parent())?;
        let store = if config.keep_intermediates {
            store.keep()
        } else {
            store
        };
        info!(scratch = %store.root().display(), pool = config.pool_size, "scratch store ready");
        Self::new(config, WorkerPool::new(config.pool_size), Arc::new(store))
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Run every document of `source` through the pipeline.
    ///
    /// Task failures never abort the run; they are collected in the report.
    /// An empty report means nothing was produced and no artifact is left.
    pub async fn run<S: Source>(&mut self, source: &S) -> RunReport {
        let mut failures = Vec::new();

        self.enter(Stage::Mapping);
        let (tasks, documents) = self.submit_map(source);
        let batches = tasks.len();
        let mapped = collect(tasks, self.stage, &mut failures).await;

        if mapped.iter().all(Mapping::is_empty) {
            error!(documents, batches, failures = failures.len(), "empty output");
            self.enter(Stage::Done);
            return RunReport {
                outputs: Mapping::new(),
                failures,
                documents,
                batches,
            };
        }

        self.enter(Stage::PartitioningAfterMap);
        let mut partitions = divide_and_partition(mapped, 1 << self.reduce_depth);

        for round in (1..=self.reduce_depth).rev() {
            self.enter(Stage::Reducing(round));
            let reduced = self.reduce_round(partitions, Some(round), &mut failures).await;

            self.enter(Stage::Partitioning(round));
            partitions = partition(reduced).split(1 << (round - 1));
        }

        self.enter(Stage::FinalReducing);
        let reduced = self.reduce_round(partitions, None, &mut failures).await;
        let outputs = reduced.into_iter().flatten().collect::<Mapping>();

        self.enter(Stage::Done);
        info!(
            documents,
            batches,
            keys = outputs.len(),
            failures = failures.len(),
            "run complete"
        );
        RunReport {
            outputs,
            failures,
            documents,
            batches,
        }
    }

    fn enter(&mut self, stage: Stage) {
        info!(%stage, "entering stage");
        self.stage = stage;
    }

    /// Chunk the documents into batches and submit one map task per batch.
    fn submit_map<S: Source>(&self, source: &S) -> (TaskSet<TaskResult>, usize) {
        let mut tasks = self.pool.task_set();
        let mut documents = 0;
        let chunks = source.documents().chunks(self.batch_size);
        for (index, batch) in (&chunks).into_iter().enumerate() {
            let batch = batch.collect::<Vec<_>>();
            documents += batch.len();
            let store = Arc::clone(&self.store);
            let workload = self.workload;
            tasks.submit(move || mapper::map_task(&store, &workload, index, batch));
        }
        debug!(documents, batches = tasks.len(), "map tasks submitted");
        (tasks, documents)
    }

    /// Submit one reducer task per (key, artifacts) pair of every partition.
    async fn reduce_round(
        &self,
        partitions: Vec<Partition>,
        round: Option<u32>,
        failures: &mut Vec<TaskFailure>,
    ) -> Vec<Mapping> {
        let mut tasks = self.pool.task_set();
        for (key, inputs) in partitions.into_iter().flatten() {
            let store = Arc::clone(&self.store);
            tasks.submit(move || reducer::reduce_task(&store, round, key, inputs));
        }
        debug!(stage = %self.stage, tasks = tasks.len(), "reduce tasks submitted");
        collect(tasks, self.stage, failures).await
    }
}

/// Take every task result as it completes. Failures are logged and recorded
/// and contribute nothing.
async fn collect(
    mut tasks: TaskSet<TaskResult>,
    stage: Stage,
    failures: &mut Vec<TaskFailure>,
) -> Vec<Mapping> {
    let mut out = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.next().await {
        let failure = match joined {
            Ok(Ok(mapping)) => {
                out.push(mapping);
                continue;
            }
            Ok(Err(failure)) => failure,
            Err(err) => TaskFailure::new(
                TaskContext::Worker { stage },
                TaskError::Worker(err.to_string()),
            ),
        };
        warn!("{failure}");
        failures.push(failure);
    }
    out
}
