//! Error taxonomy for pipeline runs.
//!
//! Task-level errors ([`TaskError`]) are caught at the task boundary and
//! collected as [`TaskFailure`]s; they never abort sibling tasks. Run-level
//! conditions are [`PipelineError`]s.

use std::fmt;
use std::io;
use thiserror::Error;

use crate::pipeline::Stage;
use crate::DestinationKey;

/// Why a single mapper or reducer task produced nothing.
#[derive(Debug, Error)]
pub enum TaskError {
    /// A document or one of its records could not be read or transformed.
    #[error("failed to read source document `{document}`: {source:#}")]
    SourceRead {
        document: String,
        #[source]
        source: anyhow::Error,
    },

    /// Creating, writing, reading or deleting an artifact failed.
    #[error("artifact i/o failed for key `{key}`: {source}")]
    ArtifactIo {
        key: DestinationKey,
        #[source]
        source: io::Error,
    },

    /// The worker running the task panicked or was aborted.
    #[error("worker task did not complete: {0}")]
    Worker(String),
}

impl TaskError {
    pub(crate) fn io(key: &str) -> impl FnOnce(io::Error) -> TaskError + '_ {
        move |source| TaskError::ArtifactIo {
            key: key.to_string(),
            source,
        }
    }
}

/// Where in the run a task failure happened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskContext {
    /// A mapper task, identified by its batch index.
    Batch { index: usize },
    /// A reducer task for one key. `round` is `None` for the final pass.
    Key {
        round: Option<u32>,
        key: DestinationKey,
    },
    /// A task whose identity was lost with its worker.
    Worker { stage: Stage },
}

impl fmt::Display for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskContext::Batch { index } => write!(f, "map batch {index}"),
            TaskContext::Key {
                round: Some(round),
                key,
            } => write!(f, "reduce round {round} key `{key}`"),
            TaskContext::Key { round: None, key } => write!(f, "final reduce key `{key}`"),
            TaskContext::Worker { stage } => write!(f, "worker during {stage}"),
        }
    }
}

/// A task-level error together with the context needed to locate it.
#[derive(Debug, Error)]
#[error("{context}: {error}")]
pub struct TaskFailure {
    pub context: TaskContext,
    #[source]
    pub error: TaskError,
}

impl TaskFailure {
    pub fn new(context: TaskContext, error: TaskError) -> Self {
        Self { context, error }
    }
}

/// Run-level errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("no workload named `{0}` found")]
    UnknownWorkload(String),

    #[error("failed to prepare scratch directory: {0}")]
    Scratch(#[from] io::Error),

    /// The mapping stage produced no usable output.
    #[error("empty output ({} task failures)", .failures.len())]
    EmptyResult { failures: Vec<TaskFailure> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_display_names_the_task() {
        let failure = TaskFailure::new(
            TaskContext::Key {
                round: Some(2),
                key: "id_level.csv".into(),
            },
            TaskError::ArtifactIo {
                key: "id_level.csv".into(),
                source: io::Error::new(io::ErrorKind::NotFound, "gone"),
            },
        );
        let msg = failure.to_string();
        assert!(msg.starts_with("reduce round 2 key `id_level.csv`"));
        assert!(msg.contains("gone"));
    }

    #[test]
    fn batch_context_display() {
        let ctx = TaskContext::Batch { index: 7 };
        assert_eq!(ctx.to_string(), "map batch 7");
        let ctx = TaskContext::Key {
            round: None,
            key: "k".into(),
        };
        assert_eq!(ctx.to_string(), "final reduce key `k`");
    }
}
