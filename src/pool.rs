//! Bounded worker pool.
//!
//! Task bodies are blocking closures run on tokio's blocking thread pool. A
//! [`Semaphore`] caps how many of them run at once; results come back in
//! completion order, which has no relation to submission order.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

use crate::utils::default_pool_size;

#[derive(Clone, Debug)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// A pool running at most `size` tasks at a time. A size of zero is
    /// treated as one.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// An empty set of tasks sharing this pool's concurrency limit.
    pub fn task_set<T: Send + 'static>(&self) -> TaskSet<T> {
        TaskSet {
            permits: Arc::clone(&self.permits),
            tasks: JoinSet::new(),
        }
    }

    /// Submit `f(input)` for every input.
    pub fn map_unordered<I, T, F>(&self, inputs: I, f: F) -> TaskSet<T>
    where
        I: IntoIterator,
        I::Item: Send + 'static,
        T: Send + 'static,
        F: Fn(I::Item) -> T + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let mut set = self.task_set();
        for input in inputs {
            let f = Arc::clone(&f);
            set.submit(move || f(input));
        }
        set
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(default_pool_size())
    }
}

/// Tasks submitted to a [`WorkerPool`] whose results have not been taken.
///
/// Dropping the set aborts every task that has not started running. Tasks
/// already running finish in the background and keep their worker until
/// they do.
pub struct TaskSet<T> {
    permits: Arc<Semaphore>,
    tasks: JoinSet<Result<T, JoinError>>,
}

impl<T: Send + 'static> TaskSet<T> {
    /// Queue `task`. It starts as soon as the pool has a free worker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit<F>(&mut self, task: F)
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        self.tasks.spawn(async move {
            // The semaphore is never closed. The permit travels with the
            // blocking body so it outlives an aborted wrapper.
            let permit = permits.acquire_owned().await.ok();
            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                task()
            })
            .await
        });
    }

    /// Number of tasks whose result has not been taken yet.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for the next task to finish. `Err` means the task panicked or
    /// was cancelled. Returns `None` once every result has been taken.
    pub async fn next(&mut self) -> Option<Result<T, JoinError>> {
        let joined = self.tasks.join_next().await?;
        Some(joined.and_then(|inner| inner))
    }

    /// Wait for all remaining tasks, in completion order.
    pub async fn drain(mut self) -> Vec<Result<T, JoinError>> {
        let mut out = Vec::with_capacity(self.len());
        while let Some(result) = self.next().await {
            out.push(result);
        }
        out
    }
}
