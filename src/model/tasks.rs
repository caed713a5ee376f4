//! Side-effect tasks queued by a model (typically from setters) that must finish before its next read or write.

use crate::error::AppError;
use std::future::Future;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
pub struct TaskQueue {
    pending: Vec<JoinHandle<Result<(), AppError>>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        TaskQueue::default()
    }

    /// Spawn `task` now; its outcome is collected by the next [`TaskQueue::drain`].
    pub fn push<F>(&mut self, task: F)
    where
        F: Future<Output = Result<(), AppError>> + Send + 'static,
    {
        self.pending.push(tokio::spawn(task));
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Wait for every queued task. All tasks are awaited; the first failure is returned.
    pub async fn drain(&mut self) -> Result<(), AppError> {
        let mut first_err = None;
        for handle in std::mem::take(&mut self.pending) {
            let outcome = match handle.await {
                Ok(res) => res,
                Err(join) => Err(AppError::Internal(format!("side effect task failed: {join}"))),
            };
            if let Err(e) = outcome {
                tracing::error!(target: "api_kit::model", error = %e, "side effect task failed");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}
