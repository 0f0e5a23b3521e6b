//! Task queue feeding the ingestion provider.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::observability::metrics;

/// Default queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// A unit of work for the provider: one payload to advertise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    /// Where the payload came from (e.g. the monitor's data URL).
    pub source: String,
    pub payload: serde_json::Value,
}

impl Task {
    pub fn new(source: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            payload,
        }
    }
}

#[derive(Debug, Error)]
#[error("task queue is closed")]
pub struct QueueClosed(pub Task);

/// Sending half of the provider's task queue. Cheap to clone.
#[derive(Clone, Debug)]
pub struct TaskQueue {
    tx: mpsc::Sender<Task>,
}

impl TaskQueue {
    /// Create a queue and its receiving half.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Task>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Enqueue a task, waiting for capacity. Fails once the provider has closed.
    pub async fn push(&self, task: Task) -> Result<(), QueueClosed> {
        let source = task.source.clone();
        self.tx.send(task).await.map_err(|e| QueueClosed(e.0))?;
        metrics::record_task_enqueued(&source);
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_push_and_receive() {
        let (queue, mut rx) = TaskQueue::channel(4);
        let task = Task::new("test", serde_json::json!({"n": 1}));
        queue.push(task.clone()).await.unwrap();
        assert_eq!(rx.recv().await, Some(task));
    }

    #[tokio::test]
    async fn test_push_after_close_returns_task() {
        let (queue, rx) = TaskQueue::channel(4);
        drop(rx);
        assert!(queue.is_closed());

        let err = queue.push(Task::new("test", serde_json::Value::Null)).await.unwrap_err();
        assert_eq!(err.0.source, "test");
    }
}
