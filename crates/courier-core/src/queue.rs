use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as SyncMutex};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::{mpsc, Mutex, Notify};
use uuid::Uuid;

use crate::error::RelayError;
use crate::ProviderId;

/// A unit of work waiting for a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPayload {
    #[serde(default = "Uuid::new_v4")]
    pub task_id: Uuid,
    pub provider: ProviderId,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default)]
    pub should_retry: bool,
}

impl TaskPayload {
    pub fn new(provider: ProviderId, params: Map<String, Value>, should_retry: bool) -> Self {
        Self {
            task_id: Uuid::new_v4(),
            provider,
            params,
            should_retry,
        }
    }
}

/// Unbounded FIFO shared by producers and the worker pool.
///
/// Every enqueued payload counts as unfinished until the [`QueuedTask`]
/// handed out for it is dropped.
pub struct TaskQueue {
    sender: SyncMutex<Option<mpsc::UnboundedSender<TaskPayload>>>,
    receiver: Mutex<mpsc::UnboundedReceiver<TaskPayload>>,
    depth: AtomicUsize,
    unfinished: AtomicUsize,
    idle: Notify,
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender: SyncMutex::new(Some(sender)),
            receiver: Mutex::new(receiver),
            depth: AtomicUsize::new(0),
            unfinished: AtomicUsize::new(0),
            idle: Notify::new(),
        }
    }

    /// Append a payload and return the queue depth after insertion.
    pub fn enqueue(&self, payload: TaskPayload) -> Result<usize, RelayError> {
        let sender = self.sender.lock().map_err(|_| RelayError::Closed)?;
        let Some(sender) = sender.as_ref() else {
            return Err(RelayError::Closed);
        };

        self.unfinished.fetch_add(1, Ordering::AcqRel);
        let depth = self.depth.fetch_add(1, Ordering::AcqRel) + 1;
        if sender.send(payload).is_err() {
            self.depth.fetch_sub(1, Ordering::AcqRel);
            self.task_done();
            return Err(RelayError::Closed);
        }
        Ok(depth)
    }

    /// Wait for the next payload. Returns `None` only once the queue is closed
    /// and empty.
    pub async fn dequeue(self: &Arc<Self>) -> Option<QueuedTask> {
        let mut receiver = self.receiver.lock().await;
        let payload = receiver.recv().await?;
        self.depth.fetch_sub(1, Ordering::AcqRel);

        Some(QueuedTask {
            payload,
            queue: Arc::clone(self),
        })
    }

    /// Payloads waiting to be picked up.
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Payloads enqueued but not yet acknowledged.
    pub fn unfinished(&self) -> usize {
        self.unfinished.load(Ordering::Acquire)
    }

    /// Refuse further payloads. Already queued payloads stay deliverable;
    /// once they are gone `dequeue` yields `None`.
    pub fn close(&self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
    }

    /// Wait until every enqueued payload has been acknowledged.
    pub async fn join(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.unfinished() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn task_done(&self) {
        let previous = self.unfinished.fetch_sub(1, Ordering::AcqRel);
        if previous == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// A dequeued payload. Dropping it acknowledges the task.
pub struct QueuedTask {
    payload: TaskPayload,
    queue: Arc<TaskQueue>,
}

impl QueuedTask {
    pub fn payload(&self) -> &TaskPayload {
        &self.payload
    }
}

impl Drop for QueuedTask {
    fn drop(&mut self) {
        self.queue.task_done();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn payload(label: &str) -> TaskPayload {
        let mut params = Map::new();
        params.insert(String::from("label"), Value::from(label));
        TaskPayload::new(
            ProviderId::parse("kakao_profile").expect("valid id"),
            params,
            false,
        )
    }

    #[tokio::test]
    async fn delivers_in_enqueue_order_and_tracks_depth() {
        let queue = Arc::new(TaskQueue::new());

        assert_eq!(queue.enqueue(payload("first")).expect("enqueue"), 1);
        assert_eq!(queue.enqueue(payload("second")).expect("enqueue"), 2);

        let first = queue.dequeue().await.expect("first");
        assert_eq!(first.payload().params["label"], "first");
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.unfinished(), 2);

        drop(first);
        assert_eq!(queue.unfinished(), 1);

        let second = queue.dequeue().await.expect("second");
        assert_eq!(second.payload().params["label"], "second");
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn join_waits_for_acknowledgement() {
        let queue = Arc::new(TaskQueue::new());
        queue.enqueue(payload("only")).expect("enqueue");

        let task = queue.dequeue().await.expect("task");
        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.join().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(task);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("join finished")
            .expect("join task");
        assert_eq!(queue.unfinished(), 0);
    }

    #[tokio::test]
    async fn dequeue_waits_for_a_payload() {
        let queue = Arc::new(TaskQueue::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                let task = queue.dequeue().await.expect("task");
                task.payload().params["label"].clone()
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!consumer.is_finished());

        queue.enqueue(payload("late")).expect("enqueue");
        assert_eq!(consumer.await.expect("consumer"), "late");
    }

    #[test]
    fn closed_queue_rejects_payloads() {
        let queue = TaskQueue::new();
        queue.close();

        assert!(matches!(queue.enqueue(payload("x")), Err(RelayError::Closed)));
        assert_eq!(queue.unfinished(), 0);
    }

    #[tokio::test]
    async fn closed_queue_drains_then_ends() {
        let queue = Arc::new(TaskQueue::new());
        queue.enqueue(payload("queued")).expect("enqueue");
        queue.close();

        let task = queue.dequeue().await.expect("queued payload survives close");
        assert_eq!(task.payload().params["label"], "queued");
        assert!(queue.dequeue().await.is_none());
    }

    #[test]
    fn payload_deserializes_with_defaults() {
        let payload: TaskPayload = serde_json::from_str(
            r#"{"provider":"kakao_profile","params":{"user_id":"1"}}"#,
        )
        .expect("payload");

        assert!(!payload.should_retry);
        assert_eq!(payload.params["user_id"], "1");
    }
}
