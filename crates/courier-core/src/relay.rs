use std::sync::Arc;

use courier_store::AuditSink;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::queue::{TaskPayload, TaskQueue};
use crate::registry::ProviderRegistry;
use crate::worker::{PoolStats, WorkerPool};
use crate::ProviderId;

/// Acknowledgement handed back to a producer. Says nothing about the call's
/// eventual result, which is only observable through the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnqueueReceipt {
    pub task_id: Uuid,
    pub queue_depth: usize,
}

/// Running relay: one queue feeding a worker pool.
pub struct Relay {
    queue: Arc<TaskQueue>,
    registry: Arc<ProviderRegistry>,
    pool: WorkerPool,
}

impl Relay {
    /// Start the worker pool on the current tokio runtime.
    pub fn start(
        config: &RelayConfig,
        registry: ProviderRegistry,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let queue = Arc::new(TaskQueue::new());
        let registry = Arc::new(registry);
        let pool = WorkerPool::start(
            config.workers,
            Arc::clone(&queue),
            Arc::clone(&registry),
            audit,
            config.retry.clone(),
        );
        info!(
            workers = pool.worker_count(),
            providers = ?registry.ids(),
            "relay started"
        );

        Self {
            queue,
            registry,
            pool,
        }
    }

    /// Place a task on the queue and return immediately.
    pub fn enqueue(
        &self,
        provider: ProviderId,
        params: Map<String, Value>,
        should_retry: bool,
    ) -> Result<EnqueueReceipt, RelayError> {
        self.submit(TaskPayload::new(provider, params, should_retry))
    }

    pub fn submit(&self, payload: TaskPayload) -> Result<EnqueueReceipt, RelayError> {
        let task_id = payload.task_id;
        let provider = payload.provider.clone();
        let queue_depth = self.queue.enqueue(payload)?;
        debug!(%task_id, %provider, queue_depth, "task enqueued");

        Ok(EnqueueReceipt {
            task_id,
            queue_depth,
        })
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Wait until every task enqueued so far has been acknowledged.
    pub async fn drain(&self) {
        self.queue.join().await;
    }

    /// Stop accepting tasks, cancel the workers and wait for them, then
    /// release the shared HTTP client. Queued tasks that were never picked
    /// up are dropped.
    pub async fn shutdown(self) -> PoolStats {
        self.queue.close();
        let stats = self.pool.shutdown().await;
        self.registry.http_client().close();

        let abandoned = self.queue.len();
        info!(abandoned, "relay stopped");
        stats
    }
}
