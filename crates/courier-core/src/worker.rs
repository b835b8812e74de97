//! Worker pool consuming the task queue.
//!
//! Every worker runs the same loop: wait for a payload, resolve its provider,
//! then run attempts until the retry policy says stop. Each attempt is
//! executed through an [`AuditedExecutor`] with a fresh audit scope. A
//! shared cancellation token interrupts workers waiting on the queue or
//! sleeping in backoff; an attempt already in flight finishes first.

use std::sync::{Arc, Mutex};

use courier_store::AuditSink;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::audited::AuditedExecutor;
use crate::provider::{panic_message, Executor};
use crate::queue::{TaskPayload, TaskQueue};
use crate::registry::ProviderRegistry;
use crate::retry::{RetryConfig, RetryDecision, StopReason};

/// Counters maintained across every worker of a pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Tasks taken off the queue and finished, whatever the result.
    pub processed: u64,
    pub succeeded: u64,
    pub validation_failed: u64,
    /// Tasks whose every allowed attempt failed, or whose failure kind is
    /// excluded from retrying.
    pub exhausted: u64,
    /// Tasks naming a provider that is not registered.
    pub discarded: u64,
    /// Tasks abandoned during backoff because the pool was shutting down.
    pub cancelled: u64,
    /// Tasks whose processing panicked outside the execution pipeline.
    pub faulted: u64,
    /// Execution attempts across all tasks.
    pub attempts: u64,
}

/// Terminal state of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TaskState {
    Succeeded,
    ValidationFailed,
    Exhausted,
    UnknownProvider,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TaskReport {
    attempts: u32,
    state: TaskState,
}

struct WorkerContext {
    queue: Arc<TaskQueue>,
    registry: Arc<ProviderRegistry>,
    audit: Arc<dyn AuditSink>,
    retry: RetryConfig,
    cancel: CancellationToken,
    stats: Mutex<PoolStats>,
}

impl WorkerContext {
    fn record(&self, report: &TaskReport) {
        let mut stats = self.stats.lock().expect("pool stats mutex poisoned");
        stats.processed += 1;
        stats.attempts += u64::from(report.attempts);
        match report.state {
            TaskState::Succeeded => stats.succeeded += 1,
            TaskState::ValidationFailed => stats.validation_failed += 1,
            TaskState::Exhausted => stats.exhausted += 1,
            TaskState::UnknownProvider => stats.discarded += 1,
            TaskState::Cancelled => stats.cancelled += 1,
        }
    }

    fn record_fault(&self) {
        let mut stats = self.stats.lock().expect("pool stats mutex poisoned");
        stats.processed += 1;
        stats.faulted += 1;
    }
}

/// A fixed number of workers sharing one queue, registry and audit sink.
pub struct WorkerPool {
    context: Arc<WorkerContext>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `workers` loops on the current tokio runtime.
    pub fn start(
        workers: usize,
        queue: Arc<TaskQueue>,
        registry: Arc<ProviderRegistry>,
        audit: Arc<dyn AuditSink>,
        retry: RetryConfig,
    ) -> Self {
        let context = Arc::new(WorkerContext {
            queue,
            registry,
            audit,
            retry,
            cancel: CancellationToken::new(),
            stats: Mutex::new(PoolStats::default()),
        });

        let handles = (0..workers.max(1))
            .map(|worker| tokio::spawn(run_worker(worker, Arc::clone(&context))))
            .collect::<Vec<_>>();
        info!(workers = handles.len(), "worker pool started");

        Self { context, handles }
    }

    pub fn stats(&self) -> PoolStats {
        *self.context.stats.lock().expect("pool stats mutex poisoned")
    }

    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// Cancel every worker and wait for all of them to exit.
    pub async fn shutdown(self) -> PoolStats {
        self.context.cancel.cancel();
        for handle in self.handles {
            if let Err(error) = handle.await {
                error!(error = %error, "worker exited abnormally");
            }
        }

        let stats = *self.context.stats.lock().expect("pool stats mutex poisoned");
        info!(
            processed = stats.processed,
            succeeded = stats.succeeded,
            "worker pool stopped"
        );
        stats
    }
}

async fn run_worker(worker: usize, context: Arc<WorkerContext>) {
    debug!(worker, "worker started");

    loop {
        let task = tokio::select! {
            biased;
            () = context.cancel.cancelled() => break,
            task = context.queue.dequeue() => match task {
                Some(task) => task,
                None => break,
            },
        };

        let task_id = task.payload().task_id;
        let provider = task.payload().provider.clone();

        // Stats are recorded before the task guard drops so `join` observers
        // see them. A panic surfaces as a JoinError; the guard is dropped
        // during unwinding, so the queue is still acknowledged.
        let handle = tokio::spawn({
            let context = Arc::clone(&context);
            async move {
                let report = process_task(worker, &context, task.payload()).await;
                context.record(&report);
                drop(task);
            }
        });

        match handle.await {
            Ok(()) => {}
            Err(join_error) => {
                context.record_fault();
                let reason = if join_error.is_panic() {
                    panic_message(join_error.into_panic().as_ref()).to_owned()
                } else {
                    join_error.to_string()
                };
                error!(worker, %task_id, %provider, %reason, "task processing failed");
            }
        }
    }

    debug!(worker, "worker stopped");
}

async fn process_task(worker: usize, context: &WorkerContext, payload: &TaskPayload) -> TaskReport {
    let task_id = payload.task_id;
    let provider = &payload.provider;
    let report = |attempts, state| TaskReport { attempts, state };

    let Some(executor) = context.registry.get(provider) else {
        error!(worker, %task_id, %provider, "unknown provider; discarding task");
        return report(0, TaskState::UnknownProvider);
    };

    let max_attempts = context.retry.attempts_for(payload.should_retry);
    let mut attempt = 1;

    loop {
        let audited = AuditedExecutor::new(Arc::clone(&executor), Arc::clone(&context.audit))
            .for_attempt(task_id, attempt);
        let outcome = audited.execute(&payload.params).await;

        match context.retry.decide(&outcome, attempt, max_attempts) {
            RetryDecision::Stop(StopReason::Succeeded) => {
                info!(worker, %task_id, %provider, attempt, "task succeeded");
                return report(attempt, TaskState::Succeeded);
            }
            RetryDecision::Stop(StopReason::ValidationFailed) => {
                warn!(
                    worker, %task_id, %provider, attempt,
                    error = outcome.error_message().unwrap_or_default(),
                    "validation failed; not retrying"
                );
                return report(attempt, TaskState::ValidationFailed);
            }
            RetryDecision::Stop(reason) => {
                error!(
                    worker, %task_id, %provider, attempt, ?reason,
                    error = outcome.error_message().unwrap_or_default(),
                    "task failed"
                );
                return report(attempt, TaskState::Exhausted);
            }
            RetryDecision::Backoff(delay) => {
                let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                warn!(
                    worker, %task_id, %provider, attempt, delay_ms,
                    error = outcome.error_message().unwrap_or_default(),
                    "attempt failed; backing off"
                );

                tokio::select! {
                    biased;
                    () = context.cancel.cancelled() => {
                        info!(worker, %task_id, %provider, attempt, "cancelled during backoff");
                        return report(attempt, TaskState::Cancelled);
                    }
                    () = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
        }
    }
}
