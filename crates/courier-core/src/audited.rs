use std::sync::Arc;

use courier_store::{write_one, AuditLogEntry, AuditSink};
use serde_json::{Map, Value};
use tracing::{debug, error};
use uuid::Uuid;

use crate::provider::{ExecuteFuture, Executor};
use crate::{ExecutionOutcome, ProviderId};

/// Task and attempt an execution belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptContext {
    pub task_id: Uuid,
    /// 1-based.
    pub attempt: u32,
}

/// Executor decorator that persists every outcome to the audit log.
///
/// Each `execute` call opens a fresh scope on the sink. Persistence
/// failures are rolled back and logged; the wrapped executor's outcome is
/// always returned unchanged.
pub struct AuditedExecutor {
    inner: Arc<dyn Executor>,
    sink: Arc<dyn AuditSink>,
    context: Option<AttemptContext>,
}

impl AuditedExecutor {
    pub fn new(inner: Arc<dyn Executor>, sink: Arc<dyn AuditSink>) -> Self {
        Self {
            inner,
            sink,
            context: None,
        }
    }

    pub fn for_attempt(mut self, task_id: Uuid, attempt: u32) -> Self {
        self.context = Some(AttemptContext { task_id, attempt });
        self
    }

    async fn persist(&self, entry: AuditLogEntry) {
        let sink = Arc::clone(&self.sink);
        let provider = entry.provider.clone();
        let entry_id = entry.entry_id;

        let written = tokio::task::spawn_blocking(move || {
            let mut scope = sink.scope();
            write_one(scope.as_mut(), &entry)
        })
        .await;

        match written {
            Ok(Ok(())) => debug!(%provider, %entry_id, "audit entry committed"),
            Ok(Err(error)) => {
                error!(%provider, %entry_id, error = %error, "failed to persist audit entry")
            }
            Err(error) => {
                error!(%provider, %entry_id, error = %error, "audit writer task failed")
            }
        }
    }
}

impl Executor for AuditedExecutor {
    fn name(&self) -> &ProviderId {
        self.inner.name()
    }

    fn execute<'a>(&'a self, params: &'a Map<String, Value>) -> ExecuteFuture<'a> {
        Box::pin(async move {
            let outcome = self.inner.execute(params).await;
            self.persist(audit_entry(&outcome, self.context)).await;
            outcome
        })
    }
}

/// Audit row for one outcome.
pub fn audit_entry(outcome: &ExecutionOutcome, context: Option<AttemptContext>) -> AuditLogEntry {
    let mut entry = AuditLogEntry::new(
        outcome.provider().as_str(),
        outcome.is_success(),
        outcome.response_time_ms(),
    );
    if let Some(context) = context {
        entry = entry.with_task(context.task_id, context.attempt);
    }
    if let Some(code) = outcome.error_code() {
        entry = entry.with_failure(
            code,
            outcome.error_message().unwrap_or_default(),
            outcome.is_validation_error(),
        );
    }
    if let Some(data) = outcome.data() {
        entry = entry.with_data(data.clone());
    }
    entry
}
