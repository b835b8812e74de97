use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

/// One persisted execution attempt.
///
/// Rows are append-only: this crate never updates or deletes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub entry_id: Uuid,
    /// Task the attempt belongs to, when it ran under a worker.
    pub task_id: Option<Uuid>,
    /// 1-based attempt number within the task.
    pub attempt: Option<u32>,
    pub provider: String,
    pub success: bool,
    pub is_validation_error: bool,
    /// Stable failure code such as `provider.timeout`.
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub response_time_ms: f64,
    pub data: Option<Map<String, Value>>,
    /// RFC 3339 UTC timestamp of when the entry was built.
    pub recorded_at: String,
}

impl AuditLogEntry {
    /// Create an entry stamped with a fresh id and the current UTC time.
    pub fn new(provider: impl Into<String>, success: bool, response_time_ms: f64) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            task_id: None,
            attempt: None,
            provider: provider.into(),
            success,
            is_validation_error: false,
            error_code: None,
            error_message: None,
            response_time_ms,
            data: None,
            recorded_at: now_rfc3339(),
        }
    }

    pub fn with_task(mut self, task_id: Uuid, attempt: u32) -> Self {
        self.task_id = Some(task_id);
        self.attempt = Some(attempt);
        self
    }

    pub fn with_failure(
        mut self,
        code: impl Into<String>,
        message: impl Into<String>,
        is_validation_error: bool,
    ) -> Self {
        self.error_code = Some(code.into());
        self.error_message = Some(message.into());
        self.is_validation_error = is_validation_error;
        self
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = Some(data);
        self
    }
}

/// Filter for audit log reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditFilter {
    pub provider: Option<String>,
    pub task_id: Option<Uuid>,
}

impl AuditFilter {
    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        if let Some(provider) = &self.provider {
            if &entry.provider != provider {
                return false;
            }
        }
        if let Some(task_id) = self.task_id {
            if entry.task_id != Some(task_id) {
                return false;
            }
        }
        true
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
