use std::sync::{Arc, Mutex};

use crate::{AuditFilter, AuditLogEntry, AuditScope, AuditSink, StoreError};

/// In-process audit backend.
///
/// Pending entries become visible only when their scope commits, matching
/// the `DuckDB` backend.
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditStore {
    committed: Arc<Mutex<Vec<AuditLogEntry>>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed entries in insertion order.
    pub fn entries(&self) -> Vec<AuditLogEntry> {
        self.committed
            .lock()
            .expect("memory audit store mutex poisoned")
            .clone()
    }

    /// Committed entries matching `filter`, newest first.
    pub fn recent(&self, filter: &AuditFilter, limit: usize) -> Vec<AuditLogEntry> {
        self.entries()
            .into_iter()
            .rev()
            .filter(|entry| filter.matches(entry))
            .take(limit)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.committed
            .lock()
            .expect("memory audit store mutex poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditStore {
    fn scope(&self) -> Box<dyn AuditScope> {
        Box::new(MemoryScope {
            committed: Arc::clone(&self.committed),
            pending: None,
        })
    }
}

struct MemoryScope {
    committed: Arc<Mutex<Vec<AuditLogEntry>>>,
    pending: Option<Vec<AuditLogEntry>>,
}

impl AuditScope for MemoryScope {
    fn begin(&mut self) -> Result<(), StoreError> {
        if self.pending.is_some() {
            return Err(StoreError::Transaction(String::from(
                "scope already has an open transaction",
            )));
        }
        self.pending = Some(Vec::new());
        Ok(())
    }

    fn append(&mut self, entry: &AuditLogEntry) -> Result<(), StoreError> {
        let pending = self
            .pending
            .as_mut()
            .ok_or_else(|| StoreError::Transaction(String::from("append outside a transaction")))?;
        pending.push(entry.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        let pending = self
            .pending
            .take()
            .ok_or_else(|| StoreError::Transaction(String::from("commit outside a transaction")))?;
        self.committed
            .lock()
            .map_err(|_| StoreError::Transaction(String::from("memory audit store poisoned")))?
            .extend(pending);
        Ok(())
    }

    fn rollback(&mut self) {
        self.pending = None;
    }
}
