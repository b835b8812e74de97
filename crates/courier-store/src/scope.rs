//! Scoped-transaction contract shared by every audit backend.

use crate::{AuditLogEntry, StoreError};

/// A backend able to hand out independent transactional scopes.
///
/// Opening a scope must be cheap and must not touch the backend; the first
/// backend round-trip happens in [`AuditScope::begin`]. Implementations are
/// shared across workers.
pub trait AuditSink: Send + Sync {
    /// Create a fresh scope. Scopes are never shared or nested.
    fn scope(&self) -> Box<dyn AuditScope>;
}

/// One transaction against an audit backend.
///
/// The calls are blocking; async callers run them on a blocking thread.
/// A scope dropped without `commit` discards everything appended to it.
pub trait AuditScope: Send {
    fn begin(&mut self) -> Result<(), StoreError>;

    fn append(&mut self, entry: &AuditLogEntry) -> Result<(), StoreError>;

    fn commit(&mut self) -> Result<(), StoreError>;

    /// Roll back whatever is pending. Never fails; a scope that was not
    /// begun is a no-op.
    fn rollback(&mut self);
}

/// Begin, append one entry and commit, rolling back on any failure.
pub fn write_one(scope: &mut dyn AuditScope, entry: &AuditLogEntry) -> Result<(), StoreError> {
    let result = scope
        .begin()
        .and_then(|()| scope.append(entry))
        .and_then(|()| scope.commit());

    if result.is_err() {
        scope.rollback();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AuditFilter;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Stage {
        Begin,
        Append,
        Commit,
    }

    /// Fails at one stage and counts every call it receives.
    #[derive(Default)]
    struct CountingScope {
        fail_at: Option<Stage>,
        begins: usize,
        appends: usize,
        commits: usize,
        rollbacks: usize,
    }

    impl CountingScope {
        fn failing_at(stage: Stage) -> Self {
            Self {
                fail_at: Some(stage),
                ..Self::default()
            }
        }

        fn step(&self, stage: Stage) -> Result<(), StoreError> {
            if self.fail_at == Some(stage) {
                Err(StoreError::Transaction(format!("{stage:?} refused")))
            } else {
                Ok(())
            }
        }
    }

    impl AuditScope for CountingScope {
        fn begin(&mut self) -> Result<(), StoreError> {
            self.begins += 1;
            self.step(Stage::Begin)
        }

        fn append(&mut self, _entry: &AuditLogEntry) -> Result<(), StoreError> {
            self.appends += 1;
            self.step(Stage::Append)
        }

        fn commit(&mut self) -> Result<(), StoreError> {
            self.commits += 1;
            self.step(Stage::Commit)
        }

        fn rollback(&mut self) {
            self.rollbacks += 1;
        }
    }

    fn entry() -> AuditLogEntry {
        AuditLogEntry::new("kakao_profile", false, 1.0)
    }

    #[test]
    fn successful_write_never_rolls_back() {
        let mut scope = CountingScope::default();

        write_one(&mut scope, &entry()).expect("write");

        assert_eq!((scope.begins, scope.appends, scope.commits), (1, 1, 1));
        assert_eq!(scope.rollbacks, 0);
    }

    #[test]
    fn failed_append_rolls_back_once_and_skips_commit() {
        let mut scope = CountingScope::failing_at(Stage::Append);

        let error = write_one(&mut scope, &entry()).expect_err("append fails");

        assert!(matches!(error, StoreError::Transaction(_)));
        assert_eq!(scope.commits, 0);
        assert_eq!(scope.rollbacks, 1);
    }

    #[test]
    fn failed_commit_rolls_back_once() {
        let mut scope = CountingScope::failing_at(Stage::Commit);

        write_one(&mut scope, &entry()).expect_err("commit fails");

        assert_eq!(scope.commits, 1);
        assert_eq!(scope.rollbacks, 1);
    }

    #[test]
    fn failed_begin_rolls_back_once_and_appends_nothing() {
        let mut scope = CountingScope::failing_at(Stage::Begin);

        write_one(&mut scope, &entry()).expect_err("begin fails");

        assert_eq!((scope.appends, scope.commits), (0, 0));
        assert_eq!(scope.rollbacks, 1);
    }

    /// Real `DuckDB` scope whose commit is refused after the row was appended.
    struct RefusedCommit {
        inner: Box<dyn AuditScope>,
    }

    impl AuditScope for RefusedCommit {
        fn begin(&mut self) -> Result<(), StoreError> {
            self.inner.begin()
        }

        fn append(&mut self, entry: &AuditLogEntry) -> Result<(), StoreError> {
            self.inner.append(entry)
        }

        fn commit(&mut self) -> Result<(), StoreError> {
            Err(StoreError::Transaction(String::from("commit refused")))
        }

        fn rollback(&mut self) {
            self.inner.rollback();
        }
    }

    #[test]
    fn failed_duckdb_write_leaves_no_row() {
        let store = crate::open_in_memory().expect("in-memory store");
        let mut scope = RefusedCommit {
            inner: store.scope(),
        };

        write_one(&mut scope, &entry()).expect_err("commit refused");
        drop(scope);

        assert_eq!(store.count(&AuditFilter::default()).expect("count"), 0);
        write_one(store.scope().as_mut(), &entry()).expect("store still writable");
        assert_eq!(store.count(&AuditFilter::default()).expect("count"), 1);
    }
}
