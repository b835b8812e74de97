use ::duckdb::{Row, ToSql};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::duckdb::{DuckDbConnectionManager, PooledConnection};
use crate::{migrations, AuditFilter, AuditLogEntry, AuditScope, AuditSink, StoreError};

const SELECT_COLUMNS: &str = "entry_id, task_id, attempt, provider, success, is_validation_error, \
     error_code, error_message, response_time_ms, data, recorded_at";

/// `DuckDB`-backed audit log.
#[derive(Clone)]
pub struct DuckDbAuditStore {
    manager: DuckDbConnectionManager,
}

impl DuckDbAuditStore {
    pub(crate) fn from_manager(manager: DuckDbConnectionManager) -> Result<Self, StoreError> {
        let store = Self { manager };
        store.initialize()?;
        Ok(store)
    }

    fn initialize(&self) -> Result<(), StoreError> {
        let connection = self.manager.acquire()?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    pub fn manager(&self) -> &DuckDbConnectionManager {
        &self.manager
    }

    /// Entries matching `filter`, newest first.
    pub fn recent(
        &self,
        filter: &AuditFilter,
        limit: usize,
    ) -> Result<Vec<AuditLogEntry>, StoreError> {
        let (where_sql, values) = where_clause(filter);
        // DuckDB limits are BIGINT.
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM external_api_log{where_sql} \
             ORDER BY seq DESC LIMIT {limit}"
        );
        let params: Vec<&dyn ToSql> = values.iter().map(|value| value as &dyn ToSql).collect();

        let connection = self.manager.acquire()?;
        let mut statement = connection.prepare(sql.as_str())?;
        let mut rows = statement.query(params.as_slice())?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(read_entry(row)?);
        }
        Ok(entries)
    }

    pub fn count(&self, filter: &AuditFilter) -> Result<usize, StoreError> {
        let (where_sql, values) = where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM external_api_log{where_sql}");
        let params: Vec<&dyn ToSql> = values.iter().map(|value| value as &dyn ToSql).collect();

        let connection = self.manager.acquire()?;
        let count: i64 = connection.query_row(sql.as_str(), params.as_slice(), |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

impl AuditSink for DuckDbAuditStore {
    fn scope(&self) -> Box<dyn AuditScope> {
        Box::new(DuckDbScope {
            manager: self.manager.clone(),
            connection: None,
        })
    }
}

struct DuckDbScope {
    manager: DuckDbConnectionManager,
    connection: Option<PooledConnection>,
}

impl DuckDbScope {
    fn open_connection(&self) -> Result<&PooledConnection, StoreError> {
        self.connection
            .as_ref()
            .ok_or_else(|| StoreError::Transaction(String::from("no open transaction")))
    }
}

impl AuditScope for DuckDbScope {
    fn begin(&mut self) -> Result<(), StoreError> {
        if self.connection.is_some() {
            return Err(StoreError::Transaction(String::from(
                "scope already has an open transaction",
            )));
        }
        let connection = self.manager.acquire()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        self.connection = Some(connection);
        Ok(())
    }

    fn append(&mut self, entry: &AuditLogEntry) -> Result<(), StoreError> {
        let connection = self.open_connection()?;

        let entry_id = entry.entry_id.to_string();
        let task_id = entry.task_id.map(|id| id.to_string());
        let data = entry
            .data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        // All values go through parameters; provider payloads are untrusted.
        let params: [&dyn ToSql; 11] = [
            &entry_id,
            &task_id,
            &entry.attempt,
            &entry.provider,
            &entry.success,
            &entry.is_validation_error,
            &entry.error_code,
            &entry.error_message,
            &entry.response_time_ms,
            &data,
            &entry.recorded_at,
        ];
        connection.execute(
            "INSERT INTO external_api_log \
             (entry_id, task_id, attempt, provider, success, is_validation_error, \
              error_code, error_message, response_time_ms, data, recorded_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params.as_slice(),
        )?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        let connection = self
            .connection
            .take()
            .ok_or_else(|| StoreError::Transaction(String::from("no open transaction")))?;
        if let Err(error) = connection.execute_batch("COMMIT") {
            let _ = connection.execute_batch("ROLLBACK");
            return Err(error.into());
        }
        Ok(())
    }

    fn rollback(&mut self) {
        if let Some(connection) = self.connection.take() {
            let _ = connection.execute_batch("ROLLBACK");
        }
    }
}

impl Drop for DuckDbScope {
    fn drop(&mut self) {
        self.rollback();
    }
}

fn where_clause(filter: &AuditFilter) -> (String, Vec<String>) {
    let mut clauses = Vec::new();
    let mut values = Vec::new();
    if let Some(provider) = &filter.provider {
        clauses.push("provider = ?");
        values.push(provider.clone());
    }
    if let Some(task_id) = filter.task_id {
        clauses.push("task_id = ?");
        values.push(task_id.to_string());
    }

    if clauses.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), values)
    }
}

fn read_entry(row: &Row<'_>) -> Result<AuditLogEntry, StoreError> {
    let entry_id: String = row.get(0)?;
    let task_id: Option<String> = row.get(1)?;
    let data: Option<String> = row.get(9)?;

    Ok(AuditLogEntry {
        entry_id: parse_uuid(&entry_id)?,
        task_id: task_id.as_deref().map(parse_uuid).transpose()?,
        attempt: row.get(2)?,
        provider: row.get(3)?,
        success: row.get(4)?,
        is_validation_error: row.get(5)?,
        error_code: row.get(6)?,
        error_message: row.get(7)?,
        response_time_ms: row.get(8)?,
        data: data.as_deref().map(parse_data).transpose()?,
        recorded_at: row.get(10)?,
    })
}

fn parse_uuid(value: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(value)
        .map_err(|error| StoreError::InvalidData(format!("bad uuid '{value}': {error}")))
}

fn parse_data(value: &str) -> Result<Map<String, Value>, StoreError> {
    match serde_json::from_str(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidData(format!(
            "audit data must be a JSON object, found {other}"
        ))),
    }
}
