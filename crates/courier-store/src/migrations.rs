use ::duckdb::Connection;

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_external_api_log",
        sql: r#"
CREATE SEQUENCE IF NOT EXISTS external_api_log_seq;

CREATE TABLE IF NOT EXISTS external_api_log (
    seq BIGINT NOT NULL DEFAULT nextval('external_api_log_seq'),
    entry_id TEXT NOT NULL,
    task_id TEXT,
    attempt INTEGER,
    provider TEXT NOT NULL,
    success BOOLEAN NOT NULL,
    is_validation_error BOOLEAN NOT NULL,
    error_code TEXT,
    error_message TEXT,
    response_time_ms DOUBLE NOT NULL,
    data TEXT,
    recorded_at TEXT NOT NULL
);
"#,
    },
    Migration {
        version: "0002_external_api_log_indexes",
        sql: r#"
CREATE INDEX IF NOT EXISTS idx_external_api_log_provider ON external_api_log(provider);
CREATE INDEX IF NOT EXISTS idx_external_api_log_task ON external_api_log(task_id);
"#,
    },
];

pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let applied_count: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            [migration.version],
            |row| row.get(0),
        )?;

        if applied_count == 0 {
            connection.execute_batch(migration.sql)?;
            connection.execute(
                "INSERT INTO schema_migrations (version) VALUES (?)",
                [migration.version],
            )?;
        }
    }

    Ok(())
}
