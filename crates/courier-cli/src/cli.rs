//! CLI argument definitions for courier.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `run` | Relay every task in an NDJSON file, then shut down |
//! | `enqueue` | Relay a single task built from flags |
//! | `audit` | List recorded execution attempts |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--db` | `$COURIER_HOME/audit/audit.duckdb` | Audit database path |
//! | `--memory` | `false` | Keep the audit log in memory |
//! | `--base-url` | `https://kapi.kakao.com` | Kakao API host |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--log-json` | `false` | Emit logs as JSON lines |
//!
//! # Examples
//!
//! ```bash
//! courier enqueue --provider kakao_profile --param user_id=42 --param kakao_token=abc --retry
//! courier run --tasks tasks.ndjson --pretty
//! courier audit --provider kakao_profile --limit 5
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use courier_core::KAKAO_API_BASE_URL;

/// Asynchronous relay for third-party API calls with audited retries.
#[derive(Debug, Parser)]
#[command(name = "courier", author, version, about)]
pub struct Cli {
    /// Path to the DuckDB audit database.
    #[arg(long, global = true, conflicts_with = "memory")]
    pub db: Option<PathBuf>,

    /// Keep the audit log in memory for this invocation only.
    #[arg(long, global = true, default_value_t = false)]
    pub memory: bool,

    /// Base URL of the Kakao REST API.
    #[arg(long, global = true, default_value = KAKAO_API_BASE_URL)]
    pub base_url: String,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Emit logs as JSON lines instead of human-readable text.
    #[arg(long, global = true, default_value_t = false)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Relay every task of an NDJSON file and wait for all of them.
    ///
    /// Each line is a JSON object with `provider`, `params` and an optional
    /// `should_retry` and `task_id`.
    Run(RunArgs),

    /// Relay one task and wait for it.
    Enqueue(EnqueueArgs),

    /// List recorded execution attempts, newest first.
    Audit(AuditArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// NDJSON file of task payloads.
    #[arg(long)]
    pub tasks: PathBuf,
}

#[derive(Debug, Args)]
pub struct EnqueueArgs {
    /// Registered provider identifier (e.g. kakao_profile).
    #[arg(long)]
    pub provider: String,

    /// Request parameter as key=value. Repeatable.
    #[arg(long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Request parameters as a JSON object, merged before `--param` values.
    #[arg(long, value_name = "JSON")]
    pub params_json: Option<String>,

    /// Retry transient failures with exponential backoff.
    #[arg(long, default_value_t = false)]
    pub retry: bool,
}

#[derive(Debug, Args)]
pub struct AuditArgs {
    /// Only entries for this provider.
    #[arg(long)]
    pub provider: Option<String>,

    /// Only entries for this task id.
    #[arg(long)]
    pub task: Option<String>,

    /// Maximum number of entries to return.
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}
