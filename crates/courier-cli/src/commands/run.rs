use std::fs;
use std::process::ExitCode;

use courier_core::{EnqueueReceipt, PoolStats, TaskPayload};
use serde::Serialize;
use tracing::info;

use crate::cli::{Cli, RunArgs};
use crate::commands::{exit_code_for, print_json, start_relay, AuditBackend};
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct RunSummary {
    tasks: Vec<EnqueueReceipt>,
    stats: PoolStats,
}

pub async fn execute(cli: &Cli, args: &RunArgs) -> Result<ExitCode, CliError> {
    let contents = fs::read_to_string(&args.tasks)?;
    let payloads = parse_tasks(&contents)?;
    info!(path = %args.tasks.display(), tasks = payloads.len(), "loaded task file");

    let audit = AuditBackend::open(cli)?;
    let relay = start_relay(cli, &audit)?;

    let mut tasks = Vec::with_capacity(payloads.len());
    for payload in payloads {
        tasks.push(relay.submit(payload)?);
    }
    relay.drain().await;
    let stats = relay.shutdown().await;

    print_json(&RunSummary { tasks, stats }, cli.pretty)?;
    Ok(exit_code_for(&stats))
}

/// One task per line. Blank lines and `#` comments are skipped.
fn parse_tasks(contents: &str) -> Result<Vec<TaskPayload>, CliError> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            serde_json::from_str(line).map_err(|source| CliError::TaskFile {
                line: index + 1,
                source,
            })
        })
        .collect()
}
