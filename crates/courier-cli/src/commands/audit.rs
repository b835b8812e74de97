use std::process::ExitCode;

use courier_store::AuditFilter;
use uuid::Uuid;

use crate::cli::{AuditArgs, Cli};
use crate::commands::{print_json, AuditBackend};
use crate::error::CliError;

/// With `--memory` the log starts empty, so this only makes sense against a
/// database file.
pub fn execute(cli: &Cli, args: &AuditArgs) -> Result<ExitCode, CliError> {
    let task_id = args
        .task
        .as_deref()
        .map(Uuid::parse_str)
        .transpose()
        .map_err(|error| CliError::InvalidArgument(format!("--task: {error}")))?;
    let filter = AuditFilter {
        provider: args.provider.clone(),
        task_id,
    };

    let audit = AuditBackend::open(cli)?;
    let entries = audit.recent(&filter, args.limit)?;
    print_json(&entries, cli.pretty)?;
    Ok(ExitCode::SUCCESS)
}
