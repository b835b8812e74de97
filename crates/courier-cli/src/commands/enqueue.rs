use std::process::ExitCode;

use courier_core::{EnqueueReceipt, PoolStats, ProviderId};
use courier_store::{AuditFilter, AuditLogEntry};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::cli::{Cli, EnqueueArgs};
use crate::commands::{exit_code_for, print_json, start_relay, AuditBackend};
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct EnqueueSummary {
    receipt: EnqueueReceipt,
    /// Attempts for this task, oldest first.
    attempts: Vec<AuditLogEntry>,
    stats: PoolStats,
}

pub async fn execute(cli: &Cli, args: &EnqueueArgs) -> Result<ExitCode, CliError> {
    let provider = ProviderId::parse(&args.provider)?;
    let params = build_params(args.params_json.as_deref(), &args.params)?;

    let audit = AuditBackend::open(cli)?;
    let relay = start_relay(cli, &audit)?;
    let receipt = relay.enqueue(provider, params, args.retry)?;
    relay.drain().await;
    let stats = relay.shutdown().await;

    let filter = AuditFilter {
        provider: None,
        task_id: Some(receipt.task_id),
    };
    let mut attempts = audit.recent(&filter, 64)?;
    attempts.reverse();

    print_json(
        &EnqueueSummary {
            receipt,
            attempts,
            stats,
        },
        cli.pretty,
    )?;
    Ok(exit_code_for(&stats))
}

/// `--params-json` first, then each `--param key=value` as a string value.
fn build_params(
    params_json: Option<&str>,
    pairs: &[String],
) -> Result<Map<String, Value>, CliError> {
    let mut params = match params_json {
        None => Map::new(),
        Some(raw) => match serde_json::from_str::<Value>(raw)? {
            Value::Object(map) => map,
            _ => {
                return Err(CliError::InvalidArgument(String::from(
                    "--params-json must be a JSON object",
                )))
            }
        },
    };

    for pair in pairs {
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            CliError::InvalidArgument(format!("expected KEY=VALUE, got '{pair}'"))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(CliError::InvalidArgument(format!("empty key in '{pair}'")));
        }
        params.insert(key.to_owned(), Value::String(value.to_owned()));
    }

    Ok(params)
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use serde_json::json;

    use super::*;

    #[test]
    fn pairs_override_json_params() {
        let params = build_params(
            Some(r#"{"user_id":"1","link_url":"https://example.com"}"#),
            &[String::from("user_id=2"), String::from("message=a=b")],
        )
        .expect("params");

        assert_eq!(
            Value::Object(params),
            json!({ "user_id": "2", "link_url": "https://example.com", "message": "a=b" })
        );
    }

    #[test]
    fn rejects_pairs_without_separator() {
        let error = build_params(None, &[String::from("user_id")]).expect_err("no '='");
        assert!(matches!(error, CliError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn malformed_provider_id_is_rejected_before_enqueue() {
        let cli = Cli::try_parse_from([
            "courier",
            "--memory",
            "enqueue",
            "--provider",
            "Kakao-Profile",
        ])
        .expect("parse");
        let crate::cli::Command::Enqueue(args) = &cli.command else {
            panic!("expected enqueue");
        };

        let error = execute(&cli, args).await.expect_err("invalid id");

        assert!(matches!(error, CliError::Registry(_)));
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn rejects_non_object_json() {
        let error = build_params(Some("[1, 2]"), &[]).expect_err("array");
        assert!(matches!(error, CliError::InvalidArgument(_)));
    }
}
