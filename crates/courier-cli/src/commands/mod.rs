mod audit;
mod enqueue;
mod run;

use std::process::ExitCode;
use std::sync::Arc;

use courier_core::{PoolStats, ProviderRegistry, Relay, RelayConfig};
use courier_store::{
    AuditFilter, AuditLogEntry, AuditSink, AuditStoreConfig, DuckDbAuditStore, MemoryAuditStore,
};
use serde::Serialize;

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn run(cli: &Cli) -> Result<ExitCode, CliError> {
    match &cli.command {
        Command::Run(args) => run::execute(cli, args).await,
        Command::Enqueue(args) => enqueue::execute(cli, args).await,
        Command::Audit(args) => audit::execute(cli, args),
    }
}

/// Where this invocation records its attempts.
#[derive(Clone)]
pub(crate) enum AuditBackend {
    DuckDb(DuckDbAuditStore),
    Memory(MemoryAuditStore),
}

impl AuditBackend {
    pub(crate) fn open(cli: &Cli) -> Result<Self, CliError> {
        if cli.memory {
            return Ok(Self::Memory(MemoryAuditStore::new()));
        }

        let mut config = AuditStoreConfig::default();
        if let Some(path) = &cli.db {
            config = config.with_db_path(path);
        }
        Ok(Self::DuckDb(courier_store::open(config)?))
    }

    pub(crate) fn sink(&self) -> Arc<dyn AuditSink> {
        match self {
            Self::DuckDb(store) => Arc::new(store.clone()),
            Self::Memory(store) => Arc::new(store.clone()),
        }
    }

    pub(crate) fn recent(
        &self,
        filter: &AuditFilter,
        limit: usize,
    ) -> Result<Vec<AuditLogEntry>, CliError> {
        match self {
            Self::DuckDb(store) => Ok(store.recent(filter, limit)?),
            Self::Memory(store) => Ok(store.recent(filter, limit)),
        }
    }
}

/// Start a relay over the built-in providers, configured from the environment.
pub(crate) fn start_relay(cli: &Cli, audit: &AuditBackend) -> Result<Relay, CliError> {
    let config = RelayConfig::from_env()?;
    let http_client = config.build_http_client()?;
    let registry = ProviderRegistry::with_kakao_providers(http_client, &cli.base_url)?;
    Ok(Relay::start(&config, registry, audit.sink()))
}

fn all_succeeded(stats: &PoolStats) -> bool {
    stats.succeeded == stats.processed
}

/// Exit non-zero when any relayed task did not end in success.
pub(crate) fn exit_code_for(stats: &PoolStats) -> ExitCode {
    if all_succeeded(stats) {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(3)
    }
}

pub(crate) fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<(), CliError> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{rendered}");
    Ok(())
}
