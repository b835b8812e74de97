use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("task file line {line}: {source}")]
    TaskFile {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Config(#[from] courier_core::ConfigError),

    #[error(transparent)]
    Registry(#[from] courier_core::RegistryError),

    #[error(transparent)]
    Relay(#[from] courier_core::RelayError),

    #[error("http client error: {0}")]
    Http(#[from] courier_core::HttpError),

    #[error(transparent)]
    Store(#[from] courier_store::StoreError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InvalidArgument(_) | Self::TaskFile { .. } => 2,
            Self::Config(_) | Self::Registry(_) => 2,
            Self::Serialization(_) => 4,
            Self::Relay(_) | Self::Http(_) => 6,
            Self::Store(_) => 7,
            Self::Io(_) => 10,
        }
    }
}
