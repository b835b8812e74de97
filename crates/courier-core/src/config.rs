use std::env;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ConfigError;
use crate::http_client::{HttpClient, HttpClientConfig, HttpError, ReqwestHttpClient};
use crate::retry::RetryConfig;
use crate::throttling::{ThrottleConfig, ThrottledHttpClient};

pub const ENV_WORKERS: &str = "COURIER_WORKERS";
pub const ENV_HTTP_TIMEOUT_MS: &str = "COURIER_HTTP_TIMEOUT_MS";
pub const ENV_MAX_CONNECTIONS: &str = "COURIER_MAX_CONNECTIONS";
pub const ENV_MAX_RETRIES: &str = "COURIER_MAX_RETRIES";
pub const ENV_BACKOFF_BASE_MS: &str = "COURIER_BACKOFF_BASE_MS";
pub const ENV_RATE_LIMIT_PER_SEC: &str = "COURIER_RATE_LIMIT_PER_SEC";

/// Runtime settings for a relay.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    pub workers: usize,
    pub http: HttpClientConfig,
    pub retry: RetryConfig,
    /// Outbound quota; unlimited when `None`.
    pub throttle: Option<ThrottleConfig>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            http: HttpClientConfig::default(),
            retry: RetryConfig::default(),
            throttle: None,
        }
    }
}

impl RelayConfig {
    /// Defaults overridden by `COURIER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each known key.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(workers) = parse_positive::<usize>(&lookup, ENV_WORKERS)? {
            config.workers = workers;
        }
        if let Some(timeout_ms) = parse_positive::<u64>(&lookup, ENV_HTTP_TIMEOUT_MS)? {
            config.http.timeout = Duration::from_millis(timeout_ms);
        }
        if let Some(max_connections) = parse_positive::<usize>(&lookup, ENV_MAX_CONNECTIONS)? {
            config.http.max_connections = max_connections;
        }
        if let Some(max_retries) = parse::<u32>(&lookup, ENV_MAX_RETRIES)? {
            config.retry.max_retries = max_retries;
        }
        if let Some(base_ms) = parse_positive::<u64>(&lookup, ENV_BACKOFF_BASE_MS)? {
            config.retry = config.retry.with_base_delay(Duration::from_millis(base_ms));
        }
        if let Some(per_second) = parse::<NonZeroU32>(&lookup, ENV_RATE_LIMIT_PER_SEC)? {
            config.throttle = Some(ThrottleConfig::per_second(per_second));
        }

        Ok(config)
    }

    /// Build the shared outbound client, throttled when a quota is set.
    pub fn build_http_client(&self) -> Result<Arc<dyn HttpClient>, HttpError> {
        let client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new(&self.http)?);
        Ok(match self.throttle {
            Some(throttle) => Arc::new(ThrottledHttpClient::new(client, throttle)),
            None => client,
        })
    }
}

fn parse<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let value = raw.trim();
    if value.is_empty() {
        return Ok(None);
    }

    value
        .parse::<T>()
        .map(Some)
        .map_err(|error| ConfigError::InvalidValue {
            key,
            value: value.to_owned(),
            reason: error.to_string(),
        })
}

fn parse_positive<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr + Default + PartialEq,
    T::Err: std::fmt::Display,
{
    match parse::<T>(lookup, key)? {
        Some(value) if value == T::default() => Err(ConfigError::Zero { key }),
        other => Ok(other),
    }
}
