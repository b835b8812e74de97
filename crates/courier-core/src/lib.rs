//! Core contracts for courier.
//!
//! This crate contains:
//! - The provider contract, shape validation and the execution pipeline
//! - The audit-logging executor decorator
//! - The shared HTTP client abstraction and outbound throttling
//! - The task queue, retrying worker pool and relay lifecycle
//! - Built-in Kakao providers

pub mod adapters;
pub mod audited;
pub mod config;
pub mod error;
pub mod http_client;
pub mod outcome;
pub mod provider;
pub mod queue;
pub mod registry;
pub mod relay;
pub mod retry;
pub mod schema;
pub mod source;
pub mod throttling;
pub mod worker;

pub use adapters::{KakaoMessageProvider, KakaoProfileProvider, KAKAO_API_BASE_URL};
pub use audited::{audit_entry, AttemptContext, AuditedExecutor};
pub use config::RelayConfig;
pub use error::{
    ConfigError, FailureKind, FieldIssue, ProviderError, RegistryError, RelayError,
    ValidationFailure,
};
pub use http_client::{
    HttpClient, HttpClientConfig, HttpError, HttpErrorKind, HttpMethod, HttpRequest,
    HttpResponse, ReqwestHttpClient,
};
pub use outcome::ExecutionOutcome;
pub use provider::{ExecuteFuture, Executor, FetchFuture, Pipeline, Provider};
pub use queue::{QueuedTask, TaskPayload, TaskQueue};
pub use registry::ProviderRegistry;
pub use relay::{EnqueueReceipt, Relay};
pub use retry::{Backoff, RetryConfig, RetryDecision, StopReason};
pub use schema::{FieldType, Shape};
pub use source::ProviderId;
pub use throttling::{ThrottleConfig, ThrottledHttpClient};
pub use worker::{PoolStats, WorkerPool};
