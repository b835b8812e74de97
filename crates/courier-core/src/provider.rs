use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;

use futures_util::FutureExt;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::time::Instant;

use crate::error::{FailureKind, ProviderError, ValidationFailure};
use crate::http_client::{HttpError, HttpErrorKind};
use crate::{ExecutionOutcome, ProviderId};

pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, ProviderError>> + Send + 'a>>;
pub type ExecuteFuture<'a> = Pin<Box<dyn Future<Output = ExecutionOutcome> + Send + 'a>>;

/// One external API's request/response contract and call logic.
pub trait Provider: Send + Sync {
    type Request: Send;
    type Response: Serialize;

    fn name(&self) -> &ProviderId;

    /// Check raw parameters against the request shape. Unknown keys are dropped.
    fn validate_request(&self, params: &Map<String, Value>)
        -> Result<Self::Request, ValidationFailure>;

    /// Call the external service and return its raw JSON payload.
    fn fetch<'a>(&'a self, request: Self::Request) -> FetchFuture<'a>;

    /// Check the raw payload against the response shape.
    fn validate_response(&self, raw: Value) -> Result<Self::Response, ValidationFailure>;
}

/// Object-safe execution contract shared by pipelines and decorators.
pub trait Executor: Send + Sync {
    fn name(&self) -> &ProviderId;

    /// Run one attempt. Never fails: every fault becomes a failed outcome.
    fn execute<'a>(&'a self, params: &'a Map<String, Value>) -> ExecuteFuture<'a>;
}

/// Drives a [`Provider`] through validate request, fetch, validate response.
pub struct Pipeline<P> {
    provider: P,
}

enum StageFailure {
    Request(ValidationFailure),
    Fetch(ProviderError),
    Response(ValidationFailure),
    Encode(String),
}

impl<P: Provider> Pipeline<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    async fn run(&self, params: &Map<String, Value>) -> Result<Map<String, Value>, StageFailure> {
        let request = self
            .provider
            .validate_request(params)
            .map_err(StageFailure::Request)?;
        let raw = self
            .provider
            .fetch(request)
            .await
            .map_err(StageFailure::Fetch)?;
        let response = self
            .provider
            .validate_response(raw)
            .map_err(StageFailure::Response)?;

        match serde_json::to_value(response) {
            Ok(Value::Object(data)) => Ok(data),
            Ok(other) => Err(StageFailure::Encode(format!(
                "normalized response must be a JSON object, found {other}"
            ))),
            Err(error) => Err(StageFailure::Encode(error.to_string())),
        }
    }
}

impl<P: Provider> Executor for Pipeline<P> {
    fn name(&self) -> &ProviderId {
        self.provider.name()
    }

    fn execute<'a>(&'a self, params: &'a Map<String, Value>) -> ExecuteFuture<'a> {
        Box::pin(async move {
            let started = Instant::now();
            let result = AssertUnwindSafe(self.run(params)).catch_unwind().await;
            let elapsed = elapsed_ms(started);
            let provider = self.name().clone();

            match result {
                Ok(Ok(data)) => ExecutionOutcome::success(provider, data, elapsed),
                Ok(Err(StageFailure::Request(failure))) => {
                    ExecutionOutcome::request_invalid(provider, &failure, elapsed)
                }
                Ok(Err(StageFailure::Fetch(error))) => {
                    ExecutionOutcome::from_error(provider, &error, elapsed)
                }
                Ok(Err(StageFailure::Response(failure))) => {
                    ExecutionOutcome::response_invalid(provider, &failure, elapsed)
                }
                Ok(Err(StageFailure::Encode(message))) => {
                    ExecutionOutcome::failure(provider, FailureKind::Internal, message, elapsed)
                }
                Err(panic) => ExecutionOutcome::failure(
                    provider,
                    FailureKind::Internal,
                    format!("provider panicked: {}", panic_message(panic.as_ref())),
                    elapsed,
                ),
            }
        })
    }
}

impl From<HttpError> for ProviderError {
    fn from(error: HttpError) -> Self {
        match error.kind() {
            HttpErrorKind::Timeout => Self::timeout(error.message()),
            HttpErrorKind::Connect | HttpErrorKind::Other => Self::transport(error.message()),
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic payload"
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1_000.0
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::schema::{FieldType, Shape};

    #[derive(Debug, Deserialize)]
    struct EchoRequest {
        token: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct EchoResponse {
        echoed: String,
    }

    struct EchoProvider {
        id: ProviderId,
        fetches: Arc<AtomicUsize>,
        reply: fn(String) -> Result<Value, ProviderError>,
    }

    impl EchoProvider {
        fn new(reply: fn(String) -> Result<Value, ProviderError>) -> Self {
            Self {
                id: ProviderId::parse("echo").expect("valid id"),
                fetches: Arc::new(AtomicUsize::new(0)),
                reply,
            }
        }
    }

    impl Provider for EchoProvider {
        type Request = EchoRequest;
        type Response = EchoResponse;

        fn name(&self) -> &ProviderId {
            &self.id
        }

        fn validate_request(
            &self,
            params: &Map<String, Value>,
        ) -> Result<EchoRequest, ValidationFailure> {
            Shape::new()
                .required("token", FieldType::String)
                .parse_map(params)
        }

        fn fetch<'a>(&'a self, request: EchoRequest) -> FetchFuture<'a> {
            Box::pin(async move {
                self.fetches.fetch_add(1, Ordering::SeqCst);
                (self.reply)(request.token)
            })
        }

        fn validate_response(&self, raw: Value) -> Result<EchoResponse, ValidationFailure> {
            Shape::new().required("echoed", FieldType::String).parse(&raw)
        }
    }

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn successful_attempt_returns_normalized_data() {
        let pipeline = Pipeline::new(EchoProvider::new(|token| {
            Ok(json!({ "echoed": token, "server": "ignored" }))
        }));

        let outcome = pipeline.execute(&params(json!({ "token": "abc" }))).await;

        assert!(outcome.is_success());
        assert_eq!(outcome.data(), Some(&params(json!({ "echoed": "abc" }))));
        assert!(outcome.response_time_ms() >= 0.0);
    }

    #[tokio::test]
    async fn request_validation_skips_fetch() {
        let provider = EchoProvider::new(|_| Ok(json!({})));
        let fetches = Arc::clone(&provider.fetches);
        let pipeline = Pipeline::new(provider);

        let outcome = pipeline.execute(&Map::new()).await;

        assert!(outcome.is_validation_error());
        assert_eq!(outcome.failure_kind(), Some(FailureKind::RequestValidation));
        assert_eq!(fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fetch_failures_keep_their_kind() {
        let pipeline = Pipeline::new(EchoProvider::new(|_| {
            Err(ProviderError::from(HttpError::connect("connection refused")))
        }));

        let outcome = pipeline.execute(&params(json!({ "token": "abc" }))).await;

        assert!(!outcome.is_validation_error());
        assert_eq!(outcome.failure_kind(), Some(FailureKind::Transport));
        assert_eq!(outcome.error_message(), Some("connection refused"));
    }

    #[tokio::test]
    async fn panicking_fetch_becomes_internal_failure() {
        let pipeline = Pipeline::new(EchoProvider::new(|_| panic!("upstream exploded")));

        let outcome = pipeline.execute(&params(json!({ "token": "abc" }))).await;

        assert_eq!(outcome.failure_kind(), Some(FailureKind::Internal));
        assert_eq!(
            outcome.error_message(),
            Some("provider panicked: upstream exploded")
        );
    }
}
