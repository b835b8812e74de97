use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{FailureKind, ProviderError, ValidationFailure};
use crate::ProviderId;

/// Normalized result of one execution attempt.
///
/// Built once per attempt and never mutated afterwards. A successful
/// outcome never carries an error message or the validation flag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionOutcome {
    provider: ProviderId,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    response_time_ms: f64,
    is_validation_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<FailureKind>,
}

impl ExecutionOutcome {
    pub fn success(provider: ProviderId, data: Map<String, Value>, response_time_ms: f64) -> Self {
        Self {
            provider,
            success: true,
            data: Some(data),
            error_message: None,
            response_time_ms: sanitize_elapsed(response_time_ms),
            is_validation_error: false,
            failure: None,
        }
    }

    /// Failed outcome of the given kind. The validation flag follows the kind.
    pub fn failure(
        provider: ProviderId,
        kind: FailureKind,
        message: impl Into<String>,
        response_time_ms: f64,
    ) -> Self {
        Self {
            provider,
            success: false,
            data: None,
            error_message: Some(message.into()),
            response_time_ms: sanitize_elapsed(response_time_ms),
            is_validation_error: kind.is_validation(),
            failure: Some(kind),
        }
    }

    pub fn request_invalid(
        provider: ProviderId,
        failure: &ValidationFailure,
        response_time_ms: f64,
    ) -> Self {
        Self::failure(
            provider,
            FailureKind::RequestValidation,
            failure.to_string(),
            response_time_ms,
        )
    }

    pub fn response_invalid(
        provider: ProviderId,
        failure: &ValidationFailure,
        response_time_ms: f64,
    ) -> Self {
        Self::failure(
            provider,
            FailureKind::ResponseValidation,
            failure.to_string(),
            response_time_ms,
        )
    }

    pub fn from_error(provider: ProviderId, error: &ProviderError, response_time_ms: f64) -> Self {
        Self::failure(provider, error.kind(), error.message(), response_time_ms)
    }

    pub fn provider(&self) -> &ProviderId {
        &self.provider
    }

    pub const fn is_success(&self) -> bool {
        self.success
    }

    pub fn data(&self) -> Option<&Map<String, Value>> {
        self.data.as_ref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub const fn response_time_ms(&self) -> f64 {
        self.response_time_ms
    }

    pub const fn is_validation_error(&self) -> bool {
        self.is_validation_error
    }

    pub const fn failure_kind(&self) -> Option<FailureKind> {
        self.failure
    }

    pub fn error_code(&self) -> Option<&'static str> {
        self.failure.map(FailureKind::code)
    }
}

fn sanitize_elapsed(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}
