use std::fmt::{Display, Formatter};

use thiserror::Error;

/// Failure classification for one execution attempt.
///
/// The worker's retry decision is a function of this kind alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Raw parameters did not match the provider's request shape.
    RequestValidation,
    /// The external response did not match the provider's response shape.
    ResponseValidation,
    /// The external call did not finish within the client timeout.
    Timeout,
    /// The external service answered with a non-2xx status.
    BadStatus,
    /// Connection or other transport-level failure.
    Transport,
    /// Any other fault raised while running the attempt.
    Internal,
}

impl FailureKind {
    pub const fn is_validation(self) -> bool {
        matches!(self, Self::RequestValidation | Self::ResponseValidation)
    }

    pub const fn code(self) -> &'static str {
        match self {
            Self::RequestValidation => "provider.request_validation",
            Self::ResponseValidation => "provider.response_validation",
            Self::Timeout => "provider.timeout",
            Self::BadStatus => "provider.bad_status",
            Self::Transport => "provider.transport",
            Self::Internal => "provider.internal",
        }
    }
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Structured failure raised by a provider's fetch stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    kind: FailureKind,
    message: String,
    status: Option<u16>,
}

impl ProviderError {
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Timeout,
            message: message.into(),
            status: None,
        }
    }

    pub fn bad_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::BadStatus,
            message: message.into(),
            status: Some(status),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transport,
            message: message.into(),
            status: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Internal,
            message: message.into(),
            status: None,
        }
    }

    pub const fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status for [`FailureKind::BadStatus`] failures.
    pub const fn status(&self) -> Option<u16> {
        self.status
    }

    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for ProviderError {}

/// One offending field in a shape check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn missing(field: impl Into<String>) -> Self {
        Self::new(field, "Field required")
    }
}

impl Display for FieldIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Rejection of a request or response against its expected shape.
///
/// Carries every offending field, not just the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    issues: Vec<FieldIssue>,
}

impl ValidationFailure {
    pub fn new(issues: Vec<FieldIssue>) -> Self {
        Self { issues }
    }

    pub fn single(issue: FieldIssue) -> Self {
        Self {
            issues: vec![issue],
        }
    }

    pub fn issues(&self) -> &[FieldIssue] {
        &self.issues
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.issues.iter().map(|issue| issue.field.as_str())
    }
}

impl Display for ValidationFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let noun = if self.issues.len() == 1 { "error" } else { "errors" };
        write!(f, "{} validation {noun}", self.issues.len())?;
        for (index, issue) in self.issues.iter().enumerate() {
            let separator = if index == 0 { ": " } else { "; " };
            write!(f, "{separator}{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationFailure {}

/// Errors raised while building relay configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("{key} must be greater than zero")]
    Zero { key: &'static str },
}

/// Errors raised when wiring providers into a registry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("provider '{0}' is already registered")]
    Duplicate(String),

    #[error("invalid provider id '{value}': {reason}")]
    InvalidProviderId { value: String, reason: &'static str },
}

/// Errors surfaced to producers of the relay.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("relay is shut down; task rejected")]
    Closed,

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
