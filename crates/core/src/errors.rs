use std::fmt;

use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExternalService {
    Slack,
    TimeTracking,
    Documents,
}

impl ExternalService {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Slack => "slack",
            Self::TimeTracking => "time_tracking",
            Self::Documents => "documents",
        }
    }
}

impl fmt::Display for ExternalService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Malformed inbound payloads. Acknowledged to the platform, never retried.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("payload is not valid json: {0}")]
    InvalidJson(String),
    #[error("payload is missing required field `{0}`")]
    MissingField(String),
    #[error("payload field `{field}` has unsupported value `{value}`")]
    InvalidValue { field: String, value: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IntegrationError {
    #[error("{service} request timed out")]
    Timeout { service: ExternalService },
    #[error("{service} transport failure: {message}")]
    Transport { service: ExternalService, message: String },
    #[error("{service} responded with status {status}")]
    Status { service: ExternalService, status: u16 },
    #[error("{service} api error: {code}")]
    Api { service: ExternalService, code: String },
    #[error("{service} response could not be decoded: {message}")]
    Decode { service: ExternalService, message: String },
    #[error("{service} credential unavailable: {message}")]
    Credential { service: ExternalService, message: String },
}

impl IntegrationError {
    pub fn service(&self) -> ExternalService {
        match self {
            Self::Timeout { service }
            | Self::Transport { service, .. }
            | Self::Status { service, .. }
            | Self::Api { service, .. }
            | Self::Decode { service, .. }
            | Self::Credential { service, .. } => *service,
        }
    }

    /// Timeouts, connection failures, throttling and 5xx responses may succeed on a second try.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Transport { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Api { code, .. } => code == "ratelimited" || code == "internal_error",
            Self::Decode { .. } | Self::Credential { .. } => false,
        }
    }

    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Transport { .. } => "network",
            Self::Status { status, .. } if *status == 401 || *status == 403 => "auth",
            Self::Status { status, .. } if *status == 429 => "rate_limit",
            Self::Status { .. } => "status",
            Self::Api { .. } => "api",
            Self::Decode { .. } => "decode",
            Self::Credential { .. } => "credential",
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ExternalService, IntegrationError};

    #[test]
    fn server_errors_and_throttling_are_retryable() {
        let throttled = IntegrationError::Status { service: ExternalService::TimeTracking, status: 429 };
        let unavailable =
            IntegrationError::Status { service: ExternalService::Documents, status: 503 };
        let timeout = IntegrationError::Timeout { service: ExternalService::Slack };

        assert!(throttled.is_retryable());
        assert!(unavailable.is_retryable());
        assert!(timeout.is_retryable());
    }

    #[test]
    fn auth_failures_are_not_retryable() {
        let error = IntegrationError::Status { service: ExternalService::TimeTracking, status: 401 };

        assert!(!error.is_retryable());
        assert_eq!(error.error_class(), "auth");
    }

    #[test]
    fn slack_channel_errors_are_terminal() {
        let error =
            IntegrationError::Api { service: ExternalService::Slack, code: "not_in_channel".into() };

        assert!(!error.is_retryable());
        assert_eq!(error.service(), ExternalService::Slack);
        assert_eq!(error.to_string(), "slack api error: not_in_channel");
    }
}
