use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use weeklybot_core::config::AppConfig;
use weeklybot_core::errors::{ExternalService, IntegrationError};

pub const USER_AGENT: &str = concat!("weeklybot/", env!("CARGO_PKG_VERSION"));

/// One client for every external call, with the configured request timeout.
pub fn http_client(config: &AppConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_secs(config.http.timeout_secs))
        .user_agent(USER_AGENT)
        .build()
}

pub fn request_error(service: ExternalService, error: reqwest::Error) -> IntegrationError {
    if error.is_timeout() {
        IntegrationError::Timeout { service }
    } else if error.is_decode() {
        IntegrationError::Decode { service, message: error.to_string() }
    } else {
        IntegrationError::Transport { service, message: error.to_string() }
    }
}

/// Reject non-success statuses, then decode the JSON body.
pub async fn read_json<T: DeserializeOwned>(
    service: ExternalService,
    response: Response,
) -> Result<T, IntegrationError> {
    let status = response.status();
    if !status.is_success() {
        return Err(IntegrationError::Status { service, status: status.as_u16() });
    }

    let body = response.text().await.map_err(|error| request_error(service, error))?;
    decode_json(service, &body)
}

pub fn decode_json<T: DeserializeOwned>(
    service: ExternalService,
    body: &str,
) -> Result<T, IntegrationError> {
    serde_json::from_str(body)
        .map_err(|error| IntegrationError::Decode { service, message: error.to_string() })
}
