use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;
use weeklybot_core::errors::{ExternalService, IntegrationError};

use crate::blocks::ModalView;

/// Outbound Slack Web API calls used by the bot. Neither call is idempotent,
/// so implementations and callers must not retry them.
#[async_trait]
pub trait SlackApi: Send + Sync {
    async fn open_view(&self, trigger_id: &str, view: &ModalView) -> Result<(), IntegrationError>;

    async fn post_message(&self, channel_id: &str, text: &str) -> Result<(), IntegrationError>;
}

pub struct WebApiClient {
    http: Client,
    base_url: String,
    bot_token: SecretString,
}

#[derive(Serialize)]
struct OpenViewRequest<'a> {
    trigger_id: &'a str,
    view: &'a ModalView,
}

#[derive(Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

impl WebApiClient {
    pub fn new(http: Client, base_url: impl Into<String>, bot_token: SecretString) -> Self {
        Self { http, base_url: base_url.into().trim_end_matches('/').to_owned(), bot_token }
    }

    async fn call<B: Serialize + Sync>(&self, method: &str, body: &B) -> Result<(), IntegrationError> {
        debug!(event_name = "slack.api.call", method, "calling slack web api");
        let response = self
            .http
            .post(format!("{}/{method}", self.base_url))
            .bearer_auth(self.bot_token.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport_error)?;
        interpret_response(status, &body)
    }
}

#[async_trait]
impl SlackApi for WebApiClient {
    async fn open_view(&self, trigger_id: &str, view: &ModalView) -> Result<(), IntegrationError> {
        self.call("views.open", &OpenViewRequest { trigger_id, view }).await
    }

    async fn post_message(&self, channel_id: &str, text: &str) -> Result<(), IntegrationError> {
        self.call("chat.postMessage", &PostMessageRequest { channel: channel_id, text }).await
    }
}

fn transport_error(error: reqwest::Error) -> IntegrationError {
    if error.is_timeout() {
        IntegrationError::Timeout { service: ExternalService::Slack }
    } else {
        IntegrationError::Transport { service: ExternalService::Slack, message: error.to_string() }
    }
}

/// Slack answers most failures with HTTP 200 and `{"ok": false, "error": "..."}`.
fn interpret_response(status: u16, body: &str) -> Result<(), IntegrationError> {
    if !(200..300).contains(&status) {
        return Err(IntegrationError::Status { service: ExternalService::Slack, status });
    }

    let parsed: ApiResponse = serde_json::from_str(body).map_err(|error| {
        IntegrationError::Decode { service: ExternalService::Slack, message: error.to_string() }
    })?;
    if parsed.ok {
        return Ok(());
    }

    Err(IntegrationError::Api {
        service: ExternalService::Slack,
        code: parsed.error.unwrap_or_else(|| "unknown_error".to_owned()),
    })
}

#[cfg(test)]
mod tests {
    use weeklybot_core::errors::{ExternalService, IntegrationError};

    use super::interpret_response;

    #[test]
    fn ok_true_is_success() {
        assert_eq!(interpret_response(200, r#"{"ok":true,"ts":"1.2"}"#), Ok(()));
    }

    #[test]
    fn ok_false_maps_to_api_error() {
        assert_eq!(
            interpret_response(200, r#"{"ok":false,"error":"channel_not_found"}"#),
            Err(IntegrationError::Api {
                service: ExternalService::Slack,
                code: "channel_not_found".to_owned()
            })
        );
    }

    #[test]
    fn throttled_status_is_retryable_status_error() {
        let error = interpret_response(429, "").expect_err("429 should fail");

        assert_eq!(error, IntegrationError::Status { service: ExternalService::Slack, status: 429 });
        assert!(error.is_retryable());
    }

    #[test]
    fn non_json_body_is_decode_error() {
        assert!(matches!(
            interpret_response(200, "<html>"),
            Err(IntegrationError::Decode { service: ExternalService::Slack, .. })
        ));
    }
}
