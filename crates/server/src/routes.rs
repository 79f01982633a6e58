//! Inbound HTTP surface. Slack retries requests that are not acknowledged
//! quickly, so every Slack route answers 200 and reports problems through logs.

use std::sync::Arc;

use axum::{
    extract::{rejection::FormRejection, State},
    http::StatusCode,
    routing::post,
    Form, Json, Router,
};
use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;
use weeklybot_core::directory::ProjectDirectory;
use weeklybot_core::domain::week::current_week_label;
use weeklybot_slack::blocks::{project_options, weekly_update_modal, OptionsResponse};
use weeklybot_slack::client::SlackApi;
use weeklybot_slack::commands::SlashCommandPayload;
use weeklybot_slack::interactions::{parse_interaction, parse_options_query};

use crate::health;
use crate::relay::SubmissionRelay;

#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<ProjectDirectory>,
    pub slack: Arc<dyn SlackApi>,
    pub relay: Arc<SubmissionRelay>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PayloadForm {
    #[serde(default)]
    pub payload: Option<String>,
}

pub fn router(state: AppState) -> Router {
    let directory = state.directory.clone();
    Router::new()
        .route("/slack/command", post(slash_command))
        .route("/slack/interact", post(interact))
        .route("/slack/options", post(options))
        .with_state(state)
        .merge(health::router(directory))
}

fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

pub async fn slash_command(
    State(state): State<AppState>,
    form: Result<Form<SlashCommandPayload>, FormRejection>,
) -> StatusCode {
    let correlation_id = new_correlation_id();
    let payload = match form {
        Ok(Form(payload)) => payload,
        Err(rejection) => {
            warn!(
                event_name = "slack.command.rejected",
                correlation_id = %correlation_id,
                error_class = "malformed_payload",
                error = %rejection,
                "could not read slash command form"
            );
            return StatusCode::OK;
        }
    };

    let request = match payload.open_modal_request() {
        Ok(request) => request,
        Err(rejection) => {
            warn!(
                event_name = "slack.command.rejected",
                correlation_id = %correlation_id,
                error_class = "malformed_payload",
                error = %rejection,
                "slash command is missing modal fields"
            );
            return StatusCode::OK;
        }
    };

    let projects = state.directory.ensure_loaded().await;
    let view = weekly_update_modal(&request.channel_id, &current_week_label(), &projects);

    match state.slack.open_view(&request.trigger_id, &view).await {
        Ok(()) => info!(
            event_name = "slack.modal.opened",
            correlation_id = %correlation_id,
            channel_id = %request.channel_id,
            project_count = projects.len(),
            "opened weekly update modal"
        ),
        Err(failure) => error!(
            event_name = "slack.modal.failed",
            correlation_id = %correlation_id,
            channel_id = %request.channel_id,
            error_class = failure.error_class(),
            error = %failure,
            "failed to open weekly update modal"
        ),
    }
    StatusCode::OK
}

pub async fn interact(
    State(state): State<AppState>,
    form: Result<Form<PayloadForm>, FormRejection>,
) -> StatusCode {
    let correlation_id = new_correlation_id();
    let raw = match form.map(|Form(form)| form.payload) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            warn!(
                event_name = "slack.interaction.rejected",
                correlation_id = %correlation_id,
                error_class = "malformed_payload",
                "interaction form has no payload"
            );
            return StatusCode::OK;
        }
        Err(rejection) => {
            warn!(
                event_name = "slack.interaction.rejected",
                correlation_id = %correlation_id,
                error_class = "malformed_payload",
                error = %rejection,
                "could not read interaction form"
            );
            return StatusCode::OK;
        }
    };

    let interaction = match parse_interaction(&raw) {
        Ok(interaction) => interaction,
        Err(rejection) => {
            warn!(
                event_name = "slack.interaction.rejected",
                correlation_id = %correlation_id,
                error_class = "malformed_payload",
                error = %rejection,
                "could not parse interaction payload"
            );
            return StatusCode::OK;
        }
    };

    let relay = state.relay.clone();
    tokio::spawn(async move {
        match relay.handle(&interaction, &correlation_id).await {
            Ok(_) => {}
            Err(rejection) => warn!(
                event_name = "relay.submission.rejected",
                correlation_id = %correlation_id,
                error_class = "malformed_payload",
                error = %rejection,
                "submission payload is malformed"
            ),
        }
    });
    StatusCode::OK
}

pub async fn options(
    State(state): State<AppState>,
    form: Result<Form<PayloadForm>, FormRejection>,
) -> Json<OptionsResponse> {
    let query = form
        .ok()
        .and_then(|Form(form)| form.payload)
        .map(|raw| parse_options_query(&raw));

    match query {
        Some(Ok(query)) => Json(project_options(&state.directory.search(&query))),
        Some(Err(rejection)) => {
            warn!(
                event_name = "slack.options.rejected",
                error_class = "malformed_payload",
                error = %rejection,
                "could not parse options payload"
            );
            Json(project_options(&[]))
        }
        None => {
            warn!(
                event_name = "slack.options.rejected",
                error_class = "malformed_payload",
                "options form has no payload"
            );
            Json(project_options(&[]))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use weeklybot_core::directory::{ProjectDirectory, ProjectPage, ProjectRecord, ProjectSource};
    use weeklybot_core::documents::DocumentSink;
    use weeklybot_core::errors::IntegrationError;
    use weeklybot_core::retry::RetryPolicy;

    use super::{router, AppState};
    use crate::relay::tests::{submission_payload, RecordingSlack, RecordingStore, StoreCall};
    use crate::relay::{ChatSink, SubmissionRelay};

    struct StaticSource(Vec<&'static str>);

    #[async_trait]
    impl ProjectSource for StaticSource {
        async fn fetch_page(&self, _cursor: Option<&str>) -> Result<ProjectPage, IntegrationError> {
            Ok(ProjectPage {
                projects: self
                    .0
                    .iter()
                    .map(|name| ProjectRecord { name: (*name).to_owned(), is_active: true })
                    .collect(),
                next_page: None,
            })
        }
    }

    struct Harness {
        router: Router,
        directory: Arc<ProjectDirectory>,
        store: Arc<RecordingStore>,
        slack: Arc<RecordingSlack>,
    }

    fn harness(projects: Vec<&'static str>) -> Harness {
        let store = Arc::new(RecordingStore::default());
        let slack = Arc::new(RecordingSlack::default());
        let directory =
            Arc::new(ProjectDirectory::new(Arc::new(StaticSource(projects)), RetryPolicy::none()));
        let relay = SubmissionRelay::new(
            Arc::new(DocumentSink::new(store.clone(), RetryPolicy::none())),
            ChatSink::new(slack.clone()),
        );
        let state =
            AppState { directory: directory.clone(), slack: slack.clone(), relay: Arc::new(relay) };
        Harness { router: router(state), directory, store, slack }
    }

    fn form_encode(pairs: &[(&str, &str)]) -> String {
        pairs
            .iter()
            .map(|(key, value)| format!("{}={}", encode_component(key), encode_component(value)))
            .collect::<Vec<_>>()
            .join("&")
    }

    fn encode_component(raw: &str) -> String {
        raw.bytes()
            .map(|byte| match byte {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                    (byte as char).to_string()
                }
                _ => format!("%{byte:02X}"),
            })
            .collect()
    }

    fn form_request(uri: &str, body: String) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .expect("request")
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn slash_command_opens_modal_for_channel() {
        let harness = harness(vec!["Alpha", "Beta"]);

        let response = harness
            .router
            .oneshot(form_request(
                "/slack/command",
                form_encode(&[("trigger_id", "T-1"), ("channel_id", "C42"), ("command", "/weekly")]),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let slack = harness.slack.state.lock().await;
        let opened = &slack.opened_views;
        assert_eq!(opened.len(), 1);
        assert_eq!(opened[0].0, "T-1");
        assert_eq!(opened[0].1.private_metadata, "C42");
    }

    #[tokio::test]
    async fn slash_command_without_trigger_still_answers_ok() {
        let harness = harness(vec!["Alpha"]);

        let response = harness
            .router
            .oneshot(form_request("/slack/command", form_encode(&[("channel_id", "C42")])))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert!(harness.slack.state.lock().await.opened_views.is_empty());
    }

    #[tokio::test]
    async fn interact_acknowledges_then_relays_submission() {
        let harness = harness(vec!["Alpha"]);
        let payload = submission_payload("view_submission", "Alpha").to_string();

        let response = harness
            .router
            .oneshot(form_request("/slack/interact", form_encode(&[("payload", payload.as_str())])))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let mut delivered = false;
        for _ in 0..100 {
            if !harness.slack.state.lock().await.messages.is_empty() {
                delivered = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(delivered, "summary should be posted by the spawned relay");
        assert!(harness
            .store
            .state
            .lock()
            .await
            .calls
            .iter()
            .any(|call| matches!(call, StoreCall::InsertRow(..))));
    }

    #[tokio::test]
    async fn interact_answers_ok_for_garbage_payload() {
        let harness = harness(vec![]);

        let response = harness
            .router
            .oneshot(form_request("/slack/interact", form_encode(&[("payload", "{nope")])))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert!(harness.store.state.lock().await.calls.is_empty());
    }

    #[tokio::test]
    async fn options_returns_matching_projects() {
        let harness = harness(vec!["Alpha", "beta", "Gamma"]);
        harness.directory.refresh().await.expect("refresh");

        let response = harness
            .router
            .oneshot(form_request(
                "/slack/options",
                form_encode(&[("payload", r#"{"type":"block_suggestion","value":"GAM"}"#)]),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"options": [{"text": {"type": "plain_text", "text": "Gamma"}, "value": "Gamma"}]})
        );
    }

    #[tokio::test]
    async fn options_before_first_load_is_empty_list() {
        let harness = harness(vec!["Alpha"]);

        let response = harness
            .router
            .oneshot(form_request("/slack/options", form_encode(&[("payload", r#"{"value":""}"#)])))
            .await
            .expect("response");

        assert_eq!(body_json(response).await, json!({"options": []}));
    }

    #[tokio::test]
    async fn options_for_malformed_payload_is_empty_list() {
        let harness = harness(vec!["Alpha"]);

        let response = harness
            .router
            .oneshot(form_request("/slack/options", form_encode(&[("payload", "not json")])))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"options": []}));
    }

    #[tokio::test]
    async fn health_is_unavailable_until_directory_loads() {
        let harness = harness(vec!["Alpha"]);

        let response = harness
            .router
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
