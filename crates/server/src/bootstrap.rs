use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::info;
use weeklybot_core::config::{AppConfig, ConfigError, LoadOptions};
use weeklybot_core::directory::{spawn_refresh_task, ProjectDirectory};
use weeklybot_core::documents::DocumentSink;
use weeklybot_core::errors::IntegrationError;
use weeklybot_core::retry::RetryPolicy;
use weeklybot_slack::client::{SlackApi, WebApiClient};

use crate::google_docs::{load_credential, GoogleDocumentStore};
use crate::outbound::http_client;
use crate::relay::{ChatSink, SubmissionRelay};
use crate::routes::AppState;
use crate::time_tracking::HarvestProjectSource;

pub struct Application {
    pub config: AppConfig,
    pub state: AppState,
    pub refresh_task: JoinHandle<()>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("http client construction failed: {0}")]
    HttpClient(#[source] reqwest::Error),
    #[error("document credentials are unusable: {0}")]
    Credential(#[source] IntegrationError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

/// Wire clients, the project directory and the relay from an already validated config.
/// Must run inside a tokio runtime: the directory refresh task is spawned here.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let credentials_path = config.documents.credentials_path.clone().ok_or_else(|| {
        ConfigError::Validation("documents.credentials_path is required".to_string())
    })?;
    load_credential(&credentials_path).map_err(BootstrapError::Credential)?;
    info!(
        event_name = "system.bootstrap.credentials_loaded",
        correlation_id = "bootstrap",
        credentials_path = %credentials_path.display(),
        "document credentials readable"
    );

    let http = http_client(&config).map_err(BootstrapError::HttpClient)?;
    let retry = RetryPolicy::with_max_retries(config.http.max_retries);

    let directory = Arc::new(ProjectDirectory::new(
        Arc::new(HarvestProjectSource::new(http.clone(), &config.time_tracking)),
        retry.clone(),
    ));
    let refresh_task = spawn_refresh_task(
        directory.clone(),
        Duration::from_secs(config.time_tracking.refresh_interval_secs),
    );
    info!(
        event_name = "system.bootstrap.directory_refresh_scheduled",
        correlation_id = "bootstrap",
        refresh_interval_secs = config.time_tracking.refresh_interval_secs,
        "project directory refresh task started"
    );

    let slack: Arc<dyn SlackApi> = Arc::new(WebApiClient::new(
        http.clone(),
        config.slack.api_base_url.clone(),
        config.slack.bot_token.clone(),
    ));
    let store = GoogleDocumentStore::new(http, &config.documents, credentials_path, retry.clone());
    let documents = Arc::new(DocumentSink::new(Arc::new(store), retry));
    let relay = Arc::new(SubmissionRelay::new(documents, ChatSink::new(slack.clone())));

    Ok(Application { config, state: AppState { directory, slack, relay }, refresh_task })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use weeklybot_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::{bootstrap, BootstrapError};

    fn overrides(credentials: &std::path::Path) -> ConfigOverrides {
        ConfigOverrides {
            slack_bot_token: Some("xoxb-test".to_string()),
            time_tracking_account_id: Some("123456".to_string()),
            time_tracking_access_token: Some("harvest-token".to_string()),
            time_tracking_base_url: Some("http://127.0.0.1:9".to_string()),
            template_document_id: Some("template-doc".to_string()),
            credentials_path: Some(credentials.to_path_buf()),
            ..ConfigOverrides::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_with_app_level_slack_token() {
        let credentials = tempfile::NamedTempFile::new().expect("temp file");
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                slack_bot_token: Some("xapp-1-abc".to_string()),
                ..overrides(credentials.path())
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("slack.bot_token"));
    }

    #[tokio::test]
    async fn bootstrap_rejects_credential_file_without_token() {
        let mut credentials = tempfile::NamedTempFile::new().expect("temp file");
        write!(credentials, r#"{{"type":"service_account"}}"#).expect("write");

        let result = bootstrap(LoadOptions {
            overrides: overrides(credentials.path()),
            ..LoadOptions::default()
        })
        .await;

        assert!(matches!(result, Err(BootstrapError::Credential(_))));
    }

    #[tokio::test]
    async fn bootstrap_wires_state_with_unloaded_directory() {
        let mut credentials = tempfile::NamedTempFile::new().expect("temp file");
        write!(credentials, r#"{{"access_token":"ya29.test"}}"#).expect("write");

        let app = bootstrap(LoadOptions {
            overrides: overrides(credentials.path()),
            ..LoadOptions::default()
        })
        .await
        .expect("bootstrap should succeed with valid overrides");

        assert_eq!(app.config.documents.template_document_id, "template-doc");
        app.refresh_task.abort();
        assert!(app.state.directory.snapshot().is_empty());
    }
}
