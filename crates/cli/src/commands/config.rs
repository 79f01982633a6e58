use std::env;
use std::fs;
use std::path::Path;

use secrecy::ExposeSecret;
use toml::Value;
use weeklybot_core::config::{
    resolve_config_path, AppConfig, ENV_DOCUMENTS_CREDENTIALS_PATH, ENV_DOCUMENTS_DOCS_BASE_URL,
    ENV_DOCUMENTS_DRIVE_BASE_URL, ENV_DOCUMENTS_TEMPLATE_ID, ENV_HTTP_MAX_RETRIES,
    ENV_HTTP_TIMEOUT_SECS, ENV_LOG_FORMAT, ENV_LOG_LEVEL, ENV_SERVER_BIND_ADDRESS, ENV_SERVER_PORT,
    ENV_SLACK_API_BASE_URL, ENV_SLACK_BOT_TOKEN, ENV_TIME_TRACKING_ACCESS_TOKEN,
    ENV_TIME_TRACKING_ACCOUNT_ID, ENV_TIME_TRACKING_BASE_URL,
    ENV_TIME_TRACKING_REFRESH_INTERVAL_SECS,
};

use super::{load_options, CommandResult};

pub fn run(config_path: Option<&Path>) -> CommandResult {
    let config = match AppConfig::load(load_options(config_path)) {
        Ok(config) => config,
        Err(error) => return CommandResult::new(2, format!("config validation failed: {error}")),
    };

    let file_path = resolve_config_path(config_path);
    let file_doc = file_path.as_deref().and_then(load_config_file_doc);
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, file_doc.as_ref(), file_path.as_deref())
    };

    let credentials_path = config
        .documents
        .credentials_path
        .as_deref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<unset>".to_string());

    let fields: Vec<(&str, String, &[&str])> = vec![
        ("slack.bot_token", redact_token(config.slack.bot_token.expose_secret()), ENV_SLACK_BOT_TOKEN),
        ("slack.api_base_url", config.slack.api_base_url.clone(), ENV_SLACK_API_BASE_URL),
        (
            "time_tracking.account_id",
            config.time_tracking.account_id.clone(),
            ENV_TIME_TRACKING_ACCOUNT_ID,
        ),
        (
            "time_tracking.access_token",
            redact_secret(config.time_tracking.access_token.expose_secret()),
            ENV_TIME_TRACKING_ACCESS_TOKEN,
        ),
        ("time_tracking.base_url", config.time_tracking.base_url.clone(), ENV_TIME_TRACKING_BASE_URL),
        (
            "time_tracking.refresh_interval_secs",
            config.time_tracking.refresh_interval_secs.to_string(),
            ENV_TIME_TRACKING_REFRESH_INTERVAL_SECS,
        ),
        (
            "documents.template_document_id",
            config.documents.template_document_id.clone(),
            ENV_DOCUMENTS_TEMPLATE_ID,
        ),
        ("documents.credentials_path", credentials_path, ENV_DOCUMENTS_CREDENTIALS_PATH),
        ("documents.drive_base_url", config.documents.drive_base_url.clone(), ENV_DOCUMENTS_DRIVE_BASE_URL),
        ("documents.docs_base_url", config.documents.docs_base_url.clone(), ENV_DOCUMENTS_DOCS_BASE_URL),
        ("server.bind_address", config.server.bind_address.clone(), ENV_SERVER_BIND_ADDRESS),
        ("server.port", config.server.port.to_string(), ENV_SERVER_PORT),
        ("http.timeout_secs", config.http.timeout_secs.to_string(), ENV_HTTP_TIMEOUT_SECS),
        ("http.max_retries", config.http.max_retries.to_string(), ENV_HTTP_MAX_RETRIES),
        ("logging.level", config.logging.level.clone(), ENV_LOG_LEVEL),
        ("logging.format", format!("{:?}", config.logging.format), ENV_LOG_FORMAT),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(
        fields
            .into_iter()
            .map(|(key, value, env_keys)| render_line(key, &value, source(key, env_keys))),
    );

    CommandResult::new(0, lines.join("\n"))
}

fn load_config_file_doc(path: &Path) -> Option<Value> {
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keep the Slack token family prefix (`xoxb`) visible, hide the rest.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

fn redact_secret(secret: &str) -> String {
    if secret.trim().is_empty() {
        "<empty>".to_string()
    } else {
        "<redacted>".to_string()
    }
}
