use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_FILE_CANDIDATES: [&str; 2] = ["weeklybot.toml", "config/weeklybot.toml"];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub slack: SlackConfig,
    pub time_tracking: TimeTrackingConfig,
    pub documents: DocumentsConfig,
    pub server: ServerConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub bot_token: SecretString,
    pub api_base_url: String,
}

#[derive(Clone, Debug)]
pub struct TimeTrackingConfig {
    pub account_id: String,
    pub access_token: SecretString,
    pub base_url: String,
    pub refresh_interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct DocumentsConfig {
    pub template_document_id: String,
    pub credentials_path: Option<PathBuf>,
    pub drive_base_url: String,
    pub docs_base_url: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub slack_bot_token: Option<String>,
    pub slack_api_base_url: Option<String>,
    pub time_tracking_account_id: Option<String>,
    pub time_tracking_access_token: Option<String>,
    pub time_tracking_base_url: Option<String>,
    pub template_document_id: Option<String>,
    pub credentials_path: Option<PathBuf>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            slack: SlackConfig {
                bot_token: String::new().into(),
                api_base_url: "https://slack.com/api".to_string(),
            },
            time_tracking: TimeTrackingConfig {
                account_id: String::new(),
                access_token: String::new().into(),
                base_url: "https://api.harvestapp.com".to_string(),
                refresh_interval_secs: 300,
            },
            documents: DocumentsConfig {
                template_document_id: String::new(),
                credentials_path: None,
                drive_base_url: "https://www.googleapis.com/drive/v3".to_string(),
                docs_base_url: "https://docs.googleapis.com/v1".to_string(),
            },
            server: ServerConfig { bind_address: "0.0.0.0".to_string(), port: 10000 },
            http: HttpConfig { timeout_secs: 10, max_retries: 1 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_CANDIDATES[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(slack) = patch.slack {
            if let Some(bot_token) = slack.bot_token {
                self.slack.bot_token = secret_value(bot_token);
            }
            if let Some(api_base_url) = slack.api_base_url {
                self.slack.api_base_url = api_base_url;
            }
        }

        if let Some(time_tracking) = patch.time_tracking {
            if let Some(account_id) = time_tracking.account_id {
                self.time_tracking.account_id = account_id;
            }
            if let Some(access_token) = time_tracking.access_token {
                self.time_tracking.access_token = secret_value(access_token);
            }
            if let Some(base_url) = time_tracking.base_url {
                self.time_tracking.base_url = base_url;
            }
            if let Some(refresh_interval_secs) = time_tracking.refresh_interval_secs {
                self.time_tracking.refresh_interval_secs = refresh_interval_secs;
            }
        }

        if let Some(documents) = patch.documents {
            if let Some(template_document_id) = documents.template_document_id {
                self.documents.template_document_id = template_document_id;
            }
            if let Some(credentials_path) = documents.credentials_path {
                self.documents.credentials_path = Some(credentials_path);
            }
            if let Some(drive_base_url) = documents.drive_base_url {
                self.documents.drive_base_url = drive_base_url;
            }
            if let Some(docs_base_url) = documents.docs_base_url {
                self.documents.docs_base_url = docs_base_url;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(http) = patch.http {
            if let Some(timeout_secs) = http.timeout_secs {
                self.http.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = http.max_retries {
                self.http.max_retries = max_retries;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env_any(ENV_SLACK_BOT_TOKEN) {
            self.slack.bot_token = secret_value(value);
        }
        if let Some(value) = read_env_any(ENV_SLACK_API_BASE_URL) {
            self.slack.api_base_url = value;
        }

        if let Some(value) = read_env_any(ENV_TIME_TRACKING_ACCOUNT_ID) {
            self.time_tracking.account_id = value;
        }
        if let Some(value) = read_env_any(ENV_TIME_TRACKING_ACCESS_TOKEN) {
            self.time_tracking.access_token = secret_value(value);
        }
        if let Some(value) = read_env_any(ENV_TIME_TRACKING_BASE_URL) {
            self.time_tracking.base_url = value;
        }
        if let Some(value) = read_env_any(ENV_TIME_TRACKING_REFRESH_INTERVAL_SECS) {
            self.time_tracking.refresh_interval_secs =
                parse_u64(ENV_TIME_TRACKING_REFRESH_INTERVAL_SECS[0], &value)?;
        }

        if let Some(value) = read_env_any(ENV_DOCUMENTS_TEMPLATE_ID) {
            self.documents.template_document_id = value;
        }
        if let Some(value) = read_env_any(ENV_DOCUMENTS_CREDENTIALS_PATH) {
            self.documents.credentials_path = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env_any(ENV_DOCUMENTS_DRIVE_BASE_URL) {
            self.documents.drive_base_url = value;
        }
        if let Some(value) = read_env_any(ENV_DOCUMENTS_DOCS_BASE_URL) {
            self.documents.docs_base_url = value;
        }

        if let Some(value) = read_env_any(ENV_SERVER_BIND_ADDRESS) {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env_any(ENV_SERVER_PORT) {
            self.server.port = parse_u16(ENV_SERVER_PORT[0], &value)?;
        }

        if let Some(value) = read_env_any(ENV_HTTP_TIMEOUT_SECS) {
            self.http.timeout_secs = parse_u64(ENV_HTTP_TIMEOUT_SECS[0], &value)?;
        }
        if let Some(value) = read_env_any(ENV_HTTP_MAX_RETRIES) {
            self.http.max_retries = parse_u32(ENV_HTTP_MAX_RETRIES[0], &value)?;
        }

        if let Some(value) = read_env_any(ENV_LOG_LEVEL) {
            self.logging.level = value;
        }
        if let Some(value) = read_env_any(ENV_LOG_FORMAT) {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(bot_token) = overrides.slack_bot_token {
            self.slack.bot_token = secret_value(bot_token);
        }
        if let Some(api_base_url) = overrides.slack_api_base_url {
            self.slack.api_base_url = api_base_url;
        }
        if let Some(account_id) = overrides.time_tracking_account_id {
            self.time_tracking.account_id = account_id;
        }
        if let Some(access_token) = overrides.time_tracking_access_token {
            self.time_tracking.access_token = secret_value(access_token);
        }
        if let Some(base_url) = overrides.time_tracking_base_url {
            self.time_tracking.base_url = base_url;
        }
        if let Some(template_document_id) = overrides.template_document_id {
            self.documents.template_document_id = template_document_id;
        }
        if let Some(credentials_path) = overrides.credentials_path {
            self.documents.credentials_path = Some(credentials_path);
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_slack(&self.slack)?;
        validate_time_tracking(&self.time_tracking)?;
        validate_documents(&self.documents)?;
        validate_server(&self.server)?;
        validate_http(&self.http)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

// The first key of each list is the canonical name; the rest are platform-conventional aliases.
pub const ENV_SLACK_BOT_TOKEN: &[&str] = &["WEEKLYBOT_SLACK_BOT_TOKEN", "SLACK_BOT_TOKEN"];
pub const ENV_SLACK_API_BASE_URL: &[&str] = &["WEEKLYBOT_SLACK_API_BASE_URL"];
pub const ENV_TIME_TRACKING_ACCOUNT_ID: &[&str] =
    &["WEEKLYBOT_TIME_TRACKING_ACCOUNT_ID", "HARVEST_ACCOUNT_ID"];
pub const ENV_TIME_TRACKING_ACCESS_TOKEN: &[&str] =
    &["WEEKLYBOT_TIME_TRACKING_ACCESS_TOKEN", "HARVEST_ACCESS_TOKEN"];
pub const ENV_TIME_TRACKING_BASE_URL: &[&str] = &["WEEKLYBOT_TIME_TRACKING_BASE_URL"];
pub const ENV_TIME_TRACKING_REFRESH_INTERVAL_SECS: &[&str] =
    &["WEEKLYBOT_TIME_TRACKING_REFRESH_INTERVAL_SECS"];
pub const ENV_DOCUMENTS_TEMPLATE_ID: &[&str] = &["WEEKLYBOT_DOCUMENTS_TEMPLATE_ID", "TEMPLATE_DOC_ID"];
pub const ENV_DOCUMENTS_CREDENTIALS_PATH: &[&str] =
    &["WEEKLYBOT_DOCUMENTS_CREDENTIALS_PATH", "GOOGLE_APPLICATION_CREDENTIALS"];
pub const ENV_DOCUMENTS_DRIVE_BASE_URL: &[&str] = &["WEEKLYBOT_DOCUMENTS_DRIVE_BASE_URL"];
pub const ENV_DOCUMENTS_DOCS_BASE_URL: &[&str] = &["WEEKLYBOT_DOCUMENTS_DOCS_BASE_URL"];
pub const ENV_SERVER_BIND_ADDRESS: &[&str] = &["WEEKLYBOT_SERVER_BIND_ADDRESS"];
pub const ENV_SERVER_PORT: &[&str] = &["WEEKLYBOT_SERVER_PORT", "PORT"];
pub const ENV_HTTP_TIMEOUT_SECS: &[&str] = &["WEEKLYBOT_HTTP_TIMEOUT_SECS"];
pub const ENV_HTTP_MAX_RETRIES: &[&str] = &["WEEKLYBOT_HTTP_MAX_RETRIES"];
pub const ENV_LOG_LEVEL: &[&str] = &["WEEKLYBOT_LOG_LEVEL", "WEEKLYBOT_LOGGING_LEVEL"];
pub const ENV_LOG_FORMAT: &[&str] = &["WEEKLYBOT_LOG_FORMAT", "WEEKLYBOT_LOGGING_FORMAT"];

/// Every environment key the loader reads, grouped per setting.
pub const ENV_KEYS: &[&[&str]] = &[
    ENV_SLACK_BOT_TOKEN,
    ENV_SLACK_API_BASE_URL,
    ENV_TIME_TRACKING_ACCOUNT_ID,
    ENV_TIME_TRACKING_ACCESS_TOKEN,
    ENV_TIME_TRACKING_BASE_URL,
    ENV_TIME_TRACKING_REFRESH_INTERVAL_SECS,
    ENV_DOCUMENTS_TEMPLATE_ID,
    ENV_DOCUMENTS_CREDENTIALS_PATH,
    ENV_DOCUMENTS_DRIVE_BASE_URL,
    ENV_DOCUMENTS_DOCS_BASE_URL,
    ENV_SERVER_BIND_ADDRESS,
    ENV_SERVER_PORT,
    ENV_HTTP_TIMEOUT_SECS,
    ENV_HTTP_MAX_RETRIES,
    ENV_LOG_LEVEL,
    ENV_LOG_FORMAT,
];

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    CONFIG_FILE_CANDIDATES.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    let bot_token = slack.bot_token.expose_secret();
    if bot_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.bot_token is required. Get it from https://api.slack.com/apps > Your App > OAuth & Permissions > Bot User OAuth Token".to_string()
        ));
    }
    if !bot_token.starts_with("xoxb-") {
        let hint = if bot_token.starts_with("xapp-") {
            " (hint: you may have used the app-level token instead of the bot token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "slack.bot_token must start with `xoxb-`{hint}. Get it from https://api.slack.com/apps"
        )));
    }

    validate_http_url("slack.api_base_url", &slack.api_base_url)
}

fn validate_time_tracking(time_tracking: &TimeTrackingConfig) -> Result<(), ConfigError> {
    if time_tracking.account_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "time_tracking.account_id is required (Harvest > Developers > Personal Access Tokens)"
                .to_string(),
        ));
    }
    if time_tracking.access_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "time_tracking.access_token is required (Harvest > Developers > Personal Access Tokens)"
                .to_string(),
        ));
    }
    if time_tracking.refresh_interval_secs < 10 || time_tracking.refresh_interval_secs > 86_400 {
        return Err(ConfigError::Validation(
            "time_tracking.refresh_interval_secs must be in range 10..=86400".to_string(),
        ));
    }

    validate_http_url("time_tracking.base_url", &time_tracking.base_url)
}

fn validate_documents(documents: &DocumentsConfig) -> Result<(), ConfigError> {
    if documents.template_document_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "documents.template_document_id is required".to_string(),
        ));
    }

    let Some(path) = documents.credentials_path.as_deref() else {
        return Err(ConfigError::Validation(
            "documents.credentials_path is required (service credential json)".to_string(),
        ));
    };
    if let Err(error) = fs::File::open(path) {
        return Err(ConfigError::Validation(format!(
            "documents.credentials_path `{}` is not readable: {error}",
            path.display()
        )));
    }

    validate_http_url("documents.drive_base_url", &documents.drive_base_url)?;
    validate_http_url("documents.docs_base_url", &documents.docs_base_url)
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    Ok(())
}

fn validate_http(http: &HttpConfig) -> Result<(), ConfigError> {
    if http.timeout_secs == 0 || http.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "http.timeout_secs must be in range 1..=120".to_string(),
        ));
    }
    if http.max_retries > 3 {
        return Err(ConfigError::Validation("http.max_retries must be in range 0..=3".to_string()));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(ConfigError::Validation(format!("{key} must start with http:// or https://")));
    }
    Ok(())
}

fn read_env_any(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| env::var(key).ok().filter(|value| !value.trim().is_empty()))
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    slack: Option<SlackPatch>,
    time_tracking: Option<TimeTrackingPatch>,
    documents: Option<DocumentsPatch>,
    server: Option<ServerPatch>,
    http: Option<HttpPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    bot_token: Option<String>,
    api_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TimeTrackingPatch {
    account_id: Option<String>,
    access_token: Option<String>,
    base_url: Option<String>,
    refresh_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct DocumentsPatch {
    template_document_id: Option<String>,
    credentials_path: Option<PathBuf>,
    drive_base_url: Option<String>,
    docs_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct HttpPatch {
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
