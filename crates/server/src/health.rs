use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use weeklybot_core::directory::ProjectDirectory;

#[derive(Clone)]
pub struct HealthState {
    directory: Arc<ProjectDirectory>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DirectoryCheck {
    pub status: &'static str,
    pub project_count: usize,
    pub last_refreshed_at: Option<String>,
    pub last_error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub directory: DirectoryCheck,
    pub checked_at: String,
}

pub fn router(directory: Arc<ProjectDirectory>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { directory })
}

/// Ready once the project directory has loaded at least once; a later failed
/// refresh still reports ready with the error attached.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let status = state.directory.status();
    let ready = status.loaded;

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "weeklybot-server runtime initialized".to_string(),
        },
        directory: DirectoryCheck {
            status: if ready { "ready" } else { "loading" },
            project_count: status.project_count,
            last_refreshed_at: status.last_refreshed_at.map(|at| at.to_rfc3339()),
            last_error: status.last_error,
        },
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{extract::State, http::StatusCode, Json};
    use weeklybot_core::directory::{ProjectDirectory, ProjectPage, ProjectRecord, ProjectSource};
    use weeklybot_core::errors::{ExternalService, IntegrationError};
    use weeklybot_core::retry::RetryPolicy;

    use crate::health::{health, HealthState};

    struct FixedSource(Result<Vec<&'static str>, u16>);

    #[async_trait]
    impl ProjectSource for FixedSource {
        async fn fetch_page(&self, _cursor: Option<&str>) -> Result<ProjectPage, IntegrationError> {
            match &self.0 {
                Ok(names) => Ok(ProjectPage {
                    projects: names
                        .iter()
                        .map(|name| ProjectRecord { name: (*name).to_owned(), is_active: true })
                        .collect(),
                    next_page: None,
                }),
                Err(status) => Err(IntegrationError::Status {
                    service: ExternalService::TimeTracking,
                    status: *status,
                }),
            }
        }
    }

    fn directory(source: FixedSource) -> Arc<ProjectDirectory> {
        Arc::new(ProjectDirectory::new(Arc::new(source), RetryPolicy::none()))
    }

    #[tokio::test]
    async fn health_returns_ready_once_directory_has_loaded() {
        let directory = directory(FixedSource(Ok(vec!["Alpha", "Beta"])));
        directory.refresh().await.expect("refresh");

        let (status, Json(payload)) = health(State(HealthState { directory })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.directory.project_count, 2);
        assert!(payload.directory.last_refreshed_at.is_some());
        assert_eq!(payload.service.status, "ready");
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_before_first_load() {
        let directory = directory(FixedSource(Err(401)));
        let _ = directory.refresh().await;

        let (status, Json(payload)) = health(State(HealthState { directory })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.directory.status, "loading");
        assert!(payload.directory.last_error.is_some());
        assert_eq!(payload.service.status, "ready");
    }
}
