//! Project listing from the time-tracking service (Harvest v2 API).

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use weeklybot_core::config::TimeTrackingConfig;
use weeklybot_core::directory::{ProjectPage, ProjectRecord, ProjectSource, PAGE_SIZE};
use weeklybot_core::errors::{ExternalService, IntegrationError};

use crate::outbound::{read_json, request_error};

const SERVICE: ExternalService = ExternalService::TimeTracking;

pub struct HarvestProjectSource {
    http: Client,
    base_url: String,
    account_id: String,
    access_token: SecretString,
}

#[derive(Debug, Deserialize)]
struct ProjectsResponse {
    #[serde(default)]
    projects: Vec<ProjectEntry>,
    #[serde(default)]
    links: Option<Links>,
}

#[derive(Debug, Deserialize)]
struct ProjectEntry {
    name: String,
    #[serde(default)]
    is_active: bool,
}

#[derive(Debug, Deserialize)]
struct Links {
    #[serde(default)]
    next: Option<String>,
}

impl HarvestProjectSource {
    pub fn new(http: Client, config: &TimeTrackingConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            account_id: config.account_id.clone(),
            access_token: config.access_token.clone(),
        }
    }

    pub fn first_page_url(&self) -> String {
        format!("{}/v2/projects?is_active=true&per_page={PAGE_SIZE}", self.base_url)
    }
}

#[async_trait]
impl ProjectSource for HarvestProjectSource {
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<ProjectPage, IntegrationError> {
        let url = cursor.map_or_else(|| self.first_page_url(), str::to_owned);
        let response = self
            .http
            .get(&url)
            .header("Harvest-Account-Id", &self.account_id)
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await
            .map_err(|error| request_error(SERVICE, error))?;

        let body: ProjectsResponse = read_json(SERVICE, response).await?;
        Ok(into_page(body))
    }
}

fn into_page(body: ProjectsResponse) -> ProjectPage {
    ProjectPage {
        projects: body
            .projects
            .into_iter()
            .map(|entry| ProjectRecord { name: entry.name, is_active: entry.is_active })
            .collect(),
        next_page: body.links.and_then(|links| links.next).filter(|next| !next.is_empty()),
    }
}
