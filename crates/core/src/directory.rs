//! In-memory directory of active project names.
//!
//! The directory owns one immutable snapshot (`Arc<[String]>`). A refresh builds a
//! complete replacement off to the side and swaps it in, so readers never observe a
//! partially-populated list. Refreshes are serialized by `refresh_lock`; a failed
//! refresh keeps the previous snapshot.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::IntegrationError;
use crate::retry::RetryPolicy;

/// Platform cap on options returned to an external select.
pub const SEARCH_RESULT_LIMIT: usize = 100;
pub const PAGE_SIZE: usize = 100;
const MAX_PAGES: usize = 1_000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectRecord {
    pub name: String,
    pub is_active: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProjectPage {
    pub projects: Vec<ProjectRecord>,
    /// Opaque cursor for the following page; `None` on the last page.
    pub next_page: Option<String>,
}

#[async_trait]
pub trait ProjectSource: Send + Sync {
    /// Fetch one page. `cursor` is `None` for the first page, then the previous page's `next_page`.
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<ProjectPage, IntegrationError>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DirectoryStatus {
    pub loaded: bool,
    pub project_count: usize,
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

pub struct ProjectDirectory {
    source: Arc<dyn ProjectSource>,
    retry: RetryPolicy,
    snapshot: RwLock<Arc<[String]>>,
    status: Mutex<DirectoryStatus>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl ProjectDirectory {
    pub fn new(source: Arc<dyn ProjectSource>, retry: RetryPolicy) -> Self {
        Self {
            source,
            retry,
            snapshot: RwLock::new(Arc::from(Vec::<String>::new())),
            status: Mutex::new(DirectoryStatus::default()),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> Arc<[String]> {
        self.snapshot.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn status(&self) -> DirectoryStatus {
        self.status.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.status().loaded
    }

    pub fn search(&self, query: &str) -> Vec<String> {
        search_names(&self.snapshot(), query)
    }

    /// Fetch every page of active projects and replace the snapshot.
    pub async fn refresh(&self) -> Result<Arc<[String]>, IntegrationError> {
        let _writer = self.refresh_lock.lock().await;

        match self.fetch_all().await {
            Ok(names) => {
                let snapshot: Arc<[String]> = Arc::from(names);
                *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = snapshot.clone();

                let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
                status.loaded = true;
                status.project_count = snapshot.len();
                status.last_refreshed_at = Some(Utc::now());
                status.last_error = None;

                info!(
                    event_name = "directory.refresh.completed",
                    project_count = snapshot.len(),
                    "project directory refreshed"
                );
                Ok(snapshot)
            }
            Err(error) => {
                self.status.lock().unwrap_or_else(PoisonError::into_inner).last_error =
                    Some(error.to_string());

                warn!(
                    event_name = "directory.refresh.failed",
                    service = %error.service(),
                    error_class = error.error_class(),
                    error = %error,
                    stale_project_count = self.snapshot().len(),
                    "project directory refresh failed; serving previous snapshot"
                );
                Err(error)
            }
        }
    }

    /// Snapshot for a request; refreshes inline only if nothing has ever loaded.
    pub async fn ensure_loaded(&self) -> Arc<[String]> {
        if !self.is_loaded() {
            // Failure is logged by `refresh`; the empty snapshot is still served.
            let _ = self.refresh().await;
        }
        self.snapshot()
    }

    async fn fetch_all(&self) -> Result<Vec<String>, IntegrationError> {
        let mut names = Vec::new();
        let mut cursor: Option<String> = None;

        for page_number in 0..MAX_PAGES {
            let page = self
                .retry
                .run("list_projects", || self.source.fetch_page(cursor.as_deref()))
                .await?;
            debug!(
                event_name = "directory.refresh.page",
                page_number,
                page_len = page.projects.len(),
                "fetched project page"
            );

            names.extend(
                page.projects.into_iter().filter(|project| project.is_active).map(|p| p.name),
            );

            match page.next_page {
                Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
                _ => return Ok(names),
            }
        }

        warn!(
            event_name = "directory.refresh.page_limit",
            max_pages = MAX_PAGES,
            "project listing exceeded page limit; keeping pages fetched so far"
        );
        Ok(names)
    }
}

/// Case-insensitive substring match in directory order, capped at [`SEARCH_RESULT_LIMIT`].
pub fn search_names(names: &[String], query: &str) -> Vec<String> {
    let blank = query.trim().is_empty();
    let needle = query.to_lowercase();
    names
        .iter()
        .filter(|name| blank || name.to_lowercase().contains(&needle))
        .take(SEARCH_RESULT_LIMIT)
        .cloned()
        .collect()
}

/// Periodic refresh on the runtime; the first tick fires immediately.
pub fn spawn_refresh_task(directory: Arc<ProjectDirectory>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let _ = directory.refresh().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::{
        search_names, spawn_refresh_task, ProjectDirectory, ProjectPage, ProjectRecord,
        ProjectSource, SEARCH_RESULT_LIMIT,
    };
    use crate::errors::{ExternalService, IntegrationError};
    use crate::retry::RetryPolicy;

    #[derive(Default)]
    struct ScriptedSource {
        state: Mutex<ScriptedState>,
    }

    #[derive(Default)]
    struct ScriptedState {
        pages: VecDeque<Result<ProjectPage, IntegrationError>>,
        repeat: Option<Vec<ProjectPage>>,
        cursors: Vec<Option<String>>,
    }

    impl ScriptedSource {
        fn with_pages(pages: Vec<Result<ProjectPage, IntegrationError>>) -> Self {
            Self {
                state: Mutex::new(ScriptedState { pages: pages.into(), ..ScriptedState::default() }),
            }
        }

        /// Serves the same upstream listing on every refresh.
        fn repeating(pages: Vec<ProjectPage>) -> Self {
            Self {
                state: Mutex::new(ScriptedState { repeat: Some(pages), ..ScriptedState::default() }),
            }
        }

        async fn cursors(&self) -> Vec<Option<String>> {
            self.state.lock().await.cursors.clone()
        }
    }

    #[async_trait]
    impl ProjectSource for ScriptedSource {
        async fn fetch_page(&self, cursor: Option<&str>) -> Result<ProjectPage, IntegrationError> {
            let mut state = self.state.lock().await;
            state.cursors.push(cursor.map(str::to_owned));
            if let Some(pages) = &state.repeat {
                let index = cursor.and_then(|c| c.parse::<usize>().ok()).unwrap_or(0);
                return Ok(pages[index].clone());
            }
            state.pages.pop_front().unwrap_or_else(|| Ok(ProjectPage::default()))
        }
    }

    fn active(names: &[&str]) -> Vec<ProjectRecord> {
        names.iter().map(|name| ProjectRecord { name: (*name).to_owned(), is_active: true }).collect()
    }

    fn page(projects: Vec<ProjectRecord>, next_page: Option<&str>) -> ProjectPage {
        ProjectPage { projects, next_page: next_page.map(str::to_owned) }
    }

    fn directory(source: Arc<ScriptedSource>) -> ProjectDirectory {
        ProjectDirectory::new(source, RetryPolicy::none())
    }

    fn owned(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| (*name).to_owned()).collect()
    }

    #[tokio::test]
    async fn search_is_case_insensitive_and_preserves_order() {
        let source = Arc::new(ScriptedSource::with_pages(vec![Ok(page(
            active(&["Alpha", "beta", "Gamma"]),
            None,
        ))]));
        let directory = directory(source);
        directory.refresh().await.expect("refresh");

        assert_eq!(directory.search("a"), owned(&["Alpha", "beta", "Gamma"]));
        assert_eq!(directory.search("A"), owned(&["Alpha", "beta", "Gamma"]));
        assert_eq!(directory.search("gam"), owned(&["Gamma"]));
        assert!(directory.search("z").is_empty());
    }

    #[tokio::test]
    async fn refresh_follows_next_page_links_and_drops_inactive_projects() {
        let source = Arc::new(ScriptedSource::with_pages(vec![
            Ok(page(
                vec![
                    ProjectRecord { name: "Alpha".to_owned(), is_active: true },
                    ProjectRecord { name: "Archived".to_owned(), is_active: false },
                ],
                Some("https://api.example.test/v2/projects?page=2"),
            )),
            Ok(page(active(&["Beta"]), None)),
        ]));
        let directory = directory(source.clone());

        let snapshot = directory.refresh().await.expect("refresh");

        assert_eq!(snapshot.to_vec(), owned(&["Alpha", "Beta"]));
        assert_eq!(
            source.cursors().await,
            vec![None, Some("https://api.example.test/v2/projects?page=2".to_owned())]
        );
    }

    #[tokio::test]
    async fn repeated_cursor_stops_pagination() {
        let source = Arc::new(ScriptedSource::with_pages(vec![
            Ok(page(active(&["Alpha"]), Some("same"))),
            Ok(page(active(&["Beta"]), Some("same"))),
        ]));
        let directory = directory(source.clone());

        let snapshot = directory.refresh().await.expect("refresh");

        assert_eq!(snapshot.to_vec(), owned(&["Alpha", "Beta"]));
        assert_eq!(source.cursors().await.len(), 2);
    }

    #[tokio::test]
    async fn refresh_is_idempotent_for_unchanged_upstream() {
        let source = Arc::new(ScriptedSource::repeating(vec![
            page(active(&["Alpha", "beta"]), Some("1")),
            page(active(&["Gamma"]), None),
        ]));
        let directory = directory(source);

        let first = directory.refresh().await.expect("first refresh");
        let second = directory.refresh().await.expect("second refresh");

        assert_eq!(first, second);
        assert_eq!(directory.snapshot(), second);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_stale_snapshot() {
        let source = Arc::new(ScriptedSource::with_pages(vec![
            Ok(page(active(&["Alpha"]), None)),
            Err(IntegrationError::Status { service: ExternalService::TimeTracking, status: 401 }),
        ]));
        let directory = directory(source);

        directory.refresh().await.expect("first refresh");
        let error = directory.refresh().await.expect_err("second refresh should fail");

        assert_eq!(error.error_class(), "auth");
        assert_eq!(directory.snapshot().to_vec(), owned(&["Alpha"]));
        let status = directory.status();
        assert!(status.loaded);
        assert!(status.last_error.is_some());
    }

    #[tokio::test]
    async fn failure_midway_through_pages_does_not_publish_partial_list() {
        let source = Arc::new(ScriptedSource::with_pages(vec![
            Ok(page(active(&["Alpha"]), None)),
            Ok(page(active(&["Beta"]), Some("2"))),
            Err(IntegrationError::Timeout { service: ExternalService::TimeTracking }),
        ]));
        let directory = directory(source);

        directory.refresh().await.expect("first refresh");
        assert!(directory.refresh().await.is_err());

        assert_eq!(directory.snapshot().to_vec(), owned(&["Alpha"]));
    }

    #[tokio::test]
    async fn ensure_loaded_refreshes_only_once() {
        let source = Arc::new(ScriptedSource::with_pages(vec![Ok(page(active(&["Alpha"]), None))]));
        let directory = directory(source.clone());

        assert_eq!(directory.ensure_loaded().await.to_vec(), owned(&["Alpha"]));
        assert_eq!(directory.ensure_loaded().await.to_vec(), owned(&["Alpha"]));
        assert_eq!(source.cursors().await.len(), 1);
    }

    #[tokio::test]
    async fn ensure_loaded_serves_empty_list_when_upstream_is_down() {
        let source = Arc::new(ScriptedSource::with_pages(vec![Err(IntegrationError::Transport {
            service: ExternalService::TimeTracking,
            message: "connection refused".to_owned(),
        })]));
        let directory = directory(source);

        assert!(directory.ensure_loaded().await.is_empty());
        assert!(!directory.is_loaded());
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_task_runs_on_interval() {
        let source = Arc::new(ScriptedSource::repeating(vec![page(active(&["Alpha"]), None)]));
        let directory = Arc::new(directory(source.clone()));

        let handle = spawn_refresh_task(directory.clone(), Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(130)).await;
        handle.abort();

        assert_eq!(source.cursors().await.len(), 3);
        assert!(directory.is_loaded());
    }

    #[test]
    fn empty_query_returns_first_hundred() {
        let names: Vec<String> = (0..250).map(|index| format!("Project {index:03}")).collect();

        let results = search_names(&names, "   ");

        assert_eq!(results.len(), SEARCH_RESULT_LIMIT);
        assert_eq!(results.first().map(String::as_str), Some("Project 000"));
        assert_eq!(results.last().map(String::as_str), Some("Project 099"));
    }

    #[test]
    fn search_results_are_capped_and_all_match() {
        let names: Vec<String> = (0..300)
            .map(|index| if index % 2 == 0 { format!("Widget {index}") } else { format!("Gear {index}") })
            .collect();

        let results = search_names(&names, "WIDGET");

        assert_eq!(results.len(), SEARCH_RESULT_LIMIT);
        assert!(results.iter().all(|name| name.to_lowercase().contains("widget")));
    }

    #[test]
    fn surrounding_spaces_are_part_of_the_query() {
        let names = vec!["Alpha Beta".to_owned(), "Betamax".to_owned()];

        assert_eq!(search_names(&names, " beta"), vec!["Alpha Beta".to_owned()]);
        assert_eq!(search_names(&names, "   "), names);
    }
}
