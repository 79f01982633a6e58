//! Append weekly updates to per-project tracking documents.
//!
//! Find-or-create is serialized per project title: the first submission for a new
//! project copies the template, later ones (including concurrent ones) reuse that
//! copy. The resolved document id is remembered per project, so reuse does not depend
//! on the store's title search having indexed a copy made moments earlier.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::update::DOCUMENT_ROW_WIDTH;
use crate::errors::IntegrationError;
use crate::retry::RetryPolicy;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DocumentId(pub String);

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Document whose title equals `title` exactly, if any.
    async fn find_by_title(&self, title: &str) -> Result<Option<DocumentId>, IntegrationError>;

    /// Copy the configured template document under a new title.
    async fn copy_template(&self, title: &str) -> Result<DocumentId, IntegrationError>;

    /// Insert a row below the header row of the document's first table and fill its cells.
    async fn insert_row(
        &self,
        document: &DocumentId,
        cells: &[String; DOCUMENT_ROW_WIDTH],
    ) -> Result<(), IntegrationError>;
}

/// Projects whose document ids are remembered before idle entries are pruned.
pub const MAX_TRACKED_PROJECTS: usize = 512;

type ProjectSlot = Arc<tokio::sync::Mutex<Option<DocumentId>>>;

pub struct DocumentSink {
    store: Arc<dyn DocumentStore>,
    retry: RetryPolicy,
    project_slots: Mutex<HashMap<String, ProjectSlot>>,
}

impl DocumentSink {
    pub fn new(store: Arc<dyn DocumentStore>, retry: RetryPolicy) -> Self {
        Self { store, retry, project_slots: Mutex::new(HashMap::new()) }
    }

    pub async fn append(
        &self,
        project: &str,
        cells: &[String; DOCUMENT_ROW_WIDTH],
    ) -> Result<DocumentId, IntegrationError> {
        let slot = self.project_slot(project);
        let document = self.find_or_create(project, &slot).await?;
        if let Err(error) = self.store.insert_row(&document, cells).await {
            // The document may have been removed; resolve it again next time.
            *slot.lock().await = None;
            warn!(
                event_name = "relay.document.forgotten",
                project,
                document_id = %document,
                error_class = error.error_class(),
                "row insert failed; dropping remembered document id"
            );
            return Err(error);
        }

        info!(
            event_name = "relay.document.row_inserted",
            project,
            document_id = %document,
            "appended weekly update row"
        );
        Ok(document)
    }

    async fn find_or_create(
        &self,
        project: &str,
        slot: &ProjectSlot,
    ) -> Result<DocumentId, IntegrationError> {
        let mut known = slot.lock().await;
        if let Some(document) = known.as_ref() {
            return Ok(document.clone());
        }

        let document = match self
            .retry
            .run("find_document", || self.store.find_by_title(project))
            .await?
        {
            Some(document) => document,
            None => {
                let document = self.store.copy_template(project).await?;
                info!(
                    event_name = "relay.document.created",
                    project,
                    document_id = %document,
                    "created project document from template"
                );
                document
            }
        };

        *known = Some(document.clone());
        Ok(document)
    }

    /// Per-project slot. At capacity, slots no other task holds are pruned first.
    fn project_slot(&self, project: &str) -> ProjectSlot {
        let mut slots = self.project_slots.lock().unwrap_or_else(PoisonError::into_inner);
        if !slots.contains_key(project) && slots.len() >= MAX_TRACKED_PROJECTS {
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        }
        slots.entry(project.to_owned()).or_default().clone()
    }

    #[cfg(test)]
    fn tracked_projects(&self) -> usize {
        self.project_slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
