//! Project documents in Google Drive, edited through the Docs API.
//!
//! The bearer token comes from the credential file's `access_token` field and
//! is re-read before every operation, so an external refresher can rotate it
//! without restarting the service.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use weeklybot_core::config::DocumentsConfig;
use weeklybot_core::documents::{DocumentId, DocumentStore};
use weeklybot_core::domain::update::DOCUMENT_ROW_WIDTH;
use weeklybot_core::errors::{ExternalService, IntegrationError};
use weeklybot_core::retry::RetryPolicy;

use crate::outbound::{read_json, request_error};

const SERVICE: ExternalService = ExternalService::Documents;
const GOOGLE_DOC_MIME_TYPE: &str = "application/vnd.google-apps.document";

#[derive(Deserialize)]
struct CredentialFile {
    #[serde(default)]
    access_token: Option<String>,
}

pub fn parse_credential(raw: &str) -> Result<SecretString, IntegrationError> {
    let file: CredentialFile = serde_json::from_str(raw).map_err(|error| {
        IntegrationError::Credential { service: SERVICE, message: format!("invalid json: {error}") }
    })?;
    file.access_token
        .filter(|token| !token.trim().is_empty())
        .map(SecretString::from)
        .ok_or_else(|| IntegrationError::Credential {
            service: SERVICE,
            message: "credential file has no `access_token`".to_owned(),
        })
}

/// Blocking read used at startup and by diagnostics.
pub fn load_credential(path: &Path) -> Result<SecretString, IntegrationError> {
    let raw = std::fs::read_to_string(path).map_err(|error| credential_read_error(path, error))?;
    parse_credential(&raw)
}

async fn read_credential(path: &Path) -> Result<SecretString, IntegrationError> {
    let raw =
        tokio::fs::read_to_string(path).await.map_err(|error| credential_read_error(path, error))?;
    parse_credential(&raw)
}

fn credential_read_error(path: &Path, error: std::io::Error) -> IntegrationError {
    IntegrationError::Credential {
        service: SERVICE,
        message: format!("could not read `{}`: {error}", path.display()),
    }
}

pub struct GoogleDocumentStore {
    http: Client,
    drive_base_url: String,
    docs_base_url: String,
    template_document_id: String,
    credentials_path: PathBuf,
    retry: RetryPolicy,
}

impl GoogleDocumentStore {
    pub fn new(
        http: Client,
        config: &DocumentsConfig,
        credentials_path: PathBuf,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http,
            drive_base_url: config.drive_base_url.trim_end_matches('/').to_owned(),
            docs_base_url: config.docs_base_url.trim_end_matches('/').to_owned(),
            template_document_id: config.template_document_id.clone(),
            credentials_path,
            retry,
        }
    }

    async fn token(&self) -> Result<SecretString, IntegrationError> {
        read_credential(&self.credentials_path).await
    }

    async fn get_document(
        &self,
        token: &SecretString,
        document: &DocumentId,
    ) -> Result<DocsDocument, IntegrationError> {
        self.retry
            .run("get_document", move || async move {
                let response = self
                    .http
                    .get(format!("{}/documents/{}", self.docs_base_url, document))
                    .bearer_auth(token.expose_secret())
                    .send()
                    .await
                    .map_err(|error| request_error(SERVICE, error))?;
                read_json(SERVICE, response).await
            })
            .await
    }

    async fn batch_update(
        &self,
        token: &SecretString,
        document: &DocumentId,
        requests: Vec<Value>,
    ) -> Result<(), IntegrationError> {
        debug!(
            event_name = "documents.batch_update",
            document_id = %document,
            request_count = requests.len(),
            "sending document batch update"
        );
        let response = self
            .http
            .post(format!("{}/documents/{}:batchUpdate", self.docs_base_url, document))
            .bearer_auth(token.expose_secret())
            .json(&json!({ "requests": requests }))
            .send()
            .await
            .map_err(|error| request_error(SERVICE, error))?;
        let _: Value = read_json(SERVICE, response).await?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Deserialize)]
struct DriveFile {
    id: String,
}

#[async_trait]
impl DocumentStore for GoogleDocumentStore {
    async fn find_by_title(&self, title: &str) -> Result<Option<DocumentId>, IntegrationError> {
        let token = self.token().await?;
        let response = self
            .http
            .get(format!("{}/files", self.drive_base_url))
            .bearer_auth(token.expose_secret())
            .query(&[
                ("q", title_query(title).as_str()),
                ("fields", "files(id,name)"),
                ("pageSize", "1"),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ])
            .send()
            .await
            .map_err(|error| request_error(SERVICE, error))?;

        let list: FileList = read_json(SERVICE, response).await?;
        Ok(list.files.into_iter().next().map(|file| DocumentId(file.id)))
    }

    async fn copy_template(&self, title: &str) -> Result<DocumentId, IntegrationError> {
        let token = self.token().await?;
        let response = self
            .http
            .post(format!("{}/files/{}/copy", self.drive_base_url, self.template_document_id))
            .bearer_auth(token.expose_secret())
            .query(&[("supportsAllDrives", "true")])
            .json(&json!({ "name": title }))
            .send()
            .await
            .map_err(|error| request_error(SERVICE, error))?;

        let file: DriveFile = read_json(SERVICE, response).await?;
        Ok(DocumentId(file.id))
    }

    async fn insert_row(
        &self,
        document: &DocumentId,
        cells: &[String; DOCUMENT_ROW_WIDTH],
    ) -> Result<(), IntegrationError> {
        let token = self.token().await?;

        let before = self.get_document(&token, document).await?;
        let table_start = before.first_table().map(|(start, _)| start).ok_or_else(no_table)?;
        self.batch_update(&token, document, vec![insert_row_request(table_start)]).await?;

        let after = self.get_document(&token, document).await?;
        let indices = after.new_row_cell_indices()?;
        let requests = fill_row_requests(&indices, cells);
        if requests.is_empty() {
            return Ok(());
        }
        self.batch_update(&token, document, requests).await
    }
}

/// Drive search expression for a non-trashed Google Doc with exactly this name.
fn title_query(title: &str) -> String {
    let escaped = title.replace('\\', "\\\\").replace('\'', "\\'");
    format!("name = '{escaped}' and mimeType = '{GOOGLE_DOC_MIME_TYPE}' and trashed = false")
}

fn insert_row_request(table_start: u64) -> Value {
    json!({
        "insertTableRow": {
            "tableCellLocation": {
                "tableStartLocation": { "index": table_start },
                "rowIndex": 0,
                "columnIndex": 0
            },
            "insertBelow": true
        }
    })
}

/// Text insertions for one row, last cell first so earlier indices stay valid.
fn fill_row_requests(indices: &[u64], cells: &[String; DOCUMENT_ROW_WIDTH]) -> Vec<Value> {
    indices
        .iter()
        .zip(cells.iter())
        .rev()
        .filter(|(_, text)| !text.is_empty())
        .map(|(index, text)| json!({ "insertText": { "location": { "index": index }, "text": text } }))
        .collect()
}

fn no_table() -> IntegrationError {
    IntegrationError::Decode { service: SERVICE, message: "document has no table".to_owned() }
}

#[derive(Debug, Default, Deserialize)]
struct DocsDocument {
    #[serde(default)]
    body: DocsBody,
}

#[derive(Debug, Default, Deserialize)]
struct DocsBody {
    #[serde(default)]
    content: Vec<StructuralElement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StructuralElement {
    #[serde(default)]
    start_index: Option<u64>,
    #[serde(default)]
    table: Option<DocsTable>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocsTable {
    #[serde(default)]
    table_rows: Vec<DocsTableRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocsTableRow {
    #[serde(default)]
    table_cells: Vec<DocsTableCell>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocsTableCell {
    #[serde(default)]
    start_index: Option<u64>,
    #[serde(default)]
    content: Vec<StructuralElement>,
}

impl DocsDocument {
    fn first_table(&self) -> Option<(u64, &DocsTable)> {
        self.body.content.iter().find_map(|element| {
            let table = element.table.as_ref()?;
            Some((element.start_index?, table))
        })
    }

    /// Insertion index of each cell in the row directly below the header.
    fn new_row_cell_indices(&self) -> Result<Vec<u64>, IntegrationError> {
        let (_, table) = self.first_table().ok_or_else(no_table)?;
        let row = table.table_rows.get(1).ok_or_else(|| IntegrationError::Decode {
            service: SERVICE,
            message: "table has no row below the header".to_owned(),
        })?;

        if row.table_cells.len() < DOCUMENT_ROW_WIDTH {
            return Err(IntegrationError::Decode {
                service: SERVICE,
                message: format!(
                    "table has {} columns, expected {DOCUMENT_ROW_WIDTH}",
                    row.table_cells.len()
                ),
            });
        }

        row.table_cells
            .iter()
            .take(DOCUMENT_ROW_WIDTH)
            .map(|cell| {
                cell.content
                    .first()
                    .and_then(|paragraph| paragraph.start_index)
                    .or_else(|| cell.start_index.map(|index| index + 1))
                    .ok_or_else(|| IntegrationError::Decode {
                        service: SERVICE,
                        message: "table cell has no start index".to_owned(),
                    })
            })
            .collect()
    }
}
