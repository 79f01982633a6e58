//! Domain core for weeklybot: configuration, errors, the weekly update model,
//! the project directory cache and the document sink.

pub mod config;
pub mod directory;
pub mod documents;
pub mod domain;
pub mod errors;
pub mod retry;

pub use directory::{ProjectDirectory, ProjectPage, ProjectRecord, ProjectSource};
pub use documents::{DocumentId, DocumentSink, DocumentStore};
pub use domain::update::{Discipline, WeeklyUpdate, DOCUMENT_ROW_WIDTH};
pub use errors::{ExternalService, IntegrationError, PayloadError};
pub use retry::RetryPolicy;
