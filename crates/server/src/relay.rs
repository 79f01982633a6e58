//! Submission relay: a submitted weekly update goes to the project document
//! first, then to the channel it was opened from.

use std::sync::Arc;

use tracing::{error, info, warn};
use weeklybot_core::documents::{DocumentId, DocumentSink};
use weeklybot_core::domain::update::WeeklyUpdate;
use weeklybot_core::domain::week::current_week_label;
use weeklybot_core::errors::{IntegrationError, PayloadError};
use weeklybot_slack::blocks::weekly_update_message;
use weeklybot_slack::client::SlackApi;
use weeklybot_slack::interactions::Interaction;

pub struct ChatSink {
    slack: Arc<dyn SlackApi>,
}

impl ChatSink {
    pub fn new(slack: Arc<dyn SlackApi>) -> Self {
        Self { slack }
    }

    pub async fn post(&self, channel_id: &str, update: &WeeklyUpdate) -> Result<(), IntegrationError> {
        self.slack.post_message(channel_id, &weekly_update_message(update)).await
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SinkStatus<T> {
    Delivered(T),
    Failed { error_class: &'static str, message: String },
}

impl<T> SinkStatus<T> {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered(_))
    }

    fn from_result(result: Result<T, IntegrationError>) -> Self {
        match result {
            Ok(value) => Self::Delivered(value),
            Err(error) => Self::Failed { error_class: error.error_class(), message: error.to_string() },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelayOutcome {
    Ignored { kind: String },
    Relayed { project: String, document: SinkStatus<DocumentId>, chat: SinkStatus<()> },
}

pub struct SubmissionRelay {
    documents: Arc<DocumentSink>,
    chat: ChatSink,
    week_label: fn() -> String,
}

impl SubmissionRelay {
    pub fn new(documents: Arc<DocumentSink>, chat: ChatSink) -> Self {
        Self { documents, chat, week_label: current_week_label }
    }

    pub fn with_week_label(mut self, week_label: fn() -> String) -> Self {
        self.week_label = week_label;
        self
    }

    pub async fn handle(
        &self,
        interaction: &Interaction,
        correlation_id: &str,
    ) -> Result<RelayOutcome, PayloadError> {
        if !interaction.is_submission() {
            info!(
                event_name = "relay.submission.ignored",
                correlation_id,
                kind = interaction.kind().as_str(),
                "ignoring non-submission interaction"
            );
            return Ok(RelayOutcome::Ignored { kind: interaction.kind().as_str().to_owned() });
        }

        let channel_id = interaction.channel_id()?;
        let update = interaction.weekly_update(&(self.week_label)())?;

        let document = self.documents.append(&update.project, &update.document_row()).await;
        if let Err(failure) = &document {
            error!(
                event_name = "relay.document.failed",
                correlation_id,
                project = %update.project,
                service = %failure.service(),
                error_class = failure.error_class(),
                error = %failure,
                "failed to append weekly update to project document"
            );
        }

        let chat = self.chat.post(&channel_id, &update).await;
        if let Err(failure) = &chat {
            warn!(
                event_name = "relay.chat.failed",
                correlation_id,
                project = %update.project,
                channel_id = %channel_id,
                error_class = failure.error_class(),
                error = %failure,
                "failed to post weekly update summary"
            );
        }

        let document = SinkStatus::from_result(document);
        let chat = SinkStatus::from_result(chat);
        info!(
            event_name = "relay.submission.completed",
            correlation_id,
            project = %update.project,
            document_delivered = document.is_delivered(),
            chat_delivered = chat.is_delivered(),
            "weekly update relayed"
        );
        Ok(RelayOutcome::Relayed { project: update.project, document, chat })
    }
}
