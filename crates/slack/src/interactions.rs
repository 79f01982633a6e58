//! Parsing of interactive payloads posted to the interaction and options endpoints.

use std::collections::HashMap;

use serde::Deserialize;
use weeklybot_core::domain::update::{Discipline, WeeklyUpdate};
use weeklybot_core::errors::PayloadError;

use crate::blocks::{
    ModalField, CHALLENGES_FIELD, DISCIPLINE_FIELD, FEEDBACK_FIELD, NAME_FIELD, NEXT_STEPS_FIELD,
    PROGRESS_FIELD, PROJECT_FIELD,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InteractionKind {
    Submission,
    Other(String),
}

impl InteractionKind {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "view_submission" | "submission" => Self::Submission,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Submission => "view_submission",
            Self::Other(kind) => kind,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
struct RawInteraction {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    view: Option<RawView>,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct RawView {
    #[serde(default)]
    private_metadata: Option<String>,
    #[serde(default)]
    state: Option<RawState>,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct RawState {
    #[serde(default)]
    values: HashMap<String, HashMap<String, RawElementState>>,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct RawElementState {
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    selected_option: Option<RawSelectedOption>,
}

#[derive(Clone, Debug, Deserialize)]
struct RawSelectedOption {
    text: RawOptionText,
    value: String,
}

#[derive(Clone, Debug, Deserialize)]
struct RawOptionText {
    text: String,
}

/// An interaction payload whose kind has been classified.
#[derive(Clone, Debug)]
pub struct Interaction {
    kind: InteractionKind,
    view: Option<RawView>,
}

impl Interaction {
    pub fn kind(&self) -> &InteractionKind {
        &self.kind
    }

    pub fn is_submission(&self) -> bool {
        self.kind == InteractionKind::Submission
    }

    /// Channel the modal was opened from, carried in the view's private metadata.
    pub fn channel_id(&self) -> Result<String, PayloadError> {
        self.view
            .as_ref()
            .and_then(|view| view.private_metadata.as_deref())
            .map(str::trim)
            .filter(|channel| !channel.is_empty())
            .map(str::to_owned)
            .ok_or_else(|| PayloadError::MissingField("view.private_metadata".to_owned()))
    }

    /// Read the seven modal fields into an update stamped with `week_label`.
    pub fn weekly_update(&self, week_label: &str) -> Result<WeeklyUpdate, PayloadError> {
        let values = self
            .view
            .as_ref()
            .and_then(|view| view.state.as_ref())
            .map(|state| &state.values)
            .ok_or_else(|| PayloadError::MissingField("view.state.values".to_owned()))?;

        let project = selected_option(values, PROJECT_FIELD)?.value.clone();
        let discipline = selected_option(values, DISCIPLINE_FIELD)?.text.text.parse::<Discipline>()?;

        Ok(WeeklyUpdate {
            project,
            name: text_value(values, NAME_FIELD)?,
            discipline,
            progress: text_value(values, PROGRESS_FIELD)?,
            challenges: text_value(values, CHALLENGES_FIELD)?,
            feedback: text_value(values, FEEDBACK_FIELD)?,
            next_steps: text_value(values, NEXT_STEPS_FIELD)?,
            week_label: week_label.to_owned(),
        })
    }
}

pub fn parse_interaction(raw: &str) -> Result<Interaction, PayloadError> {
    let payload: RawInteraction =
        serde_json::from_str(raw).map_err(|error| PayloadError::InvalidJson(error.to_string()))?;
    let kind = payload.kind.ok_or_else(|| PayloadError::MissingField("type".to_owned()))?;

    Ok(Interaction { kind: InteractionKind::parse(&kind), view: payload.view })
}

#[derive(Clone, Debug, Default, Deserialize)]
struct RawOptionsRequest {
    #[serde(default)]
    value: Option<String>,
}

/// Typed query of an options request. An absent value is an empty query.
pub fn parse_options_query(raw: &str) -> Result<String, PayloadError> {
    let request: RawOptionsRequest =
        serde_json::from_str(raw).map_err(|error| PayloadError::InvalidJson(error.to_string()))?;
    Ok(request.value.unwrap_or_default())
}

fn element<'a>(
    values: &'a HashMap<String, HashMap<String, RawElementState>>,
    field: ModalField,
) -> Result<&'a RawElementState, PayloadError> {
    values
        .get(field.block_id)
        .and_then(|block| block.get(field.action_id))
        .ok_or_else(|| missing(field))
}

fn text_value(
    values: &HashMap<String, HashMap<String, RawElementState>>,
    field: ModalField,
) -> Result<String, PayloadError> {
    element(values, field)?.value.clone().ok_or_else(|| missing(field))
}

fn selected_option(
    values: &HashMap<String, HashMap<String, RawElementState>>,
    field: ModalField,
) -> Result<&RawSelectedOption, PayloadError> {
    element(values, field)?.selected_option.as_ref().ok_or_else(|| missing(field))
}

fn missing(field: ModalField) -> PayloadError {
    PayloadError::MissingField(format!("{}.{}", field.block_id, field.action_id))
}
