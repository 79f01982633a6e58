use serde::{Deserialize, Serialize};
use tracing::warn;
use weeklybot_core::domain::update::{Discipline, WeeklyUpdate};

/// Slack caps option text at 75 characters and option values at 150.
pub const OPTION_TEXT_MAX_CHARS: usize = 75;
pub const OPTION_VALUE_MAX_CHARS: usize = 150;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Plain { text } | Self::Mrkdwn { text } => text,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionObject {
    pub text: TextObject,
    pub value: String,
}

impl OptionObject {
    /// Display text is shortened to fit; the value is carried as given.
    pub fn new(text: &str, value: &str) -> Self {
        Self {
            text: TextObject::plain(truncate_chars(text, OPTION_TEXT_MAX_CHARS)),
            value: value.to_owned(),
        }
    }

    /// Picker option whose value is the project name. Names longer than an option value
    /// can hold are left out: a shortened value would title the wrong document.
    pub fn project(name: &str) -> Option<Self> {
        if name.chars().count() > OPTION_VALUE_MAX_CHARS {
            warn!(
                event_name = "slack.options.project_skipped",
                name_chars = name.chars().count(),
                max_chars = OPTION_VALUE_MAX_CHARS,
                "project name too long for an option value; left out of the picker"
            );
            return None;
        }
        Some(Self::new(name, name))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Element {
    PlainTextInput {
        action_id: String,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        multiline: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        placeholder: Option<TextObject>,
    },
    StaticSelect {
        action_id: String,
        options: Vec<OptionObject>,
        #[serde(skip_serializing_if = "Option::is_none")]
        placeholder: Option<TextObject>,
    },
    ExternalSelect {
        action_id: String,
        min_query_length: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        placeholder: Option<TextObject>,
        #[serde(skip_serializing_if = "Option::is_none")]
        initial_option: Option<OptionObject>,
    },
}

impl Element {
    pub fn text_input(action_id: impl Into<String>) -> Self {
        Self::PlainTextInput { action_id: action_id.into(), multiline: false, placeholder: None }
    }

    pub fn multiline_input(action_id: impl Into<String>) -> Self {
        Self::PlainTextInput { action_id: action_id.into(), multiline: true, placeholder: None }
    }

    pub fn static_select(action_id: impl Into<String>, options: Vec<OptionObject>) -> Self {
        Self::StaticSelect { action_id: action_id.into(), options, placeholder: None }
    }

    pub fn external_select(action_id: impl Into<String>) -> Self {
        Self::ExternalSelect {
            action_id: action_id.into(),
            min_query_length: 0,
            placeholder: None,
            initial_option: None,
        }
    }

    pub fn placeholder(mut self, text: impl Into<String>) -> Self {
        match &mut self {
            Self::PlainTextInput { placeholder, .. }
            | Self::StaticSelect { placeholder, .. }
            | Self::ExternalSelect { placeholder, .. } => {
                *placeholder = Some(TextObject::plain(text));
            }
        }
        self
    }

    /// Only meaningful for external selects; ignored elsewhere.
    pub fn initial_option(mut self, option: OptionObject) -> Self {
        if let Self::ExternalSelect { initial_option, .. } = &mut self {
            *initial_option = Some(option);
        }
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section { block_id: String, text: TextObject },
    Input { block_id: String, label: TextObject, element: Element },
}

impl Block {
    pub fn block_id(&self) -> &str {
        match self {
            Self::Section { block_id, .. } | Self::Input { block_id, .. } => block_id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ModalView {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub callback_id: String,
    pub private_metadata: String,
    pub title: TextObject,
    pub submit: TextObject,
    pub close: TextObject,
    pub blocks: Vec<Block>,
}

pub struct ModalBuilder {
    callback_id: String,
    title: String,
    private_metadata: String,
    submit: String,
    close: String,
    blocks: Vec<Block>,
}

impl ModalBuilder {
    pub fn new(callback_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            callback_id: callback_id.into(),
            title: title.into(),
            private_metadata: String::new(),
            submit: "Submit".to_owned(),
            close: "Cancel".to_owned(),
            blocks: Vec::new(),
        }
    }

    pub fn private_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.private_metadata = metadata.into();
        self
    }

    pub fn submit(mut self, label: impl Into<String>) -> Self {
        self.submit = label.into();
        self
    }

    pub fn close(mut self, label: impl Into<String>) -> Self {
        self.close = label.into();
        self
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { block_id: block_id.into(), text: builder.build() });
        self
    }

    pub fn input(
        mut self,
        block_id: impl Into<String>,
        label: impl Into<String>,
        element: Element,
    ) -> Self {
        self.blocks.push(Block::Input {
            block_id: block_id.into(),
            label: TextObject::plain(label),
            element,
        });
        self
    }

    pub fn build(self) -> ModalView {
        ModalView {
            kind: "modal",
            callback_id: self.callback_id,
            private_metadata: self.private_metadata,
            title: TextObject::plain(self.title),
            submit: TextObject::plain(self.submit),
            close: TextObject::plain(self.close),
            blocks: self.blocks,
        }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> TextObject {
        self.text.unwrap_or_else(|| TextObject::plain(""))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionsResponse {
    pub options: Vec<OptionObject>,
}

pub const WEEKLY_UPDATE_CALLBACK_ID: &str = "weekly_update";

/// Block and action ids of one modal input; submissions are read back by these.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModalField {
    pub block_id: &'static str,
    pub action_id: &'static str,
}

pub const PROJECT_FIELD: ModalField = ModalField { block_id: "project", action_id: "project_input" };
pub const NAME_FIELD: ModalField = ModalField { block_id: "name", action_id: "name_input" };
pub const DISCIPLINE_FIELD: ModalField =
    ModalField { block_id: "discipline", action_id: "discipline_input" };
pub const PROGRESS_FIELD: ModalField =
    ModalField { block_id: "progress", action_id: "progress_input" };
pub const CHALLENGES_FIELD: ModalField =
    ModalField { block_id: "challenges", action_id: "challenges_input" };
pub const FEEDBACK_FIELD: ModalField =
    ModalField { block_id: "feedback", action_id: "feedback_input" };
pub const NEXT_STEPS_FIELD: ModalField =
    ModalField { block_id: "next_steps", action_id: "steps_input" };

pub fn weekly_update_modal(channel_id: &str, week_label: &str, projects: &[String]) -> ModalView {
    let mut project_picker = Element::external_select(PROJECT_FIELD.action_id)
        .placeholder(project_placeholder(projects.len()));
    if let [only] = projects {
        if let Some(option) = OptionObject::project(only) {
            project_picker = project_picker.initial_option(option);
        }
    }

    let disciplines = Discipline::ALL
        .iter()
        .map(|discipline| OptionObject::new(discipline.label(), discipline.value()))
        .collect();

    ModalBuilder::new(WEEKLY_UPDATE_CALLBACK_ID, "Weekly Update")
        .private_metadata(channel_id)
        .submit("Submit")
        .close("Cancel")
        .section("header", |section| {
            section.mrkdwn(format!("*Weekly Update – {week_label}*"));
        })
        .input(PROJECT_FIELD.block_id, "Project", project_picker)
        .input(NAME_FIELD.block_id, "Your Name", Element::text_input(NAME_FIELD.action_id))
        .input(
            DISCIPLINE_FIELD.block_id,
            "Choose your area:",
            Element::static_select(DISCIPLINE_FIELD.action_id, disciplines)
                .placeholder("Select a discipline"),
        )
        .input(
            PROGRESS_FIELD.block_id,
            "What was worked on, what progress was made?",
            Element::multiline_input(PROGRESS_FIELD.action_id),
        )
        .input(
            CHALLENGES_FIELD.block_id,
            "Challenges or timing surprises?",
            Element::multiline_input(CHALLENGES_FIELD.action_id),
        )
        .input(
            FEEDBACK_FIELD.block_id,
            "Need feedback from customer?",
            Element::multiline_input(FEEDBACK_FIELD.action_id),
        )
        .input(
            NEXT_STEPS_FIELD.block_id,
            "Next Steps",
            Element::multiline_input(NEXT_STEPS_FIELD.action_id),
        )
        .build()
}

fn project_placeholder(count: usize) -> String {
    match count {
        0 => "Search projects".to_owned(),
        1 => "Search 1 active project".to_owned(),
        n => format!("Search {n} active projects"),
    }
}

pub fn project_options(names: &[String]) -> OptionsResponse {
    OptionsResponse {
        options: names.iter().filter_map(|name| OptionObject::project(name)).collect(),
    }
}

/// Channel summary posted after a submission is relayed.
pub fn weekly_update_message(update: &WeeklyUpdate) -> String {
    format!(
        "*Weekly Update – {project} ({week})*\n\
         > *Name:* {name}\n\
         > *Discipline:* {discipline}\n\
         > *Progress:* {progress}\n\
         > *Challenges:* {challenges}\n\
         > *Feedback Needed:* {feedback}\n\
         > *Next Steps:* {next_steps}",
        project = update.project,
        week = update.week_label,
        name = update.name,
        discipline = update.discipline,
        progress = update.progress,
        challenges = update.challenges,
        feedback = update.feedback,
        next_steps = update.next_steps,
    )
}

fn truncate_chars(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_owned();
    }
    let mut truncated: String = value.chars().take(max_chars.saturating_sub(1)).collect();
    truncated.push('…');
    truncated
}
