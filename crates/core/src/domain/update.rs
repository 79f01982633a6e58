use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::PayloadError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Discipline {
    #[serde(rename = "ID")]
    Industrial,
    #[serde(rename = "ME")]
    Mechanical,
    #[serde(rename = "EE")]
    Electrical,
}

impl Discipline {
    pub const ALL: [Discipline; 3] = [Self::Industrial, Self::Mechanical, Self::Electrical];

    /// Label shown in the modal, the chat summary and the document row.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Industrial => "ID",
            Self::Mechanical => "ME",
            Self::Electrical => "EE",
        }
    }

    /// Option value submitted back by the platform.
    pub fn value(&self) -> &'static str {
        match self {
            Self::Industrial => "id",
            Self::Mechanical => "me",
            Self::Electrical => "ee",
        }
    }
}

impl fmt::Display for Discipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Discipline {
    type Err = PayloadError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "id" => Ok(Self::Industrial),
            "me" => Ok(Self::Mechanical),
            "ee" => Ok(Self::Electrical),
            _ => Err(PayloadError::InvalidValue {
                field: "discipline".to_owned(),
                value: raw.to_owned(),
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyUpdate {
    pub project: String,
    pub name: String,
    pub discipline: Discipline,
    pub progress: String,
    pub challenges: String,
    pub feedback: String,
    pub next_steps: String,
    pub week_label: String,
}

/// Number of cells a weekly update fills in a project document row.
pub const DOCUMENT_ROW_WIDTH: usize = 6;

impl WeeklyUpdate {
    /// Cells in document column order: name, discipline, progress, challenges, feedback, next steps.
    pub fn document_row(&self) -> [String; DOCUMENT_ROW_WIDTH] {
        [
            self.name.clone(),
            self.discipline.label().to_owned(),
            self.progress.clone(),
            self.challenges.clone(),
            self.feedback.clone(),
            self.next_steps.clone(),
        ]
    }
}
