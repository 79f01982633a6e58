use serde::Deserialize;
use weeklybot_core::errors::PayloadError;

/// Form body of the slash command request. Slack sends many more fields; only
/// the ones needed to open the modal are kept.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SlashCommandPayload {
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub trigger_id: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenModalRequest {
    pub trigger_id: String,
    pub channel_id: String,
}

impl SlashCommandPayload {
    pub fn open_modal_request(&self) -> Result<OpenModalRequest, PayloadError> {
        Ok(OpenModalRequest {
            trigger_id: required(self.trigger_id.as_deref(), "trigger_id")?,
            channel_id: required(self.channel_id.as_deref(), "channel_id")?,
        })
    }
}

fn required(value: Option<&str>, field: &str) -> Result<String, PayloadError> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| PayloadError::MissingField(field.to_owned()))
}

#[cfg(test)]
mod tests {
    use weeklybot_core::errors::PayloadError;

    use super::{OpenModalRequest, SlashCommandPayload};

    #[test]
    fn trigger_and_channel_are_required() {
        let payload = SlashCommandPayload {
            command: Some("/weekly".to_owned()),
            trigger_id: Some("13345224609.738474920.8088930838d88f008e0".to_owned()),
            channel_id: Some("C42".to_owned()),
            user_id: None,
        };

        assert_eq!(
            payload.open_modal_request(),
            Ok(OpenModalRequest {
                trigger_id: "13345224609.738474920.8088930838d88f008e0".to_owned(),
                channel_id: "C42".to_owned(),
            })
        );
    }

    #[test]
    fn blank_trigger_is_missing() {
        let payload = SlashCommandPayload {
            trigger_id: Some("  ".to_owned()),
            channel_id: Some("C42".to_owned()),
            ..SlashCommandPayload::default()
        };

        assert_eq!(
            payload.open_modal_request(),
            Err(PayloadError::MissingField("trigger_id".to_owned()))
        );
    }

    #[test]
    fn missing_channel_is_missing() {
        let payload =
            SlashCommandPayload { trigger_id: Some("T1".to_owned()), ..SlashCommandPayload::default() };

        assert_eq!(
            payload.open_modal_request(),
            Err(PayloadError::MissingField("channel_id".to_owned()))
        );
    }
}
