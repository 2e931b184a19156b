//! Request/response shapes for the chat-transport webhook.
//!
//! The minimal event shape is parsed leniently: only the fields the
//! ingest algorithm actually reads are required, everything else is
//! ignored rather than rejected, so the webhook doesn't break the moment
//! the chat transport adds a field.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookBody {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<MessageBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageBody {
    pub chat: Chat,
    pub from: From,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct From {
    pub id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebhookResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl WebhookResponse {
    #[must_use]
    pub fn ok() -> Self {
        Self {
            ok: true,
            job_id: None,
            message: None,
        }
    }

    #[must_use]
    pub fn ok_with_job(job_id: impl ToString) -> Self {
        Self {
            ok: true,
            job_id: Some(job_id.to_string()),
            message: None,
        }
    }

    #[must_use]
    pub fn ok_with_message(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            job_id: None,
            message: Some(message.into()),
        }
    }

    #[must_use]
    pub fn ok_with_job_and_message(job_id: impl ToString, message: impl Into<String>) -> Self {
        Self {
            ok: true,
            job_id: Some(job_id.to_string()),
            message: Some(message.into()),
        }
    }
}

/// The outcome of classifying an inbound message's text.
/// `Control`/`EmptyPrompt`/`Invalid` are answered immediately
/// with a canned response and never reach the dedupe/job-creation steps;
/// only `Prompt` proceeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// No text at all — acknowledged and dropped.
    NoContent,
    /// A recognized control command (`/start`, `/help`, ...).
    Control(&'static str),
    /// `/prompt <text>` with a non-empty payload.
    Prompt(String),
    /// `/prompt` with nothing (or only whitespace) after it.
    EmptyPrompt,
    /// Anything else: an unrecognized slash command or plain text that
    /// isn't a recognized control command.
    Invalid,
}

const START_REPLY: &str = "Hi! Send /prompt <your request> to generate a page.";
const HELP_REPLY: &str =
    "Send /prompt followed by a description of the page you want, e.g. /prompt Build a landing page for a bakery.";
pub const EMPTY_PROMPT_REPLY: &str = "The /prompt command needs some text after it, e.g. /prompt Build a landing page.";
pub const INVALID_COMMAND_REPLY: &str =
    "Sorry, I didn't understand that. Try /prompt <your request> or /help.";

/// Classifies the text of an inbound message.
#[must_use]
pub fn classify(text: Option<&str>) -> Classification {
    let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
        return Classification::NoContent;
    };

    match text {
        "/start" => Classification::Control(START_REPLY),
        "/help" => Classification::Control(HELP_REPLY),
        _ => {
            if let Some(rest) = text.strip_prefix("/prompt") {
                let prompt = rest.trim();
                if prompt.is_empty() {
                    Classification::EmptyPrompt
                } else {
                    Classification::Prompt(prompt.to_string())
                }
            } else {
                Classification::Invalid
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_text_is_no_content() {
        assert_eq!(classify(None), Classification::NoContent);
        assert_eq!(classify(Some("   ")), Classification::NoContent);
    }

    #[test]
    fn recognized_control_commands_classify_as_control() {
        assert_eq!(classify(Some("/start")), Classification::Control(START_REPLY));
        assert_eq!(classify(Some("/help")), Classification::Control(HELP_REPLY));
    }

    #[test]
    fn prompt_with_text_extracts_the_payload() {
        assert_eq!(
            classify(Some("/prompt Build a landing page")),
            Classification::Prompt("Build a landing page".to_string())
        );
    }

    #[test]
    fn prompt_with_only_whitespace_is_empty() {
        assert_eq!(classify(Some("/prompt    ")), Classification::EmptyPrompt);
        assert_eq!(classify(Some("/prompt")), Classification::EmptyPrompt);
    }

    #[test]
    fn anything_else_is_invalid() {
        assert_eq!(classify(Some("/unknown")), Classification::Invalid);
        assert_eq!(classify(Some("just chatting")), Classification::Invalid);
    }
}
