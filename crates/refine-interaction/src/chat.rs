//! Chat Completions wire types and response mapping.

use refine_core::{ErrorReport, ErrorType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatCompletionRequest {
    /// `[system prompt, user text]` for a single rewrite.
    pub fn rewrite(model: &str, system_prompt: &str, text: &str) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: text.to_string(),
                },
            ],
        }
    }

    pub fn user_text(&self) -> &str {
        self.messages
            .iter()
            .rfind(|message| message.role == "user")
            .map(|message| message.content.as_str())
            .unwrap_or_default()
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ResponseMessage>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Statuses worth another attempt.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

/// Pulls `choices[0].message.content` out of a success body.
pub fn extract_text_response(body: &str) -> Result<String, ErrorReport> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body).map_err(|err| {
        ErrorReport::new(
            ErrorType::Parse,
            format!("The rewrite service sent a response that could not be read: {err}"),
        )
    })?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| {
            ErrorReport::new(
                ErrorType::Empty,
                "The rewrite service returned no text. Try again or pick another model.",
            )
        })
}

/// Maps a non-2xx reply to a user-facing report.
pub fn map_http_error(status: u16, body: &str) -> ErrorReport {
    let error_type = match status {
        401 | 403 => ErrorType::Auth,
        408 => ErrorType::Timeout,
        429 => ErrorType::RateLimit,
        _ => ErrorType::Api,
    };
    let message = error_detail(body).unwrap_or_else(|| default_message(status).to_string());
    ErrorReport::new(error_type, message).with_status(status)
}

/// Human-readable detail from `{"error": {"message": ...}}`, `{"error": "..."}`
/// or `{"message": ...}`, else the raw body.
fn error_detail(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return Some(body.chars().take(300).collect());
    };
    value
        .pointer("/error/message")
        .or_else(|| value.get("error").filter(|error| error.is_string()))
        .or_else(|| value.get("message"))
        .and_then(|detail| detail.as_str())
        .map(str::to_string)
}

fn default_message(status: u16) -> &'static str {
    match status {
        400 => "The rewrite service rejected the request.",
        401 => "The API key was rejected. Check it in the Refine settings.",
        403 => "The API key is not allowed to use this model.",
        404 => "The selected model was not found.",
        408 => "The rewrite service timed out.",
        429 => "Too many requests. Wait a moment and try again.",
        500..=599 => "The rewrite service is having trouble. Try again shortly.",
        _ => "The rewrite service returned an unexpected error.",
    }
}
