//! OpenAI-compatible chat completion types used for the upstream call

use serde::{Deserialize, Serialize};

/// Chat completion request sent upstream
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl ChatCompletionRequest {
    /// A single-turn request: the persona as system message, then the user text
    pub fn single_turn(
        model: &str,
        persona: &str,
        user_message: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![Message::system(persona), Message::user(user_message)],
            max_tokens,
            temperature,
        }
    }
}

/// Chat message
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Token usage
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

impl Usage {
    pub fn from_payload(payload: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(payload.get("usage")?.clone()).ok()
    }
}

/// What `choices[0].message.content` holds in an upstream payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompletionContent<'a> {
    /// Non-blank generated text
    Text(&'a str),
    /// The path exists but the text is null, empty or blank
    Empty,
    /// The path is missing or has the wrong type
    Missing,
}

impl<'a> CompletionContent<'a> {
    /// Walk `choices[0].message.content` without indexing into absent fields
    pub fn from_payload(payload: &'a serde_json::Value) -> Self {
        let content = payload
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|m| m.get("content"));

        match content {
            None => CompletionContent::Missing,
            Some(serde_json::Value::Null) => CompletionContent::Empty,
            Some(serde_json::Value::String(text)) if text.trim().is_empty() => {
                CompletionContent::Empty
            }
            Some(serde_json::Value::String(text)) => CompletionContent::Text(text),
            Some(_) => CompletionContent::Missing,
        }
    }
}
