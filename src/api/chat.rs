//! Widget <-> proxy envelope types

use serde::{Deserialize, Serialize};

/// Body the widget posts to the proxy
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Parse a raw request body.
    ///
    /// Returns `None` for an empty body, malformed JSON, or a `message`
    /// that is not a string. Callers treat `None` as an empty message.
    pub fn parse(body: &[u8]) -> Option<Self> {
        if body.is_empty() {
            return None;
        }
        serde_json::from_slice(body).ok()
    }

    /// The trimmed message, or `None` when there is nothing to send upstream
    pub fn trimmed(&self) -> Option<&str> {
        let trimmed = self.message.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    }
}

/// Envelope the proxy returns on every path.
///
/// `reply` is always safe to show to the user. `error` is for diagnostics only.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ChatResponse {
    pub reply: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatResponse {
    pub fn reply(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            error: None,
        }
    }

    pub fn with_error(reply: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            error: Some(error.into()),
        }
    }
}
