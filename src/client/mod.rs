//! Widget-side client for the reply proxy
//!
//! [`ProxyClient::send`] never fails: transport and decoding problems are
//! logged and turned into a fixed fallback string so the UI always has
//! something to display.

use async_trait::async_trait;
use std::time::Duration;

use crate::api::ChatRequest;
use crate::config::ClientConfig;

/// Shown when the proxy cannot be reached or answers with something other than JSON
pub const CONNECTIVITY_FALLBACK: &str = "⚠️ Error connecting to AI service.";

/// Shown when the proxy answers without a usable `reply`
pub const NO_REPLY_FALLBACK: &str = "⚠️ Sorry, I couldn't generate a response.";

/// Anything that turns a user message into display text
#[async_trait]
pub trait ReplySource: Send + Sync {
    async fn send(&self, message: &str) -> String;
}

#[derive(Debug, thiserror::Error)]
enum ClientError {
    #[error("request to proxy failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("proxy response is not JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("proxy response has no reply")]
    MissingReply,
}

impl ClientError {
    fn fallback(&self) -> &'static str {
        match self {
            ClientError::Transport(_) | ClientError::Decode(_) => CONNECTIVITY_FALLBACK,
            ClientError::MissingReply => NO_REPLY_FALLBACK,
        }
    }
}

/// Posts one message per call to the proxy endpoint.
///
/// Holds no per-call state, so clones and concurrent calls are independent.
#[derive(Debug, Clone)]
pub struct ProxyClient {
    http: reqwest::Client,
    endpoint: String,
}

impl ProxyClient {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self::new(http, config.endpoint.clone()))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send a message and return the text to display
    pub async fn send(&self, message: &str) -> String {
        match self.try_send(message).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(endpoint = %self.endpoint, error = %e, "Chat request failed, using fallback reply");
                e.fallback().to_string()
            }
        }
    }

    async fn try_send(&self, message: &str) -> Result<String, ClientError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&ChatRequest::new(message))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        tracing::debug!(status = %status, body_size = body.len(), "Proxy responded");

        // Error envelopes carry a user-safe reply too, so the status is not checked
        let payload: serde_json::Value = serde_json::from_str(&body)?;
        payload
            .get("reply")
            .and_then(|r| r.as_str())
            .filter(|r| !r.trim().is_empty())
            .map(str::to_string)
            .ok_or(ClientError::MissingReply)
    }
}

#[async_trait]
impl ReplySource for ProxyClient {
    async fn send(&self, message: &str) -> String {
        ProxyClient::send(self, message).await
    }
}
