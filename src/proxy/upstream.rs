//! Client for the upstream chat completion API

use axum::http::{header, StatusCode};
use std::time::Duration;

use super::replies::{CONFIGURATION_ERROR_REPLY, UNEXPECTED_RESPONSE_REPLY, UPSTREAM_ERROR_REPLY};
use crate::api::{ChatCompletionRequest, CompletionContent, Usage};
use crate::config::{Credential, UpstreamConfig};
use crate::diagnostics::{preview, FailureKind};

/// Result of a successful upstream exchange
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Text(String),
    /// Upstream answered but the generated text was null or blank
    Empty,
}

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("Upstream API key is not configured (set {0})")]
    MissingCredential(String),

    #[error("Upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Upstream response is missing choices[0].message.content")]
    Shape { body: String },
}

impl UpstreamError {
    pub fn kind(&self) -> FailureKind {
        match self {
            UpstreamError::MissingCredential(_) => FailureKind::Configuration,
            UpstreamError::Transport(_) => FailureKind::UpstreamTransport,
            UpstreamError::Status { .. } => FailureKind::UpstreamStatus,
            UpstreamError::Shape { .. } => FailureKind::UpstreamShape,
        }
    }

    /// Upstream HTTP status, when the failure carried one
    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            UpstreamError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Truncated upstream body for the log record
    pub fn body(&self) -> &str {
        match self {
            UpstreamError::Status { body, .. } | UpstreamError::Shape { body } => body,
            _ => "",
        }
    }

    /// Text safe to show the user for this failure
    pub fn user_reply(&self) -> &'static str {
        match self {
            UpstreamError::MissingCredential(_) => CONFIGURATION_ERROR_REPLY,
            UpstreamError::Transport(_) | UpstreamError::Status { .. } => UPSTREAM_ERROR_REPLY,
            UpstreamError::Shape { .. } => UNEXPECTED_RESPONSE_REPLY,
        }
    }
}

/// Build an HTTP client with TLS configuration
pub fn build_http_client(config: &UpstreamConfig) -> Result<reqwest::Client, Box<dyn std::error::Error>> {
    let mut client_builder = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .pool_max_idle_per_host(10);

    if let Some(ref tls) = config.tls {
        if tls.accept_invalid_certs {
            client_builder = client_builder.danger_accept_invalid_certs(true);
            tracing::warn!("TLS: Accepting invalid certificates (use only for development/testing)");
        }

        if let Some(ref ca_path) = tls.ca_cert_path {
            let ca_cert = std::fs::read(ca_path)?;
            let ca_cert = reqwest::Certificate::from_pem(&ca_cert)?;
            client_builder = client_builder.add_root_certificate(ca_cert);
            tracing::info!("TLS: Loaded custom CA certificate from {}", ca_path);
        }
    }

    Ok(client_builder.build()?)
}

/// Forwards single-turn completions to the configured endpoint
#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    config: UpstreamConfig,
}

impl UpstreamClient {
    pub fn new(http: reqwest::Client, config: UpstreamConfig) -> Self {
        Self { http, config }
    }

    pub fn from_config(config: &UpstreamConfig) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self::new(build_http_client(config)?, config.clone()))
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Request body for one user message
    pub fn build_request(&self, persona: &str, message: &str) -> ChatCompletionRequest {
        ChatCompletionRequest::single_turn(
            &self.config.model,
            persona,
            message,
            self.config.max_tokens,
            self.config.temperature,
        )
    }

    /// Send one message upstream and extract the generated text
    pub async fn complete(
        &self,
        credential: &Credential,
        persona: &str,
        message: &str,
    ) -> Result<Completion, UpstreamError> {
        let request = self.build_request(persona, message);

        tracing::debug!(
            url = %self.config.url,
            model = %request.model,
            max_tokens = request.max_tokens,
            "Sending completion request upstream"
        );

        let response = self
            .http
            .post(&self.config.url)
            .header(header::AUTHORIZATION, credential.bearer())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body: redacted_preview(&body, credential),
            });
        }

        parse_completion(status, &body).map_err(|_| UpstreamError::Shape {
            body: redacted_preview(&body, credential),
        })
    }
}

/// Extract the completion from a success body; `Err(())` means the shape was wrong
fn parse_completion(status: StatusCode, body: &str) -> Result<Completion, ()> {
    let payload: serde_json::Value = serde_json::from_str(body).map_err(|_| ())?;

    if let Some(usage) = Usage::from_payload(&payload) {
        tracing::debug!(
            status = %status,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            total_tokens = usage.total_tokens,
            "Upstream usage"
        );
    }

    match CompletionContent::from_payload(&payload) {
        CompletionContent::Text(text) => Ok(Completion::Text(text.to_string())),
        CompletionContent::Empty => Ok(Completion::Empty),
        CompletionContent::Missing => Err(()),
    }
}

/// Some providers echo part of the key back in error bodies
fn redacted_preview(body: &str, credential: &Credential) -> String {
    let secret = credential.expose();
    if secret.is_empty() {
        preview(body)
    } else {
        preview(&body.replace(secret, "***"))
    }
}
