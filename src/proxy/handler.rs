//! Request/response handler for the reply proxy

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderName, HeaderValue, Method, Request, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tracing::Instrument;

use super::replies::{EMPTY_COMPLETION_REPLY, MESSAGE_TOO_LONG_REPLY};
use super::server::ProxyState;
use super::upstream::{Completion, UpstreamError};
use crate::api::{ChatRequest, ChatResponse};
use crate::diagnostics::{format_exchange_log, log_failure, FailureKind};

/// Bodies larger than this get a "too long" reply
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// CORS headers set on every response, preflight included
pub const CORS_HEADERS: [(&str, &str); 3] = [
    ("access-control-allow-origin", "*"),
    ("access-control-allow-headers", "Content-Type"),
    ("access-control-allow-methods", "POST, OPTIONS"),
];

/// Reply proxy request handler
pub struct ReplyProxy {
    state: ProxyState,
}

impl ReplyProxy {
    pub fn new(state: ProxyState) -> Self {
        Self { state }
    }

    /// Handle an incoming request
    pub async fn handle(&self, req: Request<Body>) -> Response {
        if *req.method() == Method::OPTIONS {
            tracing::debug!("CORS preflight");
            return preflight_response();
        }

        let request_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("exchange", %request_id, method = %req.method());

        async move {
            let body = match to_bytes(req.into_body(), MAX_BODY_BYTES).await {
                Ok(bytes) => bytes,
                Err(e) if is_length_limit(&e) => {
                    log_failure(FailureKind::RequestTooLarge, None, "");
                    return json_response(
                        StatusCode::PAYLOAD_TOO_LARGE,
                        &ChatResponse::with_error(
                            MESSAGE_TOO_LONG_REPLY,
                            format!("Request body exceeds {} bytes", MAX_BODY_BYTES),
                        ),
                    );
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Unreadable request body, treating as empty");
                    Bytes::new()
                }
            };

            let (status, reply) = self.exchange(&body).await;
            json_response(status, &reply)
        }
        .instrument(span)
        .await
    }

    /// Run one exchange from raw request body to reply envelope
    pub async fn exchange(&self, body: &[u8]) -> (StatusCode, ChatResponse) {
        let request = ChatRequest::parse(body).unwrap_or_default();

        let Some(message) = request.trimmed() else {
            tracing::debug!("Empty message, replying with greeting");
            return (
                StatusCode::OK,
                ChatResponse::reply(self.state.config.persona.greeting.clone()),
            );
        };

        tracing::info!("{}", format_exchange_log(message));

        let Some(credential) = self.state.credential.as_ref() else {
            let err = UpstreamError::MissingCredential(self.state.config.upstream.api_key_env.clone());
            log_failure(err.kind(), None, "");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                ChatResponse::with_error(err.user_reply(), err.to_string()),
            );
        };

        let persona = &self.state.config.persona.system_prompt;
        match self.state.upstream.complete(credential, persona, message).await {
            Ok(Completion::Text(text)) => {
                tracing::info!(reply_chars = text.chars().count(), "← reply");
                (StatusCode::OK, ChatResponse::reply(text))
            }
            Ok(Completion::Empty) => {
                log_failure(FailureKind::EmptyContent, Some(StatusCode::OK.as_u16()), "");
                (StatusCode::OK, ChatResponse::reply(EMPTY_COMPLETION_REPLY))
            }
            Err(err) => {
                log_failure(err.kind(), err.status(), err.body());
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ChatResponse::with_error(err.user_reply(), err.to_string()),
                )
            }
        }
    }
}

/// True when a body read failed on the size limit rather than on transport
fn is_length_limit(err: &axum::Error) -> bool {
    let mut source = Some(err as &(dyn std::error::Error + 'static));
    while let Some(e) = source {
        if e.is::<http_body_util::LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

/// Add the CORS headers to a response
pub fn with_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    for (name, value) in CORS_HEADERS {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }
    response
}

/// Empty 200 answering a CORS preflight
pub fn preflight_response() -> Response {
    with_cors(StatusCode::OK.into_response())
}

/// Serialize a reply envelope with status and CORS headers
pub fn json_response(status: StatusCode, reply: &ChatResponse) -> Response {
    let body = match serde_json::to_vec(reply) {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize reply");
            br#"{"reply":"Something went wrong."}"#.to_vec()
        }
    };

    let response = (
        status,
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        body,
    )
        .into_response();
    with_cors(response)
}
