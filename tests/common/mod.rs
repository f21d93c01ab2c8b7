//! Mock upstream completion API and proxy helpers shared by the integration tests
//!
//! Tests queue responses on the mock before each request; when the queue is
//! empty the mock echoes the user message back as the completion text.

#![allow(dead_code)]

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde_json::json;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use reply_proxy::config::{AppConfig, Credential};
use reply_proxy::proxy::{ProxyState, UpstreamClient};

pub const TEST_KEY: &str = "sk-test-0123456789";

/// A response the mock serves for the next completion request
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub body: String,
    pub content_type: String,
}

impl MockResponse {
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            content_type: "application/json".to_string(),
        }
    }

    pub fn error(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            content_type: "application/json".to_string(),
        }
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            content_type: "text/html".to_string(),
        }
    }
}

/// A request received by the mock
#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    pub authorization: Option<String>,
    pub body: serde_json::Value,
}

#[derive(Debug, Default)]
pub struct UpstreamState {
    pub response_queue: VecDeque<MockResponse>,
    pub received_requests: Vec<ReceivedRequest>,
}

pub type SharedUpstreamState = Arc<Mutex<UpstreamState>>;

pub struct MockUpstream {
    pub state: SharedUpstreamState,
    pub url: String,
}

impl MockUpstream {
    pub fn queue(&self, response: MockResponse) {
        self.state.lock().unwrap().response_queue.push_back(response);
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().received_requests.len()
    }

    pub fn requests(&self) -> Vec<ReceivedRequest> {
        self.state.lock().unwrap().received_requests.clone()
    }
}

/// OpenAI-style success payload with the given content
pub fn completion_body(content: serde_json::Value) -> String {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "created": 1700000000,
        "model": "gpt-3.5-turbo",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 42, "completion_tokens": 3, "total_tokens": 45}
    })
    .to_string()
}

fn echo_response(body: &serde_json::Value) -> MockResponse {
    let user = body
        .get("messages")
        .and_then(|m| m.as_array())
        .and_then(|m| m.last())
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or("");
    MockResponse::json(completion_body(json!(format!("echo: {}", user))))
}

async fn handle_completions(State(state): State<SharedUpstreamState>, request: Request<Body>) -> Response {
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body_bytes = axum::body::to_bytes(request.into_body(), 1024 * 1024)
        .await
        .unwrap_or_default();
    let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap_or(serde_json::Value::Null);

    let mock = {
        let mut state = state.lock().unwrap();
        let mock = state
            .response_queue
            .pop_front()
            .unwrap_or_else(|| echo_response(&body));
        state.received_requests.push(ReceivedRequest { authorization, body });
        mock
    };

    Response::builder()
        .status(mock.status)
        .header(header::CONTENT_TYPE, &mock.content_type)
        .body(Body::from(mock.body))
        .unwrap()
        .into_response()
}

/// Start the mock upstream on an ephemeral port
pub async fn start_upstream() -> MockUpstream {
    let state: SharedUpstreamState = Arc::new(Mutex::new(UpstreamState::default()));

    let app = Router::new()
        .route("/v1/chat/completions", post(handle_completions))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Mock upstream failed");
    });

    MockUpstream {
        state,
        url: format!("http://{}/v1/chat/completions", addr),
    }
}

/// Proxy state pointed at the mock upstream
pub fn proxy_state(upstream_url: &str, credential: Option<Credential>) -> ProxyState {
    let mut config = AppConfig::default();
    config.upstream.url = upstream_url.to_string();

    ProxyState {
        upstream: UpstreamClient::new(reqwest::Client::new(), config.upstream.clone()),
        config: Arc::new(config),
        credential,
    }
}

/// Serve a proxy on an ephemeral port and return its chat endpoint URL
pub async fn start_proxy(state: ProxyState) -> String {
    let route = state.config.server.route.clone();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        reply_proxy::proxy::serve(listener, state).await.expect("Proxy failed");
    });
    format!("http://{}{}", addr, route)
}

/// Serve an arbitrary fixed response, standing in for a broken proxy
pub async fn start_static_server(status: u16, content_type: &'static str, body: &'static str) -> String {
    let app = Router::new().route(
        "/api/chat",
        post(move || async move {
            Response::builder()
                .status(status)
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap()
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Static server failed");
    });
    format!("http://{}/api/chat", addr)
}
