//! Reply proxy behavior against a mock upstream

mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    response::Response,
};
use serde_json::json;
use tower::ServiceExt;

use common::{completion_body, proxy_state, start_upstream, MockResponse, MockUpstream, TEST_KEY};
use reply_proxy::api::ChatResponse;
use reply_proxy::config::{Credential, DEFAULT_GREETING, DEFAULT_SYSTEM_PROMPT};
use reply_proxy::proxy::replies::{
    CONFIGURATION_ERROR_REPLY, EMPTY_COMPLETION_REPLY, MESSAGE_TOO_LONG_REPLY, UNEXPECTED_RESPONSE_REPLY,
    UPSTREAM_ERROR_REPLY,
};
use reply_proxy::proxy::{build_router, CORS_HEADERS};

async fn call(upstream: &MockUpstream, credential: Option<Credential>, request: Request<Body>) -> Response {
    build_router(proxy_state(&upstream.url, credential))
        .oneshot(request)
        .await
        .unwrap()
}

fn post_chat(body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn assert_cors(response: &Response) {
    for (name, value) in CORS_HEADERS {
        assert_eq!(
            response.headers().get(name).and_then(|v| v.to_str().ok()),
            Some(value),
            "missing CORS header {}",
            name
        );
    }
}

async fn read_reply(response: Response) -> ChatResponse {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_success_returns_generated_text() {
    let upstream = start_upstream().await;
    upstream.queue(MockResponse::json(completion_body(json!("Hello there"))));

    let response = call(&upstream, Some(Credential::new(TEST_KEY)), post_chat(r#"{"message":"hi"}"#)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_cors(&response);
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, json!({"reply": "Hello there"}));
    assert_eq!(upstream.call_count(), 1);
}

#[tokio::test]
async fn test_upstream_request_shape() {
    let upstream = start_upstream().await;

    let response = call(
        &upstream,
        Some(Credential::new(TEST_KEY)),
        post_chat(r#"{"message":"  What are his main projects?  "}"#),
    )
    .await;
    assert_eq!(read_reply(response).await.reply, "echo: What are his main projects?");

    let requests = upstream.requests();
    assert_eq!(requests.len(), 1);
    let sent = &requests[0];
    assert_eq!(sent.authorization.as_deref(), Some(format!("Bearer {}", TEST_KEY).as_str()));
    assert_eq!(sent.body["model"], "gpt-3.5-turbo");
    assert_eq!(sent.body["max_tokens"], 300);
    assert!((sent.body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    assert_eq!(
        sent.body["messages"],
        json!([
            {"role": "system", "content": DEFAULT_SYSTEM_PROMPT},
            {"role": "user", "content": "What are his main projects?"}
        ])
    );
}

#[tokio::test]
async fn test_empty_message_gets_greeting_without_upstream_call() {
    let upstream = start_upstream().await;

    for body in ["", "{}", r#"{"message":""}"#, r#"{"message":"   \n "}"#, "not json at all"] {
        let response = call(&upstream, Some(Credential::new(TEST_KEY)), post_chat(body)).await;
        assert_eq!(response.status(), StatusCode::OK, "body: {:?}", body);
        assert_cors(&response);
        let reply = read_reply(response).await;
        assert_eq!(reply.reply, DEFAULT_GREETING);
        assert!(reply.error.is_none());
    }

    assert_eq!(upstream.call_count(), 0);
}

#[tokio::test]
async fn test_browser_get_without_body_gets_greeting() {
    let upstream = start_upstream().await;

    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/chat")
        .body(Body::empty())
        .unwrap();
    let response = call(&upstream, None, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_cors(&response);
    assert_eq!(read_reply(response).await.reply, DEFAULT_GREETING);
    assert_eq!(upstream.call_count(), 0);
}

#[tokio::test]
async fn test_missing_credential_is_configuration_error() {
    let upstream = start_upstream().await;

    let response = call(&upstream, None, post_chat(r#"{"message":"hi"}"#)).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_cors(&response);
    let reply = read_reply(response).await;
    assert_eq!(reply.reply, CONFIGURATION_ERROR_REPLY);
    assert!(reply.error.unwrap().contains("OPENAI_API_KEY"));
    assert_eq!(upstream.call_count(), 0);
}

#[tokio::test]
async fn test_upstream_error_status_stays_out_of_reply() {
    let upstream = start_upstream().await;
    upstream.queue(MockResponse::error(
        503,
        r#"{"error":{"message":"engine overloaded in region eu-west-7"}}"#,
    ));

    let response = call(&upstream, Some(Credential::new(TEST_KEY)), post_chat(r#"{"message":"hi"}"#)).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_cors(&response);
    let reply = read_reply(response).await;
    assert_eq!(reply.reply, UPSTREAM_ERROR_REPLY);
    assert!(!reply.reply.contains("503"));
    assert!(!reply.reply.contains("eu-west-7"));

    let error = reply.error.unwrap();
    assert!(error.contains("503"));
    assert!(error.contains("eu-west-7"));
}

#[tokio::test]
async fn test_upstream_error_never_echoes_credential() {
    let upstream = start_upstream().await;
    upstream.queue(MockResponse::error(
        401,
        format!(r#"{{"error":{{"message":"Incorrect API key provided: {}"}}}}"#, TEST_KEY),
    ));

    let response = call(&upstream, Some(Credential::new(TEST_KEY)), post_chat(r#"{"message":"hi"}"#)).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(!text.contains(TEST_KEY));
    assert!(text.contains("401"));
}

#[tokio::test]
async fn test_unexpected_shape_is_handled() {
    let upstream = start_upstream().await;
    upstream.queue(MockResponse::json(r#"{"id":"chatcmpl-x","choices":[]}"#));
    upstream.queue(MockResponse::json(r#"{"choices":[{"index":0}]}"#));
    upstream.queue(MockResponse::text(200, "<html>maintenance</html>"));

    for _ in 0..3 {
        let response = call(&upstream, Some(Credential::new(TEST_KEY)), post_chat(r#"{"message":"hi"}"#)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_cors(&response);
        let reply = read_reply(response).await;
        assert_eq!(reply.reply, UNEXPECTED_RESPONSE_REPLY);
        assert!(reply.error.is_some());
    }
    assert_eq!(upstream.call_count(), 3);
}

#[tokio::test]
async fn test_empty_completion_gets_canned_reply() {
    let upstream = start_upstream().await;
    upstream.queue(MockResponse::json(completion_body(json!(""))));
    upstream.queue(MockResponse::json(completion_body(serde_json::Value::Null)));

    for _ in 0..2 {
        let response = call(&upstream, Some(Credential::new(TEST_KEY)), post_chat(r#"{"message":"hi"}"#)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_cors(&response);
        let reply = read_reply(response).await;
        assert_eq!(reply.reply, EMPTY_COMPLETION_REPLY);
        assert!(reply.error.is_none());
    }
}

#[tokio::test]
async fn test_oversized_message_is_rejected_not_greeted() {
    let upstream = start_upstream().await;

    let body = json!({"message": "a".repeat(70_000)}).to_string();
    let response = call(&upstream, Some(Credential::new(TEST_KEY)), post_chat(&body)).await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_cors(&response);
    let reply = read_reply(response).await;
    assert_eq!(reply.reply, MESSAGE_TOO_LONG_REPLY);
    assert_ne!(reply.reply, DEFAULT_GREETING);
    assert!(reply.error.is_some());
    assert_eq!(upstream.call_count(), 0);
}

#[tokio::test]
async fn test_message_under_limit_is_forwarded() {
    let upstream = start_upstream().await;

    let message = "b".repeat(10_000);
    let body = json!({"message": message}).to_string();
    let response = call(&upstream, Some(Credential::new(TEST_KEY)), post_chat(&body)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_reply(response).await.reply, format!("echo: {}", message));
    assert_eq!(upstream.call_count(), 1);
}

#[tokio::test]
async fn test_preflight_short_circuits() {
    let upstream = start_upstream().await;

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/chat")
        .header("origin", "https://portfolio.example.com")
        .header("access-control-request-method", "POST")
        .body(Body::from("{this is not json"))
        .unwrap();
    let response = call(&upstream, None, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_cors(&response);
    let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
    assert!(bytes.is_empty());
    assert_eq!(upstream.call_count(), 0);
}

#[tokio::test]
async fn test_health() {
    let upstream = start_upstream().await;

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = call(&upstream, None, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
    assert_eq!(&bytes[..], b"OK");
}
