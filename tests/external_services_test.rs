// ABOUTME: Integration tests for the LLM, payments and scheduling clients against a fake upstream
// ABOUTME: Verifies wire formats, unconfigured-service errors, forwarded rejections and timeouts
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use atelier_server::config::ServerConfig;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use common::{test_config, TestServer};
use helpers::axum_test::AxumTestRequest;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

/// A request the fake upstream received
#[derive(Debug, Clone)]
struct Recorded {
    path: String,
    authorization: String,
    body: String,
}

type Log = Arc<Mutex<Vec<Recorded>>>;

fn record(log: &Log, path: &str, headers: &HeaderMap, body: String) {
    let authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    log.lock().unwrap().push(Recorded {
        path: path.to_owned(),
        authorization,
        body,
    });
}

async fn chat_completions(State(log): State<Log>, headers: HeaderMap, body: String) -> impl IntoResponse {
    record(&log, "/v1/chat/completions", &headers, body);
    Json(json!({
        "model": "gpt-4o-mini-2024",
        "choices": [{
            "message": { "role": "assistant", "content": "```html\n<html><body>Bakery</body></html>\n```" },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 30, "completion_tokens": 20, "total_tokens": 50 }
    }))
}

async fn customers(State(log): State<Log>, headers: HeaderMap, body: String) -> impl IntoResponse {
    record(&log, "/v1/customers", &headers, body);
    Json(json!({ "id": "cus_test123", "object": "customer" }))
}

async fn payment_intents(State(log): State<Log>, headers: HeaderMap, body: String) -> impl IntoResponse {
    let declined = body.contains("amount=13&");
    record(&log, "/v1/payment_intents", &headers, body);
    if declined {
        return (
            StatusCode::PAYMENT_REQUIRED,
            Json(json!({ "error": { "message": "Your card was declined." } })),
        )
            .into_response();
    }
    Json(json!({ "id": "pi_test", "client_secret": "pi_test_secret_abc" })).into_response()
}

async fn available_times(
    State(log): State<Log>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    record(&log, "/event_type_available_times", &headers, serde_json::to_string(&query).unwrap());
    Json(json!({
        "collection": [
            { "status": "available", "start_time": "2026-03-03T15:00:00Z" },
            { "status": "unavailable", "start_time": "2026-03-03T10:00:00Z" },
            { "status": "available", "start_time": "2026-03-02T09:30:00Z" }
        ]
    }))
}

async fn slow() -> impl IntoResponse {
    tokio::time::sleep(Duration::from_secs(5)).await;
    Json(json!({}))
}

/// Start the fake upstream and return its base URL
async fn spawn_upstream(log: Log) -> String {
    let app = Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/customers", post(customers))
        .route("/v1/payment_intents", post(payment_intents))
        .route("/event_type_available_times", get(available_times))
        .route("/slow/v1/chat/completions", post(slow))
        .with_state(log);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn configured(base: &str) -> ServerConfig {
    let mut config = test_config();
    config.external.timeout_secs = 1;
    config.external.llm.base_url = format!("{base}/v1");
    config.external.llm.api_key = Some("sk-test".to_owned());
    config.external.payments.base_url = base.to_owned();
    config.external.payments.secret_key = Some("sk_stripe_test".to_owned());
    config.external.scheduling.base_url = base.to_owned();
    config.external.scheduling.api_token = Some("calendly-token".to_owned());
    config.external.scheduling.event_type = Some("https://api.calendly.com/event_types/abc".to_owned());
    config
}

#[tokio::test]
async fn test_website_generation_calls_llm_and_strips_fence() {
    let log = Log::default();
    let base = spawn_upstream(log.clone()).await;
    let server = TestServer::with_http_providers(configured(&base)).await;
    let account = server.create_account("owner@example.com").await;

    let response = AxumTestRequest::post("/api/generate-website")
        .cookie(&server.session_cookie(&account))
        .json(&json!({ "prompt": "A cozy bakery", "businessName": "Crumb" }))
        .send(server.router())
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json();
    assert_eq!(body["html"], "<html><body>Bakery</body></html>");
    assert_eq!(body["model"], "gpt-4o-mini-2024");
    assert_eq!(body["usage"]["totalTokens"], 50);

    let recorded = log.lock().unwrap().clone();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].authorization, "Bearer sk-test");
    let sent: Value = serde_json::from_str(&recorded[0].body).unwrap();
    assert_eq!(sent["messages"][0]["role"], "system");
    assert!(sent["messages"][1]["content"].as_str().unwrap().contains("Crumb"));
    assert_eq!(sent["max_tokens"], 4096);
}

#[tokio::test]
async fn test_website_generation_requires_prompt() {
    let log = Log::default();
    let base = spawn_upstream(log.clone()).await;
    let server = TestServer::with_http_providers(configured(&base)).await;
    let account = server.create_account("owner@example.com").await;

    let response = AxumTestRequest::post("/api/generate-website")
        .cookie(&server.session_cookie(&account))
        .json(&json!({ "prompt": "  " }))
        .send(server.router())
        .await;
    assert_eq!(response.status(), 400);
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_chat_without_llm_key_is_a_configuration_error() {
    let server = TestServer::with_http_providers(test_config()).await;

    let response = AxumTestRequest::post("/api/chat")
        .json(&json!({ "message": "hello" }))
        .send(server.router())
        .await;
    assert_eq!(response.status(), 500);
    assert_eq!(response.error_code(), "CONFIG_MISSING");
}

#[tokio::test]
async fn test_llm_timeout_is_service_unavailable() {
    let log = Log::default();
    let base = spawn_upstream(log).await;
    let mut config = configured(&base);
    config.external.llm.base_url = format!("{base}/slow/v1");
    let server = TestServer::with_http_providers(config).await;

    let response = AxumTestRequest::post("/api/chat")
        .json(&json!({ "message": "hello" }))
        .send(server.router())
        .await;
    assert_eq!(response.status(), 503);
}

#[tokio::test]
async fn test_payment_intent_creates_customer_then_intent() {
    let log = Log::default();
    let base = spawn_upstream(log.clone()).await;
    let server = TestServer::with_http_providers(configured(&base)).await;
    let account = server.create_account("buyer@example.com").await;

    let response = AxumTestRequest::post("/api/payments/create-intent")
        .cookie(&server.session_cookie(&account))
        .json(&json!({ "amount": 4900, "currency": "USD", "plan": "pro" }))
        .send(server.router())
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json();
    assert_eq!(body["clientSecret"], "pi_test_secret_abc");
    assert_eq!(body["customerId"], "cus_test123");

    let recorded = log.lock().unwrap().clone();
    let paths: Vec<&str> = recorded.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, ["/v1/customers", "/v1/payment_intents"]);
    assert!(recorded.iter().all(|r| r.authorization == "Bearer sk_stripe_test"));
    assert!(recorded[0].body.contains("email=buyer%40example.com"));
    let intent = &recorded[1].body;
    assert!(intent.contains("amount=4900"));
    assert!(intent.contains("currency=usd"));
    assert!(intent.contains("customer=cus_test123"));
    assert!(intent.contains("metadata%5Bplan%5D=pro"));
}

#[tokio::test]
async fn test_payment_rejection_is_forwarded() {
    let log = Log::default();
    let base = spawn_upstream(log).await;
    let server = TestServer::with_http_providers(configured(&base)).await;
    let account = server.create_account("buyer@example.com").await;

    let response = AxumTestRequest::post("/api/payments/create-intent")
        .cookie(&server.session_cookie(&account))
        .json(&json!({ "amount": 13, "currency": "usd" }))
        .send(server.router())
        .await;
    assert_eq!(response.status(), 402);
    let body: Value = response.json();
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Your card was declined."));
}

#[tokio::test]
async fn test_payments_unconfigured_and_invalid_amount() {
    let server = TestServer::with_http_providers(test_config()).await;
    let account = server.create_account("buyer@example.com").await;
    let session = server.session_cookie(&account);

    let unconfigured = AxumTestRequest::post("/api/payments/create-intent")
        .cookie(&session)
        .json(&json!({ "amount": 4900, "currency": "usd" }))
        .send(server.router())
        .await;
    assert_eq!(unconfigured.status(), 500);
    assert_eq!(unconfigured.error_code(), "CONFIG_MISSING");

    let log = Log::default();
    let base = spawn_upstream(log.clone()).await;
    let server = TestServer::with_http_providers(configured(&base)).await;
    let account = server.create_account("buyer@example.com").await;
    let invalid = AxumTestRequest::post("/api/payments/create-intent")
        .cookie(&server.session_cookie(&account))
        .json(&json!({ "amount": 0, "currency": "usd" }))
        .send(server.router())
        .await;
    assert_eq!(invalid.status(), 400);
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_slots_are_filtered_and_sorted() {
    let log = Log::default();
    let base = spawn_upstream(log.clone()).await;
    let server = TestServer::with_http_providers(configured(&base)).await;

    let response = AxumTestRequest::get(
        "/api/scheduling/slots?start=2026-03-02T00:00:00Z&end=2026-03-05T00:00:00Z",
    )
    .send(server.router())
    .await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json();
    assert_eq!(
        body["slots"],
        json!(["2026-03-02T09:30:00Z", "2026-03-03T15:00:00Z"])
    );

    let recorded = log.lock().unwrap().clone();
    assert_eq!(recorded[0].authorization, "Bearer calendly-token");
    let query: HashMap<String, String> = serde_json::from_str(&recorded[0].body).unwrap();
    assert_eq!(query["start_time"], "2026-03-02T00:00:00Z");
    assert_eq!(query["end_time"], "2026-03-05T00:00:00Z");
    assert_eq!(query["event_type"], "https://api.calendly.com/event_types/abc");
}

#[tokio::test]
async fn test_slots_unconfigured_fails_before_parsing_query() {
    let server = TestServer::with_http_providers(test_config()).await;

    let response = AxumTestRequest::get("/api/scheduling/slots?start=garbage")
        .send(server.router())
        .await;
    assert_eq!(response.status(), 500);
    assert_eq!(response.error_code(), "CONFIG_MISSING");
}

#[tokio::test]
async fn test_slots_reject_bad_window() {
    let log = Log::default();
    let base = spawn_upstream(log.clone()).await;
    let server = TestServer::with_http_providers(configured(&base)).await;

    let garbage = AxumTestRequest::get("/api/scheduling/slots?start=garbage")
        .send(server.router())
        .await;
    assert_eq!(garbage.status(), 400);

    let inverted = AxumTestRequest::get(
        "/api/scheduling/slots?start=2026-03-05T00:00:00Z&end=2026-03-02T00:00:00Z",
    )
    .send(server.router())
    .await;
    assert_eq!(inverted.status(), 400);
    assert!(log.lock().unwrap().is_empty());
}
