mod support;

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use support::TestServer;

#[tokio::test]
async fn health_check_responds_ok() {
    let server = TestServer::spawn().await;
    let response = reqwest::get(server.http_url("/health")).await.expect("health");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn preflight_accepts_valid_name_without_reserving_it() {
    let server = TestServer::spawn().await;
    let client = Client::new();

    let response = client
        .post(server.http_url("/register"))
        .json(&json!({"username": "alice"}))
        .send()
        .await
        .expect("register");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.json::<Value>().await.unwrap(), json!({"success": true}));

    let roster: Vec<String> = client
        .get(server.http_url("/roster"))
        .send()
        .await
        .expect("roster")
        .json()
        .await
        .expect("roster json");
    assert!(roster.is_empty());
}

#[tokio::test]
async fn preflight_rejects_missing_or_blank_name() {
    let server = TestServer::spawn().await;
    let client = Client::new();

    for body in [json!({}), json!({"username": "   "}), json!({"username": "x".repeat(51)})] {
        let response = client
            .post(server.http_url("/register"))
            .json(&body)
            .send()
            .await
            .expect("register");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
        let error: Value = response.json().await.expect("error json");
        assert!(error["code"].is_string());
        assert!(error["message"].is_string());
    }
}

#[tokio::test]
async fn roster_lists_registered_names() {
    let server = TestServer::spawn().await;
    let _alice = server.join("alice").await;
    let _bob = server.join("bob").await;

    let roster: Vec<String> = reqwest::get(server.http_url("/roster"))
        .await
        .expect("roster")
        .json()
        .await
        .expect("roster json");
    assert_eq!(roster, vec!["alice", "bob"]);
}
