// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{create_test_app, ScriptedLoader, CLEAN_PAGE};
use axum::http::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app(ScriptedLoader::default()).await;

    let response = app.server.get("/health").await;
    response.assert_status_ok();
    response.assert_text("OK");
}

#[tokio::test]
async fn test_submit_and_poll_analysis() {
    let app = create_test_app(
        ScriptedLoader::default().page("https://example.com/", 200, CLEAN_PAGE),
    )
    .await;

    let response = app
        .server
        .post("/v1/analyses")
        .json(&json!({ "url": "example.com" }))
        .await;
    response.assert_status(StatusCode::ACCEPTED);
    let id = response.json::<Value>()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let pending = app.server.get(&format!("/v1/analyses/{}", id)).await;
    pending.assert_status_ok();
    assert_eq!(pending.json::<Value>()["status"], "pending");

    app.drain().await;

    let done = app.server.get(&format!("/v1/analyses/{}", id)).await;
    done.assert_status_ok();
    let body = done.json::<Value>();
    assert_eq!(body["status"], "completed");
    assert_eq!(body["target_url"], "https://example.com/");
    assert_eq!(body["overall_score"], 100.0);
    assert_eq!(body["jobs"].as_array().unwrap().len(), 6);
    assert!(body["findings"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_url_is_bad_request() {
    let app = create_test_app(ScriptedLoader::default()).await;

    let response = app
        .server
        .post("/v1/analyses")
        .json(&json!({ "url": "ftp://example.com/file" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.json::<Value>()["error"].is_string());
}

#[tokio::test]
async fn test_empty_url_fails_validation() {
    let app = create_test_app(ScriptedLoader::default()).await;

    let response = app
        .server
        .post("/v1/analyses")
        .json(&json!({ "url": "" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_owner_is_recorded() {
    let app = create_test_app(ScriptedLoader::default()).await;
    let owner = Uuid::new_v4();

    let response = app
        .server
        .post("/v1/analyses")
        .json(&json!({ "url": "https://example.com", "owner_id": owner }))
        .await;
    response.assert_status(StatusCode::ACCEPTED);
    let id: Uuid = serde_json::from_value(response.json::<Value>()["id"].clone()).unwrap();

    let analysis = app.orchestrator.find_analysis(id).await.unwrap().unwrap();
    assert_eq!(analysis.owner_id, Some(owner));
    assert!(analysis.expires_at.is_none());
}

#[tokio::test]
async fn test_unknown_analysis_is_not_found() {
    let app = create_test_app(ScriptedLoader::default()).await;

    let response = app
        .server
        .get(&format!("/v1/analyses/{}", Uuid::new_v4()))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}
