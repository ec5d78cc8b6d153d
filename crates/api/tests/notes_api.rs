//! Integration tests for note CRUD under `/api/notes`.

mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, delete, get, post_json, put_json};
use serde_json::json;

#[tokio::test]
async fn create_then_fetch_note() {
    let app = build_test_app();

    let response = post_json(
        &app.router,
        "/api/notes",
        json!({ "title": "  Groceries ", "content": "Milk, eggs" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["title"], "Groceries");
    assert!(created["txHash"].is_null());
    assert!(created["status"].is_null());
    assert!(created["created_at"].is_string());

    let id = created["id"].as_i64().unwrap();
    let response = get(&app.router, &format!("/api/notes/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["content"], "Milk, eggs");
}

#[tokio::test]
async fn list_is_newest_first() {
    let app = build_test_app();
    for title in ["First", "Second"] {
        post_json(&app.router, "/api/notes", json!({ "title": title, "content": "x" })).await;
    }

    let notes = body_json(get(&app.router, "/api/notes").await).await;
    let titles: Vec<_> = notes
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["title"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(titles, vec!["Second", "First"]);
}

#[tokio::test]
async fn blank_title_is_rejected() {
    let app = build_test_app();
    let response = post_json(&app.router, "/api/notes", json!({ "title": " ", "content": "x" })).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn missing_fields_are_a_bad_request() {
    let app = build_test_app();
    let response = post_json(&app.router, "/api/notes", json!({ "title": "No content" })).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn update_changes_only_given_fields() {
    let app = build_test_app();
    let created =
        body_json(post_json(&app.router, "/api/notes", json!({ "title": "Old", "content": "Body" })).await)
            .await;
    let id = created["id"].as_i64().unwrap();

    let response = put_json(&app.router, &format!("/api/notes/{id}"), json!({ "title": "New" })).await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;
    assert_eq!(updated["title"], "New");
    assert_eq!(updated["content"], "Body");
}

#[tokio::test]
async fn delete_then_missing() {
    let app = build_test_app();
    let created =
        body_json(post_json(&app.router, "/api/notes", json!({ "title": "Bye", "content": "x" })).await)
            .await;
    let id = created["id"].as_i64().unwrap();

    let response = delete(&app.router, &format!("/api/notes/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "Note deleted successfully");

    let response = delete(&app.router, &format!("/api/notes/{id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = get(&app.router, &format!("/api/notes/{id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

#[tokio::test]
async fn update_missing_note_is_404() {
    let app = build_test_app();
    let response = put_json(&app.router, "/api/notes/999", json!({ "content": "x" })).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
