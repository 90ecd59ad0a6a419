use std::time::Duration;

use axum::http::{header, StatusCode};
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;

mod support;

use support::{empty_request, json_request, TestApp};

#[tokio::test]
async fn opinions_default_to_the_author_display_name() {
    let app = TestApp::new();
    let token = app.register("reader@example.com", "Avid Reader").await;

    let (status, opinion) = app
        .send(json_request(
            "POST",
            "/api/opinions",
            Some(&token),
            json!({ "book": "Kindred", "opinion": "Gripping", "score": 4.5 }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(opinion["username"], "Avid Reader");

    let (status, page) = app.send(empty_request("GET", "/api/opinions", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["data"][0]["book"], "Kindred");
}

#[tokio::test]
async fn scores_outside_the_range_are_rejected() {
    let app = TestApp::new();
    let token = app.register("reader@example.com", "Reader").await;
    let (status, body) = app
        .send(json_request(
            "POST",
            "/api/opinions",
            Some(&token),
            json!({ "book": "Kindred", "opinion": "Wow", "score": 7 }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn only_the_author_may_edit_or_delete() {
    let app = TestApp::new();
    let author = app.register("author@example.com", "Author").await;
    let other = app.register("other@example.com", "Other").await;
    let (_, opinion) = app
        .send(json_request(
            "POST",
            "/api/opinions",
            Some(&author),
            json!({ "book": "Parable of the Sower", "opinion": "Bleak", "score": 3 }),
        ))
        .await;
    let uri = format!("/api/opinions/{}", opinion["id"].as_str().unwrap());

    let (status, _) = app
        .send(json_request("PUT", &uri, Some(&other), json!({ "score": 1 })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = app
        .send(json_request("PUT", &uri, Some(&author), json!({ "score": 5 })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["score"], 5.0);

    let (status, _) = app.send(empty_request("DELETE", &uri, Some(&other))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.send(empty_request("DELETE", &uri, Some(&author))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.send(empty_request("GET", &uri, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stream_pushes_created_opinions() {
    let app = TestApp::new();
    let token = app.register("reader@example.com", "Reader").await;

    let response = app
        .router
        .clone()
        .oneshot(empty_request("GET", "/api/opinions/stream", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .starts_with("text/event-stream"));
    let mut body = response.into_body();

    app.send(json_request(
        "POST",
        "/api/opinions",
        Some(&token),
        json!({ "book": "Dawn", "opinion": "Strange and good", "score": 4 }),
    ))
    .await;

    let frame = tokio::time::timeout(Duration::from_secs(5), body.frame())
        .await
        .expect("event within timeout")
        .expect("stream still open")
        .unwrap();
    let bytes = frame.into_data().unwrap();
    let text = std::str::from_utf8(&bytes).unwrap();
    assert!(text.contains("event: created"), "{}", text);
    assert!(text.contains("\"book\":\"Dawn\""), "{}", text);
}
