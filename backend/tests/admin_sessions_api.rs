use axum::http::StatusCode;
use chrono::Utc;
use serde_json::json;

mod support;

use support::{empty_request, json_request, TestApp, ADMIN_EMAIL, PASSWORD};

#[tokio::test]
async fn session_log_is_admin_only() {
    let app = TestApp::new();
    let visitor = app.register("reader@example.com", "Reader").await;

    let (status, _) = app
        .send(empty_request("GET", "/api/admin/sessions", Some(&visitor)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(empty_request("GET", "/api/admin/sessions", None))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_sees_filtered_and_sorted_sessions() {
    let app = TestApp::new();
    let admin = app.register(ADMIN_EMAIL, "Admin").await;
    let reader = app.register("reader@example.com", "Reader").await;
    app.send(empty_request("POST", "/api/auth/logout", Some(&reader)))
        .await;

    let (status, all) = app
        .send(empty_request(
            "GET",
            "/api/admin/sessions?sort=email&direction=asc",
            Some(&admin),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    let rows = all.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["email"], ADMIN_EMAIL);
    assert_eq!(rows[1]["email"], "reader@example.com");
    assert_eq!(rows[1]["status"], "inactive");
    assert!(rows[1]["duration_seconds"].is_number());
    assert_eq!(rows[0]["status"], "active");
    assert!(rows[0]["logout_at"].is_null());

    let (_, filtered) = app
        .send(empty_request(
            "GET",
            "/api/admin/sessions?email=READER",
            Some(&admin),
        ))
        .await;
    assert_eq!(filtered.as_array().unwrap().len(), 1);

    let today = Utc::now().date_naive();
    let (_, summary) = app
        .send(empty_request(
            "GET",
            &format!(
                "/api/admin/sessions/summary?start_date={}&end_date={}",
                today, today
            ),
            Some(&admin),
        ))
        .await;
    assert_eq!(summary["total"], 2);
    assert_eq!(summary["active"], 1);
    assert_eq!(summary["inactive"], 1);
    assert_eq!(summary["distinct_accounts"], 2);
}

#[tokio::test]
async fn inverted_date_range_is_rejected() {
    let app = TestApp::new();
    let admin = app.register(ADMIN_EMAIL, "Admin").await;
    let (status, _) = app
        .send(empty_request(
            "GET",
            "/api/admin/sessions?start_date=2024-02-01&end_date=2024-01-01",
            Some(&admin),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn export_renders_a_csv_with_placeholders_for_open_sessions() {
    let app = TestApp::new();
    let admin = app.register(ADMIN_EMAIL, "Admin").await;

    let (status, export) = app
        .send(empty_request(
            "GET",
            "/api/admin/sessions/export",
            Some(&admin),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    let filename = export["filename"].as_str().unwrap();
    assert!(filename.starts_with("session_log_") && filename.ends_with(".csv"));
    let csv = export["csv_data"].as_str().unwrap();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next().unwrap(),
        "\"User\",\"Email\",\"Providers\",\"Login\",\"Logout\",\"Duration\",\"Status\""
    );
    let row = lines.next().unwrap();
    assert!(row.contains(ADMIN_EMAIL));
    assert!(row.contains("In session"));
}

#[tokio::test]
async fn account_sessions_list_every_sign_in() {
    let app = TestApp::new();
    let admin = app.register(ADMIN_EMAIL, "Admin").await;
    let token = app.register("reader@example.com", "Reader").await;
    app.send(json_request(
        "POST",
        "/api/auth/login",
        None,
        json!({ "email": "reader@example.com", "password": PASSWORD }),
    ))
    .await;

    let (_, me) = app
        .send(empty_request("GET", "/api/accounts/me", Some(&token)))
        .await;
    let uri = format!(
        "/api/admin/accounts/{}/sessions",
        me["id"].as_str().unwrap()
    );
    let (status, sessions) = app.send(empty_request("GET", &uri, Some(&admin))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sessions.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn unload_closes_the_session_in_the_background() {
    let app = TestApp::new();
    let admin = app.register(ADMIN_EMAIL, "Admin").await;
    let reader = app.register("reader@example.com", "Reader").await;

    let (status, _) = app
        .send(empty_request("POST", "/api/sessions/unload", Some(&reader)))
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let mut closed = false;
    for _ in 0..50 {
        let (_, rows) = app
            .send(empty_request(
                "GET",
                "/api/admin/sessions?email=reader",
                Some(&admin),
            ))
            .await;
        if rows[0]["status"] == "inactive" {
            closed = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(closed);
}
