use axum::http::StatusCode;
use serde_json::{json, Value};

mod support;

use support::{empty_request, json_request, TestApp, ADMIN_EMAIL};

fn listing(title: &str, category: &str) -> Value {
    json!({
        "title": title,
        "author": "Ursula K. Le Guin",
        "category": category,
        "price": 12.5,
        "description": "Paperback, lightly read",
        "condition": "good",
    })
}

async fn create(app: &TestApp, token: &str, body: Value) -> Value {
    let (status, book) = app
        .send(json_request("POST", "/api/books", Some(token), body))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", book);
    book
}

#[tokio::test]
async fn listing_books_is_public_and_filterable() {
    let app = TestApp::new();
    let token = app.register("seller@example.com", "Seller").await;
    create(&app, &token, listing("The Dispossessed", "Science fiction")).await;
    create(&app, &token, listing("A Wizard of Earthsea", "Fantasy")).await;

    let (status, page) = app.send(empty_request("GET", "/api/books", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 2);
    assert_eq!(page["limit"], 50);

    let (_, page) = app
        .send(empty_request("GET", "/api/books?category=Fantasy", None))
        .await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["data"][0]["title"], "A Wizard of Earthsea");

    let (_, page) = app
        .send(empty_request("GET", "/api/books?search=dispossessed", None))
        .await;
    assert_eq!(page["total"], 1);

    let (_, page) = app
        .send(empty_request("GET", "/api/books?limit=1&offset=1", None))
        .await;
    assert_eq!(page["total"], 2);
    assert_eq!(page["data"].as_array().unwrap().len(), 1);

    let (status, _) = app
        .send(empty_request("GET", "/api/books?category=Cookbooks", None))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn creating_a_book_requires_sign_in_and_a_valid_payload() {
    let app = TestApp::new();
    let (status, _) = app
        .send(json_request(
            "POST",
            "/api/books",
            None,
            listing("Lathe of Heaven", "Fantasy"),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = app.register("seller@example.com", "Seller").await;
    let (status, body) = app
        .send(json_request(
            "POST",
            "/api/books",
            Some(&token),
            listing("Lathe of Heaven", "Cookbooks"),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let mut negative = listing("Lathe of Heaven", "Fantasy");
    negative["price"] = json!(-1.0);
    let (status, _) = app
        .send(json_request("POST", "/api/books", Some(&token), negative))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn only_the_seller_or_an_admin_may_change_a_listing() {
    let app = TestApp::new();
    let seller = app.register("seller@example.com", "Seller").await;
    let other = app.register("other@example.com", "Other").await;
    let admin = app.register(ADMIN_EMAIL, "Admin").await;
    let book = create(&app, &seller, listing("The Word for World Is Forest", "Fiction")).await;
    let uri = format!("/api/books/{}", book["id"].as_str().unwrap());

    let (status, _) = app
        .send(json_request("PUT", &uri, Some(&other), json!({ "price": 1.0 })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = app
        .send(json_request("PUT", &uri, Some(&seller), json!({ "price": 9.0 })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["price"], 9.0);
    assert_eq!(updated["title"], "The Word for World Is Forest");

    let (status, _) = app.send(empty_request("DELETE", &uri, Some(&other))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.send(empty_request("DELETE", &uri, Some(&admin))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.send(empty_request("GET", &uri, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_book_ids_are_bad_requests() {
    let app = TestApp::new();
    let (status, _) = app
        .send(empty_request("GET", "/api/books/not-a-uuid", None))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
