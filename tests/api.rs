//! HTTP tests driving the router over the in-memory store

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header::AUTHORIZATION, header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use circulation_server::{
    api,
    config::{AppConfig, StorageBackend},
    models::{Identity, Role},
    repository::MemoryStore,
    services::{auth::StaticGate, loans::LoanPolicy, Services},
    AppState,
};

struct TestApp {
    router: Router,
    book_id: i64,
    member_id: i64,
}

async fn setup() -> TestApp {
    let store = MemoryStore::new();
    let book = store
        .add_book("El árbol de la ciencia", "Pío Baroja", Some("9788437604183"), 1)
        .await
        .unwrap();
    let ana = store.add_user("ana", Role::Member).await;
    let bruno = store.add_user("bruno", Role::Member).await;
    let root = store.add_user("root", Role::Administrator).await;

    let gate = StaticGate::new()
        .with_token("ana-token", Identity::new(ana.id, Role::Member))
        .with_token("bruno-token", Identity::new(bruno.id, Role::Member))
        .with_token("root-token", Identity::new(root.id, Role::Administrator));

    let mut config = AppConfig::default();
    config.storage.backend = StorageBackend::Memory;

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(Services::new(Arc::new(store), Arc::new(gate), LoanPolicy::default())),
    };

    TestApp {
        router: api::router(state),
        book_id: book.id.raw(),
        member_id: ana.id.raw(),
    }
}

async fn send(router: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_health() {
    let app = setup().await;
    let (status, body) = send(&app.router, Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storage"], "memory");
}

#[tokio::test]
async fn test_borrow_and_return_flow() {
    let app = setup().await;
    let borrow_uri = format!("/api/v1/books/{}/borrow", app.book_id);

    let (status, body) = send(&app.router, Method::POST, &borrow_uri, Some("ana-token"), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["loan"]["status"], "active");
    assert_eq!(body["loan"]["user_id"], app.member_id);
    let loan_id = body["loan"]["id"].as_i64().unwrap();

    let (status, book) = send(&app.router, Method::GET, &format!("/api/v1/books/{}", app.book_id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(book["stock"], 0);
    assert_eq!(book["available"], false);

    // Last copy is out
    let (status, body) = send(&app.router, Method::POST, &borrow_uri, Some("bruno-token"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "OutOfStock");

    let return_uri = format!("/api/v1/loans/{}/return", loan_id);
    let (status, body) = send(&app.router, Method::POST, &return_uri, Some("bruno-token"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Forbidden");

    let (status, body) = send(&app.router, Method::POST, &return_uri, Some("ana-token"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["loan"]["status"], "returned");
    assert!(body["loan"]["returned_at"].is_string());

    let (status, body) = send(&app.router, Method::POST, &return_uri, Some("ana-token"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "AlreadyReturned");

    let (_, book) = send(&app.router, Method::GET, &format!("/api/v1/books/{}", app.book_id), None, None).await;
    assert_eq!(book["stock"], 1);
    assert_eq!(book["available"], true);
}

#[tokio::test]
async fn test_duplicate_borrow_is_conflict() {
    let app = setup().await;
    let borrow_uri = format!("/api/v1/books/{}/borrow", app.book_id);

    send(&app.router, Method::POST, &borrow_uri, Some("ana-token"), None).await;
    let (status, body) = send(&app.router, Method::POST, &borrow_uri, Some("ana-token"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "DuplicateActiveLoan");
}

#[tokio::test]
async fn test_borrow_requires_credential() {
    let app = setup().await;
    let borrow_uri = format!("/api/v1/books/{}/borrow", app.book_id);

    let (status, body) = send(&app.router, Method::POST, &borrow_uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "NotAuthenticated");

    let (status, body) = send(&app.router, Method::POST, &borrow_uri, Some("forged"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "InvalidCredential");
}

#[tokio::test]
async fn test_unknown_book_is_not_found() {
    let app = setup().await;
    let (status, body) = send(&app.router, Method::POST, "/api/v1/books/9999/borrow", Some("ana-token"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NoSuchBook");
}

#[tokio::test]
async fn test_admin_issue_and_listing() {
    let app = setup().await;
    let due_at = (Utc::now() + Duration::days(21)).to_rfc3339();
    let request = json!({"book_id": app.book_id, "user_id": app.member_id, "due_at": due_at});

    let (status, _) = send(&app.router, Method::POST, "/api/v1/loans", Some("ana-token"), Some(request.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app.router, Method::POST, "/api/v1/loans", Some("root-token"), Some(request)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["loan"]["user_id"], app.member_id);

    let (status, _) = send(&app.router, Method::GET, "/api/v1/loans", Some("ana-token"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app.router, Method::GET, "/api/v1/loans", Some("root-token"), None).await;
    assert_eq!(status, StatusCode::OK);
    let loans = body.as_array().unwrap();
    assert_eq!(loans.len(), 1);
    assert_eq!(loans[0]["book"]["title"], "El árbol de la ciencia");
    assert_eq!(loans[0]["user"]["username"], "ana");
    assert_eq!(loans[0]["user"]["role"], "member");
    assert_eq!(loans[0]["is_overdue"], false);

    let (status, body) = send(&app.router, Method::GET, "/api/v1/loans/mine", Some("ana-token"), None).await;
    assert_eq!(status, StatusCode::OK);
    let mine = body.as_array().unwrap();
    assert_eq!(mine.len(), 1);
    assert!(mine[0].get("user").is_none());

    let (_, body) = send(&app.router, Method::GET, "/api/v1/loans/mine", Some("bruno-token"), None).await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_issue_validates_body() {
    let app = setup().await;
    let due_at = (Utc::now() + Duration::days(21)).to_rfc3339();
    let request = json!({"book_id": 0, "user_id": app.member_id, "due_at": due_at});

    let (status, body) = send(&app.router, Method::POST, "/api/v1/loans", Some("root-token"), Some(request)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");
}

#[tokio::test]
async fn test_admin_issue_missing_field_is_bad_value() {
    let app = setup().await;
    let request = json!({"book_id": app.book_id});

    let (status, body) = send(&app.router, Method::POST, "/api/v1/loans", Some("root-token"), Some(request)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");
    assert_eq!(body["code"], 13);
    assert!(body["message"].as_str().unwrap().contains("user_id"));
}

#[tokio::test]
async fn test_admin_issue_unparseable_due_date_is_bad_value() {
    let app = setup().await;
    let request = json!({"book_id": app.book_id, "user_id": app.member_id, "due_at": "tomorrow"});

    let (status, body) = send(&app.router, Method::POST, "/api/v1/loans", Some("root-token"), Some(request)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");

    // Nothing was issued
    let (_, book) = send(&app.router, Method::GET, &format!("/api/v1/books/{}", app.book_id), None, None).await;
    assert_eq!(book["stock"], 1);
}

#[tokio::test]
async fn test_non_numeric_ids_are_bad_value() {
    let app = setup().await;

    let (status, body) = send(&app.router, Method::POST, "/api/v1/books/abc/borrow", Some("ana-token"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");

    let (status, body) = send(&app.router, Method::GET, "/api/v1/books/abc", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");

    let (status, body) = send(&app.router, Method::POST, "/api/v1/loans/x1/return", Some("ana-token"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");
}
