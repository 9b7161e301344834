mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use pretty_assertions::assert_eq;
use serde_json::json;
use shared::Role;

use catalog_api::middleware::cache::CACHE_STATUS_HEADER;
use common::{access_token, body_json, send, test_app};

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn cache_status(response: &axum::http::Response<Body>) -> Option<&str> {
    response
        .headers()
        .get(CACHE_STATUS_HEADER)
        .and_then(|v| v.to_str().ok())
}

#[tokio::test]
async fn test_second_request_is_served_from_cache() {
    let (state, app) = test_app();
    // Too short to reach the database
    let uri = "/api/v1/product/user-search?q=a";

    let first = send(&app, get(uri)).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(cache_status(&first), Some("MISS"));
    let first_body = body_json(first).await;

    let second = send(&app, get(uri)).await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(cache_status(&second), Some("HIT"));
    assert_eq!(body_json(second).await, first_body);

    let stats = state.cache.stats().await;
    assert_eq!(stats.keys, vec![format!("GET:{}", uri)]);
}

#[tokio::test]
async fn test_query_string_is_part_of_the_key() {
    let (state, app) = test_app();

    send(&app, get("/api/v1/product/user-search?q=a")).await;
    send(&app, get("/api/v1/product/user-search?q=b")).await;

    assert_eq!(state.cache.stats().await.size, 2);
}

#[tokio::test]
async fn test_failures_are_not_cached() {
    let (state, app) = test_app();

    let response = send(&app, get("/api/v1/product/user-search")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(cache_status(&response), None);

    assert_eq!(state.cache.stats().await.size, 0);
}

fn authed(method: Method, uri: &str, token: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_product_delete_invalidates_catalog_entries() {
    let (state, app) = test_app();
    let uri = "/api/v1/product/user-search?q=a";
    let token = access_token(&state, Role::ProductManager);

    send(&app, get(uri)).await;
    assert_eq!(cache_status(&send(&app, get(uri)).await), Some("HIT"));

    // Reaches the handler, which then fails on the database
    let response = send(
        &app,
        authed(Method::DELETE, "/api/v1/product/ball-valve", &token, json!({})),
    )
    .await;
    assert!(response.status().is_server_error());

    assert_eq!(state.cache.stats().await.size, 0);
    assert_eq!(cache_status(&send(&app, get(uri)).await), Some("MISS"));
}

#[tokio::test]
async fn test_rejected_category_write_still_invalidates() {
    let (state, app) = test_app();
    let uri = "/api/v1/product/user-search?q=a";
    let token = access_token(&state, Role::Manager);

    send(&app, get(uri)).await;

    let response = send(
        &app,
        authed(Method::POST, "/api/v1/category", &token, json!({ "name": "UNCATEGORIZED" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(cache_status(&send(&app, get(uri)).await), Some("MISS"));
}

#[tokio::test]
async fn test_unauthenticated_writes_leave_cache_alone() {
    let (state, app) = test_app();
    let uri = "/api/v1/product/user-search?q=a";

    send(&app, get(uri)).await;

    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/api/v1/product/ball-valve")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(state.cache.stats().await.size, 1);
    assert_eq!(cache_status(&send(&app, get(uri)).await), Some("HIT"));
}

#[tokio::test]
async fn test_anonymous_requests_never_see_protected_cache_entries() {
    let (state, app) = test_app();

    let response = send(&app, get("/api/v1/product/search?q=valve")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(cache_status(&response), None);
    assert_eq!(state.cache.stats().await.size, 0);
}

#[tokio::test]
async fn test_hint_message_for_short_storefront_queries() {
    let (_, app) = test_app();

    let response = send(&app, get("/api/v1/product/user-search?q=%3Cb%3Ea%3C%2Fb%3E")).await;
    let body = body_json(response).await;

    assert_eq!(body["data"], json!([]));
    assert_eq!(body["success"], json!(true));
    assert_eq!(
        body["message"],
        json!("Please enter at least 2 characters to search")
    );
}

#[tokio::test]
async fn test_cors_preflight_for_allowed_origin() {
    let (_, app) = test_app();

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/product")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:3000"
    );
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
        "true"
    );
}

#[tokio::test]
async fn test_cors_ignores_unknown_origins() {
    let (_, app) = test_app();

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/product")
        .header(header::ORIGIN, "http://evil.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;

    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

#[tokio::test]
async fn test_health_reports_unreachable_database() {
    let (_, app) = test_app();

    let response = send(&app, get("/health")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = body_json(response).await;
    assert_eq!(body["status"], json!("degraded"));
    assert_eq!(body["database"], json!("down"));
}
