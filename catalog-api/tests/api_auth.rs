mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use pretty_assertions::assert_eq;
use serde_json::json;
use shared::Role;

use common::{access_token, body_json, refresh_token, send, test_app};

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: Method, uri: &str, body: serde_json::Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn test_protected_routes_reject_anonymous_requests() {
    let (_, app) = test_app();

    for uri in [
        "/api/v1/user/get-user",
        "/api/v1/user/users",
        "/api/v1/leads",
        "/api/v1/leads/recent",
        "/api/v1/comments/lead/0d9c4f5e-8a43-4b9e-9b56-1f0f3c1f6a11",
        "/api/v1/category/length",
        "/api/v1/subcategory",
        "/api/v1/product/search?q=valve",
        "/api/v1/product/product-length",
        "/api/v1/banner/assign-positions",
    ] {
        let response = send(&app, get(uri)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
    }
}

#[tokio::test]
async fn test_rejection_body_shape() {
    let (_, app) = test_app();

    let response = send(&app, get("/api/v1/user/check-auth")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["statusCode"], json!(401));
    assert_eq!(body["message"], json!("Unauthorized request"));
}

#[tokio::test]
async fn test_check_auth_returns_claims() {
    let (state, app) = test_app();
    let token = access_token(&state, Role::Sales);

    let request = Request::builder()
        .uri("/api/v1/user/check-auth")
        .header(header::COOKIE, format!("accessToken={}", token))
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["user"]["role"], json!("Sales"));
    assert_eq!(body["data"]["user"]["email"], json!("test@example.com"));
}

#[tokio::test]
async fn test_refresh_token_is_not_an_access_token() {
    let (state, app) = test_app();
    let token = refresh_token(&state, Role::Admin);

    let request = Request::builder()
        .uri("/api/v1/user/check-auth")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_garbage_token_is_rejected() {
    let (_, app) = test_app();

    let request = Request::builder()
        .uri("/api/v1/leads/all")
        .header(header::AUTHORIZATION, "Bearer not.a.jwt")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_only_routes_forbid_members() {
    let (state, app) = test_app();
    let token = access_token(&state, Role::Manager);

    let response = send(
        &app,
        json_request(
            Method::PUT,
            "/api/v1/user/active-status",
            json!({ "status": false }),
            Some(&token),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_uploads_require_auth_before_reading_the_form() {
    let (_, app) = test_app();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/banner/banners")
        .header(header::CONTENT_TYPE, "multipart/form-data; boundary=X")
        .body(Body::from("--X--\r\n"))
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_lead_form_is_validated_before_storage() {
    let (_, app) = test_app();

    let response = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/leads",
            json!({
                "name": "Ravi",
                "email": "not-an-email",
                "phone": "9999999999",
                "message": "Need a quote"
            }),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search_requires_query() {
    let (state, app) = test_app();
    let token = access_token(&state, Role::Sales);

    let request = Request::builder()
        .uri("/api/v1/leads/search?q=%20")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["message"], json!("Search query is required"));
}
