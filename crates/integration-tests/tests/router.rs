//! Router-level tests: health, envelopes, auth guards and validation.
//!
//! None of these reach the database.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::json;

use bazaar_core::UserRole;
use bazaar_integration_tests::{TestApp, json_request, request};

#[tokio::test]
async fn test_health_is_ok() {
    let app = TestApp::new();
    let (status, body) = app.send(request("GET", "/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_readiness_reports_unreachable_database() {
    let app = TestApp::new();
    let (status, body) = app.send(request("GET", "/health/ready", None)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Database unavailable");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = TestApp::new();
    let mut req = request("GET", "/health", None);
    req.headers_mut()
        .insert("x-request-id", "abc-123".parse().unwrap());

    let response = tower::ServiceExt::oneshot(app.router.clone(), req)
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "abc-123");
}

#[tokio::test]
async fn test_request_id_is_generated() {
    let app = TestApp::new();
    let response = tower::ServiceExt::oneshot(app.router.clone(), request("GET", "/health", None))
        .await
        .unwrap();
    let id = response.headers()["x-request-id"].to_str().unwrap();
    assert!(uuid::Uuid::parse_str(id).is_ok());
}

#[tokio::test]
async fn test_unknown_route_uses_envelope() {
    let app = TestApp::new();
    let (status, body) = app.send(request("GET", "/api/v1/nope", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "No route for GET /api/v1/nope");
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = TestApp::new();
    let (status, body) = app.send(request("GET", "/api/v1/cart", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Authentication required");
}

#[tokio::test]
async fn test_garbage_token_is_unauthorized() {
    let app = TestApp::new();
    let (status, body) = app
        .send(request("GET", "/api/v1/user/me", Some("not.a.jwt")))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid or expired token");
}

#[tokio::test]
async fn test_tampered_token_is_unauthorized() {
    let app = TestApp::new();
    let token = app.token(UserRole::Customer);
    let (status, _) = app
        .send(request("GET", "/api/v1/cart", Some(&format!("{token}x"))))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_roles_are_enforced() {
    let app = TestApp::new();

    let merchant = app.token(UserRole::Merchant);
    let (status, body) = app.send(request("GET", "/api/v1/cart", Some(&merchant))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "This action requires a customer account");

    let customer = app.token(UserRole::Customer);
    let (status, _) = app
        .send(request("GET", "/api/v1/order/merchant", Some(&customer)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(request("GET", "/api/v1/delivery/mine", Some(&customer)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(request("POST", "/api/v1/settlement/generate", Some(&customer)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = TestApp::new();
    let mut req = json_request("POST", "/api/v1/user/login", None, &json!({}));
    *req.body_mut() = axum::body::Body::from("{not json");

    let (status, body) = app.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_missing_fields_are_bad_request() {
    let app = TestApp::new();
    let (status, body) = app
        .send(json_request(
            "POST",
            "/api/v1/user/register",
            None,
            &json!({"name": "Asha"}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_weak_password_is_rejected_before_storage() {
    let app = TestApp::new();
    let (status, body) = app
        .send(json_request(
            "POST",
            "/api/v1/user/register",
            None,
            &json!({"name": "Asha", "email": "asha@example.com", "password": "short"}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "password must be at least 8 characters");
}

#[tokio::test]
async fn test_cart_quantity_is_validated() {
    let app = TestApp::new();
    let token = app.token(UserRole::Customer);
    let (status, body) = app
        .send(json_request(
            "POST",
            "/api/v1/cart/items",
            Some(&token),
            &json!({"product_id": 1, "quantity": 0}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "quantity must be between 1 and 100");
}

#[tokio::test]
async fn test_wrong_method_uses_envelope() {
    let app = TestApp::new();
    let (status, body) = app.send(request("DELETE", "/api/v1/user/login", None)).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["success"], false);
}
