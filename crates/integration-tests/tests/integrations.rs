//! Optional integrations: Razorpay webhooks, presigned uploads, maps.

#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;

use bazaar_core::UserRole;
use bazaar_integration_tests::{TestApp, WEBHOOK_SECRET, json_request, request};

fn webhook(body: &str, signature: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/payment/webhook/razorpay")
        .header("content-type", "application/json")
        .header("x-razorpay-signature", signature)
        .body(Body::from(body.to_owned()))
        .unwrap()
}

fn sign(body: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.update(body.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[tokio::test]
async fn test_webhook_without_razorpay_is_unavailable() {
    let app = TestApp::new();
    let (status, body) = app.send(webhook("{}", "00")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["message"], "Razorpay is not configured");
}

#[tokio::test]
async fn test_webhook_rejects_bad_signature() {
    let app = TestApp::with_razorpay();
    let payload = r#"{"event":"payment.captured","payload":{}}"#;
    let (status, body) = app.send(webhook(payload, &"0".repeat(64))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Payment signature verification failed");
}

#[tokio::test]
async fn test_webhook_signature_covers_raw_body() {
    let app = TestApp::with_razorpay();
    let payload = r#"{"event":"order.paid","payload":{}}"#;
    let signature = sign(payload);

    // Whitespace changes the bytes, so the signature no longer matches.
    let reformatted = r#"{ "event": "order.paid", "payload": {} }"#;
    let (status, _) = app.send(webhook(reformatted, &signature)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.send(webhook(payload, &signature)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Event ignored");
}

#[tokio::test]
async fn test_webhook_rejects_signed_garbage() {
    let app = TestApp::with_razorpay();
    let payload = "not json";
    let (status, body) = app.send(webhook(payload, &sign(payload))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_online_checkout_without_razorpay_is_unavailable() {
    let app = TestApp::new();
    let token = app.token(UserRole::Customer);
    let (status, _) = app
        .send(json_request(
            "POST",
            "/api/v1/order/checkout",
            Some(&token),
            &json!({"delivery_address": "12 MG Road, Bengaluru", "payment_method": "online"}),
        ))
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_presign_upload() {
    let app = TestApp::with_storage();
    let token = app.token(UserRole::Merchant);
    let (status, body) = app
        .send(json_request(
            "POST",
            "/api/v1/upload/presign",
            Some(&token),
            &json!({"file_name": "dosa.png", "content_type": "image/png", "folder": "products"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let upload = &body["upload"];
    let key = upload["key"].as_str().unwrap();
    assert!(key.starts_with("products/42/"));
    assert!(key.ends_with(".png"));
    assert_eq!(upload["expires_in"], 900);
    assert_eq!(
        upload["file_url"].as_str().unwrap(),
        format!("https://cdn.example.com/{key}")
    );
    let url = upload["upload_url"].as_str().unwrap();
    assert!(url.starts_with("https://bazaar-uploads.s3.ap-south-1.amazonaws.com/products/42/"));
    assert!(url.contains("X-Amz-Signature="));
}

#[tokio::test]
async fn test_presign_rejects_non_images() {
    let app = TestApp::with_storage();
    let token = app.token(UserRole::Customer);
    let (status, _) = app
        .send(json_request(
            "POST",
            "/api/v1/upload/presign",
            Some(&token),
            &json!({"file_name": "notes.pdf", "content_type": "application/pdf", "folder": "avatars"}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_presign_without_storage_is_unavailable() {
    let app = TestApp::new();
    let token = app.token(UserRole::Customer);
    let (status, _) = app
        .send(json_request(
            "POST",
            "/api/v1/upload/presign",
            Some(&token),
            &json!({"file_name": "me.jpg", "content_type": "image/jpeg", "folder": "avatars"}),
        ))
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_geocode_without_maps_is_unavailable() {
    let app = TestApp::new();
    let token = app.token(UserRole::Customer);
    let (status, body) = app
        .send(request("GET", "/api/v1/geocode?address=Indiranagar", Some(&token)))
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["message"], "Google Maps is not configured");
}

#[tokio::test]
async fn test_extract_plain_link_needs_no_maps() {
    let app = TestApp::new();
    let token = app.token(UserRole::Delivery);
    let (status, body) = app
        .send(json_request(
            "POST",
            "/api/v1/geocode/extract",
            Some(&token),
            &json!({"url": "https://www.google.com/maps/place/Cubbon+Park/@12.9763,77.5929,17z"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!((body["location"]["latitude"].as_f64().unwrap() - 12.9763).abs() < 1e-9);
}

#[tokio::test]
async fn test_extract_without_coordinates_is_bad_request() {
    let app = TestApp::new();
    let token = app.token(UserRole::Customer);
    let (status, _) = app
        .send(json_request(
            "POST",
            "/api/v1/geocode/extract",
            Some(&token),
            &json!({"url": "https://example.com/somewhere"}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_directions_validate_points() {
    let app = TestApp::new();
    let token = app.token(UserRole::Delivery);
    let (status, body) = app
        .send(request(
            "GET",
            "/api/v1/directions?origin=12.9,77.5&destination=nowhere",
            Some(&token),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "destination: expected \"lat,lng\"");
}
