//! End-to-end tests against a running server.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (`bazaar-cli migrate`)
//! - The API server running (`cargo run -p bazaar-api`)
//!
//! Run with: `API_BASE_URL=http://127.0.0.1:5000 cargo test -p bazaar-integration-tests --test live_api -- --ignored`
//!
//! Order, delivery and payment flows run in-process against the database in
//! `db_flows.rs`.

#![allow(clippy::unwrap_used)]

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

/// Base URL for the API (configurable via environment).
fn base_url() -> String {
    std::env::var("API_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:5000".to_string())
}

/// A fresh client address. The server rate-limits register and login by it.
fn forwarded_for() -> String {
    let b = Uuid::new_v4().into_bytes();
    format!("10.{}.{}.{}", b[0], b[1], b[2])
}

/// Register a fresh user with `role` and return `(token, body)`.
async fn register(client: &Client, role: &str) -> (String, Value) {
    let email = format!("{role}-{}@example.com", Uuid::new_v4().simple());
    let resp = client
        .post(format!("{}/api/v1/user/register", base_url()))
        .header("x-forwarded-for", forwarded_for())
        .json(&json!({
            "name": format!("Test {role}"),
            "email": email,
            "password": "hunter22-bazaar",
            "role": role,
        }))
        .send()
        .await
        .expect("Failed to register");
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body: Value = resp.json().await.unwrap();
    (body["token"].as_str().unwrap().to_string(), body)
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_register_login_me() {
    let client = Client::new();
    let (token, body) = register(&client, "customer").await;
    let email = body["user"]["email"].as_str().unwrap().to_string();

    let resp = client
        .post(format!("{}/api/v1/user/login", base_url()))
        .header("x-forwarded-for", forwarded_for())
        .json(&json!({"email": email, "password": "hunter22-bazaar"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .get(format!("{}/api/v1/user/me", base_url()))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let me: Value = resp.json().await.unwrap();
    assert_eq!(me["user"]["email"], email);
    assert!(me["user"].get("password_hash").is_none());
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_duplicate_email_conflicts() {
    let client = Client::new();
    let (_, body) = register(&client, "customer").await;

    let resp = client
        .post(format!("{}/api/v1/user/register", base_url()))
        .header("x-forwarded-for", forwarded_for())
        .json(&json!({
            "name": "Again",
            "email": body["user"]["email"],
            "password": "hunter22-bazaar",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_cod_order_flow() {
    let client = Client::new();
    let url = base_url();
    let (merchant, _) = register(&client, "merchant").await;
    let (customer, _) = register(&client, "customer").await;

    let store: Value = client
        .post(format!("{url}/api/v1/store"))
        .bearer_auth(&merchant)
        .json(&json!({
            "name": "Corner Dosa",
            "address": "80 Feet Road, Koramangala",
            "latitude": 12.9352,
            "longitude": 77.6245,
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(store["success"], true);

    let product: Value = client
        .post(format!("{url}/api/v1/product"))
        .bearer_auth(&merchant)
        .json(&json!({"name": "Masala Dosa", "price": "80.00", "stock": 10}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let product_id = product["product"]["id"].as_i64().unwrap();

    let resp = client
        .post(format!("{url}/api/v1/cart/items"))
        .bearer_auth(&customer)
        .json(&json!({"product_id": product_id, "quantity": 2}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .post(format!("{url}/api/v1/order/checkout"))
        .bearer_auth(&customer)
        .json(&json!({
            "payment_method": "cod",
            "delivery_address": "4th Block, Koramangala",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let placed: Value = resp.json().await.unwrap();
    let order_id = placed["order"]["id"].as_i64().unwrap();
    assert_eq!(placed["order"]["status"], "placed");

    // Checkout empties the cart.
    let cart: Value = client
        .get(format!("{url}/api/v1/cart"))
        .bearer_auth(&customer)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cart["cart"]["items"].as_array().unwrap().len(), 0);

    // Skipping straight to delivered is refused.
    let resp = client
        .put(format!("{url}/api/v1/order/{order_id}/status"))
        .bearer_auth(&merchant)
        .json(&json!({"status": "delivered"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = client
        .put(format!("{url}/api/v1/order/{order_id}/status"))
        .bearer_auth(&merchant)
        .json(&json!({"status": "accepted"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
