//! Order, delivery and payment flows against a real database.
//!
//! These tests require a migrated `PostgreSQL` database (`bazaar-cli migrate`)
//! named by `DATABASE_URL`. Razorpay is served by a local stub, so payment
//! flows run without network access.
//!
//! Run with: `DATABASE_URL=... cargo test -p bazaar-integration-tests --test db_flows -- --ignored`
//!
//! Every test registers its own users and places its store at a random spot,
//! so tests never share a delivery partner and may run in parallel.

#![allow(clippy::unwrap_used)]

use std::str::FromStr;

use axum::http::StatusCode;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use sha2::Sha256;
use uuid::Uuid;

use bazaar_core::percent_of;
use bazaar_integration_tests::{
    KEY_SECRET, RazorpayStub, TestApp, WEBHOOK_SECRET, json_request, request,
};

const PASSWORD: &str = "hunter22-bazaar";

/// A registered user.
struct Account {
    id: i64,
    token: String,
}

/// A merchant with an open store and one product.
struct Shop {
    merchant: Account,
    product_id: i64,
    latitude: f64,
    longitude: f64,
}

struct Market {
    app: TestApp,
    razorpay: RazorpayStub,
    client_ip: String,
}

impl Market {
    async fn open() -> Self {
        let razorpay = RazorpayStub::start().await;
        let app = TestApp::with_database(&razorpay.base_url);
        let b = Uuid::new_v4().into_bytes();
        Self {
            app,
            razorpay,
            client_ip: format!("10.{}.{}.{}", b[0], b[1], b[2]),
        }
    }

    async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<&Value>,
    ) -> (StatusCode, Value) {
        let mut req = match body {
            Some(body) => json_request(method, uri, token, body),
            None => request(method, uri, token),
        };
        req.headers_mut()
            .insert("x-forwarded-for", self.client_ip.parse().unwrap());
        self.app.send(req).await
    }

    async fn ok(&self, method: &str, uri: &str, token: &str, body: Option<&Value>) -> Value {
        let (status, body) = self.call(method, uri, Some(token), body).await;
        assert!(status.is_success(), "{method} {uri}: {status} {body}");
        body
    }

    async fn register(&self, role: &str) -> Account {
        let (status, body) = self
            .call(
                "POST",
                "/api/v1/user/register",
                None,
                Some(&json!({
                    "name": format!("Test {role}"),
                    "email": format!("{role}-{}@example.com", Uuid::new_v4().simple()),
                    "password": PASSWORD,
                    "role": role,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        Account {
            id: body["user"]["id"].as_i64().unwrap(),
            token: body["token"].as_str().unwrap().to_string(),
        }
    }

    async fn shop(&self, price: &str, stock: i32) -> Shop {
        let merchant = self.register("merchant").await;
        let (latitude, longitude) = random_spot();
        self.ok(
            "POST",
            "/api/v1/store",
            &merchant.token,
            Some(&json!({
                "name": "Corner Dosa",
                "address": "80 Feet Road",
                "latitude": latitude,
                "longitude": longitude,
            })),
        )
        .await;
        let product = self
            .ok(
                "POST",
                "/api/v1/product",
                &merchant.token,
                Some(&json!({"name": "Masala Dosa", "price": price, "stock": stock})),
            )
            .await;

        Shop {
            merchant,
            product_id: product["product"]["id"].as_i64().unwrap(),
            latitude,
            longitude,
        }
    }

    /// A delivery partner who is available at the given spot.
    async fn partner_at(&self, latitude: f64, longitude: f64) -> Account {
        let partner = self.register("delivery").await;
        self.ok(
            "PUT",
            "/api/v1/delivery/availability",
            &partner.token,
            Some(&json!({"is_available": true, "latitude": latitude, "longitude": longitude})),
        )
        .await;
        partner
    }

    async fn add_to_cart(&self, customer: &Account, product_id: i64, quantity: i32) {
        self.ok(
            "POST",
            "/api/v1/cart/items",
            &customer.token,
            Some(&json!({"product_id": product_id, "quantity": quantity})),
        )
        .await;
    }

    async fn checkout(&self, customer: &Account, payment_method: &str) -> (StatusCode, Value) {
        self.call(
            "POST",
            "/api/v1/order/checkout",
            Some(&customer.token),
            Some(&json!({
                "payment_method": payment_method,
                "delivery_address": "4th Block, Koramangala",
            })),
        )
        .await
    }

    /// Cart `quantity` units and check out; returns the placed order response.
    async fn place(&self, customer: &Account, shop: &Shop, quantity: i32, method: &str) -> Value {
        self.add_to_cart(customer, shop.product_id, quantity).await;
        let (status, placed) = self.checkout(customer, method).await;
        assert_eq!(status, StatusCode::CREATED, "{placed}");
        placed
    }

    async fn set_status(
        &self,
        merchant: &Account,
        order_id: i64,
        status: &str,
    ) -> (StatusCode, Value) {
        self.call(
            "PUT",
            &format!("/api/v1/order/{order_id}/status"),
            Some(&merchant.token),
            Some(&json!({"status": status})),
        )
        .await
    }

    async fn ready_for_pickup(&self, merchant: &Account, order_id: i64) {
        for status in ["accepted", "preparing", "ready_for_pickup"] {
            let (code, body) = self.set_status(merchant, order_id, status).await;
            assert_eq!(code, StatusCode::OK, "{status}: {body}");
        }
    }

    async fn stock(&self, product_id: i64) -> i64 {
        let (status, body) = self
            .call("GET", &format!("/api/v1/product/{product_id}"), None, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        body["product"]["stock"].as_i64().unwrap()
    }

    async fn order(&self, viewer: &Account, order_id: i64) -> Value {
        self.ok("GET", &format!("/api/v1/order/{order_id}"), &viewer.token, None)
            .await
    }

    async fn me(&self, user: &Account) -> Value {
        self.ok("GET", "/api/v1/user/me", &user.token, None).await["user"].clone()
    }

    async fn verify(
        &self,
        customer: &Account,
        rzp_order: &str,
        payment_id: &str,
        signature: &str,
    ) -> (StatusCode, Value) {
        self.call(
            "POST",
            "/api/v1/payment/verify",
            Some(&customer.token),
            Some(&json!({
                "razorpay_order_id": rzp_order,
                "razorpay_payment_id": payment_id,
                "razorpay_signature": signature,
            })),
        )
        .await
    }

    async fn webhook(&self, event: &Value) -> StatusCode {
        let body = event.to_string();
        let req = axum::http::Request::builder()
            .method("POST")
            .uri("/api/v1/payment/webhook/razorpay")
            .header("content-type", "application/json")
            .header("x-razorpay-signature", hmac_hex(WEBHOOK_SECRET, &body))
            .body(axum::body::Body::from(body))
            .unwrap();
        self.app.send(req).await.0
    }

    async fn payments(&self, customer: &Account, order_id: i64) -> Vec<Value> {
        self.ok(
            "GET",
            &format!("/api/v1/payment/order/{order_id}"),
            &customer.token,
            None,
        )
        .await["payments"]
            .as_array()
            .unwrap()
            .clone()
    }
}

/// Somewhere no other test's store is within delivery range.
fn random_spot() -> (f64, f64) {
    let b = Uuid::new_v4().into_bytes();
    let lat = f64::from(u16::from_be_bytes([b[0], b[1]])) / f64::from(u16::MAX);
    let lng = f64::from(u16::from_be_bytes([b[2], b[3]])) / f64::from(u16::MAX);
    (-60.0 + lat * 120.0, -170.0 + lng * 340.0)
}

fn hmac_hex(secret: &str, message: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn checkout_signature(rzp_order: &str, payment_id: &str) -> String {
    hmac_hex(KEY_SECRET, &format!("{rzp_order}|{payment_id}"))
}

fn money(value: &Value) -> Decimal {
    Decimal::from_str(value.as_str().unwrap()).unwrap()
}

fn id(value: &Value) -> i64 {
    value["id"].as_i64().unwrap()
}

fn payment_event(event: &str, rzp_order: &str, payment_id: &str) -> Value {
    json!({
        "event": event,
        "payload": {"payment": {"entity": {
            "id": payment_id,
            "order_id": rzp_order,
            "status": event.trim_start_matches("payment."),
        }}},
    })
}

// =============================================================================
// Checkout and stock
// =============================================================================

#[tokio::test]
#[ignore = "Requires a migrated database at DATABASE_URL"]
async fn test_checkout_takes_stock_and_cancel_restores_it() {
    let market = Market::open().await;
    let shop = market.shop("80.00", 10).await;
    let customer = market.register("customer").await;

    let (status, body) = market.checkout(&customer, "cod").await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let placed = market.place(&customer, &shop, 3, "cod").await;
    let order_id = id(&placed["order"]);
    assert_eq!(market.stock(shop.product_id).await, 7);
    assert_eq!(money(&placed["order"]["subtotal"]), Decimal::new(24_000, 2));
    assert_eq!(placed["items"].as_array().unwrap().len(), 1);

    let cart = market.ok("GET", "/api/v1/cart", &customer.token, None).await;
    assert!(cart["cart"]["items"].as_array().unwrap().is_empty());

    let cancelled = market
        .ok("POST", &format!("/api/v1/order/{order_id}/cancel"), &customer.token, None)
        .await;
    assert_eq!(cancelled["order"]["status"], "cancelled");
    assert_eq!(market.stock(shop.product_id).await, 10);

    let (status, _) = market
        .call("POST", &format!("/api/v1/order/{order_id}/cancel"), Some(&customer.token), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(market.stock(shop.product_id).await, 10);
}

#[tokio::test]
#[ignore = "Requires a migrated database at DATABASE_URL"]
async fn test_merchant_reject_restores_stock() {
    let market = Market::open().await;
    let shop = market.shop("45.50", 4).await;
    let customer = market.register("customer").await;

    let placed = market.place(&customer, &shop, 4, "cod").await;
    let order_id = id(&placed["order"]);
    assert_eq!(market.stock(shop.product_id).await, 0);

    let (status, body) = market.set_status(&shop.merchant, order_id, "rejected").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["order"]["status"], "rejected");
    assert_eq!(market.stock(shop.product_id).await, 4);

    let (status, _) = market.set_status(&shop.merchant, order_id, "accepted").await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires a migrated database at DATABASE_URL"]
async fn test_short_stock_at_checkout_conflicts_and_keeps_cart() {
    let market = Market::open().await;
    let shop = market.shop("20.00", 5).await;
    let customer = market.register("customer").await;
    market.add_to_cart(&customer, shop.product_id, 5).await;

    market
        .ok(
            "PUT",
            &format!("/api/v1/product/{}", shop.product_id),
            &shop.merchant.token,
            Some(&json!({"stock": 2})),
        )
        .await;

    let (status, _) = market.checkout(&customer, "cod").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(market.stock(shop.product_id).await, 2);

    let cart = market.ok("GET", "/api/v1/cart", &customer.token, None).await;
    assert_eq!(cart["cart"]["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
#[ignore = "Requires a migrated database at DATABASE_URL"]
async fn test_cart_holds_one_store_unless_replaced() {
    let market = Market::open().await;
    let first = market.shop("10.00", 5).await;
    let second = market.shop("12.00", 5).await;
    let customer = market.register("customer").await;
    market.add_to_cart(&customer, first.product_id, 1).await;

    let (status, _) = market
        .call(
            "POST",
            "/api/v1/cart/items",
            Some(&customer.token),
            Some(&json!({"product_id": second.product_id, "quantity": 1})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let cart = market
        .ok(
            "POST",
            "/api/v1/cart/items",
            &customer.token,
            Some(&json!({"product_id": second.product_id, "quantity": 2, "replace": true})),
        )
        .await;
    let items = cart["cart"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["product_id"].as_i64().unwrap(), second.product_id);
    assert_eq!(items[0]["quantity"], 2);
}

// =============================================================================
// Delivery, cash and settlement
// =============================================================================

#[tokio::test]
#[ignore = "Requires a migrated database at DATABASE_URL"]
async fn test_cod_delivery_confirmation_and_settlement() {
    let market = Market::open().await;
    let shop = market.shop("80.00", 10).await;
    let partner = market.partner_at(shop.latitude, shop.longitude).await;
    let customer = market.register("customer").await;

    let placed = market.place(&customer, &shop, 2, "cod").await;
    let order_id = id(&placed["order"]);
    market.ready_for_pickup(&shop.merchant, order_id).await;

    let (status, body) = market
        .call(
            "POST",
            &format!("/api/v1/delivery/assign/{order_id}"),
            Some(&shop.merchant.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["delivery"]["partner_id"].as_i64().unwrap(), partner.id);
    let delivery_id = id(&body["delivery"]);
    assert_eq!(market.me(&partner).await["is_available"], false);

    let picked = market
        .ok("POST", &format!("/api/v1/delivery/{delivery_id}/pickup"), &partner.token, None)
        .await;
    assert_eq!(picked["order"]["status"], "out_for_delivery");

    let detail = market.order(&customer, order_id).await;
    let otp = detail["order"]["delivery_otp"].as_str().unwrap().to_string();
    let total = detail["order"]["total"].clone();
    let partner_view = market.order(&partner, order_id).await;
    assert!(partner_view["order"].get("delivery_otp").is_none());

    let complete = format!("/api/v1/delivery/{delivery_id}/complete");
    let wrong = if otp == "0000" { "1111" } else { "0000" };
    let (status, _) = market
        .call(
            "POST",
            &complete,
            Some(&partner.token),
            Some(&json!({"otp": wrong, "cod_amount": total})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = market
        .call("POST", &complete, Some(&partner.token), Some(&json!({"otp": otp})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let delivered = market
        .ok("POST", &complete, &partner.token, Some(&json!({"otp": otp, "cod_amount": total})))
        .await;
    assert_eq!(delivered["order"]["status"], "delivered");
    assert_eq!(delivered["delivery"]["status"], "delivered");
    assert_eq!(market.me(&partner).await["is_available"], true);

    // Unconfirmed cash is not settled yet.
    let period = json!({"period_start": "2000-01-01", "period_end": "2100-12-31"});
    let (status, _) = market
        .call("POST", "/api/v1/settlement/generate", Some(&shop.merchant.token), Some(&period))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let confirm = format!("/api/v1/cod/{order_id}/confirm");
    let confirmed = market.ok("POST", &confirm, &shop.merchant.token, None).await;
    assert_eq!(confirmed["collection"]["status"], "confirmed");
    assert_eq!(money(&confirmed["collection"]["amount"]), money(&total));
    let (status, _) = market
        .call("POST", &confirm, Some(&shop.merchant.token), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(market.order(&customer, order_id).await["order"]["payment_status"], "paid");

    let (status, body) = market
        .call("POST", "/api/v1/settlement/generate", Some(&shop.merchant.token), Some(&period))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let settlement = &body["settlement"];
    let gross = money(&settlement["gross_amount"]);
    let commission = money(&settlement["commission_amount"]);
    assert_eq!(settlement["order_count"], 1);
    assert_eq!(gross, Decimal::new(16_000, 2));
    assert_eq!(
        commission,
        percent_of(gross, money(&settlement["commission_percent"]))
    );
    assert_eq!(money(&settlement["net_amount"]), gross - commission);

    // Each order is settled once.
    let (status, _) = market
        .call("POST", "/api/v1/settlement/generate", Some(&shop.merchant.token), Some(&period))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires a migrated database at DATABASE_URL"]
async fn test_busy_partner_cannot_go_available_or_take_second_order() {
    let market = Market::open().await;
    let shop = market.shop("30.00", 10).await;
    let partner = market.partner_at(shop.latitude, shop.longitude).await;
    let customer = market.register("customer").await;

    let first = id(&market.place(&customer, &shop, 1, "cod").await["order"]);
    market.ready_for_pickup(&shop.merchant, first).await;
    market
        .ok("POST", &format!("/api/v1/delivery/assign/{first}"), &shop.merchant.token, None)
        .await;

    let (status, _) = market
        .call(
            "PUT",
            "/api/v1/delivery/availability",
            Some(&partner.token),
            Some(&json!({
                "is_available": true,
                "latitude": shop.latitude,
                "longitude": shop.longitude,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(market.me(&partner).await["is_available"], false);

    let second = id(&market.place(&customer, &shop, 1, "cod").await["order"]);
    market.ready_for_pickup(&shop.merchant, second).await;
    let (status, _) = market
        .call(
            "POST",
            &format!("/api/v1/delivery/assign/{second}"),
            Some(&shop.merchant.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let mine = market
        .ok("GET", "/api/v1/delivery/mine?status=assigned", &partner.token, None)
        .await;
    assert_eq!(mine["deliveries"].as_array().unwrap().len(), 1);

    // Going offline is always allowed.
    let body = market
        .ok(
            "PUT",
            "/api/v1/delivery/availability",
            &partner.token,
            Some(&json!({"is_available": false})),
        )
        .await;
    assert_eq!(body["user"]["is_available"], false);
}

#[tokio::test]
#[ignore = "Requires a migrated database at DATABASE_URL"]
async fn test_rejected_delivery_goes_to_next_partner() {
    let market = Market::open().await;
    let shop = market.shop("55.00", 10).await;
    let nearest = market.partner_at(shop.latitude, shop.longitude).await;
    let next = market
        .partner_at(shop.latitude + 0.01, shop.longitude)
        .await;
    let customer = market.register("customer").await;

    let order_id = id(&market.place(&customer, &shop, 1, "cod").await["order"]);
    market.ready_for_pickup(&shop.merchant, order_id).await;
    let assigned = market
        .ok("POST", &format!("/api/v1/delivery/assign/{order_id}"), &shop.merchant.token, None)
        .await;
    assert_eq!(assigned["delivery"]["partner_id"].as_i64().unwrap(), nearest.id);
    let delivery_id = id(&assigned["delivery"]);

    let rejected = market
        .ok("POST", &format!("/api/v1/delivery/{delivery_id}/reject"), &nearest.token, None)
        .await;
    assert_eq!(rejected["delivery"]["status"], "rejected");
    assert_eq!(rejected["reassigned"], true);
    assert_eq!(rejected["new_delivery"]["partner_id"].as_i64().unwrap(), next.id);
    assert_eq!(market.me(&nearest).await["is_available"], true);
    assert_eq!(market.me(&next).await["is_available"], false);

    // The rejected assignment cannot be picked up any more.
    let (status, _) = market
        .call(
            "POST",
            &format!("/api/v1/delivery/{delivery_id}/pickup"),
            Some(&nearest.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

// =============================================================================
// Online payments
// =============================================================================

#[tokio::test]
#[ignore = "Requires a migrated database at DATABASE_URL"]
async fn test_capture_records_verified_payment_id_and_refunds_it() {
    let market = Market::open().await;
    let shop = market.shop("99.00", 5).await;
    let customer = market.register("customer").await;

    let placed = market.place(&customer, &shop, 1, "online").await;
    let order_id = id(&placed["order"]);
    let rzp_order = placed["payment"]["razorpay_order_id"].as_str().unwrap().to_string();

    let (status, _) = market
        .verify(&customer, &rzp_order, "pay_failedA", "deadbeef")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let payments = market.payments(&customer, order_id).await;
    assert_eq!(payments[0]["status"], "failed");
    assert!(payments[0]["provider_payment_id"].is_null());

    let signature = checkout_signature(&rzp_order, "pay_realB");
    let (status, body) = market.verify(&customer, &rzp_order, "pay_realB", &signature).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["payment"]["status"], "captured");
    assert_eq!(body["payment"]["provider_payment_id"], "pay_realB");

    // A late failure for another attempt leaves the capture alone.
    let failed = payment_event("payment.failed", &rzp_order, "pay_failedA");
    assert_eq!(market.webhook(&failed).await, StatusCode::OK);
    let payments = market.payments(&customer, order_id).await;
    assert_eq!(payments[0]["status"], "captured");
    assert_eq!(payments[0]["provider_payment_id"], "pay_realB");
    assert_eq!(market.order(&customer, order_id).await["order"]["payment_status"], "paid");

    let (status, _) = market.set_status(&shop.merchant, order_id, "rejected").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(market.razorpay.refunds(), vec!["pay_realB".to_string()]);
    assert_eq!(
        market.order(&customer, order_id).await["order"]["payment_status"],
        "refunded"
    );
}

#[tokio::test]
#[ignore = "Requires a migrated database at DATABASE_URL"]
async fn test_capture_after_cancel_is_refunded() {
    let market = Market::open().await;
    let shop = market.shop("150.00", 5).await;
    let customer = market.register("customer").await;

    let placed = market.place(&customer, &shop, 1, "online").await;
    let order_id = id(&placed["order"]);
    let rzp_order = placed["payment"]["razorpay_order_id"].as_str().unwrap().to_string();

    market
        .ok("POST", &format!("/api/v1/order/{order_id}/cancel"), &customer.token, None)
        .await;
    assert!(market.razorpay.refunds().is_empty());

    let signature = checkout_signature(&rzp_order, "pay_late");
    let (status, body) = market.verify(&customer, &rzp_order, "pay_late", &signature).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(market.razorpay.refunds(), vec!["pay_late".to_string()]);

    let order = &market.order(&customer, order_id).await["order"];
    assert_eq!(order["status"], "cancelled");
    assert_eq!(order["payment_status"], "refunded");
}

#[tokio::test]
#[ignore = "Requires a migrated database at DATABASE_URL"]
async fn test_webhook_capture_after_reject_is_refunded() {
    let market = Market::open().await;
    let shop = market.shop("75.00", 5).await;
    let customer = market.register("customer").await;

    let placed = market.place(&customer, &shop, 1, "online").await;
    let order_id = id(&placed["order"]);
    let rzp_order = placed["payment"]["razorpay_order_id"].as_str().unwrap().to_string();

    let (status, _) = market.set_status(&shop.merchant, order_id, "rejected").await;
    assert_eq!(status, StatusCode::OK);

    let captured = payment_event("payment.captured", &rzp_order, "pay_hook");
    assert_eq!(market.webhook(&captured).await, StatusCode::OK);
    assert_eq!(market.razorpay.refunds(), vec!["pay_hook".to_string()]);

    // Replaying the capture neither refunds twice nor marks the order paid.
    assert_eq!(market.webhook(&captured).await, StatusCode::OK);
    assert_eq!(market.razorpay.refunds().len(), 1);
    let order = &market.order(&customer, order_id).await["order"];
    assert_eq!(order["status"], "rejected");
    assert_eq!(order["payment_status"], "refunded");
}

#[tokio::test]
#[ignore = "Requires a migrated database at DATABASE_URL"]
async fn test_webhook_replays_are_idempotent() {
    let market = Market::open().await;
    let shop = market.shop("60.00", 5).await;
    let customer = market.register("customer").await;

    let placed = market.place(&customer, &shop, 1, "online").await;
    let order_id = id(&placed["order"]);
    let rzp_order = placed["payment"]["razorpay_order_id"].as_str().unwrap().to_string();

    let captured = payment_event("payment.captured", &rzp_order, "pay_once");
    for _ in 0..2 {
        assert_eq!(market.webhook(&captured).await, StatusCode::OK);
    }
    let payments = market.payments(&customer, order_id).await;
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0]["status"], "captured");
    assert_eq!(payments[0]["provider_payment_id"], "pay_once");
    assert_eq!(market.order(&customer, order_id).await["order"]["payment_status"], "paid");

    let refunded = json!({
        "event": "refund.processed",
        "payload": {"refund": {"entity": {"id": "rfnd_once", "payment_id": "pay_once"}}},
    });
    for _ in 0..2 {
        assert_eq!(market.webhook(&refunded).await, StatusCode::OK);
    }
    assert_eq!(market.webhook(&captured).await, StatusCode::OK);

    let payments = market.payments(&customer, order_id).await;
    assert_eq!(payments[0]["status"], "refunded");
    assert_eq!(
        market.order(&customer, order_id).await["order"]["payment_status"],
        "refunded"
    );
    assert!(market.razorpay.refunds().is_empty());
}
