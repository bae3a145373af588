//! Razorpay client.
//!
//! Creates orders and refunds over the REST API (basic auth with the key
//! pair) and checks the two HMAC-SHA256 signatures Razorpay produces:
//! the checkout signature over `order_id|payment_id` (key secret) and the
//! webhook signature over the raw body (webhook secret).

use hmac::{Hmac, Mac};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, error, instrument};

use bazaar_core::CURRENCY;

use crate::config::RazorpayConfig;

/// Errors that can occur when talking to Razorpay.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Checkout or webhook signature did not match.
    #[error("invalid signature")]
    InvalidSignature,

    /// Amount cannot be charged (negative or out of range).
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// HTTP request failed.
    #[error("Razorpay request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Razorpay answered with an error.
    #[error("Razorpay API error ({status}): {message}")]
    Api { status: u16, message: String },
}

/// Order as returned by `POST /v1/orders`.
#[derive(Debug, Clone, Deserialize)]
pub struct RazorpayOrder {
    pub id: String,
    /// Amount in paise.
    pub amount: i64,
    pub currency: String,
    pub receipt: Option<String>,
    pub status: String,
}

/// Refund as returned by `POST /v1/payments/{id}/refund`.
#[derive(Debug, Clone, Deserialize)]
pub struct RazorpayRefund {
    pub id: String,
    pub payment_id: String,
    pub amount: i64,
    pub status: String,
}

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

#[derive(Debug, Serialize)]
struct RefundRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    amount: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

// =============================================================================
// Webhooks
// =============================================================================

/// A webhook delivery. Only the fields we act on are modelled.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub payload: WebhookPayload,
}

/// Entities carried by a webhook.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    pub payment: Option<EntityWrapper<PaymentEntity>>,
    pub refund: Option<EntityWrapper<RefundEntity>>,
}

/// Razorpay nests every entity under `entity`.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityWrapper<T> {
    pub entity: T,
}

/// Payment entity in webhooks.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentEntity {
    pub id: String,
    pub order_id: Option<String>,
    pub status: Option<String>,
}

/// Refund entity in webhooks.
#[derive(Debug, Clone, Deserialize)]
pub struct RefundEntity {
    pub id: String,
    pub payment_id: String,
}

// =============================================================================
// Client
// =============================================================================

/// Razorpay API client.
#[derive(Clone)]
pub struct RazorpayClient {
    client: Client,
    key_id: String,
    key_secret: SecretString,
    webhook_secret: SecretString,
    base_url: String,
}

impl std::fmt::Debug for RazorpayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayClient")
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl RazorpayClient {
    /// Create a new client.
    #[must_use]
    pub fn new(client: Client, config: &RazorpayConfig) -> Self {
        Self {
            client,
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
            webhook_secret: config.webhook_secret.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Public key ID, handed to the client for checkout.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Create an order for `amount` paise.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidAmount` for non-positive amounts and
    /// `PaymentError::Http`/`Api` when the call fails.
    #[instrument(skip(self), fields(receipt = %receipt))]
    pub async fn create_order(
        &self,
        amount: i64,
        receipt: &str,
    ) -> Result<RazorpayOrder, PaymentError> {
        if amount <= 0 {
            return Err(PaymentError::InvalidAmount(
                "amount must be positive".to_string(),
            ));
        }

        let response = self
            .client
            .post(format!("{}/v1/orders", self.base_url))
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(&CreateOrderRequest {
                amount,
                currency: CURRENCY,
                receipt,
            })
            .send()
            .await?;

        let order: RazorpayOrder = parse_response(response).await?;
        debug!(razorpay_order_id = %order.id, amount, "Razorpay order created");
        Ok(order)
    }

    /// Refund a captured payment. `None` refunds the full amount.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Http`/`Api` when the call fails.
    #[instrument(skip(self), fields(payment_id = %payment_id))]
    pub async fn refund(
        &self,
        payment_id: &str,
        amount: Option<i64>,
    ) -> Result<RazorpayRefund, PaymentError> {
        let response = self
            .client
            .post(format!("{}/v1/payments/{payment_id}/refund", self.base_url))
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(&RefundRequest { amount })
            .send()
            .await?;

        let refund: RazorpayRefund = parse_response(response).await?;
        debug!(refund_id = %refund.id, "Razorpay refund created");
        Ok(refund)
    }

    /// Check the signature returned by Razorpay checkout.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidSignature` on mismatch.
    pub fn verify_payment_signature(
        &self,
        razorpay_order_id: &str,
        razorpay_payment_id: &str,
        signature: &str,
    ) -> Result<(), PaymentError> {
        let message = format!("{razorpay_order_id}|{razorpay_payment_id}");
        let expected = hmac_hex(self.key_secret.expose_secret().as_bytes(), message.as_bytes());
        check(&expected, signature)
    }

    /// Check the `X-Razorpay-Signature` header against the raw body.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidSignature` on mismatch.
    pub fn verify_webhook_signature(&self, body: &[u8], signature: &str) -> Result<(), PaymentError> {
        let expected = hmac_hex(self.webhook_secret.expose_secret().as_bytes(), body);
        check(&expected, signature)
    }
}

async fn parse_response<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, PaymentError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .ok()
        .and_then(|e| e.error.description.or(e.error.code))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());

    error!(status = %status, message = %message, "Razorpay API error");
    Err(PaymentError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Lower-case hex HMAC-SHA256 of `message`.
fn hmac_hex(secret: &[u8], message: &[u8]) -> String {
    // HMAC accepts keys of any length, so this never fails.
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret) else {
        return String::new();
    };
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

fn check(expected: &str, provided: &str) -> Result<(), PaymentError> {
    if !expected.is_empty() && constant_time_compare(expected, provided.trim()) {
        Ok(())
    } else {
        Err(PaymentError::InvalidSignature)
    }
}

/// Constant-time string comparison to prevent timing attacks.
pub(crate) fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client() -> RazorpayClient {
        RazorpayClient::new(
            Client::new(),
            &RazorpayConfig {
                key_id: "rzp_test_abc".to_string(),
                key_secret: SecretString::from("key-secret"),
                webhook_secret: SecretString::from("hook-secret"),
                base_url: "https://api.razorpay.com/".to_string(),
            },
        )
    }

    #[test]
    fn test_hmac_hex_rfc4231_case_2() {
        assert_eq!(
            hmac_hex(b"Jefe", b"what do ya want for nothing?"),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_payment_signature() {
        let client = client();
        let signature = hmac_hex(b"key-secret", b"order_X|pay_Y");
        assert!(client.verify_payment_signature("order_X", "pay_Y", &signature).is_ok());
        assert!(matches!(
            client.verify_payment_signature("order_X", "pay_Z", &signature),
            Err(PaymentError::InvalidSignature)
        ));
    }

    #[test]
    fn test_webhook_signature_uses_webhook_secret() {
        let client = client();
        let body = br#"{"event":"payment.captured"}"#;
        let good = hmac_hex(b"hook-secret", body);
        let wrong_key = hmac_hex(b"key-secret", body);
        assert!(client.verify_webhook_signature(body, &good).is_ok());
        assert!(client.verify_webhook_signature(body, &wrong_key).is_err());
        assert!(client.verify_webhook_signature(body, "").is_err());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        assert_eq!(client().base_url, "https://api.razorpay.com");
    }

    #[test]
    fn test_webhook_event_parsing() {
        let event: WebhookEvent = serde_json::from_str(
            r#"{
                "entity": "event",
                "event": "payment.captured",
                "payload": {"payment": {"entity": {"id": "pay_1", "order_id": "order_1", "status": "captured", "amount": 5000}}}
            }"#,
        )
        .unwrap();
        assert_eq!(event.event, "payment.captured");
        let payment = event.payload.payment.unwrap().entity;
        assert_eq!(payment.order_id.as_deref(), Some("order_1"));
        assert!(event.payload.refund.is_none());
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc", "abc"));
        assert!(!constant_time_compare("abc", "abd"));
        assert!(!constant_time_compare("abc", "ab"));
    }
}
