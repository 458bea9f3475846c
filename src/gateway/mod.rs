//! Payment gateway adapter.
//!
//! Outbound, [`PaymentGateway`] registers the buyer and opens a payment
//! intent. Inbound, the gateway posts [`WebhookPayload`]s: an untrusted,
//! at-least-once, possibly out-of-order event stream that
//! [`crate::service::WebhookReconciler`] turns into state transitions.

pub mod http;
pub mod mock;
pub mod signature;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Buyer, Money};

pub use self::http::HttpPaymentGateway;
pub use mock::{MockBehavior, MockGateway};
pub use signature::WebhookVerifier;

/// Gateway-side failures.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// Network or TLS failure talking to the gateway.
    #[error("gateway transport error: {0}")]
    Transport(String),

    /// Gateway answered with a non-success status.
    #[error("gateway rejected request ({status}): {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// Gateway answered with something we cannot decode.
    #[error("invalid gateway response: {0}")]
    InvalidResponse(String),
}

/// Request to open a payment for a sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePaymentRequest {
    /// Gateway customer id from [`PaymentGateway::register_customer`].
    pub customer_ref: String,
    /// Amount to charge.
    pub amount: Money,
    /// Last day the payment can be made.
    pub due_date: NaiveDate,
    /// Our correlation id (the sale id), echoed back in webhooks.
    pub external_reference: String,
    /// Human-readable charge description.
    pub description: String,
}

/// A payment opened at the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentIntent {
    /// Gateway payment id; the sale's payment reference.
    pub payment_id: String,
    /// Hosted page where the buyer pays.
    pub invoice_url: String,
}

/// Outbound side of the gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync + std::fmt::Debug {
    /// Registers (or looks up) the buyer at the gateway and returns the
    /// gateway's customer reference.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError`] on transport or gateway failure.
    async fn register_customer(&self, buyer: &Buyer) -> Result<String, PaymentError>;

    /// Opens a payment intent.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError`] on transport or gateway failure.
    async fn create_payment(
        &self,
        request: &CreatePaymentRequest,
    ) -> Result<PaymentIntent, PaymentError>;
}

/// Inbound webhook body.
///
/// ```json
/// { "event": "PAYMENT_CONFIRMED", "payment": { "id": "pay_123", ... } }
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct WebhookPayload {
    /// Gateway event name.
    pub event: String,
    /// Payment the event refers to.
    pub payment: WebhookPayment,
}

/// The `payment` object of a webhook. Only the gateway payment id is read:
/// sales are matched on the reference stored at checkout and nothing else.
/// Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct WebhookPayment {
    /// Gateway payment id.
    pub id: String,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn webhook_payload_ignores_unknown_fields() {
        let raw = r#"{
            "event": "PAYMENT_RECEIVED",
            "payment": {
                "id": "pay_080225913252",
                "customer": "cus_000005219613",
                "value": 100.0,
                "externalReference": "a3c1",
                "status": "RECEIVED"
            }
        }"#;
        let parsed: Result<WebhookPayload, _> = serde_json::from_str(raw);
        let Ok(payload) = parsed else {
            panic!("payload should parse");
        };
        assert_eq!(payload.event, "PAYMENT_RECEIVED");
        assert_eq!(payload.payment.id, "pay_080225913252");
    }

    #[test]
    fn webhook_payload_requires_payment_id() {
        let parsed: Result<WebhookPayload, _> =
            serde_json::from_str(r#"{"event":"PAYMENT_CONFIRMED","payment":{}}"#);
        assert!(parsed.is_err());
    }
}
