//! Checkout DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{Buyer, PaymentStatus, TicketTypeId};
use crate::service::{CheckoutReceipt, CheckoutRequest};

/// Request body for `POST /checkout`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutBody {
    /// Ticket type to buy.
    pub ticket_type_id: Uuid,
    /// Number of tickets (1–50).
    pub quantity: u32,
    /// Buyer details.
    pub buyer: Buyer,
}

impl From<CheckoutBody> for CheckoutRequest {
    fn from(body: CheckoutBody) -> Self {
        Self {
            ticket_type_id: TicketTypeId::from_uuid(body.ticket_type_id),
            quantity: body.quantity,
            buyer: body.buyer,
        }
    }
}

/// Response body for `POST /checkout` (201 Created).
#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutResponse {
    /// Sale identifier.
    pub sale_id: Uuid,
    /// Code to present at the gate once paid.
    pub redemption_code: String,
    /// Gateway payment id.
    pub payment_id: String,
    /// Hosted payment page.
    pub invoice_url: String,
    /// Number of tickets.
    pub quantity: u32,
    /// Amount charged, decimal string (e.g. `"150.00"`).
    pub total: String,
    /// Amount charged in cents.
    pub total_cents: i64,
    /// Payment status, `pending` until the gateway confirms.
    pub payment_status: PaymentStatus,
}

impl From<CheckoutReceipt> for CheckoutResponse {
    fn from(receipt: CheckoutReceipt) -> Self {
        Self {
            sale_id: *receipt.sale_id.as_uuid(),
            redemption_code: receipt.redemption_code.to_string(),
            payment_id: receipt.payment_id,
            invoice_url: receipt.invoice_url,
            quantity: receipt.quantity,
            total: receipt.total.to_string(),
            total_cents: receipt.total.cents(),
            payment_status: receipt.payment_status,
        }
    }
}
