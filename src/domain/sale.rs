//! Sales: one buyer's purchase of N tickets of one type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{EventId, Money, PaymentStatus, RedemptionCode, SaleId, TicketTypeId};

/// Buyer identity captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Buyer {
    /// Full name.
    pub name: String,
    /// Contact e-mail; the ticket is delivered here.
    pub email: String,
    /// Contact phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// Tax document number, forwarded to the gateway when present.
    #[serde(default)]
    pub document: Option<String>,
}

/// A persisted sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sale {
    /// Sale identifier (also the gateway external reference).
    pub id: SaleId,
    /// Purchased ticket type.
    pub ticket_type_id: TicketTypeId,
    /// Event of the ticket type.
    pub event_id: EventId,
    /// Buyer identity.
    pub buyer: Buyer,
    /// Number of tickets covered by this sale.
    pub quantity: u32,
    /// Total charged.
    pub total_price: Money,
    /// Current payment state.
    pub payment_status: PaymentStatus,
    /// Gateway payment id; webhooks are matched on this.
    pub payment_reference: String,
    /// Ticket token. Immutable.
    pub redemption_code: RedemptionCode,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last status change.
    pub updated_at: DateTime<Utc>,
}

/// Everything needed to persist a new pending sale.
#[derive(Debug, Clone)]
pub struct NewSale {
    /// Pre-generated sale id, already sent to the gateway.
    pub id: SaleId,
    /// Buyer identity.
    pub buyer: Buyer,
    /// Gateway payment id.
    pub payment_reference: String,
    /// Candidate redemption code; the store rejects duplicates.
    pub redemption_code: RedemptionCode,
}
