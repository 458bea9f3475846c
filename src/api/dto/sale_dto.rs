//! Read-side DTOs for ticket types and sales.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{PaymentStatus, Sale, TicketType};

/// Response body for `GET /ticket-types/{id}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct TicketTypeResponse {
    /// Ticket type identifier.
    pub id: Uuid,
    /// Owning event.
    pub event_id: Uuid,
    /// Display name.
    pub name: String,
    /// Unit price, decimal string.
    pub unit_price: String,
    /// Unit price in cents.
    pub unit_price_cents: i64,
    /// Total capacity.
    pub total: u32,
    /// Tickets still available.
    pub remaining: u32,
    /// Whether the type is on sale.
    pub active: bool,
}

impl From<TicketType> for TicketTypeResponse {
    fn from(tt: TicketType) -> Self {
        Self {
            id: *tt.id.as_uuid(),
            event_id: *tt.event_id.as_uuid(),
            name: tt.name,
            unit_price: tt.unit_price.to_string(),
            unit_price_cents: tt.unit_price.cents(),
            total: tt.total,
            remaining: tt.remaining,
            active: tt.active,
        }
    }
}

/// Response body for `GET /sales/{redemption_code}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct SaleResponse {
    /// Sale identifier.
    pub sale_id: Uuid,
    /// Ticket type sold.
    pub ticket_type_id: Uuid,
    /// Event the tickets are for.
    pub event_id: Uuid,
    /// Buyer's name.
    pub buyer_name: String,
    /// Number of tickets.
    pub quantity: u32,
    /// Amount charged, decimal string.
    pub total: String,
    /// Current payment status.
    pub payment_status: PaymentStatus,
    /// Gateway payment id.
    pub payment_reference: String,
    /// Redemption code.
    pub redemption_code: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last status change.
    pub updated_at: DateTime<Utc>,
}

impl From<Sale> for SaleResponse {
    fn from(sale: Sale) -> Self {
        Self {
            sale_id: *sale.id.as_uuid(),
            ticket_type_id: *sale.ticket_type_id.as_uuid(),
            event_id: *sale.event_id.as_uuid(),
            buyer_name: sale.buyer.name,
            quantity: sale.quantity,
            total: sale.total_price.to_string(),
            payment_status: sale.payment_status,
            payment_reference: sale.payment_reference,
            redemption_code: sale.redemption_code.to_string(),
            created_at: sale.created_at,
            updated_at: sale.updated_at,
        }
    }
}
