//! Database row models and their mapping into domain types.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::StoreError;
use crate::domain::{
    Buyer, CheckIn, Money, PaymentStatus, RedemptionCode, Reservation, Sale, TicketType,
    UnmatchedWebhook,
};

/// Column list shared by every query returning a full sale row.
pub const SALE_COLUMNS: &str = "id, ticket_type_id, event_id, buyer_name, buyer_email, \
     buyer_phone, buyer_document, quantity, total_price_cents, payment_status, \
     payment_reference, redemption_code, created_at, updated_at";

/// A row of the `ticket_types` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TicketTypeRow {
    /// Primary key.
    pub id: Uuid,
    /// Owning event.
    pub event_id: Uuid,
    /// Display name.
    pub name: String,
    /// Unit price in cents.
    pub unit_price_cents: i64,
    /// Quantity put on sale.
    pub total: i32,
    /// Quantity left.
    pub remaining: i32,
    /// On-sale flag.
    pub active: bool,
}

/// A row of the `reservations` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReservationRow {
    /// Primary key.
    pub id: Uuid,
    /// Ticket type the stock was taken from.
    pub ticket_type_id: Uuid,
    /// Event of the ticket type.
    pub event_id: Uuid,
    /// Reserved quantity.
    pub quantity: i32,
    /// Unit price in cents at reservation time.
    pub unit_price_cents: i64,
    /// Total in cents.
    pub total_cents: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A row of the `sales` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SaleRow {
    /// Primary key.
    pub id: Uuid,
    /// Purchased ticket type.
    pub ticket_type_id: Uuid,
    /// Event of the ticket type.
    pub event_id: Uuid,
    /// Buyer name.
    pub buyer_name: String,
    /// Buyer e-mail.
    pub buyer_email: String,
    /// Buyer phone.
    pub buyer_phone: Option<String>,
    /// Buyer tax document.
    pub buyer_document: Option<String>,
    /// Ticket count.
    pub quantity: i32,
    /// Total in cents.
    pub total_price_cents: i64,
    /// `pending | paid | refunded | cancelled`.
    pub payment_status: String,
    /// Gateway payment id.
    pub payment_reference: String,
    /// Ticket token.
    pub redemption_code: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last status change.
    pub updated_at: DateTime<Utc>,
}

/// A row of the `check_ins` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CheckInRow {
    /// Primary key.
    pub id: Uuid,
    /// Redeemed sale (unique).
    pub sale_id: Uuid,
    /// Event of the sale.
    pub event_id: Uuid,
    /// Scanning staff member or device.
    pub staff_id: String,
    /// People admitted.
    pub party_size: i32,
    /// Admission time.
    pub checked_in_at: DateTime<Utc>,
}

/// A row of the `unmatched_webhooks` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UnmatchedWebhookRow {
    /// Primary key.
    pub id: i64,
    /// Gateway event name.
    pub event: String,
    /// Gateway payment id.
    pub payment_reference: String,
    /// Raw payload.
    pub payload: serde_json::Value,
    /// Arrival time.
    pub received_at: DateTime<Utc>,
}

/// Converts a non-negative `INTEGER` column into `u32`.
pub(crate) fn to_u32(column: &str, value: i32) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{column} = {value}")))
}

/// Converts a quantity into an `INTEGER` bind value.
pub(crate) fn to_i32(value: u32) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::Corrupt(format!("quantity {value} too large")))
}

impl TryFrom<TicketTypeRow> for TicketType {
    type Error = StoreError;

    fn try_from(row: TicketTypeRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            event_id: row.event_id.into(),
            name: row.name,
            unit_price: Money::from_cents(row.unit_price_cents),
            total: to_u32("total", row.total)?,
            remaining: to_u32("remaining", row.remaining)?,
            active: row.active,
        })
    }
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = StoreError;

    fn try_from(row: ReservationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            ticket_type_id: row.ticket_type_id.into(),
            event_id: row.event_id.into(),
            quantity: to_u32("quantity", row.quantity)?,
            unit_price: Money::from_cents(row.unit_price_cents),
            total: Money::from_cents(row.total_cents),
            created_at: row.created_at,
        })
    }
}

impl TryFrom<SaleRow> for Sale {
    type Error = StoreError;

    fn try_from(row: SaleRow) -> Result<Self, Self::Error> {
        let payment_status: PaymentStatus = row
            .payment_status
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("{e}")))?;
        let redemption_code = RedemptionCode::parse(&row.redemption_code)
            .map_err(|e| StoreError::Corrupt(format!("sale {}: {e}", row.id)))?;
        Ok(Self {
            id: row.id.into(),
            ticket_type_id: row.ticket_type_id.into(),
            event_id: row.event_id.into(),
            buyer: Buyer {
                name: row.buyer_name,
                email: row.buyer_email,
                phone: row.buyer_phone,
                document: row.buyer_document,
            },
            quantity: to_u32("quantity", row.quantity)?,
            total_price: Money::from_cents(row.total_price_cents),
            payment_status,
            payment_reference: row.payment_reference,
            redemption_code,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<CheckInRow> for CheckIn {
    type Error = StoreError;

    fn try_from(row: CheckInRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            sale_id: row.sale_id.into(),
            event_id: row.event_id.into(),
            staff_id: row.staff_id,
            party_size: to_u32("party_size", row.party_size)?,
            checked_in_at: row.checked_in_at,
        })
    }
}

impl From<UnmatchedWebhookRow> for UnmatchedWebhook {
    fn from(row: UnmatchedWebhookRow) -> Self {
        Self {
            id: row.id,
            event: row.event,
            payment_reference: row.payment_reference,
            payload: row.payload,
            received_at: row.received_at,
        }
    }
}
