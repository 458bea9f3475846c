//! Ticket types and inventory reservations.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{EventId, Money, ReservationId, TicketTypeId};

/// A priced, stocked kind of ticket belonging to one event.
///
/// Invariant: `0 <= remaining <= total`. `remaining` only shrinks inside a
/// reservation and only grows when a reservation is released.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketType {
    /// Ticket type identifier.
    pub id: TicketTypeId,
    /// Owning event.
    pub event_id: EventId,
    /// Display name (e.g. `"General admission"`).
    pub name: String,
    /// Price of a single ticket.
    pub unit_price: Money,
    /// Quantity put on sale.
    pub total: u32,
    /// Quantity not yet reserved.
    pub remaining: u32,
    /// Whether the type can currently be sold.
    pub active: bool,
}

impl TicketType {
    /// Creates an active ticket type with full stock.
    #[must_use]
    pub fn new(event_id: EventId, name: impl Into<String>, unit_price: Money, total: u32) -> Self {
        Self {
            id: TicketTypeId::new(),
            event_id,
            name: name.into(),
            unit_price,
            total,
            remaining: total,
            active: true,
        }
    }
}

/// Inventory taken from a ticket type but not yet attached to a sale.
///
/// Created atomically with the decrement of `remaining`; the total price is
/// computed in the same unit. Consumed when the sale is persisted, or
/// released by compensation or by the orphan sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    /// Reservation identifier.
    pub id: ReservationId,
    /// Ticket type the inventory was taken from.
    pub ticket_type_id: TicketTypeId,
    /// Event of the ticket type.
    pub event_id: EventId,
    /// Number of tickets reserved.
    pub quantity: u32,
    /// Unit price at reservation time.
    pub unit_price: Money,
    /// `unit_price * quantity`.
    pub total: Money,
    /// When the inventory was taken.
    pub created_at: DateTime<Utc>,
}
