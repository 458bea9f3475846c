//! Persistence layer: the inventory store, the single source of truth.
//!
//! [`InventoryStore`] owns ticket types, reservations, sales, check-ins,
//! and unmatched webhooks. Two operations are the only real critical
//! sections of the pipeline and every implementation must make them
//! atomic:
//!
//! - [`InventoryStore::reserve`]: conditional decrement of `remaining`.
//! - [`InventoryStore::record_check_in`]: insert-if-absent of the check-in
//!   for a paid sale. This is the linearization point for admission.
//!
//! [`postgres::PostgresStore`] is the production implementation;
//! [`memory::InMemoryStore`] backs tests and local development.

pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    CheckIn, NewSale, PaymentStatus, RedemptionCode, Reservation, ReservationId, Sale,
    TicketType, TicketTypeId, UnmatchedWebhook,
};

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Store-level failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No ticket type with the given id.
    #[error("ticket type not found: {0}")]
    TicketTypeNotFound(TicketTypeId),

    /// Ticket type exists but is not on sale.
    #[error("ticket type {0} is not on sale")]
    TicketTypeInactive(TicketTypeId),

    /// Not enough inventory left.
    #[error("out of stock: requested {requested}, remaining {remaining}")]
    OutOfStock {
        /// Quantity asked for.
        requested: u32,
        /// Quantity left at the time of the attempt.
        remaining: u32,
    },

    /// Reservation was already consumed or released.
    #[error("reservation not found: {0}")]
    ReservationNotFound(ReservationId),

    /// Another sale already carries the candidate redemption code.
    #[error("redemption code already issued")]
    DuplicateRedemptionCode,

    /// The price computation overflowed.
    #[error("sale total overflows")]
    TotalOverflow,

    /// The backing store could not be reached or failed mid-operation.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be mapped back into a domain value.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        Self::Unavailable(e.to_string())
    }
}

/// Result of applying a payment status change to a sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The status changed from `from` to the sale's current status.
    Applied {
        /// Sale after the change.
        sale: Sale,
        /// Status before the change.
        from: PaymentStatus,
    },
    /// The sale was already in the target status.
    AlreadyApplied(Sale),
    /// The move is not part of the state machine; nothing changed.
    Illegal {
        /// Unchanged sale.
        sale: Sale,
        /// Status that was requested.
        requested: PaymentStatus,
    },
    /// No sale has this payment reference.
    NotFound,
}

/// Result of the atomic check-in attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckInOutcome {
    /// This call inserted the check-in.
    Admitted(CheckIn),
    /// A check-in already existed; it is returned as-is.
    AlreadyCheckedIn(CheckIn),
    /// The sale exists but is not `paid`.
    NotAdmissible(Sale),
    /// No sale carries this code.
    UnknownCode,
}

/// A webhook to be parked until its sale exists.
#[derive(Debug, Clone)]
pub struct NewUnmatchedWebhook {
    /// Gateway event name.
    pub event: String,
    /// Gateway payment id.
    pub payment_reference: String,
    /// Raw payload.
    pub payload: serde_json::Value,
}

/// Durable system of record for the pipeline.
#[async_trait]
pub trait InventoryStore: Send + Sync + std::fmt::Debug {
    /// Looks up a ticket type.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on backend failure.
    async fn ticket_type(&self, id: TicketTypeId) -> Result<Option<TicketType>, StoreError>;

    /// Atomically checks `remaining >= quantity`, decrements it, computes
    /// the total price, and records a reservation.
    ///
    /// # Errors
    ///
    /// [`StoreError::OutOfStock`], [`StoreError::TicketTypeNotFound`],
    /// [`StoreError::TicketTypeInactive`], [`StoreError::TotalOverflow`],
    /// or [`StoreError::Unavailable`].
    async fn reserve(&self, id: TicketTypeId, quantity: u32) -> Result<Reservation, StoreError>;

    /// Restores the reserved inventory and deletes the reservation.
    /// Returns `false` if it was already consumed or released.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on backend failure.
    async fn release_reservation(&self, id: ReservationId) -> Result<bool, StoreError>;

    /// Consumes the reservation and persists a `pending` sale in one atomic
    /// unit.
    ///
    /// # Errors
    ///
    /// [`StoreError::DuplicateRedemptionCode`] leaves the reservation in
    /// place so the caller can retry with a new code.
    /// [`StoreError::ReservationNotFound`] if the sweep released it first.
    async fn create_sale(
        &self,
        reservation: &Reservation,
        sale: NewSale,
    ) -> Result<Sale, StoreError>;

    /// Looks up a sale by redemption code.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on backend failure.
    async fn sale_by_code(&self, code: &RedemptionCode) -> Result<Option<Sale>, StoreError>;

    /// Applies a payment status change to the sale with this gateway
    /// reference. A `pending → cancelled` move also restores inventory.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on backend failure.
    async fn transition_payment(
        &self,
        payment_reference: &str,
        target: PaymentStatus,
    ) -> Result<TransitionOutcome, StoreError>;

    /// Inserts the check-in for the sale with this code if the sale is
    /// `paid` and no check-in exists yet. The status check and the insert
    /// are one atomic unit.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on backend failure. Callers must
    /// treat this as a refusal.
    async fn record_check_in(
        &self,
        code: &RedemptionCode,
        staff_id: &str,
    ) -> Result<CheckInOutcome, StoreError>;

    /// Parks a webhook whose payment reference matched no sale.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on backend failure.
    async fn record_unmatched_webhook(&self, event: NewUnmatchedWebhook) -> Result<(), StoreError>;

    /// Lists the open parked webhooks for a payment reference, oldest
    /// first. Listing does not resolve them.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on backend failure.
    async fn open_unmatched_webhooks(
        &self,
        payment_reference: &str,
    ) -> Result<Vec<UnmatchedWebhook>, StoreError>;

    /// Marks a parked webhook as resolved so it is no longer listed.
    /// Resolving an already-resolved id is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on backend failure.
    async fn resolve_unmatched_webhook(&self, id: i64) -> Result<(), StoreError>;

    /// Lists reservations created before `cutoff`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on backend failure.
    async fn stale_reservations(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, StoreError>;
}
