//! PostgreSQL implementation of the inventory store.
//!
//! Atomicity comes from the database, not from process-level locks:
//!
//! - reservations use a conditional `UPDATE ... WHERE remaining >= $n`,
//!   backed by a `CHECK (remaining BETWEEN 0 AND total)` constraint;
//! - check-ins lock the sale row and insert with
//!   `ON CONFLICT (sale_id) DO NOTHING`, backed by a unique constraint.
//!
//! The schema lives in `migrations/` and is applied by [`PostgresStore::connect`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use super::models::{
    CheckInRow, ReservationRow, SALE_COLUMNS, SaleRow, TicketTypeRow, UnmatchedWebhookRow, to_i32,
    to_u32,
};
use super::{CheckInOutcome, InventoryStore, NewUnmatchedWebhook, StoreError, TransitionOutcome};
use crate::domain::{
    CheckIn, CheckInId, Money, NewSale, PaymentStatus, RedemptionCode, Reservation,
    ReservationId, Sale, TicketType, TicketTypeId, Transition, UnmatchedWebhook,
};

const RESERVATION_COLUMNS: &str =
    "id, ticket_type_id, event_id, quantity, unit_price_cents, total_cents, created_at";

const CHECK_IN_COLUMNS: &str = "id, sale_id, event_id, staff_id, party_size, checked_in_at";

/// Name of the unique constraint on `sales.redemption_code`.
const REDEMPTION_CODE_CONSTRAINT: &str = "sales_redemption_code_key";

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool and applies pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the database cannot be reached
    /// or a migration fails.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        connect_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(connect_timeout)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("migration failed: {e}")))?;

        tracing::info!(max_connections, "connected to postgres");
        Ok(Self::new(pool))
    }
}

fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation() && db.constraint() == Some(constraint))
}

#[async_trait]
impl InventoryStore for PostgresStore {
    async fn ticket_type(&self, id: TicketTypeId) -> Result<Option<TicketType>, StoreError> {
        let row = sqlx::query_as::<_, TicketTypeRow>(
            "SELECT id, event_id, name, unit_price_cents, total, remaining, active \
             FROM ticket_types WHERE id = $1",
        )
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await?;

        row.map(TicketType::try_from).transpose()
    }

    async fn reserve(&self, id: TicketTypeId, quantity: u32) -> Result<Reservation, StoreError> {
        let requested = to_i32(quantity)?;
        let mut tx = self.pool.begin().await?;

        let decremented = sqlx::query_as::<_, (Uuid, i64)>(
            "UPDATE ticket_types SET remaining = remaining - $2 \
             WHERE id = $1 AND active AND remaining >= $2 \
             RETURNING event_id, unit_price_cents",
        )
        .bind(Uuid::from(id))
        .bind(requested)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((event_id, unit_price_cents)) = decremented else {
            let current = sqlx::query_as::<_, (bool, i32)>(
                "SELECT active, remaining FROM ticket_types WHERE id = $1",
            )
            .bind(Uuid::from(id))
            .fetch_optional(&mut *tx)
            .await?;
            return Err(match current {
                None => StoreError::TicketTypeNotFound(id),
                Some((false, _)) => StoreError::TicketTypeInactive(id),
                Some((true, remaining)) => StoreError::OutOfStock {
                    requested: quantity,
                    remaining: to_u32("remaining", remaining)?,
                },
            });
        };

        let unit_price = Money::from_cents(unit_price_cents);
        let total = unit_price
            .checked_mul(quantity)
            .ok_or(StoreError::TotalOverflow)?;

        let row = sqlx::query_as::<_, ReservationRow>(&format!(
            "INSERT INTO reservations \
             (id, ticket_type_id, event_id, quantity, unit_price_cents, total_cents) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {RESERVATION_COLUMNS}"
        ))
        .bind(Uuid::from(ReservationId::new()))
        .bind(Uuid::from(id))
        .bind(event_id)
        .bind(requested)
        .bind(unit_price.cents())
        .bind(total.cents())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Reservation::try_from(row)
    }

    async fn release_reservation(&self, id: ReservationId) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let released = sqlx::query_as::<_, (Uuid, i32)>(
            "DELETE FROM reservations WHERE id = $1 RETURNING ticket_type_id, quantity",
        )
        .bind(Uuid::from(id))
        .fetch_optional(&mut *tx)
        .await?;

        let Some((ticket_type_id, quantity)) = released else {
            return Ok(false);
        };

        sqlx::query(
            "UPDATE ticket_types SET remaining = LEAST(total, remaining + $2) WHERE id = $1",
        )
        .bind(ticket_type_id)
        .bind(quantity)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn create_sale(
        &self,
        reservation: &Reservation,
        sale: NewSale,
    ) -> Result<Sale, StoreError> {
        let mut tx = self.pool.begin().await?;

        let consumed = sqlx::query("DELETE FROM reservations WHERE id = $1")
            .bind(Uuid::from(reservation.id))
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if consumed == 0 {
            return Err(StoreError::ReservationNotFound(reservation.id));
        }

        let inserted = sqlx::query_as::<_, SaleRow>(&format!(
            "INSERT INTO sales \
             (id, ticket_type_id, event_id, buyer_name, buyer_email, buyer_phone, \
              buyer_document, quantity, total_price_cents, payment_status, \
              payment_reference, redemption_code) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'pending', $10, $11) \
             RETURNING {SALE_COLUMNS}"
        ))
        .bind(Uuid::from(sale.id))
        .bind(Uuid::from(reservation.ticket_type_id))
        .bind(Uuid::from(reservation.event_id))
        .bind(&sale.buyer.name)
        .bind(&sale.buyer.email)
        .bind(sale.buyer.phone.as_deref())
        .bind(sale.buyer.document.as_deref())
        .bind(to_i32(reservation.quantity)?)
        .bind(reservation.total.cents())
        .bind(&sale.payment_reference)
        .bind(sale.redemption_code.as_str())
        .fetch_one(&mut *tx)
        .await;

        let row = match inserted {
            Ok(row) => row,
            // Dropping `tx` rolls back, restoring the reservation row.
            Err(e) if is_unique_violation(&e, REDEMPTION_CODE_CONSTRAINT) => {
                return Err(StoreError::DuplicateRedemptionCode);
            }
            Err(e) => return Err(e.into()),
        };

        tx.commit().await?;
        Sale::try_from(row)
    }

    async fn sale_by_code(&self, code: &RedemptionCode) -> Result<Option<Sale>, StoreError> {
        let row = sqlx::query_as::<_, SaleRow>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE redemption_code = $1"
        ))
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Sale::try_from).transpose()
    }

    async fn transition_payment(
        &self,
        payment_reference: &str,
        target: PaymentStatus,
    ) -> Result<TransitionOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, SaleRow>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE payment_reference = $1 FOR UPDATE"
        ))
        .bind(payment_reference)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(TransitionOutcome::NotFound);
        };
        let sale = Sale::try_from(row)?;
        let from = sale.payment_status;

        match from.transition_to(target) {
            Transition::AlreadyApplied => Ok(TransitionOutcome::AlreadyApplied(sale)),
            Transition::Illegal => Ok(TransitionOutcome::Illegal {
                sale,
                requested: target,
            }),
            Transition::Apply => {
                let updated = sqlx::query_as::<_, SaleRow>(&format!(
                    "UPDATE sales SET payment_status = $2, updated_at = now() \
                     WHERE id = $1 RETURNING {SALE_COLUMNS}"
                ))
                .bind(Uuid::from(sale.id))
                .bind(target.as_str())
                .fetch_one(&mut *tx)
                .await?;

                if from == PaymentStatus::Pending && target == PaymentStatus::Cancelled {
                    sqlx::query(
                        "UPDATE ticket_types SET remaining = LEAST(total, remaining + $2) \
                         WHERE id = $1",
                    )
                    .bind(Uuid::from(sale.ticket_type_id))
                    .bind(to_i32(sale.quantity)?)
                    .execute(&mut *tx)
                    .await?;
                }

                tx.commit().await?;
                Ok(TransitionOutcome::Applied {
                    sale: Sale::try_from(updated)?,
                    from,
                })
            }
        }
    }

    async fn record_check_in(
        &self,
        code: &RedemptionCode,
        staff_id: &str,
    ) -> Result<CheckInOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes racing scanners and concurrent refunds.
        let row = sqlx::query_as::<_, SaleRow>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE redemption_code = $1 FOR UPDATE"
        ))
        .bind(code.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(CheckInOutcome::UnknownCode);
        };
        let sale = Sale::try_from(row)?;
        if sale.payment_status != PaymentStatus::Paid {
            return Ok(CheckInOutcome::NotAdmissible(sale));
        }

        let inserted = sqlx::query_as::<_, CheckInRow>(&format!(
            "INSERT INTO check_ins (id, sale_id, event_id, staff_id, party_size) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (sale_id) DO NOTHING RETURNING {CHECK_IN_COLUMNS}"
        ))
        .bind(Uuid::from(CheckInId::new()))
        .bind(Uuid::from(sale.id))
        .bind(Uuid::from(sale.event_id))
        .bind(staff_id)
        .bind(to_i32(sale.quantity)?)
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = match inserted {
            Some(row) => CheckInOutcome::Admitted(CheckIn::try_from(row)?),
            None => {
                let existing = sqlx::query_as::<_, CheckInRow>(&format!(
                    "SELECT {CHECK_IN_COLUMNS} FROM check_ins WHERE sale_id = $1"
                ))
                .bind(Uuid::from(sale.id))
                .fetch_one(&mut *tx)
                .await?;
                CheckInOutcome::AlreadyCheckedIn(CheckIn::try_from(existing)?)
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn record_unmatched_webhook(&self, event: NewUnmatchedWebhook) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO unmatched_webhooks (event, payment_reference, payload) \
             VALUES ($1, $2, $3)",
        )
        .bind(&event.event)
        .bind(&event.payment_reference)
        .bind(&event.payload)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn open_unmatched_webhooks(
        &self,
        payment_reference: &str,
    ) -> Result<Vec<UnmatchedWebhook>, StoreError> {
        let rows = sqlx::query_as::<_, UnmatchedWebhookRow>(
            "SELECT id, event, payment_reference, payload, received_at \
             FROM unmatched_webhooks \
             WHERE payment_reference = $1 AND resolved_at IS NULL \
             ORDER BY id ASC",
        )
        .bind(payment_reference)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(UnmatchedWebhook::from).collect())
    }

    async fn resolve_unmatched_webhook(&self, id: i64) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE unmatched_webhooks SET resolved_at = now() \
             WHERE id = $1 AND resolved_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn stale_reservations(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, StoreError> {
        let rows = sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations \
             WHERE created_at < $1 ORDER BY created_at ASC"
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Reservation::try_from).collect()
    }
}
