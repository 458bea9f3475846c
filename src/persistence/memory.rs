//! In-memory inventory store.
//!
//! All state sits behind a single [`tokio::sync::Mutex`], so every trait
//! method is one critical section and trivially atomic. Used by tests and by
//! `STORE_BACKEND=memory` for local development.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{CheckInOutcome, InventoryStore, NewUnmatchedWebhook, StoreError, TransitionOutcome};
use crate::domain::{
    CheckIn, CheckInId, NewSale, PaymentStatus, RedemptionCode, Reservation, ReservationId, Sale,
    SaleId, TicketType, TicketTypeId, Transition, UnmatchedWebhook,
};

#[derive(Debug, Default)]
struct Inner {
    ticket_types: HashMap<TicketTypeId, TicketType>,
    reservations: HashMap<ReservationId, Reservation>,
    sales: HashMap<SaleId, Sale>,
    sale_by_code: HashMap<RedemptionCode, SaleId>,
    sale_by_reference: HashMap<String, SaleId>,
    check_ins: HashMap<SaleId, CheckIn>,
    unmatched: Vec<UnmatchedWebhook>,
    next_unmatched_id: i64,
}

impl Inner {
    fn restock(&mut self, ticket_type_id: TicketTypeId, quantity: u32) {
        if let Some(tt) = self.ticket_types.get_mut(&ticket_type_id) {
            tt.remaining = tt.remaining.saturating_add(quantity).min(tt.total);
        }
    }
}

/// Mutex-guarded in-process store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a ticket type. Ticket type authoring is outside
    /// the pipeline, so this is not part of [`InventoryStore`].
    pub async fn add_ticket_type(&self, ticket_type: TicketType) {
        self.inner
            .lock()
            .await
            .ticket_types
            .insert(ticket_type.id, ticket_type);
    }

    /// Fault injection: while `false`, every operation fails with
    /// [`StoreError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Number of outstanding reservations.
    pub async fn reservation_count(&self) -> usize {
        self.inner.lock().await.reservations.len()
    }

    /// Number of persisted sales.
    pub async fn sale_count(&self) -> usize {
        self.inner.lock().await.sales.len()
    }

    /// Number of recorded check-ins.
    pub async fn check_in_count(&self) -> usize {
        self.inner.lock().await.check_ins.len()
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for InMemoryStore {
    async fn ticket_type(&self, id: TicketTypeId) -> Result<Option<TicketType>, StoreError> {
        self.ensure_available()?;
        Ok(self.inner.lock().await.ticket_types.get(&id).cloned())
    }

    async fn reserve(&self, id: TicketTypeId, quantity: u32) -> Result<Reservation, StoreError> {
        self.ensure_available()?;
        let mut inner = self.inner.lock().await;
        let tt = inner
            .ticket_types
            .get_mut(&id)
            .ok_or(StoreError::TicketTypeNotFound(id))?;
        if !tt.active {
            return Err(StoreError::TicketTypeInactive(id));
        }
        if tt.remaining < quantity {
            return Err(StoreError::OutOfStock {
                requested: quantity,
                remaining: tt.remaining,
            });
        }
        let total = tt
            .unit_price
            .checked_mul(quantity)
            .ok_or(StoreError::TotalOverflow)?;
        tt.remaining -= quantity;

        let reservation = Reservation {
            id: ReservationId::new(),
            ticket_type_id: id,
            event_id: tt.event_id,
            quantity,
            unit_price: tt.unit_price,
            total,
            created_at: Utc::now(),
        };
        inner
            .reservations
            .insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    async fn release_reservation(&self, id: ReservationId) -> Result<bool, StoreError> {
        self.ensure_available()?;
        let mut inner = self.inner.lock().await;
        let Some(reservation) = inner.reservations.remove(&id) else {
            return Ok(false);
        };
        inner.restock(reservation.ticket_type_id, reservation.quantity);
        Ok(true)
    }

    async fn create_sale(
        &self,
        reservation: &Reservation,
        sale: NewSale,
    ) -> Result<Sale, StoreError> {
        self.ensure_available()?;
        let mut inner = self.inner.lock().await;
        if !inner.reservations.contains_key(&reservation.id) {
            return Err(StoreError::ReservationNotFound(reservation.id));
        }
        if inner.sale_by_code.contains_key(&sale.redemption_code) {
            return Err(StoreError::DuplicateRedemptionCode);
        }
        inner.reservations.remove(&reservation.id);

        let now = Utc::now();
        let sale = Sale {
            id: sale.id,
            ticket_type_id: reservation.ticket_type_id,
            event_id: reservation.event_id,
            buyer: sale.buyer,
            quantity: reservation.quantity,
            total_price: reservation.total,
            payment_status: PaymentStatus::Pending,
            payment_reference: sale.payment_reference,
            redemption_code: sale.redemption_code,
            created_at: now,
            updated_at: now,
        };
        inner
            .sale_by_code
            .insert(sale.redemption_code.clone(), sale.id);
        inner
            .sale_by_reference
            .insert(sale.payment_reference.clone(), sale.id);
        inner.sales.insert(sale.id, sale.clone());
        Ok(sale)
    }

    async fn sale_by_code(&self, code: &RedemptionCode) -> Result<Option<Sale>, StoreError> {
        self.ensure_available()?;
        let inner = self.inner.lock().await;
        Ok(inner
            .sale_by_code
            .get(code)
            .and_then(|id| inner.sales.get(id))
            .cloned())
    }

    async fn transition_payment(
        &self,
        payment_reference: &str,
        target: PaymentStatus,
    ) -> Result<TransitionOutcome, StoreError> {
        self.ensure_available()?;
        let mut inner = self.inner.lock().await;
        let Some(sale_id) = inner.sale_by_reference.get(payment_reference).copied() else {
            return Ok(TransitionOutcome::NotFound);
        };
        let Some(sale) = inner.sales.get_mut(&sale_id) else {
            return Err(StoreError::Corrupt(format!(
                "reference index points at missing sale {sale_id}"
            )));
        };

        let from = sale.payment_status;
        match from.transition_to(target) {
            Transition::AlreadyApplied => Ok(TransitionOutcome::AlreadyApplied(sale.clone())),
            Transition::Illegal => Ok(TransitionOutcome::Illegal {
                sale: sale.clone(),
                requested: target,
            }),
            Transition::Apply => {
                sale.payment_status = target;
                sale.updated_at = Utc::now();
                let sale = sale.clone();
                if from == PaymentStatus::Pending && target == PaymentStatus::Cancelled {
                    inner.restock(sale.ticket_type_id, sale.quantity);
                }
                Ok(TransitionOutcome::Applied { sale, from })
            }
        }
    }

    async fn record_check_in(
        &self,
        code: &RedemptionCode,
        staff_id: &str,
    ) -> Result<CheckInOutcome, StoreError> {
        self.ensure_available()?;
        let mut inner = self.inner.lock().await;
        let Some(sale) = inner
            .sale_by_code
            .get(code)
            .and_then(|id| inner.sales.get(id))
            .cloned()
        else {
            return Ok(CheckInOutcome::UnknownCode);
        };
        if sale.payment_status != PaymentStatus::Paid {
            return Ok(CheckInOutcome::NotAdmissible(sale));
        }
        if let Some(existing) = inner.check_ins.get(&sale.id) {
            return Ok(CheckInOutcome::AlreadyCheckedIn(existing.clone()));
        }

        let check_in = CheckIn {
            id: CheckInId::new(),
            sale_id: sale.id,
            event_id: sale.event_id,
            staff_id: staff_id.to_string(),
            party_size: sale.quantity,
            checked_in_at: Utc::now(),
        };
        inner.check_ins.insert(sale.id, check_in.clone());
        Ok(CheckInOutcome::Admitted(check_in))
    }

    async fn record_unmatched_webhook(&self, event: NewUnmatchedWebhook) -> Result<(), StoreError> {
        self.ensure_available()?;
        let mut inner = self.inner.lock().await;
        inner.next_unmatched_id += 1;
        let id = inner.next_unmatched_id;
        inner.unmatched.push(UnmatchedWebhook {
            id,
            event: event.event,
            payment_reference: event.payment_reference,
            payload: event.payload,
            received_at: Utc::now(),
        });
        Ok(())
    }

    async fn open_unmatched_webhooks(
        &self,
        payment_reference: &str,
    ) -> Result<Vec<UnmatchedWebhook>, StoreError> {
        self.ensure_available()?;
        let inner = self.inner.lock().await;
        Ok(inner
            .unmatched
            .iter()
            .filter(|w| w.payment_reference == payment_reference)
            .cloned()
            .collect())
    }

    async fn resolve_unmatched_webhook(&self, id: i64) -> Result<(), StoreError> {
        self.ensure_available()?;
        self.inner.lock().await.unmatched.retain(|w| w.id != id);
        Ok(())
    }

    async fn stale_reservations(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, StoreError> {
        self.ensure_available()?;
        let inner = self.inner.lock().await;
        let mut stale: Vec<Reservation> = inner
            .reservations
            .values()
            .filter(|r| r.created_at < cutoff)
            .cloned()
            .collect();
        stale.sort_by_key(|r| r.created_at);
        Ok(stale)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::{Buyer, EventId, Money};

    async fn store_with_stock(total: u32) -> (InMemoryStore, TicketTypeId) {
        let store = InMemoryStore::new();
        let tt = TicketType::new(EventId::new(), "General", Money::from_cents(5_000), total);
        let id = tt.id;
        store.add_ticket_type(tt).await;
        (store, id)
    }

    fn new_sale(reference: &str) -> NewSale {
        NewSale {
            id: SaleId::new(),
            buyer: Buyer {
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                phone: None,
                document: None,
            },
            payment_reference: reference.to_string(),
            redemption_code: RedemptionCode::generate(),
        }
    }

    async fn remaining(store: &InMemoryStore, id: TicketTypeId) -> u32 {
        let Ok(Some(tt)) = store.ticket_type(id).await else {
            panic!("ticket type missing");
        };
        tt.remaining
    }

    #[tokio::test]
    async fn reserve_decrements_and_prices() {
        let (store, id) = store_with_stock(5).await;
        let Ok(reservation) = store.reserve(id, 2).await else {
            panic!("reserve failed");
        };
        assert_eq!(reservation.total, Money::from_cents(10_000));
        assert_eq!(remaining(&store, id).await, 3);
    }

    #[tokio::test]
    async fn reserve_beyond_stock_is_out_of_stock() {
        let (store, id) = store_with_stock(1).await;
        let result = store.reserve(id, 2).await;
        assert!(matches!(
            result,
            Err(StoreError::OutOfStock {
                requested: 2,
                remaining: 1
            })
        ));
        assert_eq!(remaining(&store, id).await, 1);
    }

    #[tokio::test]
    async fn inactive_types_cannot_be_reserved() {
        let store = InMemoryStore::new();
        let mut tt = TicketType::new(EventId::new(), "Closed", Money::from_cents(100), 10);
        tt.active = false;
        let id = tt.id;
        store.add_ticket_type(tt).await;
        assert!(matches!(
            store.reserve(id, 1).await,
            Err(StoreError::TicketTypeInactive(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reservations_never_oversell() {
        let (store, id) = store_with_stock(10).await;
        let store = Arc::new(store);
        let mut handles = Vec::new();
        for _ in 0..25 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move { store.reserve(id, 1).await }));
        }
        let mut ok = 0;
        let mut out_of_stock = 0;
        for handle in handles {
            match handle.await {
                Ok(Ok(_)) => ok += 1,
                Ok(Err(StoreError::OutOfStock { .. })) => out_of_stock += 1,
                other => panic!("unexpected result: {other:?}"),
            }
        }
        assert_eq!(ok, 10);
        assert_eq!(out_of_stock, 15);
        assert_eq!(remaining(&store, id).await, 0);
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let (store, id) = store_with_stock(3).await;
        let Ok(reservation) = store.reserve(id, 3).await else {
            panic!("reserve failed");
        };
        assert!(matches!(store.release_reservation(reservation.id).await, Ok(true)));
        assert!(matches!(store.release_reservation(reservation.id).await, Ok(false)));
        assert_eq!(remaining(&store, id).await, 3);
    }

    #[tokio::test]
    async fn duplicate_code_keeps_reservation() {
        let (store, id) = store_with_stock(5).await;
        let Ok(first) = store.reserve(id, 1).await else {
            panic!("reserve failed");
        };
        let Ok(second) = store.reserve(id, 1).await else {
            panic!("reserve failed");
        };
        let sale = new_sale("pay_1");
        let code = sale.redemption_code.clone();
        assert!(store.create_sale(&first, sale).await.is_ok());

        let mut clash = new_sale("pay_2");
        clash.redemption_code = code;
        assert!(matches!(
            store.create_sale(&second, clash).await,
            Err(StoreError::DuplicateRedemptionCode)
        ));
        assert_eq!(store.reservation_count().await, 1);
        assert!(store.create_sale(&second, new_sale("pay_2")).await.is_ok());
        assert_eq!(store.reservation_count().await, 0);
    }

    #[tokio::test]
    async fn pending_cancellation_restocks() {
        let (store, id) = store_with_stock(4).await;
        let Ok(reservation) = store.reserve(id, 4).await else {
            panic!("reserve failed");
        };
        let _ = store.create_sale(&reservation, new_sale("pay_9")).await;
        assert_eq!(remaining(&store, id).await, 0);

        let outcome = store
            .transition_payment("pay_9", PaymentStatus::Cancelled)
            .await;
        assert!(matches!(outcome, Ok(TransitionOutcome::Applied { .. })));
        assert_eq!(remaining(&store, id).await, 4);
    }

    #[tokio::test]
    async fn check_in_requires_paid_and_is_unique() {
        let (store, id) = store_with_stock(2).await;
        let Ok(reservation) = store.reserve(id, 2).await else {
            panic!("reserve failed");
        };
        let Ok(sale) = store.create_sale(&reservation, new_sale("pay_3")).await else {
            panic!("create_sale failed");
        };
        let code = sale.redemption_code.clone();

        assert!(matches!(
            store.record_check_in(&code, "gate-1").await,
            Ok(CheckInOutcome::NotAdmissible(_))
        ));

        let _ = store.transition_payment("pay_3", PaymentStatus::Paid).await;
        let Ok(CheckInOutcome::Admitted(first)) = store.record_check_in(&code, "gate-1").await
        else {
            panic!("expected admission");
        };
        assert_eq!(first.party_size, 2);

        let Ok(CheckInOutcome::AlreadyCheckedIn(existing)) =
            store.record_check_in(&code, "gate-2").await
        else {
            panic!("expected conflict");
        };
        assert_eq!(existing, first);
        assert_eq!(store.check_in_count().await, 1);
    }

    #[tokio::test]
    async fn unmatched_webhooks_stay_open_until_resolved() {
        let store = InMemoryStore::new();
        for reference in ["pay_a", "pay_b", "pay_a"] {
            let _ = store
                .record_unmatched_webhook(NewUnmatchedWebhook {
                    event: "PAYMENT_CONFIRMED".to_string(),
                    payment_reference: reference.to_string(),
                    payload: serde_json::json!({}),
                })
                .await;
        }
        let Ok(open) = store.open_unmatched_webhooks("pay_a").await else {
            panic!("list failed");
        };
        assert_eq!(open.len(), 2);
        assert!(open.windows(2).all(|w| matches!(w, [a, b] if a.id < b.id)));

        let Ok(again) = store.open_unmatched_webhooks("pay_a").await else {
            panic!("list failed");
        };
        assert_eq!(again.len(), 2);

        for webhook in &open {
            let _ = store.resolve_unmatched_webhook(webhook.id).await;
        }
        let Ok(after) = store.open_unmatched_webhooks("pay_a").await else {
            panic!("list failed");
        };
        assert!(after.is_empty());
        let Ok(other) = store.open_unmatched_webhooks("pay_b").await else {
            panic!("list failed");
        };
        assert_eq!(other.len(), 1);
    }

    #[tokio::test]
    async fn offline_store_fails_every_call() {
        let (store, id) = store_with_stock(1).await;
        store.set_available(false);
        assert!(matches!(
            store.reserve(id, 1).await,
            Err(StoreError::Unavailable(_))
        ));
        store.set_available(true);
        assert!(store.reserve(id, 1).await.is_ok());
    }
}
