//! Webhook reconciler: turns gateway callbacks into payment transitions.
//!
//! Delivery is at-least-once and unordered, so every event is applied as an
//! idempotent transition keyed by payment reference. Events for payments we
//! have not persisted yet are parked and replayed once the sale exists.

use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;

use crate::cache::{CacheState, ValidationCache};
use crate::domain::{PaymentEvent, PaymentStatus, Sale};
use crate::error::PipelineError;
use crate::gateway::WebhookPayload;
use crate::persistence::{InventoryStore, NewUnmatchedWebhook, TransitionOutcome};

/// What a webhook did. Every variant is acknowledged with 200.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// The sale moved to a new status.
    Applied,
    /// The sale already had the target status.
    Duplicate,
    /// The move is not allowed from the sale's current status.
    Illegal,
    /// No sale matches yet; the event was parked.
    Unmatched,
    /// A refund or chargeback for a sale that is still pending. It was
    /// parked and is applied as soon as the confirmation lands.
    Deferred,
    /// The event does not affect payment state.
    Ignored,
}

impl ReconcileOutcome {
    /// Whether the event has to wait in the unmatched queue.
    const fn must_wait(self) -> bool {
        matches!(self, Self::Unmatched | Self::Deferred)
    }
}

/// Applies gateway events to sales and publishes the result to the cache.
#[derive(Debug, Clone)]
pub struct WebhookReconciler {
    store: Arc<dyn InventoryStore>,
    cache: Arc<dyn ValidationCache>,
}

impl WebhookReconciler {
    /// Creates a new reconciler.
    #[must_use]
    pub fn new(store: Arc<dyn InventoryStore>, cache: Arc<dyn ValidationCache>) -> Self {
        Self { store, cache }
    }

    /// Processes one webhook. `raw` is the original body, kept if the event
    /// has to be parked.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::StoreUnavailable`] when the store fails; the
    /// handler answers 5xx so the gateway redelivers.
    pub async fn reconcile(
        &self,
        payload: &WebhookPayload,
        raw: serde_json::Value,
    ) -> Result<ReconcileOutcome, PipelineError> {
        let event = PaymentEvent::from_name(&payload.event);
        let reference = payload.payment.id.as_str();
        let Some(target) = event.target_status() else {
            tracing::debug!(event = event.name(), payment_reference = reference, "webhook ignored");
            return Ok(ReconcileOutcome::Ignored);
        };

        let outcome = self.apply(&event, reference, target).await?;
        if outcome.must_wait() {
            self.store
                .record_unmatched_webhook(NewUnmatchedWebhook {
                    event: event.name().to_string(),
                    payment_reference: reference.to_string(),
                    payload: raw,
                })
                .await?;
            if outcome == ReconcileOutcome::Unmatched {
                tracing::warn!(
                    alert = true,
                    event = event.name(),
                    payment_reference = reference,
                    "webhook matched no sale; parked for replay"
                );
            } else {
                tracing::info!(
                    event = event.name(),
                    payment_reference = reference,
                    "refund arrived before confirmation; parked until the sale is paid"
                );
            }

            // The sale may have moved between the lookup and the park.
            if self.replay_unmatched(reference).await? > 0 {
                return Ok(ReconcileOutcome::Applied);
            }
            return Ok(outcome);
        }

        if outcome == ReconcileOutcome::Applied && target == PaymentStatus::Paid {
            self.replay_unmatched(reference).await?;
        }
        Ok(outcome)
    }

    /// Replays parked events for a payment reference, oldest first, until
    /// a pass changes nothing. Events that still cannot apply stay open;
    /// the rest are resolved. Returns how many changed a sale.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::StoreUnavailable`] when the store fails.
    pub async fn replay_unmatched(&self, payment_reference: &str) -> Result<usize, PipelineError> {
        let mut applied = 0;
        // Each productive pass moves the sale forward in the state machine,
        // so this ends after a few passes.
        loop {
            let progressed = self.replay_pass(payment_reference).await?;
            if progressed == 0 {
                break;
            }
            applied += progressed;
        }
        if applied > 0 {
            tracing::info!(payment_reference, applied, "replayed parked webhooks");
        }
        Ok(applied)
    }

    async fn replay_pass(&self, payment_reference: &str) -> Result<usize, PipelineError> {
        let parked = self.store.open_unmatched_webhooks(payment_reference).await?;
        let mut applied = 0;
        for webhook in parked {
            let event = PaymentEvent::from_name(&webhook.event);
            let outcome = match event.target_status() {
                Some(target) => self.apply(&event, payment_reference, target).await?,
                None => ReconcileOutcome::Ignored,
            };
            if outcome.must_wait() {
                continue;
            }
            if outcome == ReconcileOutcome::Applied {
                applied += 1;
            }
            self.store.resolve_unmatched_webhook(webhook.id).await?;
        }
        Ok(applied)
    }

    /// Runs the transition against the sale with this reference.
    async fn apply(
        &self,
        event: &PaymentEvent,
        reference: &str,
        target: PaymentStatus,
    ) -> Result<ReconcileOutcome, PipelineError> {
        let outcome = match self.store.transition_payment(reference, target).await? {
            TransitionOutcome::NotFound => ReconcileOutcome::Unmatched,
            TransitionOutcome::AlreadyApplied(sale) => {
                tracing::debug!(sale_id = %sale.id, event = event.name(), "duplicate webhook");
                ReconcileOutcome::Duplicate
            }
            TransitionOutcome::Illegal { sale, requested }
                if sale.payment_status == PaymentStatus::Pending
                    && requested == PaymentStatus::Refunded =>
            {
                tracing::debug!(
                    sale_id = %sale.id,
                    event = event.name(),
                    "refund ahead of confirmation"
                );
                ReconcileOutcome::Deferred
            }
            TransitionOutcome::Illegal { sale, requested } => {
                tracing::warn!(
                    alert = true,
                    sale_id = %sale.id,
                    current = %sale.payment_status,
                    %requested,
                    event = event.name(),
                    "illegal payment transition ignored"
                );
                ReconcileOutcome::Illegal
            }
            TransitionOutcome::Applied { sale, from } => {
                tracing::info!(
                    sale_id = %sale.id,
                    %from,
                    to = %sale.payment_status,
                    event = event.name(),
                    "payment status updated"
                );
                self.publish(&sale).await;
                ReconcileOutcome::Applied
            }
        };
        Ok(outcome)
    }

    /// Best-effort cache update after a transition. The store is already
    /// correct; a failure here only costs latency at the gate.
    async fn publish(&self, sale: &Sale) {
        let code = &sale.redemption_code;
        let result = if sale.payment_status == PaymentStatus::Paid {
            self.cache.set(code, CacheState::Paid).await
        } else {
            self.cache.invalidate(code).await
        };
        if let Err(e) = result {
            tracing::error!(
                alert = true,
                sale_id = %sale.id,
                status = %sale.payment_status,
                error = %e,
                "failed to publish payment state to validation cache"
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::domain::{Buyer, EventId, Money, NewSale, RedemptionCode, SaleId, TicketType};
    use crate::gateway::WebhookPayment;
    use crate::persistence::InMemoryStore;
    use std::time::Duration;

    struct Fixture {
        store: Arc<InMemoryStore>,
        cache: Arc<InMemoryCache>,
        reconciler: WebhookReconciler,
        ticket_type: crate::domain::TicketTypeId,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let tt = TicketType::new(EventId::new(), "General", Money::from_cents(2_500), 5);
        let ticket_type = tt.id;
        store.add_ticket_type(tt).await;
        let cache = Arc::new(InMemoryCache::new(Duration::from_secs(60), 1_000));
        let reconciler = WebhookReconciler::new(
            Arc::<InMemoryStore>::clone(&store),
            Arc::<InMemoryCache>::clone(&cache),
        );
        Fixture {
            store,
            cache,
            reconciler,
            ticket_type,
        }
    }

    async fn pending_sale(f: &Fixture, reference: &str) -> RedemptionCode {
        let Ok(reservation) = f.store.reserve(f.ticket_type, 1).await else {
            panic!("reserve failed");
        };
        let code = RedemptionCode::generate();
        let new_sale = NewSale {
            id: SaleId::new(),
            buyer: Buyer {
                name: "Grace".to_string(),
                email: "grace@example.com".to_string(),
                phone: None,
                document: None,
            },
            payment_reference: reference.to_string(),
            redemption_code: code.clone(),
        };
        let Ok(_) = f.store.create_sale(&reservation, new_sale).await else {
            panic!("create_sale failed");
        };
        code
    }

    fn webhook(event: &str, reference: &str) -> WebhookPayload {
        WebhookPayload {
            event: event.to_string(),
            payment: WebhookPayment {
                id: reference.to_string(),
            },
        }
    }

    async fn status_of(f: &Fixture, code: &RedemptionCode) -> PaymentStatus {
        let Ok(Some(sale)) = f.store.sale_by_code(code).await else {
            panic!("sale missing");
        };
        sale.payment_status
    }

    #[tokio::test]
    async fn confirmation_marks_paid_and_publishes() {
        let f = fixture().await;
        let code = pending_sale(&f, "pay_1").await;
        let outcome = f
            .reconciler
            .reconcile(&webhook("PAYMENT_CONFIRMED", "pay_1"), serde_json::Value::Null)
            .await;
        assert!(matches!(outcome, Ok(ReconcileOutcome::Applied)));
        assert_eq!(status_of(&f, &code).await, PaymentStatus::Paid);
        assert!(matches!(f.cache.get(&code).await, Ok(CacheState::Paid)));
    }

    #[tokio::test]
    async fn duplicate_confirmation_is_absorbed() {
        let f = fixture().await;
        let code = pending_sale(&f, "pay_1").await;
        let payload = webhook("PAYMENT_RECEIVED", "pay_1");
        let _ = f.reconciler.reconcile(&payload, serde_json::Value::Null).await;
        let second = f.reconciler.reconcile(&payload, serde_json::Value::Null).await;
        assert!(matches!(second, Ok(ReconcileOutcome::Duplicate)));
        assert_eq!(status_of(&f, &code).await, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn confirmation_after_refund_is_illegal_and_ignored() {
        let f = fixture().await;
        let code = pending_sale(&f, "pay_1").await;
        let _ = f
            .reconciler
            .reconcile(&webhook("PAYMENT_CONFIRMED", "pay_1"), serde_json::Value::Null)
            .await;
        let refund = f
            .reconciler
            .reconcile(&webhook("PAYMENT_REFUNDED", "pay_1"), serde_json::Value::Null)
            .await;
        assert!(matches!(refund, Ok(ReconcileOutcome::Applied)));
        assert!(matches!(f.cache.get(&code).await, Ok(CacheState::Unknown)));

        let late = f
            .reconciler
            .reconcile(&webhook("PAYMENT_CONFIRMED", "pay_1"), serde_json::Value::Null)
            .await;
        assert!(matches!(late, Ok(ReconcileOutcome::Illegal)));
        assert_eq!(status_of(&f, &code).await, PaymentStatus::Refunded);
        assert!(matches!(f.cache.get(&code).await, Ok(CacheState::Unknown)));
    }

    #[tokio::test]
    async fn unknown_reference_is_parked_then_replayed() {
        let f = fixture().await;
        let raw = serde_json::json!({"event": "PAYMENT_CONFIRMED", "payment": {"id": "pay_early"}});
        let outcome = f
            .reconciler
            .reconcile(&webhook("PAYMENT_CONFIRMED", "pay_early"), raw)
            .await;
        assert!(matches!(outcome, Ok(ReconcileOutcome::Unmatched)));

        let code = pending_sale(&f, "pay_early").await;
        let Ok(replayed) = f.reconciler.replay_unmatched("pay_early").await else {
            panic!("replay failed");
        };
        assert_eq!(replayed, 1);
        assert_eq!(status_of(&f, &code).await, PaymentStatus::Paid);

        let Ok(again) = f.reconciler.replay_unmatched("pay_early").await else {
            panic!("replay failed");
        };
        assert_eq!(again, 0);
    }

    #[tokio::test]
    async fn refund_before_confirmation_ends_refunded() {
        let f = fixture().await;
        let code = pending_sale(&f, "pay_1").await;
        let refund = f
            .reconciler
            .reconcile(&webhook("PAYMENT_REFUNDED", "pay_1"), serde_json::Value::Null)
            .await;
        assert!(matches!(refund, Ok(ReconcileOutcome::Deferred)));
        assert_eq!(status_of(&f, &code).await, PaymentStatus::Pending);

        let confirm = f
            .reconciler
            .reconcile(&webhook("PAYMENT_CONFIRMED", "pay_1"), serde_json::Value::Null)
            .await;
        assert!(matches!(confirm, Ok(ReconcileOutcome::Applied)));
        assert_eq!(status_of(&f, &code).await, PaymentStatus::Refunded);
        assert!(matches!(f.cache.get(&code).await, Ok(CacheState::Unknown)));

        let Ok(open) = f.store.open_unmatched_webhooks("pay_1").await else {
            panic!("list failed");
        };
        assert!(open.is_empty());
    }

    #[tokio::test]
    async fn chargeback_before_confirmation_ends_refunded() {
        let f = fixture().await;
        let code = pending_sale(&f, "pay_1").await;
        let _ = f
            .reconciler
            .reconcile(
                &webhook("PAYMENT_CHARGEBACK_REQUESTED", "pay_1"),
                serde_json::Value::Null,
            )
            .await;
        let _ = f
            .reconciler
            .reconcile(&webhook("PAYMENT_RECEIVED", "pay_1"), serde_json::Value::Null)
            .await;
        assert_eq!(status_of(&f, &code).await, PaymentStatus::Refunded);
    }

    #[tokio::test]
    async fn parked_refund_and_confirmation_replay_to_refunded() {
        let f = fixture().await;
        for event in ["PAYMENT_REFUNDED", "PAYMENT_CONFIRMED"] {
            let outcome = f
                .reconciler
                .reconcile(&webhook(event, "pay_early"), serde_json::Value::Null)
                .await;
            assert!(matches!(outcome, Ok(ReconcileOutcome::Unmatched)));
        }

        let code = pending_sale(&f, "pay_early").await;
        let Ok(replayed) = f.reconciler.replay_unmatched("pay_early").await else {
            panic!("replay failed");
        };
        assert_eq!(replayed, 2);
        assert_eq!(status_of(&f, &code).await, PaymentStatus::Refunded);
    }

    #[tokio::test]
    async fn replay_without_sale_keeps_one_open_row() {
        let f = fixture().await;
        let _ = f
            .reconciler
            .reconcile(&webhook("PAYMENT_CONFIRMED", "pay_ghost"), serde_json::Value::Null)
            .await;
        for _ in 0..3 {
            let Ok(replayed) = f.reconciler.replay_unmatched("pay_ghost").await else {
                panic!("replay failed");
            };
            assert_eq!(replayed, 0);
        }
        let Ok(open) = f.store.open_unmatched_webhooks("pay_ghost").await else {
            panic!("list failed");
        };
        assert_eq!(open.len(), 1);
    }

    #[tokio::test]
    async fn informational_events_are_ignored() {
        let f = fixture().await;
        let outcome = f
            .reconciler
            .reconcile(&webhook("PAYMENT_CREATED", "pay_x"), serde_json::Value::Null)
            .await;
        assert!(matches!(outcome, Ok(ReconcileOutcome::Ignored)));
    }

    #[tokio::test]
    async fn cache_outage_keeps_sale_paid() {
        let f = fixture().await;
        let code = pending_sale(&f, "pay_1").await;
        f.cache.set_available(false);
        let outcome = f
            .reconciler
            .reconcile(&webhook("PAYMENT_CONFIRMED", "pay_1"), serde_json::Value::Null)
            .await;
        assert!(matches!(outcome, Ok(ReconcileOutcome::Applied)));
        assert_eq!(status_of(&f, &code).await, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn store_outage_is_an_error() {
        let f = fixture().await;
        f.store.set_available(false);
        let outcome = f
            .reconciler
            .reconcile(&webhook("PAYMENT_CONFIRMED", "pay_1"), serde_json::Value::Null)
            .await;
        assert!(matches!(outcome, Err(PipelineError::StoreUnavailable(_))));
    }
}
