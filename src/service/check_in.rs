//! Gate-facing validation: ADMIT or REJECT a redemption code.
//!
//! The cache answers `USED` without touching the store. Every other path
//! ends at [`InventoryStore::record_check_in`], the single atomic insert
//! that decides admission, so a stale or missing cache entry can only
//! cost latency, never a second entry.

use std::sync::Arc;

use crate::cache::{CacheState, ValidationCache};
use crate::domain::{GateDecision, PaymentStatus, RedemptionCode, RejectReason};
use crate::error::PipelineError;
use crate::persistence::{CheckInOutcome, InventoryStore};

/// Longest staff/device identifier accepted.
const MAX_STAFF_ID_LEN: usize = 128;

/// Validates codes presented at the gate.
#[derive(Debug, Clone)]
pub struct CheckInValidator {
    store: Arc<dyn InventoryStore>,
    cache: Arc<dyn ValidationCache>,
}

impl CheckInValidator {
    /// Creates a new validator.
    #[must_use]
    pub fn new(store: Arc<dyn InventoryStore>, cache: Arc<dyn ValidationCache>) -> Self {
        Self { store, cache }
    }

    /// Decides whether the holder of `raw_code` may enter.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::InvalidRequest`] for an empty or oversized staff id.
    /// - [`PipelineError::StoreUnavailable`] when the store cannot be reached.
    ///   Nothing is admitted in that case.
    pub async fn validate(
        &self,
        raw_code: &str,
        staff_id: &str,
    ) -> Result<GateDecision, PipelineError> {
        let staff_id = staff_id.trim();
        if staff_id.is_empty() || staff_id.len() > MAX_STAFF_ID_LEN {
            return Err(PipelineError::InvalidRequest(format!(
                "staff_id must be 1 to {MAX_STAFF_ID_LEN} characters"
            )));
        }
        let Ok(code) = RedemptionCode::parse(raw_code) else {
            tracing::info!(staff_id, "malformed redemption code rejected");
            return Ok(GateDecision::Reject(RejectReason::UnknownCode));
        };

        match self.cache.get(&code).await {
            Ok(CacheState::Used) => {
                tracing::info!(%code, staff_id, "rejected from cache: already used");
                return Ok(GateDecision::Reject(RejectReason::AlreadyUsed));
            }
            Ok(CacheState::Paid) => return self.admit(&code, staff_id).await,
            Ok(CacheState::Pending | CacheState::Unknown) => {}
            Err(e) => {
                tracing::warn!(%code, error = %e, "validation cache unavailable; using store");
            }
        }

        let sale = self
            .store
            .sale_by_code(&code)
            .await
            .map_err(|e| fail_closed(&code, e))?;
        let Some(sale) = sale else {
            tracing::info!(%code, staff_id, "unknown redemption code");
            return Ok(GateDecision::Reject(RejectReason::UnknownCode));
        };
        match sale.payment_status {
            PaymentStatus::Paid => self.admit(&code, staff_id).await,
            PaymentStatus::Pending => {
                self.remember(&code, CacheState::Pending).await;
                Ok(reject(&code, staff_id, RejectReason::NotPaid))
            }
            PaymentStatus::Refunded => Ok(reject(&code, staff_id, RejectReason::Refunded)),
            PaymentStatus::Cancelled => Ok(reject(&code, staff_id, RejectReason::Cancelled)),
        }
    }

    /// Runs the atomic insert and maps its outcome.
    async fn admit(
        &self,
        code: &RedemptionCode,
        staff_id: &str,
    ) -> Result<GateDecision, PipelineError> {
        let outcome = self
            .store
            .record_check_in(code, staff_id)
            .await
            .map_err(|e| fail_closed(code, e))?;
        match outcome {
            CheckInOutcome::Admitted(check_in) => {
                self.remember(code, CacheState::Used).await;
                tracing::info!(
                    %code,
                    sale_id = %check_in.sale_id,
                    party_size = check_in.party_size,
                    staff_id,
                    "admitted"
                );
                Ok(GateDecision::Admit(check_in))
            }
            CheckInOutcome::AlreadyCheckedIn(existing) => {
                self.remember(code, CacheState::Used).await;
                tracing::info!(
                    %code,
                    sale_id = %existing.sale_id,
                    first_scan_at = %existing.checked_in_at,
                    first_staff_id = %existing.staff_id,
                    staff_id,
                    "rejected: already used"
                );
                Ok(GateDecision::Reject(RejectReason::AlreadyUsed))
            }
            CheckInOutcome::NotAdmissible(sale) => {
                let reason = match sale.payment_status {
                    PaymentStatus::Refunded => RejectReason::Refunded,
                    PaymentStatus::Cancelled => RejectReason::Cancelled,
                    PaymentStatus::Pending | PaymentStatus::Paid => RejectReason::NotPaid,
                };
                if sale.payment_status.is_terminal() {
                    if let Err(e) = self.cache.invalidate(code).await {
                        tracing::warn!(%code, error = %e, "stale cache entry not invalidated");
                    }
                }
                Ok(reject(code, staff_id, reason))
            }
            CheckInOutcome::UnknownCode => {
                Ok(reject(code, staff_id, RejectReason::UnknownCode))
            }
        }
    }

    async fn remember(&self, code: &RedemptionCode, state: CacheState) {
        if let Err(e) = self.cache.set(code, state).await {
            tracing::warn!(%code, %state, error = %e, "validation cache write failed");
        }
    }
}

fn reject(code: &RedemptionCode, staff_id: &str, reason: RejectReason) -> GateDecision {
    tracing::info!(%code, staff_id, ?reason, "rejected");
    GateDecision::Reject(reason)
}

fn fail_closed(code: &RedemptionCode, err: crate::persistence::StoreError) -> PipelineError {
    tracing::error!(%code, error = %err, "store unavailable during validation; refusing entry");
    PipelineError::from(err)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::cache::InMemoryCache;
    use crate::domain::{Buyer, EventId, Money, NewSale, SaleId, TicketType};
    use crate::persistence::{InMemoryStore, TransitionOutcome};

    struct Fixture {
        store: Arc<InMemoryStore>,
        cache: Arc<InMemoryCache>,
        validator: CheckInValidator,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(InMemoryCache::new(Duration::from_secs(60), 1_000));
        let validator = CheckInValidator::new(
            Arc::<InMemoryStore>::clone(&store),
            Arc::<InMemoryCache>::clone(&cache),
        );
        Fixture {
            store,
            cache,
            validator,
        }
    }

    /// Creates a sale of `quantity` and moves it to `status`.
    async fn sale(f: &Fixture, quantity: u32, status: PaymentStatus) -> RedemptionCode {
        let tt = TicketType::new(EventId::new(), "General", Money::from_cents(1_000), 10);
        let tt_id = tt.id;
        f.store.add_ticket_type(tt).await;
        let Ok(reservation) = f.store.reserve(tt_id, quantity).await else {
            panic!("reserve failed");
        };
        let code = RedemptionCode::generate();
        let reference = format!("pay_{}", SaleId::new());
        let new_sale = NewSale {
            id: SaleId::new(),
            buyer: Buyer {
                name: "Ken".to_string(),
                email: "ken@example.com".to_string(),
                phone: None,
                document: None,
            },
            payment_reference: reference.clone(),
            redemption_code: code.clone(),
        };
        let Ok(_) = f.store.create_sale(&reservation, new_sale).await else {
            panic!("create_sale failed");
        };
        let path: &[PaymentStatus] = match status {
            PaymentStatus::Pending => &[],
            PaymentStatus::Paid => &[PaymentStatus::Paid],
            PaymentStatus::Refunded => &[PaymentStatus::Paid, PaymentStatus::Refunded],
            PaymentStatus::Cancelled => &[PaymentStatus::Cancelled],
        };
        for step in path {
            let Ok(TransitionOutcome::Applied { .. }) =
                f.store.transition_payment(&reference, *step).await
            else {
                panic!("transition to {step} failed");
            };
        }
        code
    }

    #[tokio::test]
    async fn paid_code_is_admitted_once() {
        let f = fixture();
        let code = sale(&f, 2, PaymentStatus::Paid).await;
        let Ok(GateDecision::Admit(check_in)) = f.validator.validate(code.as_str(), "gate-1").await
        else {
            panic!("expected admit");
        };
        assert_eq!(check_in.party_size, 2);
        assert!(matches!(f.cache.get(&code).await, Ok(CacheState::Used)));

        let second = f.validator.validate(code.as_str(), "gate-2").await;
        assert!(matches!(
            second,
            Ok(GateDecision::Reject(RejectReason::AlreadyUsed))
        ));
    }

    #[tokio::test]
    async fn rescan_with_cleared_cache_is_still_rejected() {
        let f = fixture();
        let code = sale(&f, 1, PaymentStatus::Paid).await;
        let _ = f.validator.validate(code.as_str(), "gate-1").await;
        f.cache.clear().await;
        let second = f.validator.validate(code.as_str(), "gate-1").await;
        assert!(matches!(
            second,
            Ok(GateDecision::Reject(RejectReason::AlreadyUsed))
        ));
        assert_eq!(f.store.check_in_count().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_scans_admit_exactly_once() {
        let f = fixture();
        let code = sale(&f, 1, PaymentStatus::Paid).await;
        let validator = Arc::new(f.validator.clone());
        let mut handles = Vec::new();
        for gate in 0..32 {
            let validator = Arc::clone(&validator);
            let raw = code.as_str().to_string();
            handles.push(tokio::spawn(async move {
                validator.validate(&raw, &format!("gate-{gate}")).await
            }));
        }
        let mut admits = 0;
        let mut already_used = 0;
        for handle in handles {
            match handle.await {
                Ok(Ok(GateDecision::Admit(_))) => admits += 1,
                Ok(Ok(GateDecision::Reject(RejectReason::AlreadyUsed))) => already_used += 1,
                other => panic!("unexpected result: {other:?}"),
            }
        }
        assert_eq!(admits, 1);
        assert_eq!(already_used, 31);
        assert_eq!(f.store.check_in_count().await, 1);
    }

    #[tokio::test]
    async fn non_paid_states_are_rejected_with_reason() {
        let f = fixture();
        let pending = sale(&f, 1, PaymentStatus::Pending).await;
        let refunded = sale(&f, 1, PaymentStatus::Refunded).await;
        let cancelled = sale(&f, 1, PaymentStatus::Cancelled).await;

        let cases = [
            (pending.as_str().to_string(), RejectReason::NotPaid),
            (refunded.as_str().to_string(), RejectReason::Refunded),
            (cancelled.as_str().to_string(), RejectReason::Cancelled),
            ("NOSUCHCODE123".to_string(), RejectReason::UnknownCode),
            ("??".to_string(), RejectReason::UnknownCode),
        ];
        for (raw, expected) in cases {
            let Ok(decision) = f.validator.validate(&raw, "gate-1").await else {
                panic!("validation errored for {raw}");
            };
            assert_eq!(decision.reason(), Some(expected), "code {raw}");
        }
        assert_eq!(f.store.check_in_count().await, 0);
    }

    #[tokio::test]
    async fn stale_paid_cache_cannot_admit_refunded_sale() {
        let f = fixture();
        let code = sale(&f, 1, PaymentStatus::Refunded).await;
        let _ = f.cache.set(&code, CacheState::Paid).await;
        let decision = f.validator.validate(code.as_str(), "gate-1").await;
        assert!(matches!(
            decision,
            Ok(GateDecision::Reject(RejectReason::Refunded))
        ));
        assert!(matches!(f.cache.get(&code).await, Ok(CacheState::Unknown)));
    }

    #[tokio::test]
    async fn cache_outage_falls_back_to_store() {
        let f = fixture();
        let code = sale(&f, 1, PaymentStatus::Paid).await;
        f.cache.set_available(false);
        let decision = f.validator.validate(code.as_str(), "gate-1").await;
        assert!(matches!(decision, Ok(GateDecision::Admit(_))));
        let again = f.validator.validate(code.as_str(), "gate-1").await;
        assert!(matches!(
            again,
            Ok(GateDecision::Reject(RejectReason::AlreadyUsed))
        ));
    }

    #[tokio::test]
    async fn store_outage_fails_closed() {
        let f = fixture();
        let code = sale(&f, 1, PaymentStatus::Paid).await;
        let _ = f.cache.set(&code, CacheState::Paid).await;
        f.store.set_available(false);
        let decision = f.validator.validate(code.as_str(), "gate-1").await;
        assert!(matches!(decision, Err(PipelineError::StoreUnavailable(_))));
        f.store.set_available(true);
        assert_eq!(f.store.check_in_count().await, 0);
    }

    #[tokio::test]
    async fn blank_staff_id_is_invalid() {
        let f = fixture();
        let decision = f.validator.validate("ABCDEF123456", "  ").await;
        assert!(matches!(decision, Err(PipelineError::InvalidRequest(_))));
    }
}
