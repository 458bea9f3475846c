//! Background release of orphaned reservations.
//!
//! A reservation that outlives `ttl` was never turned into a sale: the
//! checkout task crashed, the process restarted mid-request, or compensation
//! itself failed. The sweeper gives that inventory back.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::persistence::{InventoryStore, StoreError};

/// Periodically releases reservations older than a threshold.
#[derive(Debug, Clone)]
pub struct ReservationSweeper {
    store: Arc<dyn InventoryStore>,
    ttl: Duration,
    interval: Duration,
}

impl ReservationSweeper {
    /// Creates a sweeper.
    #[must_use]
    pub fn new(store: Arc<dyn InventoryStore>, ttl: Duration, interval: Duration) -> Self {
        Self {
            store,
            ttl,
            interval,
        }
    }

    /// Releases every reservation older than the threshold once. Returns
    /// the number released by this call.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if stale reservations cannot be listed.
    pub async fn sweep_once(&self) -> Result<usize, StoreError> {
        let Ok(age) = TimeDelta::from_std(self.ttl) else {
            return Ok(0);
        };
        let Some(cutoff) = Utc::now().checked_sub_signed(age) else {
            return Ok(0);
        };

        let stale = self.store.stale_reservations(cutoff).await?;
        let mut released = 0;
        for reservation in stale {
            match self.store.release_reservation(reservation.id).await {
                Ok(true) => {
                    released += 1;
                    tracing::warn!(
                        alert = true,
                        reservation_id = %reservation.id,
                        ticket_type_id = %reservation.ticket_type_id,
                        quantity = reservation.quantity,
                        created_at = %reservation.created_at,
                        "released orphaned reservation"
                    );
                }
                // Consumed or released between listing and release.
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(reservation_id = %reservation.id, error = %e, "release failed");
                }
            }
        }
        Ok(released)
    }

    /// Runs [`Self::sweep_once`] every `interval` until the task is aborted.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval.max(Duration::from_secs(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match self.sweep_once().await {
                    Ok(0) => {}
                    Ok(released) => tracing::info!(released, "reservation sweep complete"),
                    Err(e) => tracing::error!(error = %e, "reservation sweep failed"),
                }
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{EventId, Money, TicketType};
    use crate::persistence::InMemoryStore;

    #[tokio::test]
    async fn releases_only_old_reservations() {
        let store = Arc::new(InMemoryStore::new());
        let tt = TicketType::new(EventId::new(), "General", Money::from_cents(100), 5);
        let id = tt.id;
        store.add_ticket_type(tt).await;
        let Ok(_) = store.reserve(id, 2).await else {
            panic!("reserve failed");
        };

        let patient = ReservationSweeper::new(
            Arc::<InMemoryStore>::clone(&store),
            Duration::from_secs(3_600),
            Duration::from_secs(60),
        );
        assert!(matches!(patient.sweep_once().await, Ok(0)));
        assert_eq!(store.reservation_count().await, 1);

        let eager = ReservationSweeper::new(
            Arc::<InMemoryStore>::clone(&store),
            Duration::ZERO,
            Duration::from_secs(60),
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(matches!(eager.sweep_once().await, Ok(1)));
        assert_eq!(store.reservation_count().await, 0);

        let Ok(Some(tt)) = store.ticket_type(id).await else {
            panic!("ticket type missing");
        };
        assert_eq!(tt.remaining, 5);
    }

    #[tokio::test]
    async fn store_outage_is_reported() {
        let store = Arc::new(InMemoryStore::new());
        store.set_available(false);
        let sweeper = ReservationSweeper::new(store, Duration::ZERO, Duration::from_secs(60));
        assert!(matches!(
            sweeper.sweep_once().await,
            Err(StoreError::Unavailable(_))
        ));
    }
}
