//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::cache::ValidationCache;
use crate::gateway::{PaymentGateway, WebhookVerifier};
use crate::persistence::InventoryStore;
use crate::service::{CheckInValidator, CheckoutService, CheckoutSettings, WebhookReconciler};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Checkout pipeline. Behind an `Arc` so handlers can move it into a
    /// detached task.
    pub checkout: Arc<CheckoutService>,
    /// Webhook reconciler.
    pub reconciler: WebhookReconciler,
    /// Gate validator.
    pub validator: CheckInValidator,
    /// Inventory store, for read endpoints.
    pub store: Arc<dyn InventoryStore>,
    /// Webhook authenticity check.
    pub verifier: WebhookVerifier,
}

impl AppState {
    /// Wires the services over the given backends.
    #[must_use]
    pub fn new(
        store: Arc<dyn InventoryStore>,
        cache: Arc<dyn ValidationCache>,
        gateway: Arc<dyn PaymentGateway>,
        settings: CheckoutSettings,
        verifier: WebhookVerifier,
    ) -> Self {
        let reconciler = WebhookReconciler::new(Arc::clone(&store), Arc::clone(&cache));
        let validator = CheckInValidator::new(Arc::clone(&store), cache);
        let checkout = Arc::new(CheckoutService::new(
            Arc::clone(&store),
            gateway,
            reconciler.clone(),
            settings,
        ));
        Self {
            checkout,
            reconciler,
            validator,
            store,
            verifier,
        }
    }
}
