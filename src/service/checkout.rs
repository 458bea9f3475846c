//! Checkout orchestrator: reserve → open payment → persist pending sale.
//!
//! The reservation is the only step that touches shared inventory. If the
//! gateway fails or misses its deadline the reservation is released before
//! the error is returned. Anything this path fails to release is picked up
//! by [`super::ReservationSweeper`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, Utc};

use super::WebhookReconciler;
use crate::domain::{
    Buyer, Money, NewSale, PaymentStatus, RedemptionCode, Reservation, Sale, SaleId, TicketTypeId,
};
use crate::error::PipelineError;
use crate::gateway::{CreatePaymentRequest, PaymentGateway, PaymentIntent};
use crate::persistence::{InventoryStore, StoreError};

/// Largest quantity a single checkout may request.
pub const MAX_QUANTITY: u32 = 50;

/// Tunables for [`CheckoutService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutSettings {
    /// Deadline for customer registration plus payment creation.
    pub gateway_timeout: Duration,
    /// Days until the opened payment is due.
    pub payment_due_days: u32,
    /// Attempts at finding an unused redemption code.
    pub redemption_code_max_attempts: u32,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            gateway_timeout: Duration::from_secs(10),
            payment_due_days: 3,
            redemption_code_max_attempts: 5,
        }
    }
}

/// Incoming purchase.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    /// Ticket type to buy.
    pub ticket_type_id: TicketTypeId,
    /// Number of tickets.
    pub quantity: u32,
    /// Buyer details forwarded to the gateway.
    pub buyer: Buyer,
}

/// Result of a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutReceipt {
    /// Sale id, also the gateway's external reference.
    pub sale_id: SaleId,
    /// Code presented at the gate.
    pub redemption_code: RedemptionCode,
    /// Gateway payment id.
    pub payment_id: String,
    /// Hosted payment page.
    pub invoice_url: String,
    /// Number of tickets.
    pub quantity: u32,
    /// Amount charged.
    pub total: Money,
    /// Payment status at the time the sale was recorded.
    pub payment_status: PaymentStatus,
}

impl CheckoutReceipt {
    fn from_sale(sale: &Sale, intent: PaymentIntent) -> Self {
        Self {
            sale_id: sale.id,
            redemption_code: sale.redemption_code.clone(),
            payment_id: intent.payment_id,
            invoice_url: intent.invoice_url,
            quantity: sale.quantity,
            total: sale.total_price,
            payment_status: sale.payment_status,
        }
    }
}

/// Runs the checkout pipeline.
#[derive(Debug, Clone)]
pub struct CheckoutService {
    store: Arc<dyn InventoryStore>,
    gateway: Arc<dyn PaymentGateway>,
    reconciler: WebhookReconciler,
    settings: CheckoutSettings,
    generate_code: fn() -> RedemptionCode,
}

impl CheckoutService {
    /// Creates a new checkout service.
    #[must_use]
    pub fn new(
        store: Arc<dyn InventoryStore>,
        gateway: Arc<dyn PaymentGateway>,
        reconciler: WebhookReconciler,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            reconciler,
            settings,
            generate_code: RedemptionCode::generate,
        }
    }

    /// Replaces the redemption code generator.
    #[must_use]
    pub fn with_code_generator(mut self, generate_code: fn() -> RedemptionCode) -> Self {
        self.generate_code = generate_code;
        self
    }

    /// Sells `quantity` tickets: reserves inventory, opens a gateway payment,
    /// and records a `pending` sale.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::InvalidRequest`] for a bad quantity or buyer.
    /// - [`PipelineError::OutOfStock`] / [`PipelineError::TicketTypeInactive`]
    ///   / [`PipelineError::TicketTypeNotFound`] from the reservation.
    /// - [`PipelineError::GatewayTimeout`] / [`PipelineError::GatewayFailure`]
    ///   after the reservation has been released.
    /// - [`PipelineError::ReservationExpired`] if the sweep released the
    ///   reservation first.
    pub async fn checkout(&self, request: CheckoutRequest) -> Result<CheckoutReceipt, PipelineError> {
        validate(&request)?;

        let reservation = self
            .store
            .reserve(request.ticket_type_id, request.quantity)
            .await?;
        tracing::debug!(
            reservation_id = %reservation.id,
            ticket_type_id = %reservation.ticket_type_id,
            quantity = reservation.quantity,
            "inventory reserved"
        );

        let sale_id = SaleId::new();
        let intent = match tokio::time::timeout(
            self.settings.gateway_timeout,
            self.open_payment(&reservation, &request.buyer, sale_id),
        )
        .await
        {
            Ok(Ok(intent)) => intent,
            Ok(Err(e)) => {
                tracing::warn!(%sale_id, error = %e, "payment creation failed");
                self.compensate(&reservation).await;
                return Err(e.into());
            }
            Err(_) => {
                tracing::warn!(
                    %sale_id,
                    timeout_ms = self.settings.gateway_timeout.as_millis(),
                    "payment gateway timed out"
                );
                self.compensate(&reservation).await;
                return Err(PipelineError::GatewayTimeout);
            }
        };

        let sale = self
            .persist_sale(&reservation, sale_id, request.buyer, &intent)
            .await?;
        tracing::info!(
            sale_id = %sale.id,
            payment_reference = %sale.payment_reference,
            quantity = sale.quantity,
            total = %sale.total_price,
            "sale recorded"
        );

        if let Err(e) = self.reconciler.replay_unmatched(&sale.payment_reference).await {
            tracing::warn!(sale_id = %sale.id, error = %e, "parked webhook replay failed");
        }

        Ok(CheckoutReceipt::from_sale(&sale, intent))
    }

    async fn open_payment(
        &self,
        reservation: &Reservation,
        buyer: &Buyer,
        sale_id: SaleId,
    ) -> Result<PaymentIntent, crate::gateway::PaymentError> {
        let customer_ref = self.gateway.register_customer(buyer).await?;
        let today = Utc::now().date_naive();
        let due_date = today
            .checked_add_days(Days::new(u64::from(self.settings.payment_due_days)))
            .unwrap_or(today);
        let request = CreatePaymentRequest {
            customer_ref,
            amount: reservation.total,
            due_date,
            external_reference: sale_id.to_string(),
            description: format!(
                "{} ticket(s) at {}",
                reservation.quantity, reservation.unit_price
            ),
        };
        self.gateway.create_payment(&request).await
    }

    /// Consumes the reservation into a sale, drawing a fresh code on
    /// collision.
    async fn persist_sale(
        &self,
        reservation: &Reservation,
        sale_id: SaleId,
        buyer: Buyer,
        intent: &PaymentIntent,
    ) -> Result<Sale, PipelineError> {
        let attempts = self.settings.redemption_code_max_attempts.max(1);
        for attempt in 1..=attempts {
            let new_sale = NewSale {
                id: sale_id,
                buyer: buyer.clone(),
                payment_reference: intent.payment_id.clone(),
                redemption_code: (self.generate_code)(),
            };
            match self.store.create_sale(reservation, new_sale).await {
                Ok(sale) => return Ok(sale),
                Err(StoreError::DuplicateRedemptionCode) => {
                    tracing::warn!(%sale_id, attempt, "redemption code collision; retrying");
                }
                Err(StoreError::ReservationNotFound(id)) => {
                    tracing::error!(
                        alert = true,
                        %sale_id,
                        reservation_id = %id,
                        payment_reference = %intent.payment_id,
                        "reservation released before sale was recorded; gateway payment is orphaned"
                    );
                    return Err(PipelineError::ReservationExpired);
                }
                Err(e) => {
                    tracing::error!(
                        alert = true,
                        %sale_id,
                        payment_reference = %intent.payment_id,
                        error = %e,
                        "failed to record sale after payment was opened"
                    );
                    self.compensate(reservation).await;
                    return Err(e.into());
                }
            }
        }

        self.compensate(reservation).await;
        Err(PipelineError::Internal(format!(
            "no unused redemption code after {attempts} attempts"
        )))
    }

    /// Best-effort release. On failure the sweep releases it later.
    async fn compensate(&self, reservation: &Reservation) {
        match self.store.release_reservation(reservation.id).await {
            Ok(true) => {
                tracing::info!(
                    reservation_id = %reservation.id,
                    quantity = reservation.quantity,
                    "reservation released"
                );
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(
                    reservation_id = %reservation.id,
                    error = %e,
                    "reservation release failed; left for sweep"
                );
            }
        }
    }
}

fn validate(request: &CheckoutRequest) -> Result<(), PipelineError> {
    if request.quantity == 0 || request.quantity > MAX_QUANTITY {
        return Err(PipelineError::InvalidRequest(format!(
            "quantity must be between 1 and {MAX_QUANTITY}"
        )));
    }
    if request.buyer.name.trim().is_empty() {
        return Err(PipelineError::InvalidRequest(
            "buyer name is required".to_string(),
        ));
    }
    let email = request.buyer.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(PipelineError::InvalidRequest(
            "buyer email is invalid".to_string(),
        ));
    }
    Ok(())
}
