//! Service layer: the three pipeline stages plus housekeeping.
//!
//! [`CheckoutService`] sells, [`WebhookReconciler`] confirms,
//! [`CheckInValidator`] admits. Each holds `Arc`s to the store and cache
//! trait objects and is cheap to clone into request tasks.

pub mod check_in;
pub mod checkout;
pub mod reconciler;
pub mod sweeper;

pub use check_in::CheckInValidator;
pub use checkout::{CheckoutReceipt, CheckoutRequest, CheckoutService, CheckoutSettings};
pub use reconciler::{ReconcileOutcome, WebhookReconciler};
pub use sweeper::ReservationSweeper;
