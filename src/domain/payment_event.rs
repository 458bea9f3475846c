//! Payment events delivered by the gateway.
//!
//! The gateway names events with upper-snake strings such as
//! `PAYMENT_CONFIRMED`. Only a handful move a sale through the state
//! machine; everything else is acknowledged and ignored.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::PaymentStatus;

/// Gateway event kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentEvent {
    /// Card payment authorized and confirmed.
    PaymentConfirmed,
    /// Funds received (e.g. bank slip or instant transfer settled).
    PaymentReceived,
    /// Payment returned to the buyer.
    PaymentRefunded,
    /// Buyer disputed the charge.
    PaymentChargebackRequested,
    /// Payment removed at the gateway before settlement.
    PaymentDeleted,
    /// Any other event name.
    Other(String),
}

impl PaymentEvent {
    /// Parses a gateway event name.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "PAYMENT_CONFIRMED" => Self::PaymentConfirmed,
            "PAYMENT_RECEIVED" => Self::PaymentReceived,
            "PAYMENT_REFUNDED" => Self::PaymentRefunded,
            "PAYMENT_CHARGEBACK_REQUESTED" => Self::PaymentChargebackRequested,
            "PAYMENT_DELETED" => Self::PaymentDeleted,
            other => Self::Other(other.to_string()),
        }
    }

    /// Gateway event name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::PaymentConfirmed => "PAYMENT_CONFIRMED",
            Self::PaymentReceived => "PAYMENT_RECEIVED",
            Self::PaymentRefunded => "PAYMENT_REFUNDED",
            Self::PaymentChargebackRequested => "PAYMENT_CHARGEBACK_REQUESTED",
            Self::PaymentDeleted => "PAYMENT_DELETED",
            Self::Other(name) => name,
        }
    }

    /// Status this event drives a sale to, or `None` if it is informational.
    #[must_use]
    pub const fn target_status(&self) -> Option<PaymentStatus> {
        match self {
            Self::PaymentConfirmed | Self::PaymentReceived => Some(PaymentStatus::Paid),
            Self::PaymentRefunded | Self::PaymentChargebackRequested => {
                Some(PaymentStatus::Refunded)
            }
            Self::PaymentDeleted => Some(PaymentStatus::Cancelled),
            Self::Other(_) => None,
        }
    }
}

/// A webhook whose payment reference matched no sale, kept for operator
/// review and for replay once the sale appears.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmatchedWebhook {
    /// Row identifier.
    pub id: i64,
    /// Gateway event name.
    pub event: String,
    /// Gateway payment id carried by the event.
    pub payment_reference: String,
    /// Raw payload as received.
    pub payload: serde_json::Value,
    /// Arrival time.
    pub received_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_events_target_paid() {
        assert_eq!(
            PaymentEvent::from_name("PAYMENT_CONFIRMED").target_status(),
            Some(PaymentStatus::Paid)
        );
        assert_eq!(
            PaymentEvent::from_name("PAYMENT_RECEIVED").target_status(),
            Some(PaymentStatus::Paid)
        );
    }

    #[test]
    fn refund_and_delete_events() {
        assert_eq!(
            PaymentEvent::from_name("PAYMENT_CHARGEBACK_REQUESTED").target_status(),
            Some(PaymentStatus::Refunded)
        );
        assert_eq!(
            PaymentEvent::from_name("PAYMENT_DELETED").target_status(),
            Some(PaymentStatus::Cancelled)
        );
    }

    #[test]
    fn unknown_events_are_informational() {
        let event = PaymentEvent::from_name("PAYMENT_CREATED");
        assert_eq!(event.target_status(), None);
        assert_eq!(event.name(), "PAYMENT_CREATED");
    }
}
