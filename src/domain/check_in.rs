//! Check-in records and gate decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{CheckInId, EventId, SaleId};

/// Durable proof of attendance. At most one exists per sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckIn {
    /// Check-in identifier.
    pub id: CheckInId,
    /// Redeemed sale.
    pub sale_id: SaleId,
    /// Event the sale belongs to.
    pub event_id: EventId,
    /// Staff member or device that scanned the code.
    pub staff_id: String,
    /// Number of people admitted with this code (the sale quantity).
    pub party_size: u32,
    /// Admission time.
    pub checked_in_at: DateTime<Utc>,
}

/// Why a code was refused at the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    /// The sale was already admitted.
    AlreadyUsed,
    /// Payment has not been confirmed.
    NotPaid,
    /// The payment was refunded.
    Refunded,
    /// The sale was cancelled.
    Cancelled,
    /// No sale carries this code.
    UnknownCode,
}

impl RejectReason {
    /// Message shown on the scanning device.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::AlreadyUsed => "Ticket already used",
            Self::NotPaid => "Payment not confirmed for this ticket",
            Self::Refunded => "Ticket was refunded",
            Self::Cancelled => "Ticket was cancelled",
            Self::UnknownCode => "Ticket code not recognized",
        }
    }
}

/// Outcome of validating a code at the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Entry granted; the check-in has been durably recorded.
    Admit(CheckIn),
    /// Entry refused.
    Reject(RejectReason),
}

impl GateDecision {
    /// Returns `true` for [`GateDecision::Admit`].
    #[must_use]
    pub const fn is_admit(&self) -> bool {
        matches!(self, Self::Admit(_))
    }

    /// Returns the rejection reason, if any.
    #[must_use]
    pub const fn reason(&self) -> Option<RejectReason> {
        match self {
            Self::Admit(_) => None,
            Self::Reject(reason) => Some(*reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_serialize_screaming_snake() {
        let json = serde_json::to_string(&RejectReason::AlreadyUsed).unwrap_or_default();
        assert_eq!(json, "\"ALREADY_USED\"");
        let json = serde_json::to_string(&RejectReason::UnknownCode).unwrap_or_default();
        assert_eq!(json, "\"UNKNOWN_CODE\"");
    }

    #[test]
    fn decision_accessors() {
        let reject = GateDecision::Reject(RejectReason::NotPaid);
        assert!(!reject.is_admit());
        assert_eq!(reject.reason(), Some(RejectReason::NotPaid));
    }
}
