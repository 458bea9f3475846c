//! Sale payment state machine.
//!
//! ```text
//! pending ──► paid ──► refunded
//!    │          └────► cancelled
//!    └───────────────► cancelled
//! ```
//!
//! `refunded` and `cancelled` are terminal. Every store implementation
//! applies transitions through [`PaymentStatus::transition_to`] so the
//! legality rules live in exactly one place.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Payment status of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Inventory reserved, payment not yet confirmed.
    Pending,
    /// Gateway confirmed the payment.
    Paid,
    /// Payment returned to the buyer. Terminal.
    Refunded,
    /// Sale voided. Terminal.
    Cancelled,
}

/// Result of asking whether `from → to` is a legal move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The move is legal and changes state.
    Apply,
    /// The sale is already in the target state (replayed event).
    AlreadyApplied,
    /// The move is not part of the state machine.
    Illegal,
}

/// Error returned when parsing an unknown status string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown payment status: {0}")]
pub struct UnknownStatus(pub String);

impl PaymentStatus {
    /// Returns `true` for states no event can leave.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Refunded | Self::Cancelled)
    }

    /// Classifies a requested transition.
    #[must_use]
    pub const fn transition_to(self, target: Self) -> Transition {
        match (self, target) {
            (Self::Pending, Self::Pending)
            | (Self::Paid, Self::Paid)
            | (Self::Refunded, Self::Refunded)
            | (Self::Cancelled, Self::Cancelled) => Transition::AlreadyApplied,
            (Self::Pending, Self::Paid | Self::Cancelled)
            | (Self::Paid, Self::Refunded | Self::Cancelled) => Transition::Apply,
            _ => Transition::Illegal,
        }
    }

    /// Database / wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Refunded => "refunded",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "refunded" => Ok(Self::Refunded),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PaymentStatus::{Cancelled, Paid, Pending, Refunded};
    use super::*;

    #[test]
    fn forward_moves_apply() {
        assert_eq!(Pending.transition_to(Paid), Transition::Apply);
        assert_eq!(Paid.transition_to(Refunded), Transition::Apply);
        assert_eq!(Paid.transition_to(Cancelled), Transition::Apply);
        assert_eq!(Pending.transition_to(Cancelled), Transition::Apply);
    }

    #[test]
    fn replays_are_already_applied() {
        for s in [Pending, Paid, Refunded, Cancelled] {
            assert_eq!(s.transition_to(s), Transition::AlreadyApplied);
        }
    }

    #[test]
    fn terminal_states_cannot_be_left() {
        for terminal in [Refunded, Cancelled] {
            assert!(terminal.is_terminal());
            for target in [Pending, Paid] {
                assert_eq!(terminal.transition_to(target), Transition::Illegal);
            }
        }
        assert_eq!(Refunded.transition_to(Cancelled), Transition::Illegal);
        assert_eq!(Cancelled.transition_to(Refunded), Transition::Illegal);
    }

    #[test]
    fn backward_and_skipping_moves_are_illegal() {
        assert_eq!(Paid.transition_to(Pending), Transition::Illegal);
        assert_eq!(Pending.transition_to(Refunded), Transition::Illegal);
    }

    #[test]
    fn string_round_trip() {
        for s in [Pending, Paid, Refunded, Cancelled] {
            assert_eq!(s.as_str().parse::<PaymentStatus>(), Ok(s));
        }
        assert!("settled".parse::<PaymentStatus>().is_err());
    }
}
