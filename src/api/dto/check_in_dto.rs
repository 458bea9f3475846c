//! Gate check-in DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{GateDecision, RejectReason};

/// Request body for `POST /check-ins`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckInBody {
    /// Code scanned from the ticket.
    pub redemption_code: String,
    /// Scanning staff member or device.
    pub staff_id: String,
}

/// Gate verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateResult {
    /// Let the party in.
    Admit,
    /// Turn the holder away.
    Reject,
}

/// Response body for `POST /check-ins`. Always 200; a rejection is a
/// normal answer, not an error.
#[derive(Debug, Serialize, ToSchema)]
pub struct CheckInResponse {
    /// `ADMIT` or `REJECT`.
    pub result: GateResult,
    /// Why the code was rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
    /// Message to show the gate operator.
    pub message: String,
    /// Admitted sale.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale_id: Option<Uuid>,
    /// Number of people admitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub party_size: Option<u32>,
    /// Admission time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked_in_at: Option<DateTime<Utc>>,
}

impl From<GateDecision> for CheckInResponse {
    fn from(decision: GateDecision) -> Self {
        match decision {
            GateDecision::Admit(check_in) => Self {
                result: GateResult::Admit,
                reason: None,
                message: format!("Admit {}", check_in.party_size),
                sale_id: Some(*check_in.sale_id.as_uuid()),
                party_size: Some(check_in.party_size),
                checked_in_at: Some(check_in.checked_in_at),
            },
            GateDecision::Reject(reason) => Self {
                result: GateResult::Reject,
                reason: Some(reason),
                message: reason.message().to_string(),
                sale_id: None,
                party_size: None,
                checked_in_at: None,
            },
        }
    }
}
