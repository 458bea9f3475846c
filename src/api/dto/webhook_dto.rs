//! Webhook acknowledgement DTO.

use serde::Serialize;
use utoipa::ToSchema;

use crate::service::ReconcileOutcome;

/// Response body for `POST /webhooks/payments`.
#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    /// Always `true`; the gateway only looks at the status code.
    pub received: bool,
    /// What the event did.
    pub outcome: ReconcileOutcome,
}

impl From<ReconcileOutcome> for WebhookAck {
    fn from(outcome: ReconcileOutcome) -> Self {
        Self {
            received: true,
            outcome,
        }
    }
}
