//! Payment gateway webhook handler.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::WebhookAck;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, PipelineError};
use crate::gateway::WebhookPayload;

/// `POST /webhooks/payments`: Gateway callback.
///
/// The raw body is taken as bytes so the signature is checked over exactly
/// what was sent.
///
/// # Errors
///
/// - [`PipelineError::WebhookSignatureInvalid`] (401) on a bad signature.
/// - [`PipelineError::InvalidRequest`] (400) for an unparsable body.
/// - [`PipelineError::StoreUnavailable`] (503) so the gateway redelivers.
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/payments",
    tag = "Webhooks",
    summary = "Receive a payment event",
    description = "Idempotent. Duplicates, unknown events, and events for unknown payments are acknowledged with 200.",
    request_body = WebhookPayload,
    responses(
        (status = 200, description = "Event accepted", body = WebhookAck),
        (status = 400, description = "Malformed payload", body = ErrorResponse),
        (status = 401, description = "Signature verification failed", body = ErrorResponse),
        (status = 503, description = "Store unavailable; redeliver", body = ErrorResponse),
    )
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, PipelineError> {
    if !state.verifier.verify(&headers, &body) {
        tracing::warn!(bytes = body.len(), "webhook rejected: bad signature");
        return Err(PipelineError::WebhookSignatureInvalid);
    }

    let raw: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| PipelineError::InvalidRequest(format!("webhook body is not JSON: {e}")))?;
    let payload: WebhookPayload = serde_json::from_value(raw.clone())
        .map_err(|e| PipelineError::InvalidRequest(format!("unexpected webhook shape: {e}")))?;

    let outcome = state.reconciler.reconcile(&payload, raw).await?;
    tracing::debug!(event = %payload.event, payment_reference = %payload.payment.id, ?outcome, "webhook handled");
    Ok(Json(WebhookAck::from(outcome)))
}

/// Webhook routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/webhooks/payments", post(payment_webhook))
}
