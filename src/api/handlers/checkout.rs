//! Checkout handler.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{CheckoutBody, CheckoutResponse};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, PipelineError};

/// `POST /checkout`: Buy tickets.
///
/// The pipeline runs on a detached task: if the client goes away mid-call
/// the reservation is still either turned into a sale or released.
///
/// # Errors
///
/// Returns [`PipelineError`] for invalid input, missing stock, or gateway
/// failure.
#[utoipa::path(
    post,
    path = "/api/v1/checkout",
    tag = "Checkout",
    summary = "Reserve tickets and open a payment",
    description = "Atomically reserves inventory, opens a payment at the gateway, and records a pending sale. On gateway failure or timeout the reservation is released and a retryable error is returned.",
    request_body = CheckoutBody,
    responses(
        (status = 201, description = "Sale recorded; pay at invoice_url", body = CheckoutResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Ticket type not found", body = ErrorResponse),
        (status = 409, description = "Out of stock or not on sale", body = ErrorResponse),
        (status = 502, description = "Gateway error (retryable)", body = ErrorResponse),
        (status = 504, description = "Gateway timeout (retryable)", body = ErrorResponse),
    )
)]
pub async fn create_checkout(
    State(state): State<AppState>,
    Json(body): Json<CheckoutBody>,
) -> Result<impl IntoResponse, PipelineError> {
    let checkout = Arc::clone(&state.checkout);
    let receipt = tokio::spawn(async move { checkout.checkout(body.into()).await })
        .await
        .map_err(|e| PipelineError::Internal(format!("checkout task failed: {e}")))??;

    Ok((StatusCode::CREATED, Json(CheckoutResponse::from(receipt))))
}

/// Checkout routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/checkout", post(create_checkout))
}
