//! Gate check-in handler.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{CheckInBody, CheckInResponse};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, PipelineError};

/// `POST /check-ins`: Validate a scanned code.
///
/// # Errors
///
/// Returns [`PipelineError::StoreUnavailable`] when admission cannot be
/// decided; the gate must treat that as a refusal.
#[utoipa::path(
    post,
    path = "/api/v1/check-ins",
    tag = "Gate",
    summary = "Admit or reject a redemption code",
    description = "Returns ADMIT exactly once per paid sale. Every other presentation returns REJECT with a reason: ALREADY_USED, NOT_PAID, REFUNDED, CANCELLED or UNKNOWN_CODE.",
    request_body = CheckInBody,
    responses(
        (status = 200, description = "Gate decision", body = CheckInResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 503, description = "Store unavailable; do not admit", body = ErrorResponse),
    )
)]
pub async fn check_in(
    State(state): State<AppState>,
    Json(body): Json<CheckInBody>,
) -> Result<impl IntoResponse, PipelineError> {
    let decision = state
        .validator
        .validate(&body.redemption_code, &body.staff_id)
        .await?;
    Ok(Json(CheckInResponse::from(decision)))
}

/// Check-in routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/check-ins", post(check_in))
}
