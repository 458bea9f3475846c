//! Read endpoints: ticket type availability and sale lookup.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use uuid::Uuid;

use crate::api::dto::{SaleResponse, TicketTypeResponse};
use crate::app_state::AppState;
use crate::domain::{RedemptionCode, TicketTypeId};
use crate::error::{ErrorResponse, PipelineError};

/// `GET /ticket-types/{id}`: Current availability.
///
/// # Errors
///
/// Returns [`PipelineError::TicketTypeNotFound`] if the id is unknown.
#[utoipa::path(
    get,
    path = "/api/v1/ticket-types/{id}",
    tag = "Inventory",
    summary = "Get ticket type availability",
    params(("id" = Uuid, Path, description = "Ticket type identifier")),
    responses(
        (status = 200, description = "Ticket type", body = TicketTypeResponse),
        (status = 404, description = "Ticket type not found", body = ErrorResponse),
    )
)]
pub async fn get_ticket_type(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, PipelineError> {
    let ticket_type = state
        .store
        .ticket_type(TicketTypeId::from_uuid(id))
        .await?
        .ok_or(PipelineError::TicketTypeNotFound(id))?;
    Ok(Json(TicketTypeResponse::from(ticket_type)))
}

/// `GET /sales/{redemption_code}`: Sale status lookup for support staff.
///
/// # Errors
///
/// Returns [`PipelineError::SaleNotFound`] if no sale carries the code.
#[utoipa::path(
    get,
    path = "/api/v1/sales/{redemption_code}",
    tag = "Inventory",
    summary = "Look up a sale by redemption code",
    params(("redemption_code" = String, Path, description = "Redemption code")),
    responses(
        (status = 200, description = "Sale", body = SaleResponse),
        (status = 404, description = "Sale not found", body = ErrorResponse),
    )
)]
pub async fn get_sale(
    State(state): State<AppState>,
    Path(raw_code): Path<String>,
) -> Result<impl IntoResponse, PipelineError> {
    let Ok(code) = RedemptionCode::parse(&raw_code) else {
        return Err(PipelineError::SaleNotFound(raw_code));
    };
    let sale = state
        .store
        .sale_by_code(&code)
        .await?
        .ok_or_else(|| PipelineError::SaleNotFound(code.to_string()))?;
    Ok(Json(SaleResponse::from(sale)))
}

/// Read routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/ticket-types/{id}", get(get_ticket_type))
        .route("/sales/{redemption_code}", get(get_sale))
}
