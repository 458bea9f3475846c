//! Pipeline error types with HTTP status code mapping.
//!
//! [`PipelineError`] is the error every service and handler returns. Each
//! variant maps to a specific HTTP status code and structured JSON error
//! response. Gate rejections are *not* errors: they are normal
//! [`GateDecision`](crate::domain::GateDecision) values.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::gateway::PaymentError;
use crate::persistence::StoreError;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 4001,
///     "message": "out of stock: requested 3, remaining 2",
///     "retryable": false
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Whether the same request may succeed if retried later.
    pub retryable: bool,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category         | HTTP Status              |
/// |-----------|------------------|--------------------------|
/// | 1000–1999 | Validation/auth  | 400 / 401                |
/// | 2000–2999 | Not found        | 404                      |
/// | 3000–3999 | Server           | 500 / 503                |
/// | 4000–4999 | Inventory        | 409 Conflict             |
/// | 5000–5999 | Payment gateway  | 502 / 504                |
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Webhook failed authenticity verification.
    #[error("invalid webhook signature")]
    WebhookSignatureInvalid,

    /// Ticket type with the given id was not found.
    #[error("ticket type not found: {0}")]
    TicketTypeNotFound(uuid::Uuid),

    /// No sale carries the given redemption code.
    #[error("sale not found: {0}")]
    SaleNotFound(String),

    /// Fewer tickets remain than were requested.
    #[error("out of stock: requested {requested}, remaining {remaining}")]
    OutOfStock {
        /// Quantity asked for.
        requested: u32,
        /// Quantity still available.
        remaining: u32,
    },

    /// Ticket type is closed for sale.
    #[error("ticket type is not on sale")]
    TicketTypeInactive,

    /// Reservation vanished before the sale could be recorded.
    #[error("reservation expired before the sale was recorded")]
    ReservationExpired,

    /// Inventory store could not be reached.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Payment gateway did not answer within the deadline.
    #[error("payment gateway timed out")]
    GatewayTimeout,

    /// Payment gateway failed or refused the request.
    #[error("payment gateway error: {0}")]
    GatewayFailure(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::WebhookSignatureInvalid => 1002,
            Self::TicketTypeNotFound(_) => 2001,
            Self::SaleNotFound(_) => 2002,
            Self::Internal(_) => 3000,
            Self::StoreUnavailable(_) => 3001,
            Self::OutOfStock { .. } => 4001,
            Self::TicketTypeInactive => 4002,
            Self::ReservationExpired => 4003,
            Self::GatewayTimeout => 5001,
            Self::GatewayFailure(_) => 5002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::WebhookSignatureInvalid => StatusCode::UNAUTHORIZED,
            Self::TicketTypeNotFound(_) | Self::SaleNotFound(_) => StatusCode::NOT_FOUND,
            Self::OutOfStock { .. } | Self::TicketTypeInactive | Self::ReservationExpired => {
                StatusCode::CONFLICT
            }
            Self::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::GatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::GatewayFailure(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the client may retry the same request.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable(_)
                | Self::GatewayTimeout
                | Self::GatewayFailure(_)
                | Self::ReservationExpired
        )
    }
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::TicketTypeNotFound(id) => Self::TicketTypeNotFound(*id.as_uuid()),
            StoreError::TicketTypeInactive(_) => Self::TicketTypeInactive,
            StoreError::OutOfStock {
                requested,
                remaining,
            } => Self::OutOfStock {
                requested,
                remaining,
            },
            StoreError::ReservationNotFound(_) => Self::ReservationExpired,
            StoreError::Unavailable(msg) => Self::StoreUnavailable(msg),
            StoreError::DuplicateRedemptionCode
            | StoreError::TotalOverflow
            | StoreError::Corrupt(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<PaymentError> for PipelineError {
    fn from(err: PaymentError) -> Self {
        Self::GatewayFailure(err.to_string())
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                retryable: self.is_retryable(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
