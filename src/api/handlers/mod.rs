//! REST endpoint handlers organized by resource.

pub mod check_in;
pub mod checkout;
pub mod sales;
pub mod system;
pub mod webhook;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(checkout::routes())
        .merge(check_in::routes())
        .merge(webhook::routes())
        .merge(sales::routes())
}
