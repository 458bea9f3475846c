//! Data Transfer Objects for REST request/response serialization.
//!
//! Identifiers are plain UUIDs on the wire; money is sent both as a
//! decimal string and as integer cents.

pub mod check_in_dto;
pub mod checkout_dto;
pub mod sale_dto;
pub mod webhook_dto;

pub use check_in_dto::*;
pub use checkout_dto::*;
pub use sale_dto::*;
pub use webhook_dto::*;
