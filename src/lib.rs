//! # gate-pass
//!
//! Ticket sale → payment confirmation → gate check-in pipeline.
//!
//! A ticket is reserved and sold at checkout, a third-party payment gateway
//! confirms it asynchronously by webhook, and gate scanners validate and
//! consume it exactly once. The validation cache keeps scans fast; the
//! inventory store keeps them correct.
//!
//! ## Architecture
//!
//! ```text
//! Buyers            Payment gateway            Gate scanners
//!   │                     │                          │
//!   ├── POST /checkout    ├── POST /webhooks/...     ├── POST /check-ins
//!   │                     │                          │
//!   CheckoutService       WebhookReconciler          CheckInValidator
//!   │   └── PaymentGateway│                          │
//!   │                     ├──────► ValidationCache ◄─┤
//!   │                     │       (memory / Redis)   │
//!   └─────────────────────┴──► InventoryStore ◄──────┘
//!                            (PostgreSQL / memory)
//! ```
//!
//! Two store operations are atomic and carry every invariant: the
//! conditional inventory decrement in [`persistence::InventoryStore::reserve`]
//! and the insert-if-absent in [`persistence::InventoryStore::record_check_in`].

pub mod api;
pub mod app_state;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod persistence;
pub mod service;
