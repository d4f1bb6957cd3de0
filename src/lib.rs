//! Storefront payment confirmation service
//!
//! A CSRF-gated HTTP API that checks an invoice's settlement state against an
//! external payment gateway, normalizes gateway-specific statuses into an
//! internal result, and is polled by clients until a terminal outcome.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod http;
pub mod infrastructure;
pub mod metrics;
pub mod middleware;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use http::ConfirmServer;

/// Application result type
pub type Result<T> = std::result::Result<T, error::AppError>;
