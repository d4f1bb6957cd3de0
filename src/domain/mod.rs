//! Domain layer - Core business logic and domain models
//!
//! Types and pure functions independent of HTTP and gateway transport
//! concerns.

pub mod invoice;
pub mod settlement;

pub use invoice::{GatewayInvoiceStatus, InvoiceId};
pub use settlement::{normalize, ConfirmationResult, SettlementState};
