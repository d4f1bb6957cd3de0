//! Application layer - Use cases and application services
//!
//! Services that orchestrate the confirmation pipeline: token issuance and
//! validation, the per-request confirmation state machine, and the polling
//! contract for callers of the endpoint.

pub mod confirm_service;
pub mod polling;
pub mod token_service;

pub use confirm_service::{failure_result, ConfirmationService};
pub use polling::{ConfirmEndpoint, ConfirmationPoller, PollOutcome, TokenSource};
pub use token_service::{CsrfTokenService, IssuedCsrfToken};
