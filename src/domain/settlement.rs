//! Settlement states and the gateway status normalizer

use serde::{Deserialize, Serialize};

use crate::domain::invoice::GatewayInvoiceStatus;

/// Internal classification of an invoice's settlement outcome
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SettlementState {
    Pending,
    Processing,
    Completed,
    Failed,
    /// The gateway's response could not be classified. Never terminal: a
    /// caller must keep polling, the payment may still settle.
    Unknown,
}

impl SettlementState {
    /// Only `Completed` and `Failed` end the polling loop
    pub fn is_terminal(&self) -> bool {
        matches!(self, SettlementState::Completed | SettlementState::Failed)
    }
}

/// Response envelope returned to every caller of the confirmation endpoint.
///
/// `success` reports whether the status query itself succeeded, not whether
/// the payment did; the two are orthogonal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfirmationResult {
    pub success: bool,
    pub state: SettlementState,
    pub message: String,
}

impl ConfirmationResult {
    pub fn ok(state: SettlementState, message: String) -> Self {
        Self { success: true, state, message }
    }

    pub fn failed(state: SettlementState, message: String) -> Self {
        Self { success: false, state, message }
    }
}

/// Map a raw gateway response onto the internal settlement state.
///
/// Pure and total: the table covers every status the gateway is known to
/// emit, and anything outside it maps to `Unknown` rather than an error, so
/// upstream additions of new intermediate statuses degrade gracefully.
pub fn normalize(response: &GatewayInvoiceStatus) -> SettlementState {
    match response.status.trim().to_ascii_lowercase().as_str() {
        "new" | "pending" | "created" | "awaiting_payment" => SettlementState::Pending,
        "processing" | "confirming" | "in_progress" | "paid_unconfirmed" => {
            SettlementState::Processing
        }
        "completed" | "complete" | "paid" | "confirmed" | "settled" => SettlementState::Completed,
        "failed" | "expired" | "invalid" | "canceled" | "cancelled" | "declined" => {
            SettlementState::Failed
        }
        _ => SettlementState::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(s: &str) -> GatewayInvoiceStatus {
        GatewayInvoiceStatus {
            status: s.to_string(),
            message: None,
            raw_code: None,
        }
    }

    #[test]
    fn test_known_statuses_map_to_expected_states() {
        assert_eq!(normalize(&status("pending")), SettlementState::Pending);
        assert_eq!(normalize(&status("processing")), SettlementState::Processing);
        assert_eq!(normalize(&status("completed")), SettlementState::Completed);
        assert_eq!(normalize(&status("paid")), SettlementState::Completed);
        assert_eq!(normalize(&status("expired")), SettlementState::Failed);
        assert_eq!(normalize(&status("declined")), SettlementState::Failed);
    }

    #[test]
    fn test_normalize_is_case_and_whitespace_insensitive() {
        assert_eq!(normalize(&status("  Completed ")), SettlementState::Completed);
        assert_eq!(normalize(&status("PROCESSING")), SettlementState::Processing);
    }

    #[test]
    fn test_unknown_status_maps_to_unknown() {
        assert_eq!(normalize(&status("quantum_flux")), SettlementState::Unknown);
        assert_eq!(normalize(&status("")), SettlementState::Unknown);
    }

    #[test]
    fn test_normalize_is_pure() {
        let s = status("confirming");
        assert_eq!(normalize(&s), normalize(&s));
    }

    #[test]
    fn test_terminality() {
        assert!(SettlementState::Completed.is_terminal());
        assert!(SettlementState::Failed.is_terminal());
        assert!(!SettlementState::Pending.is_terminal());
        assert!(!SettlementState::Processing.is_terminal());
        assert!(!SettlementState::Unknown.is_terminal());
    }
}
