//! Invoice identifier and raw gateway response types

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::{AppError, AppResult};

fn invoice_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("static pattern"))
}

/// Opaque gateway-side invoice identifier.
///
/// Never generated here, only forwarded. Treated as untrusted input: parsing
/// enforces non-emptiness and a conservative charset before the value touches
/// an outbound URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(String);

impl InvoiceId {
    pub fn parse(raw: &str) -> AppResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation("invoiceId is required".to_string()));
        }
        if !invoice_id_pattern().is_match(trimmed) {
            return Err(AppError::Validation("invoiceId is malformed".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw invoice status as relayed by the gateway client.
///
/// The client never interprets `status`; classification is the normalizer's
/// job so new gateway statuses degrade gracefully instead of failing here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayInvoiceStatus {
    /// Gateway-specific status string
    pub status: String,

    /// Optional human-readable message from the gateway
    #[serde(default)]
    pub message: Option<String>,

    /// Optional gateway-provided raw code
    #[serde(default)]
    pub raw_code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_typical_ids() {
        assert!(InvoiceId::parse("inv_01HZX4T9").is_ok());
        assert!(InvoiceId::parse("5f3a-88c1").is_ok());
        assert_eq!(InvoiceId::parse(" inv42 ").unwrap().as_str(), "inv42");
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(matches!(InvoiceId::parse(""), Err(AppError::Validation(_))));
        assert!(matches!(InvoiceId::parse("   "), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(InvoiceId::parse("inv/../admin").is_err());
        assert!(InvoiceId::parse("inv 42").is_err());
        assert!(InvoiceId::parse(&"x".repeat(65)).is_err());
    }
}
