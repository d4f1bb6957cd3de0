//! Payment gateway client
//!
//! Thin, typed interface to the external gateway's invoice-status query. The
//! client relays transport results and raw status payloads; it never
//! interprets gateway status strings and never retries. Retries belong to the
//! polling client so the confirmation endpoint stays stateless and fast.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::GatewayConfig;
use crate::domain::invoice::{GatewayInvoiceStatus, InvoiceId};
use crate::error::{AppError, AppResult};

/// Transport-level gateway failure carrying a retry classification.
///
/// Transient network failures and gateway 5xx responses are retryable;
/// "invoice not found" and other 4xx rejections are not.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct GatewayError {
    pub retryable: bool,
    pub message: String,
}

impl GatewayError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self { retryable: true, message: message.into() }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self { retryable: false, message: message.into() }
    }
}

/// Interface to the external gateway's invoice-status query
#[async_trait]
pub trait InvoiceGateway: Send + Sync {
    async fn query_invoice(&self, id: &InvoiceId) -> Result<GatewayInvoiceStatus, GatewayError>;
}

/// HTTP implementation backed by reqwest with a bounded request timeout
pub struct HttpInvoiceGateway {
    client: Client,
    config: GatewayConfig,
}

impl HttpInvoiceGateway {
    pub fn new(config: GatewayConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn invoice_url(&self, id: &InvoiceId) -> String {
        format!("{}/invoices/{}", self.config.base_url.trim_end_matches('/'), id)
    }
}

#[async_trait]
impl InvoiceGateway for HttpInvoiceGateway {
    async fn query_invoice(&self, id: &InvoiceId) -> Result<GatewayInvoiceStatus, GatewayError> {
        info!(invoice_id = %id, "Querying payment gateway for invoice status");

        let response = self
            .client
            .get(self.invoice_url(id))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| {
                warn!(invoice_id = %id, error = %e, "Gateway request failed");
                if e.is_timeout() {
                    GatewayError::transient("gateway request timed out")
                } else {
                    GatewayError::transient(format!("gateway unreachable: {}", e))
                }
            })?;

        let status = response.status();
        if status.is_success() {
            response.json::<GatewayInvoiceStatus>().await.map_err(|e| {
                warn!(invoice_id = %id, error = %e, "Gateway response could not be parsed");
                GatewayError::transient("gateway returned an unreadable response")
            })
        } else if status == reqwest::StatusCode::NOT_FOUND {
            Err(GatewayError::permanent("invoice not found"))
        } else if status.is_client_error() {
            Err(GatewayError::permanent(format!("gateway rejected the query: HTTP {}", status)))
        } else {
            warn!(invoice_id = %id, http_status = %status, "Gateway returned server error");
            Err(GatewayError::transient(format!("gateway error: HTTP {}", status)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoice_url() {
        let gateway = HttpInvoiceGateway::new(GatewayConfig {
            base_url: "https://pay.example.com/api/".to_string(),
            ..GatewayConfig::default()
        })
        .unwrap();

        let id = InvoiceId::parse("inv_123").unwrap();
        assert_eq!(gateway.invoice_url(&id), "https://pay.example.com/api/invoices/inv_123");
    }

    #[test]
    fn test_error_classification() {
        assert!(GatewayError::transient("timeout").retryable);
        assert!(!GatewayError::permanent("not found").retryable);
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_transient() {
        // Reserved TEST-NET-1 address, nothing listens there
        let gateway = HttpInvoiceGateway::new(GatewayConfig {
            base_url: "http://192.0.2.1:9".to_string(),
            timeout_seconds: 1,
            ..GatewayConfig::default()
        })
        .unwrap();

        let id = InvoiceId::parse("inv_123").unwrap();
        let err = gateway.query_invoice(&id).await.unwrap_err();
        assert!(err.retryable);
    }
}
