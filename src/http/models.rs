//! HTTP request/response models

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::infrastructure::cart_store::CartItem;
use crate::infrastructure::search_cache::{CacheDisposition, SearchResult};

/// Body of the confirmation endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmRequest {
    /// Gateway-side invoice identifier, forwarded as-is after validation
    #[serde(rename = "invoiceId", default)]
    pub invoice_id: String,
}

/// Response of the token issuance endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsrfTokenResponse {
    #[serde(rename = "csrfToken")]
    pub csrf_token: String,
    pub expires_in: u64,
}

/// Body of the cart/wishlist sync endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRequest {
    pub items: Vec<CartItem>,
}

/// Response of the cart/wishlist sync endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResponse {
    pub success: bool,
    pub count: usize,
}

/// Response of the search endpoint
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub cache: CacheDisposition,
    pub results: Vec<SearchResult>,
}

/// Request context for tracking and logging
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Unique request ID
    pub request_id: String,

    /// Client IP address
    pub client_ip: String,

    /// Request timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl RequestContext {
    pub fn new(client_ip: String) -> Self {
        Self {
            request_id: format!("req_{}", Uuid::new_v4().simple()),
            client_ip,
            timestamp: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirm_request_field_name() {
        let req: ConfirmRequest = serde_json::from_str(r#"{"invoiceId":"inv_1"}"#).unwrap();
        assert_eq!(req.invoice_id, "inv_1");

        // Missing field deserializes to empty and is rejected downstream
        let req: ConfirmRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.invoice_id, "");
    }

    #[test]
    fn test_token_response_field_name() {
        let resp = CsrfTokenResponse { csrf_token: "abc".into(), expires_in: 900 };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["csrfToken"], "abc");
    }

    #[test]
    fn test_request_ids_are_unique() {
        let a = RequestContext::new("127.0.0.1".into());
        let b = RequestContext::new("127.0.0.1".into());
        assert_ne!(a.request_id, b.request_id);
    }
}
