//! Error handling module
//!
//! Centralized error taxonomy for the confirmation pipeline. Every failure is
//! converted to a uniform JSON envelope at the HTTP boundary; nothing escapes
//! as an unhandled fault.

use thiserror::Error;

/// Application error types
#[derive(Error, Debug, Clone)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid or expired anti-forgery token. The message is always generic;
    /// token contents are never logged or echoed back.
    #[error("Authorization failed")]
    Authorization,

    #[error("Validation error: {0}")]
    Validation(String),

    /// Transient gateway failure (network, DNS, timeout, 5xx). The caller is
    /// expected to retry; the pipeline performs no internal retry.
    #[error("Gateway temporarily unavailable: {0}")]
    GatewayTransient(String),

    /// Permanent gateway failure (invoice unknown or rejected).
    #[error("Gateway rejected request: {0}")]
    GatewayPermanent(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get HTTP status code for this error
    pub fn http_status_code(&self) -> warp::http::StatusCode {
        match self {
            AppError::Authorization => warp::http::StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => warp::http::StatusCode::BAD_REQUEST,
            AppError::GatewayTransient(_) => warp::http::StatusCode::BAD_GATEWAY,
            AppError::GatewayPermanent(_) => warp::http::StatusCode::BAD_REQUEST,
            AppError::RateLimit => warp::http::StatusCode::TOO_MANY_REQUESTS,
            _ => warp::http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to surface to a client. Internal details stay in the logs.
    pub fn client_message(&self) -> String {
        match self {
            AppError::Authorization => "Request could not be authorized".to_string(),
            AppError::Validation(msg) => msg.clone(),
            AppError::GatewayTransient(_) => {
                "Payment gateway temporarily unavailable, please retry".to_string()
            }
            AppError::GatewayPermanent(msg) => msg.clone(),
            AppError::RateLimit => "Rate limit exceeded".to_string(),
            AppError::Config(_) | AppError::Internal(_) => "Internal server error".to_string(),
        }
    }
}

/// Application result type
pub type AppResult<T> = Result<T, AppError>;

impl warp::reject::Reject for AppError {}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::Authorization.http_status_code(), warp::http::StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::Validation("invoiceId is required".into()).http_status_code(),
            warp::http::StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::GatewayTransient("timeout".into()).http_status_code(),
            warp::http::StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::GatewayPermanent("invoice not found".into()).http_status_code(),
            warp::http::StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Internal("boom".into()).http_status_code(),
            warp::http::StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_detail_not_leaked() {
        let err = AppError::Internal("secret key missing at /etc/keys".into());
        assert_eq!(err.client_message(), "Internal server error");

        let err = AppError::GatewayTransient("connect error: 10.0.0.5:443".into());
        assert!(!err.client_message().contains("10.0.0.5"));
    }
}
