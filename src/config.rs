//! Configuration management module
//!
//! Handles loading, validation, and access to application settings. Settings
//! come from an optional `Conf` file merged with `STOREFRONT__`-prefixed
//! environment variables.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use validator::Validate;

/// Payment gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GatewayConfig {
    /// Base URL of the gateway's invoice-status API
    #[validate(url)]
    pub base_url: String,

    /// API key sent as a bearer credential
    #[validate(length(min = 1))]
    pub api_key: String,

    /// Request timeout in seconds; bounds the only blocking call in the
    /// confirmation pipeline, distinct from the polling client's budget
    #[validate(range(min = 1, max = 300))]
    pub timeout_seconds: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9750".to_string(),
            api_key: "gateway-api-key".to_string(),
            timeout_seconds: 10,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    /// Server address to bind to
    pub bind_address: IpAddr,

    /// Server port
    #[validate(range(min = 1, max = 65535))]
    pub port: u16,

    /// Maximum request size in bytes
    #[validate(range(min = 1024, max = 10485760))] // 1KB to 10MB
    pub max_request_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".parse().unwrap(),
            port: 8080,
            max_request_size: 64 * 1024,
        }
    }
}

/// Anti-forgery token configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CsrfConfig {
    /// Signing secret for anti-forgery tokens
    #[validate(length(min = 32))]
    pub secret_key: String,

    /// Token lifetime in seconds. Must exceed the polling budget so a token
    /// issued at checkout survives the whole poll, or be refreshed mid-poll.
    #[validate(range(min = 60, max = 86400))]
    pub token_lifetime_seconds: u64,

    /// Token issuer claim
    #[validate(length(min = 1))]
    pub issuer: String,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            secret_key: "storefront-csrf-secret-key-at-least-32-chars".to_string(),
            token_lifetime_seconds: 900, // 15 minutes
            issuer: "storefront-confirm".to_string(),
        }
    }
}

/// Security configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SecurityConfig {
    /// Enable request logging
    pub enable_request_logging: bool,

    /// Anti-forgery token settings
    #[validate(nested)]
    pub csrf: CsrfConfig,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_request_logging: true,
            csrf: CsrfConfig::default(),
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RateLimitConfig {
    /// Requests per minute per IP
    #[validate(range(min = 1, max = 10000))]
    pub requests_per_minute: u32,

    /// Burst size
    #[validate(range(min = 1, max = 1000))]
    pub burst_size: u32,

    /// Enable rate limiting
    pub enabled: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 120,
            burst_size: 20,
            enabled: true,
        }
    }
}

/// Search cache configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SearchCacheConfig {
    /// Enable caching
    pub enabled: bool,

    /// Redis connection URL; memory fallback is used when unreachable
    pub redis_url: String,

    /// Freshness window in seconds
    #[validate(range(min = 1, max = 3600))]
    pub fresh_ttl_seconds: u64,

    /// Stale-while-revalidate grace in seconds, added on top of the
    /// freshness window
    #[validate(range(min = 0, max = 86400))]
    pub stale_grace_seconds: u64,

    /// Maximum result-count limit a client may request
    #[validate(range(min = 1, max = 500))]
    pub max_limit: usize,
}

impl Default for SearchCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            fresh_ttl_seconds: 60,
            stale_grace_seconds: 300,
            max_limit: 100,
        }
    }
}

/// Polling contract configuration, consumed by library clients of the
/// confirmation endpoint
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PollingConfig {
    /// Fixed interval between polls in seconds
    #[validate(range(min = 1, max = 60))]
    pub interval_seconds: u64,

    /// Overall budget before the outcome is reported as unknown
    #[validate(range(min = 10, max = 1800))]
    pub overall_timeout_seconds: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 4,
            overall_timeout_seconds: 180,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoggingConfig {
    /// Log level
    #[validate(length(min = 1))]
    pub level: String,

    /// Enable structured logging
    pub structured: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            structured: true,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Payment gateway configuration
    pub gateway: GatewayConfig,

    /// Server configuration
    pub server: ServerConfig,

    /// Security configuration
    pub security: SecurityConfig,

    /// Rate limiting configuration
    pub rate_limit: RateLimitConfig,

    /// Search cache configuration
    pub search_cache: SearchCacheConfig,

    /// Polling contract configuration
    pub polling: PollingConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> crate::error::AppResult<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("Conf").required(false))
            .add_source(config::Environment::with_prefix("STOREFRONT").separator("__"))
            .build()
            .map_err(|e| crate::error::AppError::Config(format!("Failed to build configuration: {}", e)))?;

        let config: AppConfig = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(format!("Failed to deserialize configuration: {}", e)))?;

        config
            .validate_config()
            .map_err(|e| crate::error::AppError::Validation(format!("Configuration validation failed: {}", e)))?;

        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate_config(&self) -> Result<(), validator::ValidationErrors> {
        self.gateway.validate()?;
        self.server.validate()?;
        self.security.validate()?;
        self.rate_limit.validate()?;
        self.search_cache.validate()?;
        self.polling.validate()?;
        self.logging.validate()?;

        Ok(())
    }

    /// Get server address as string
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }
}
