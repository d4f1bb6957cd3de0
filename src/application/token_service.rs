//! Anti-forgery token service
//!
//! Stateless issuance and validation of signed, self-contained tokens. There
//! is no server-side token store: validation recomputes the HS256 signature
//! and checks the embedded expiry, trading replay-window size for
//! scalability. Tokens are short-lived and only guard same-session requests.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::config::CsrfConfig;
use crate::error::{AppError, AppResult};

/// Signed token claims
#[derive(Debug, Serialize, Deserialize)]
pub struct CsrfClaims {
    /// Issuer
    pub iss: String,

    /// Issued at
    pub iat: usize,

    /// Expiration time
    pub exp: usize,

    /// Token ID
    pub jti: String,

    /// Random value bound into the signature
    pub nonce: String,
}

/// An issued anti-forgery token with its lifetime
#[derive(Debug, Clone, Serialize)]
pub struct IssuedCsrfToken {
    pub token: String,
    pub expires_in: u64,
}

/// Issues and validates anti-forgery tokens bound to the server secret
pub struct CsrfTokenService {
    config: CsrfConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl CsrfTokenService {
    pub fn new(config: CsrfConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret_key.as_ref());
        let decoding_key = DecodingKey::from_secret(config.secret_key.as_ref());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.issuer]);
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.leeway = 0;

        Self { config, encoding_key, decoding_key, validation }
    }

    /// Issue a fresh token. No side effects beyond randomness consumption.
    pub fn issue(&self) -> AppResult<IssuedCsrfToken> {
        let mut nonce = [0u8; 16];
        rand::rng().fill_bytes(&mut nonce);

        let now = Utc::now();
        let expires_at = now + Duration::seconds(self.config.token_lifetime_seconds as i64);

        let claims = CsrfClaims {
            iss: self.config.issuer.clone(),
            iat: now.timestamp() as usize,
            exp: expires_at.timestamp() as usize,
            jti: Uuid::new_v4().to_string(),
            nonce: hex::encode(nonce),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))?;

        Ok(IssuedCsrfToken { token, expires_in: self.config.token_lifetime_seconds })
    }

    /// Validate a token by recomputing its signature and checking expiry.
    ///
    /// Fails closed: any parse error, signature mismatch, or expiry violation
    /// yields `false`. Token contents are never logged.
    pub fn validate(&self, token: &str) -> bool {
        match decode::<CsrfClaims>(token, &self.decoding_key, &self.validation) {
            Ok(_) => true,
            Err(e) => {
                warn!(reason = %e.kind_description(), "Anti-forgery token rejected");
                false
            }
        }
    }
}

trait KindDescription {
    fn kind_description(&self) -> &'static str;
}

impl KindDescription for jsonwebtoken::errors::Error {
    fn kind_description(&self) -> &'static str {
        use jsonwebtoken::errors::ErrorKind;
        match self.kind() {
            ErrorKind::ExpiredSignature => "expired",
            ErrorKind::InvalidSignature => "signature mismatch",
            ErrorKind::InvalidIssuer => "issuer mismatch",
            _ => "malformed",
        }
    }
}
