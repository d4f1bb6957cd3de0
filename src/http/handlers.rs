//! HTTP handlers
//!
//! Every handler converts service results into the uniform JSON envelopes of
//! the external interface; no error escapes as an unhandled rejection.

use std::sync::Arc;
use tracing::{error, info};
use warp::Reply;

use crate::application::confirm_service::{failure_result, ConfirmationService};
use crate::application::token_service::CsrfTokenService;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::http::models::{
    ConfirmRequest, CsrfTokenResponse, RequestContext, SearchResponse, SyncRequest, SyncResponse,
};
use crate::infrastructure::cart_store::{CartStore, IdentityProvider};
use crate::infrastructure::search_cache::SearchCache;
use crate::metrics::Metrics;
use crate::middleware::rate_limit::RateLimitMiddleware;

/// `GET /csrf/token`
pub async fn handle_issue_token(
    tokens: Arc<CsrfTokenService>,
    metrics: Arc<Metrics>,
) -> Result<impl Reply, warp::reject::Rejection> {
    match tokens.issue() {
        Ok(issued) => {
            metrics.record_token_issued();
            Ok(warp::reply::with_status(
                warp::reply::json(&CsrfTokenResponse {
                    csrf_token: issued.token,
                    expires_in: issued.expires_in,
                }),
                warp::http::StatusCode::OK,
            ))
        }
        Err(e) => {
            error!(error = %e, "Token issuance failed");
            Ok(warp::reply::with_status(
                warp::reply::json(&serde_json::json!({ "error": e.client_message() })),
                e.http_status_code(),
            ))
        }
    }
}

/// `POST /payments/confirm`
pub async fn handle_confirm(
    body: ConfirmRequest,
    csrf_token: Option<String>,
    client_ip: String,
    service: Arc<ConfirmationService>,
    limiter: Arc<RateLimitMiddleware>,
    config: AppConfig,
) -> Result<impl Reply, warp::reject::Rejection> {
    let context = RequestContext::new(client_ip);

    if let Err(e) = limiter.check(&context.client_ip) {
        return Ok(warp::reply::with_status(
            warp::reply::json(&failure_result(&e)),
            e.http_status_code(),
        ));
    }

    if config.security.enable_request_logging {
        info!(
            request_id = %context.request_id,
            client_ip = %context.client_ip,
            "Processing confirmation request"
        );
    }

    let response = match service.confirm(csrf_token.as_deref(), &body.invoice_id).await {
        Ok(result) => warp::reply::with_status(
            warp::reply::json(&result),
            warp::http::StatusCode::OK,
        ),
        Err(e) => {
            if config.security.enable_request_logging {
                info!(request_id = %context.request_id, error = %e, "Confirmation request failed");
            }
            warp::reply::with_status(warp::reply::json(&failure_result(&e)), e.http_status_code())
        }
    };
    Ok(response)
}

/// `PUT /sync/cart` and `PUT /sync/wishlist`
pub async fn handle_sync(
    kind: SyncKind,
    body: SyncRequest,
    auth_header: Option<String>,
    identity: Arc<dyn IdentityProvider>,
    store: Arc<CartStore>,
) -> Result<impl Reply, warp::reject::Rejection> {
    let user_id = match authenticated_user(auth_header.as_deref(), identity.as_ref()).await {
        Some(user_id) => user_id,
        None => {
            let e = AppError::Authorization;
            return Ok(warp::reply::with_status(
                warp::reply::json(&serde_json::json!({ "error": e.client_message() })),
                e.http_status_code(),
            ));
        }
    };

    let count = body.items.len();
    let result = match kind {
        SyncKind::Cart => store.put_cart(&user_id, body.items).await,
        SyncKind::Wishlist => store.put_wishlist(&user_id, body.items).await,
    };

    let response = match result {
        Ok(()) => warp::reply::with_status(
            warp::reply::json(&SyncResponse { success: true, count }),
            warp::http::StatusCode::OK,
        ),
        Err(e) => warp::reply::with_status(
            warp::reply::json(&serde_json::json!({ "error": e.client_message() })),
            e.http_status_code(),
        ),
    };
    Ok(response)
}

/// Which overwrite store a sync request targets
#[derive(Debug, Clone, Copy)]
pub enum SyncKind {
    Cart,
    Wishlist,
}

async fn authenticated_user(
    auth_header: Option<&str>,
    identity: &dyn IdentityProvider,
) -> Option<String> {
    let token = auth_header?.strip_prefix("Bearer ")?;
    identity.authenticate(token).await
}

/// `GET /search?q=&limit=`
pub async fn handle_search(
    params: std::collections::HashMap<String, String>,
    cache: Arc<SearchCache>,
) -> Result<impl Reply, warp::reject::Rejection> {
    let query = match params.get("q").map(|q| q.trim()).filter(|q| !q.is_empty()) {
        Some(q) => q.to_string(),
        None => {
            return Ok(warp::reply::with_status(
                warp::reply::json(&serde_json::json!({ "error": "query parameter q is required" })),
                warp::http::StatusCode::BAD_REQUEST,
            ));
        }
    };
    let limit = params.get("limit").and_then(|l| l.parse::<usize>().ok()).unwrap_or(20);

    let response = match cache.query(&query, limit).await {
        Ok((results, disposition)) => warp::reply::with_status(
            warp::reply::json(&SearchResponse { query, cache: disposition, results }),
            warp::http::StatusCode::OK,
        ),
        Err(e) => {
            error!(error = %e, "Search failed");
            warp::reply::with_status(
                warp::reply::json(&serde_json::json!({ "error": e.client_message() })),
                e.http_status_code(),
            )
        }
    };
    Ok(response)
}

/// Map filter-level rejections onto the uniform JSON envelope.
///
/// Body parse failures and oversized payloads never reach a handler, so they
/// are converted here instead of escaping as warp's plain-text rejections.
pub async fn handle_rejection(
    rejection: warp::Rejection,
) -> Result<impl Reply, std::convert::Infallible> {
    use warp::http::StatusCode;

    let (status, error) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, AppError::Validation("resource not found".to_string()))
    } else if rejection.find::<warp::filters::body::BodyDeserializeError>().is_some() {
        (
            StatusCode::BAD_REQUEST,
            AppError::Validation("request body could not be parsed".to_string()),
        )
    } else if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Validation("request body too large".to_string()),
        )
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            AppError::Validation("method not allowed".to_string()),
        )
    } else if let Some(e) = rejection.find::<AppError>() {
        (e.http_status_code(), e.clone())
    } else {
        error!(?rejection, "Unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, AppError::Internal("unhandled rejection".to_string()))
    };

    Ok(warp::reply::with_status(warp::reply::json(&failure_result(&error)), status))
}

/// `GET /metrics`
pub async fn handle_metrics(
    metrics: Arc<Metrics>,
) -> Result<impl Reply, warp::reject::Rejection> {
    match metrics.render() {
        Ok(body) => Ok(warp::reply::with_status(body, warp::http::StatusCode::OK)),
        Err(e) => {
            error!(error = %e, "Metrics rendering failed");
            Ok(warp::reply::with_status(
                String::new(),
                warp::http::StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}
