//! Route builders

use std::sync::Arc;
use warp::Filter;

use crate::application::confirm_service::ConfirmationService;
use crate::application::token_service::CsrfTokenService;
use crate::config::AppConfig;
use crate::http::handlers::{
    handle_confirm, handle_issue_token, handle_metrics, handle_search, handle_sync, SyncKind,
};
use crate::infrastructure::cart_store::{CartStore, IdentityProvider};
use crate::infrastructure::search_cache::SearchCache;
use crate::metrics::Metrics;
use crate::middleware::rate_limit::RateLimitMiddleware;

/// Token issuance and confirmation routes
pub struct ConfirmRoutes;

impl ConfirmRoutes {
    pub fn create_routes(
        config: AppConfig,
        tokens: Arc<CsrfTokenService>,
        service: Arc<ConfirmationService>,
        limiter: Arc<RateLimitMiddleware>,
        metrics: Arc<Metrics>,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let token = warp::path("csrf")
            .and(warp::path("token"))
            .and(warp::path::end())
            .and(warp::get())
            .and(with_arc(tokens))
            .and(with_arc(metrics))
            .and_then(handle_issue_token);

        let confirm = warp::path("payments")
            .and(warp::path("confirm"))
            .and(warp::path::end())
            .and(warp::post())
            .and(warp::body::content_length_limit(config.server.max_request_size as u64))
            .and(warp::body::json())
            .and(warp::header::optional::<String>("x-csrf-token"))
            .and(client_ip())
            .and(with_arc(service))
            .and(with_arc(limiter))
            .and(with_config(config))
            .and_then(handle_confirm);

        token.or(confirm)
    }
}

/// Cart and wishlist sync routes
pub struct SyncRoutes;

impl SyncRoutes {
    pub fn create_routes(
        config: AppConfig,
        identity: Arc<dyn IdentityProvider>,
        store: Arc<CartStore>,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let cart = Self::sync_route("cart", SyncKind::Cart, &config, identity.clone(), store.clone());
        let wishlist = Self::sync_route("wishlist", SyncKind::Wishlist, &config, identity, store);
        cart.or(wishlist)
    }

    fn sync_route(
        segment: &'static str,
        kind: SyncKind,
        config: &AppConfig,
        identity: Arc<dyn IdentityProvider>,
        store: Arc<CartStore>,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        warp::path("sync")
            .and(warp::path(segment))
            .and(warp::path::end())
            .and(warp::put())
            .and(warp::body::content_length_limit(config.server.max_request_size as u64))
            .and(warp::any().map(move || kind))
            .and(warp::body::json())
            .and(warp::header::optional::<String>("authorization"))
            .and(with_arc_dyn(identity))
            .and(with_arc(store))
            .and_then(handle_sync)
    }
}

/// Search route
pub struct SearchRoutes;

impl SearchRoutes {
    pub fn create_routes(
        cache: Arc<SearchCache>,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        warp::path("search")
            .and(warp::path::end())
            .and(warp::get())
            .and(warp::query::<std::collections::HashMap<String, String>>())
            .and(with_arc(cache))
            .and_then(handle_search)
    }
}

/// Metrics route
pub struct MetricsRoutes;

impl MetricsRoutes {
    pub fn create_routes(
        metrics: Arc<Metrics>,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        warp::path("metrics")
            .and(warp::path::end())
            .and(warp::get())
            .and(with_arc(metrics))
            .and_then(handle_metrics)
    }
}

/// Best-effort client IP from the proxy header
fn client_ip() -> impl Filter<Extract = (String,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>("x-forwarded-for").map(|header: Option<String>| {
        header
            .and_then(|h| h.split(',').next().map(|ip| ip.trim().to_string()))
            .filter(|ip| !ip.is_empty())
            .unwrap_or_else(|| "127.0.0.1".to_string())
    })
}

/// Helper to inject a shared service into a route
fn with_arc<T: Send + Sync + 'static>(
    value: Arc<T>,
) -> impl Filter<Extract = (Arc<T>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || value.clone())
}

fn with_arc_dyn(
    identity: Arc<dyn IdentityProvider>,
) -> impl Filter<Extract = (Arc<dyn IdentityProvider>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || identity.clone())
}

fn with_config(
    config: AppConfig,
) -> impl Filter<Extract = (AppConfig,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || config.clone())
}
