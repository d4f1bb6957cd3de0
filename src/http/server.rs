//! Main server implementation

use std::sync::Arc;
use tracing::{info, instrument};
use warp::{Filter, Reply};

use crate::application::confirm_service::ConfirmationService;
use crate::application::token_service::CsrfTokenService;
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::http::handlers::handle_rejection;
use crate::http::routes::{ConfirmRoutes, MetricsRoutes, SearchRoutes, SyncRoutes};
use crate::infrastructure::cart_store::{CartStore, SessionIdentityProvider};
use crate::infrastructure::gateway::{HttpInvoiceGateway, InvoiceGateway};
use crate::infrastructure::search_cache::{SearchBackend, SearchCache, StaticCatalogBackend};
use crate::metrics::Metrics;
use crate::middleware::rate_limit::RateLimitMiddleware;

/// Storefront confirmation server
pub struct ConfirmServer {
    config: AppConfig,
    tokens: Arc<CsrfTokenService>,
    service: Arc<ConfirmationService>,
    metrics: Arc<Metrics>,
    limiter: Arc<RateLimitMiddleware>,
    identity: Arc<SessionIdentityProvider>,
    cart_store: Arc<CartStore>,
    search: Arc<SearchCache>,
}

impl ConfirmServer {
    /// Create a new server instance with the live gateway client
    pub async fn new(config: AppConfig) -> AppResult<Self> {
        let gateway = Arc::new(HttpInvoiceGateway::new(config.gateway.clone())?);
        let backend = Arc::new(StaticCatalogBackend::new(vec![]));
        Self::with_adapters(config, gateway, backend).await
    }

    /// Assemble the server with injected adapters
    pub async fn with_adapters(
        config: AppConfig,
        gateway: Arc<dyn InvoiceGateway>,
        search_backend: Arc<dyn SearchBackend>,
    ) -> AppResult<Self> {
        let metrics = Arc::new(Metrics::new()?);
        let tokens = Arc::new(CsrfTokenService::new(config.security.csrf.clone()));
        let service = Arc::new(ConfirmationService::new(tokens.clone(), gateway, metrics.clone()));
        let limiter = Arc::new(RateLimitMiddleware::new(&config.rate_limit));
        let search = Arc::new(SearchCache::new(config.search_cache.clone(), search_backend).await);

        Ok(Self {
            config,
            tokens,
            service,
            metrics,
            limiter,
            identity: Arc::new(SessionIdentityProvider::new()),
            cart_store: Arc::new(CartStore::new()),
            search,
        })
    }

    /// Get a reference to the configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Session table used to gate the cart/wishlist sync endpoints
    pub fn identity(&self) -> Arc<SessionIdentityProvider> {
        self.identity.clone()
    }

    /// Run the server
    #[instrument(skip(self))]
    pub async fn run(self) -> AppResult<()> {
        let addr = self.config.server_address();
        info!("Starting server on {}", addr);

        let addr: std::net::SocketAddr = addr
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid server address: {}", e)))?;

        let routes = self.create_routes();

        warp::serve(routes).run(addr).await;

        Ok(())
    }

    /// Create the application routes
    pub fn create_routes(
        &self,
    ) -> impl Filter<Extract = impl Reply, Error = std::convert::Infallible> + Clone {
        let confirm = ConfirmRoutes::create_routes(
            self.config.clone(),
            self.tokens.clone(),
            self.service.clone(),
            self.limiter.clone(),
            self.metrics.clone(),
        );
        let sync = SyncRoutes::create_routes(
            self.config.clone(),
            self.identity.clone(),
            self.cart_store.clone(),
        );
        let search = SearchRoutes::create_routes(self.search.clone());
        let metrics = MetricsRoutes::create_routes(self.metrics.clone());

        let health = warp::path("health")
            .and(warp::path::end())
            .and(warp::get())
            .map(|| warp::reply::json(&serde_json::json!({"status": "healthy"})));

        confirm
            .or(sync)
            .or(search)
            .or(metrics)
            .or(health)
            .recover(handle_rejection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::invoice::{GatewayInvoiceStatus, InvoiceId};
    use crate::domain::settlement::{ConfirmationResult, SettlementState};
    use crate::http::models::CsrfTokenResponse;
    use crate::infrastructure::gateway::GatewayError;
    use crate::infrastructure::search_cache::CatalogEntry;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockGateway {
        response: Result<GatewayInvoiceStatus, GatewayError>,
        calls: AtomicUsize,
    }

    impl MockGateway {
        fn reporting(status: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Ok(GatewayInvoiceStatus {
                    status: status.to_string(),
                    message: None,
                    raw_code: None,
                }),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(err: GatewayError) -> Arc<Self> {
            Arc::new(Self { response: Err(err), calls: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl InvoiceGateway for MockGateway {
        async fn query_invoice(
            &self,
            _id: &InvoiceId,
        ) -> Result<GatewayInvoiceStatus, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.clone()
        }
    }

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        // Keep tests off any local Redis instance
        config.search_cache.redis_url = "redis://127.0.0.1:1".to_string();
        config
    }

    async fn server_with(gateway: Arc<MockGateway>) -> ConfirmServer {
        let backend = Arc::new(StaticCatalogBackend::new(vec![
            CatalogEntry { product_id: "p1".into(), title: "Espresso Machine".into() },
            CatalogEntry { product_id: "p2".into(), title: "Milk Frother".into() },
        ]));
        ConfirmServer::with_adapters(test_config(), gateway, backend).await.unwrap()
    }

    async fn issue_token(server: &ConfirmServer) -> String {
        let routes = server.create_routes();
        let resp = warp::test::request()
            .method("GET")
            .path("/csrf/token")
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), 200);
        let body: CsrfTokenResponse = serde_json::from_slice(resp.body()).unwrap();
        assert!(!body.csrf_token.is_empty());
        body.csrf_token
    }

    #[tokio::test]
    async fn test_processing_invoice_confirmed() {
        let server = server_with(MockGateway::reporting("processing")).await;
        let routes = server.create_routes();
        let token = issue_token(&server).await;

        let resp = warp::test::request()
            .method("POST")
            .path("/payments/confirm")
            .header("x-csrf-token", token)
            .json(&serde_json::json!({"invoiceId": "inv_1"}))
            .reply(&routes)
            .await;

        assert_eq!(resp.status(), 200);
        let body: ConfirmationResult = serde_json::from_slice(resp.body()).unwrap();
        assert!(body.success);
        assert_eq!(body.state, SettlementState::Processing);
    }

    #[tokio::test]
    async fn test_missing_token_rejected_without_gateway_call() {
        let gateway = MockGateway::reporting("completed");
        let server = server_with(gateway.clone()).await;
        let routes = server.create_routes();

        let resp = warp::test::request()
            .method("POST")
            .path("/payments/confirm")
            .json(&serde_json::json!({"invoiceId": "inv_1"}))
            .reply(&routes)
            .await;

        assert_eq!(resp.status(), 401);
        let body: ConfirmationResult = serde_json::from_slice(resp.body()).unwrap();
        assert!(!body.success);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_forged_token_rejected() {
        let gateway = MockGateway::reporting("completed");
        let server = server_with(gateway.clone()).await;
        let routes = server.create_routes();

        let resp = warp::test::request()
            .method("POST")
            .path("/payments/confirm")
            .header("x-csrf-token", "forged.token.value")
            .json(&serde_json::json!({"invoiceId": "inv_1"}))
            .reply(&routes)
            .await;

        assert_eq!(resp.status(), 401);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_invoice_id_is_bad_request() {
        let server = server_with(MockGateway::reporting("completed")).await;
        let routes = server.create_routes();
        let token = issue_token(&server).await;

        let resp = warp::test::request()
            .method("POST")
            .path("/payments/confirm")
            .header("x-csrf-token", token)
            .json(&serde_json::json!({"invoiceId": ""}))
            .reply(&routes)
            .await;

        assert_eq!(resp.status(), 400);
        let body: ConfirmationResult = serde_json::from_slice(resp.body()).unwrap();
        assert!(!body.success);
        assert!(body.message.contains("invoiceId"));
    }

    #[tokio::test]
    async fn test_gateway_timeout_is_bad_gateway() {
        let server = server_with(MockGateway::failing(GatewayError::transient("timed out"))).await;
        let routes = server.create_routes();
        let token = issue_token(&server).await;

        let resp = warp::test::request()
            .method("POST")
            .path("/payments/confirm")
            .header("x-csrf-token", token)
            .json(&serde_json::json!({"invoiceId": "inv_1"}))
            .reply(&routes)
            .await;

        assert_eq!(resp.status(), 502);
        let body: ConfirmationResult = serde_json::from_slice(resp.body()).unwrap();
        assert!(!body.success);
        assert_eq!(body.state, SettlementState::Unknown);
        assert!(body.message.contains("retry"));
    }

    #[tokio::test]
    async fn test_completed_invoice_is_idempotent() {
        let gateway = MockGateway::reporting("completed");
        let server = server_with(gateway.clone()).await;
        let routes = server.create_routes();
        let token = issue_token(&server).await;

        let mut bodies = Vec::new();
        for _ in 0..2 {
            let resp = warp::test::request()
                .method("POST")
                .path("/payments/confirm")
                .header("x-csrf-token", token.clone())
                .json(&serde_json::json!({"invoiceId": "inv_1"}))
                .reply(&routes)
                .await;
            assert_eq!(resp.status(), 200);
            bodies.push(serde_json::from_slice::<ConfirmationResult>(resp.body()).unwrap());
        }

        assert_eq!(bodies[0], bodies[1]);
        assert_eq!(bodies[0].state, SettlementState::Completed);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invoice_not_found_maps_to_failed() {
        let server =
            server_with(MockGateway::failing(GatewayError::permanent("invoice not found"))).await;
        let routes = server.create_routes();
        let token = issue_token(&server).await;

        let resp = warp::test::request()
            .method("POST")
            .path("/payments/confirm")
            .header("x-csrf-token", token)
            .json(&serde_json::json!({"invoiceId": "inv_404"}))
            .reply(&routes)
            .await;

        assert_eq!(resp.status(), 400);
        let body: ConfirmationResult = serde_json::from_slice(resp.body()).unwrap();
        assert!(!body.success);
        assert_eq!(body.state, SettlementState::Failed);
    }

    #[tokio::test]
    async fn test_malformed_body_gets_envelope() {
        let server = server_with(MockGateway::reporting("completed")).await;
        let routes = server.create_routes();
        let token = issue_token(&server).await;

        let resp = warp::test::request()
            .method("POST")
            .path("/payments/confirm")
            .header("x-csrf-token", token)
            .header("content-type", "application/json")
            .body("{not json")
            .reply(&routes)
            .await;

        assert_eq!(resp.status(), 400);
        let body: ConfirmationResult = serde_json::from_slice(resp.body()).unwrap();
        assert!(!body.success);
        assert_eq!(body.state, SettlementState::Unknown);
    }

    #[tokio::test]
    async fn test_oversized_body_gets_envelope() {
        let server = server_with(MockGateway::reporting("completed")).await;
        let routes = server.create_routes();

        let resp = warp::test::request()
            .method("POST")
            .path("/payments/confirm")
            .body("x".repeat(70 * 1024))
            .reply(&routes)
            .await;

        assert_eq!(resp.status(), 413);
        let body: ConfirmationResult = serde_json::from_slice(resp.body()).unwrap();
        assert!(!body.success);
    }

    #[tokio::test]
    async fn test_unknown_path_gets_envelope() {
        let server = server_with(MockGateway::reporting("completed")).await;
        let routes = server.create_routes();

        let resp = warp::test::request().method("GET").path("/nope").reply(&routes).await;
        assert_eq!(resp.status(), 404);
        let body: ConfirmationResult = serde_json::from_slice(resp.body()).unwrap();
        assert!(!body.success);
    }

    #[tokio::test]
    async fn test_cart_sync_requires_session() {
        let server = server_with(MockGateway::reporting("pending")).await;
        server.identity().register_session("sess-1", "u1").await;
        let routes = server.create_routes();

        let items = serde_json::json!({"items": [{"product_id": "p1", "quantity": 2}]});

        let resp = warp::test::request()
            .method("PUT")
            .path("/sync/cart")
            .json(&items)
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), 401);

        let resp = warp::test::request()
            .method("PUT")
            .path("/sync/cart")
            .header("authorization", "Bearer sess-1")
            .json(&items)
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn test_search_route() {
        let server = server_with(MockGateway::reporting("pending")).await;
        let routes = server.create_routes();

        let resp = warp::test::request()
            .method("GET")
            .path("/search?q=espresso&limit=5")
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body["results"][0]["product_id"], "p1");

        let resp = warp::test::request().method("GET").path("/search").reply(&routes).await;
        assert_eq!(resp.status(), 400);
    }

    #[tokio::test]
    async fn test_health_and_metrics_routes() {
        let server = server_with(MockGateway::reporting("pending")).await;
        let routes = server.create_routes();

        let resp = warp::test::request().method("GET").path("/health").reply(&routes).await;
        assert_eq!(resp.status(), 200);

        let resp = warp::test::request().method("GET").path("/metrics").reply(&routes).await;
        assert_eq!(resp.status(), 200);
    }
}
