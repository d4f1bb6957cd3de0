//! Prometheus metrics for the confirmation pipeline

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::error::{AppError, AppResult};

/// Metrics registry and instruments
pub struct Metrics {
    registry: Registry,
    confirm_outcomes: IntCounterVec,
    gateway_latency: Histogram,
    tokens_issued: IntCounter,
}

impl Metrics {
    pub fn new() -> AppResult<Self> {
        let registry = Registry::new();

        let confirm_outcomes = IntCounterVec::new(
            Opts::new("confirm_requests_total", "Confirmation requests by outcome"),
            &["outcome"],
        )
        .map_err(|e| AppError::Internal(format!("Failed to create metric: {}", e)))?;

        let gateway_latency = Histogram::with_opts(
            HistogramOpts::new("gateway_query_seconds", "Latency of gateway invoice queries")
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0]),
        )
        .map_err(|e| AppError::Internal(format!("Failed to create metric: {}", e)))?;

        let tokens_issued = IntCounter::new("csrf_tokens_issued_total", "Anti-forgery tokens issued")
            .map_err(|e| AppError::Internal(format!("Failed to create metric: {}", e)))?;

        registry
            .register(Box::new(confirm_outcomes.clone()))
            .and_then(|_| registry.register(Box::new(gateway_latency.clone())))
            .and_then(|_| registry.register(Box::new(tokens_issued.clone())))
            .map_err(|e| AppError::Internal(format!("Failed to register metric: {}", e)))?;

        Ok(Self { registry, confirm_outcomes, gateway_latency, tokens_issued })
    }

    pub fn record_confirm_outcome(&self, outcome: &str) {
        self.confirm_outcomes.with_label_values(&[outcome]).inc();
    }

    pub fn observe_gateway_latency(&self, seconds: f64) {
        self.gateway_latency.observe(seconds);
    }

    pub fn record_token_issued(&self) {
        self.tokens_issued.inc();
    }

    /// Render the registry in the Prometheus text exposition format
    pub fn render(&self) -> AppResult<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| AppError::Internal(format!("Failed to encode metrics: {}", e)))?;
        String::from_utf8(buffer).map_err(|e| AppError::Internal(format!("Metrics not UTF-8: {}", e)))
    }
}
