//! Confirmation pipeline
//!
//! Per-request state machine: token validation, invoice validation, gateway
//! query, normalization. Each invocation is independent and read-only against
//! the gateway, so repeated calls with the same invoice are safe from any
//! number of concurrent pollers. Order-completion side effects belong to a
//! downstream collaborator, never to this pipeline.

use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};

use crate::application::token_service::CsrfTokenService;
use crate::domain::invoice::InvoiceId;
use crate::domain::settlement::{normalize, ConfirmationResult, SettlementState};
use crate::error::{AppError, AppResult};
use crate::infrastructure::gateway::InvoiceGateway;
use crate::metrics::Metrics;

/// Orchestrates a single confirmation check
pub struct ConfirmationService {
    tokens: Arc<CsrfTokenService>,
    gateway: Arc<dyn InvoiceGateway>,
    metrics: Arc<Metrics>,
}

impl ConfirmationService {
    pub fn new(
        tokens: Arc<CsrfTokenService>,
        gateway: Arc<dyn InvoiceGateway>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { tokens, gateway, metrics }
    }

    /// Run the confirmation state machine for one request.
    ///
    /// The anti-forgery check runs before anything else; on failure the
    /// gateway is never contacted.
    #[instrument(skip(self, csrf_token))]
    pub async fn confirm(
        &self,
        csrf_token: Option<&str>,
        raw_invoice_id: &str,
    ) -> AppResult<ConfirmationResult> {
        match csrf_token {
            Some(token) if self.tokens.validate(token) => {}
            _ => {
                self.metrics.record_confirm_outcome("auth_failure");
                return Err(AppError::Authorization);
            }
        }

        let invoice = InvoiceId::parse(raw_invoice_id).map_err(|e| {
            self.metrics.record_confirm_outcome("validation_failure");
            e
        })?;

        let started = Instant::now();
        let query = self.gateway.query_invoice(&invoice).await;
        self.metrics.observe_gateway_latency(started.elapsed().as_secs_f64());

        match query {
            Ok(response) => {
                let state = normalize(&response);
                self.metrics.record_confirm_outcome(outcome_label(state));
                info!(invoice_id = %invoice, state = ?state, "Invoice status confirmed");

                let message = response
                    .message
                    .unwrap_or_else(|| default_message(state).to_string());
                Ok(ConfirmationResult::ok(state, message))
            }
            Err(e) if e.retryable => {
                self.metrics.record_confirm_outcome("gateway_transient");
                Err(AppError::GatewayTransient(e.message))
            }
            Err(e) => {
                self.metrics.record_confirm_outcome("gateway_permanent");
                Err(AppError::GatewayPermanent(e.message))
            }
        }
    }
}

/// Map a pipeline failure onto the uniform response envelope.
///
/// Settlement outcome stays orthogonal to query success: only a permanent
/// gateway rejection marks the invoice `Failed`; everything else is `Unknown`
/// so callers keep polling.
pub fn failure_result(err: &AppError) -> ConfirmationResult {
    let state = match err {
        AppError::GatewayPermanent(_) => SettlementState::Failed,
        _ => SettlementState::Unknown,
    };
    ConfirmationResult::failed(state, err.client_message())
}

fn outcome_label(state: SettlementState) -> &'static str {
    match state {
        SettlementState::Pending => "pending",
        SettlementState::Processing => "processing",
        SettlementState::Completed => "completed",
        SettlementState::Failed => "failed",
        SettlementState::Unknown => "unknown",
    }
}

fn default_message(state: SettlementState) -> &'static str {
    match state {
        SettlementState::Pending => "Awaiting payment",
        SettlementState::Processing => "Payment is being processed",
        SettlementState::Completed => "Payment completed",
        SettlementState::Failed => "Payment failed",
        SettlementState::Unknown => "Payment state could not be determined",
    }
}
