//! Polling client for the confirmation endpoint
//!
//! Repeatedly checks an invoice at a fixed interval until a terminal
//! settlement state or an overall deadline. Exceeding the deadline yields a
//! timed-out outcome distinct from failure: the payment may still settle
//! asynchronously on the gateway side. An expired session token mid-poll is
//! replaced by a fresh one, one refresh per rejection.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::PollingConfig;
use crate::domain::invoice::InvoiceId;
use crate::domain::settlement::ConfirmationResult;
use crate::error::{AppError, AppResult};

/// The confirmation call as seen by a polling client
#[async_trait]
pub trait ConfirmEndpoint: Send + Sync {
    async fn confirm(&self, invoice: &InvoiceId, csrf_token: &str) -> AppResult<ConfirmationResult>;
}

/// Supplies anti-forgery tokens, including mid-poll refreshes
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fresh_token(&self) -> AppResult<String>;
}

/// Final outcome of a polling run
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// A terminal settlement state was reached
    Terminal(ConfirmationResult),
    /// The budget elapsed without a terminal state. Not a failure: the
    /// outcome is unknown and the payment may still complete.
    TimedOut,
}

/// Drives the polling contract against any confirmation endpoint
pub struct ConfirmationPoller {
    config: PollingConfig,
}

impl ConfirmationPoller {
    pub fn new(config: PollingConfig) -> Self {
        Self { config }
    }

    /// Poll until terminal state or deadline.
    ///
    /// Transient failures (gateway unavailable, internal hiccups) consume an
    /// interval and retry; validation failures abort immediately since
    /// repeating a malformed request cannot succeed.
    pub async fn poll(
        &self,
        endpoint: &dyn ConfirmEndpoint,
        tokens: &dyn TokenSource,
        invoice: &InvoiceId,
    ) -> AppResult<PollOutcome> {
        let interval = Duration::from_secs(self.config.interval_seconds);
        let deadline =
            tokio::time::Instant::now() + Duration::from_secs(self.config.overall_timeout_seconds);

        let mut token = tokens.fresh_token().await?;

        loop {
            match endpoint.confirm(invoice, &token).await {
                Ok(result) if result.state.is_terminal() => {
                    info!(invoice_id = %invoice, state = ?result.state, "Polling reached terminal state");
                    return Ok(PollOutcome::Terminal(result));
                }
                Ok(result) => {
                    debug!(invoice_id = %invoice, state = ?result.state, "Polling continues");
                }
                Err(AppError::Authorization) => {
                    debug!(invoice_id = %invoice, "Session token rejected mid-poll, refreshing");
                    token = tokens.fresh_token().await?;
                }
                Err(e @ AppError::Validation(_)) => return Err(e),
                Err(e) => {
                    warn!(invoice_id = %invoice, error = %e, "Poll attempt failed, will retry");
                }
            }

            if tokio::time::Instant::now() + interval > deadline {
                info!(invoice_id = %invoice, "Polling budget exhausted without terminal state");
                return Ok(PollOutcome::TimedOut);
            }
            tokio::time::sleep(interval).await;
        }
    }
}
