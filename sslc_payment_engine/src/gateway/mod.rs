//! The outbound gateway boundary.
//!
//! [`ValidationClient`] is the engine's view of the gateway's server-to-server APIs: the authoritative validation
//! lookup and the refund call. [`RestGatewayClient`] is the production implementation; the integration tests
//! substitute a scripted client. The engine guarantees at most one in-flight call per transaction by holding the
//! per-transaction lock across the call.

mod data_objects;
mod rest;

pub use data_objects::{RefundCall, RefundRecord, ValidationRecord};
pub use rest::RestGatewayClient;

use spg_common::Money;
use thiserror::Error;

#[allow(async_fn_in_trait)]
pub trait ValidationClient {
    /// Fetch the gateway's authoritative record for `val_id`.
    ///
    /// `expected_amount` is informational (logged on discrepancy); the amount comparison itself is the
    /// reconciliation engine's job.
    async fn validate(&self, val_id: &str, expected_amount: Money) -> Result<ValidationRecord, ValidationClientError>;

    /// Issue a refund against a settled transaction.
    async fn refund(&self, call: &RefundCall) -> Result<RefundRecord, ValidationClientError>;
}

#[derive(Debug, Error)]
pub enum ValidationClientError {
    /// A transport-level failure (connect, timeout, TLS). Retried with backoff before surfacing.
    #[error("The gateway request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("The gateway response could not be interpreted: {0}")]
    InvalidResponse(String),
    #[error("The gateway call failed after {0} attempts: {1}")]
    RetriesExhausted(u32, String),
}
