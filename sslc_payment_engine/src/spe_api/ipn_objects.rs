use std::{collections::HashMap, fmt::Display};

use serde::{Deserialize, Serialize};
use spg_common::Money;

use crate::{db_types::TransactionId, traits::PaymentGatewayError};

/// The flat key/value payload the web layer hands us, exactly as the gateway POSTed it.
pub type IpnPayload = HashMap<String, String>;

/// A structurally valid notification. Parsed once at the boundary; the engine never handles the raw map again
/// except for signature recomputation and the audit copy.
#[derive(Debug, Clone)]
pub struct IpnNotification {
    pub tran_id: TransactionId,
    pub val_id: String,
    /// The amount the notification *claims*. Reconciliation compares against our own record, never this.
    pub claimed_amount: Money,
    /// The status string the notification claims ("VALID", "FAILED", "CANCELLED", ...).
    pub claimed_status: String,
    pub bank_tran_id: Option<String>,
    pub has_signature: bool,
    /// The full payload, retained verbatim for audit.
    pub raw: serde_json::Value,
}

impl IpnNotification {
    /// Structural validation of an inbound payload. Fails with [`PaymentGatewayError::MalformedNotification`]
    /// without touching any state; no external call is made for a payload that fails here.
    pub fn parse(payload: &IpnPayload) -> Result<Self, PaymentGatewayError> {
        let field = |name: &str| -> Result<String, PaymentGatewayError> {
            payload
                .get(name)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .ok_or_else(|| PaymentGatewayError::MalformedNotification(format!("missing required field `{name}`")))
        };
        let tran_id = TransactionId::from(field("tran_id")?);
        let val_id = field("val_id")?;
        let amount = field("amount")?;
        let claimed_amount = amount
            .parse::<Money>()
            .map_err(|e| PaymentGatewayError::MalformedNotification(format!("unparseable amount `{amount}`: {e}")))?;
        let claimed_status = field("status")?;
        let bank_tran_id = payload.get("bank_tran_id").map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let has_signature = payload.get("verify_sign").map(|s| !s.is_empty()).unwrap_or(false);
        let raw = serde_json::to_value(payload)
            .map_err(|e| PaymentGatewayError::MalformedNotification(format!("payload is not serializable: {e}")))?;
        Ok(Self { tran_id, val_id, claimed_amount, claimed_status, bank_tran_id, has_signature, raw })
    }
}

/// The terminal decision for one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disposition {
    ValidationSucceeded,
    ValidationFailed,
    AmountMismatch,
}

impl Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Disposition::ValidationSucceeded => "ValidationSucceeded",
            Disposition::ValidationFailed => "ValidationFailed",
            Disposition::AmountMismatch => "AmountMismatch",
        };
        write!(f, "{s}")
    }
}

/// What the web layer gets back from [`crate::PaymentFlowApi::reconcile_ipn`], and what the idempotency cache
/// stores per `(tran_id, val_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationOutcome {
    pub accepted: bool,
    pub tran_id: TransactionId,
    pub disposition: Disposition,
    pub detail: Option<String>,
}
