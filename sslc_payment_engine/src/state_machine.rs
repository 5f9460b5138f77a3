//! The transaction state machine.
//!
//! Every status change in the system is expressed as a [`TransitionEvent`] and resolved here against the
//! legal-transition table. Backends call [`next_status`] from their `apply_event` implementations; nothing else in
//! the codebase writes a transaction status.
//!
//! Transitions are idempotent: applying an event whose target state is the state the transaction is already in is a
//! success no-op, so redelivered gateway callbacks settle without error. Any pairing without an edge is rejected
//! with [`InvalidTransition`] and the transaction is left untouched.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use spg_common::Money;
use thiserror::Error;

use crate::db_types::TransactionStatus;

#[derive(Debug, Clone, Error)]
#[error("No legal transition from {from} on {event}")]
pub struct InvalidTransition {
    pub from: TransactionStatus,
    pub event: String,
}

/// The events that may be applied to a transaction.
///
/// The payload carries everything the backend needs to populate audit columns; none of it influences which edge is
/// taken except `fully_refunded` and the gateway status on a successful validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TransitionEvent {
    /// The gateway session was created and the customer was redirected to pay.
    SessionCreated { session_key: String },
    /// The IPN reconciled against the validation API.
    ValidationSucceeded {
        val_id: String,
        bank_tran_id: Option<String>,
        /// The status string the validation API reported ("VALID" or "VALIDATED").
        gateway_status: String,
        ipn: serde_json::Value,
        gateway_response: Option<serde_json::Value>,
    },
    /// The validation API reported the transaction invalid, or the call could not be completed.
    ValidationFailed { reason: String, ipn: Option<serde_json::Value> },
    /// The validation API reported an amount that does not reconcile with what is owed.
    AmountMismatch { expected: Money, actual: Money, ipn: serde_json::Value },
    /// The customer or merchant abandoned the payment.
    PaymentCancelled { reason: String },
    RefundSucceeded { refund_id: String, fully_refunded: bool },
    RefundFailed { refund_id: String, reason: String },
}

impl TransitionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TransitionEvent::SessionCreated { .. } => "SessionCreated",
            TransitionEvent::ValidationSucceeded { .. } => "ValidationSucceeded",
            TransitionEvent::ValidationFailed { .. } => "ValidationFailed",
            TransitionEvent::AmountMismatch { .. } => "AmountMismatch",
            TransitionEvent::PaymentCancelled { .. } => "PaymentCancelled",
            TransitionEvent::RefundSucceeded { .. } => "RefundSucceeded",
            TransitionEvent::RefundFailed { .. } => "RefundFailed",
        }
    }
}

impl Display for TransitionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Resolve the status a transaction moves to when `event` is applied in state `from`.
///
/// Returns the (possibly unchanged) target status, or [`InvalidTransition`] if the table has no edge for the
/// pairing.
pub fn next_status(from: TransactionStatus, event: &TransitionEvent) -> Result<TransactionStatus, InvalidTransition> {
    use TransactionStatus::*;
    let target = match (from, event) {
        (Pending, TransitionEvent::SessionCreated { .. }) => Processing,
        // Re-recording a session for a transaction already in flight is a no-op.
        (Processing, TransitionEvent::SessionCreated { .. }) => Processing,

        (Pending | Processing, TransitionEvent::ValidationSucceeded { gateway_status, .. }) => {
            if gateway_status.eq_ignore_ascii_case("VALIDATED") {
                Validated
            } else {
                Valid
            }
        },
        // Redelivery of the callback that produced the current state.
        (Valid, TransitionEvent::ValidationSucceeded { .. }) => Valid,
        (Validated, TransitionEvent::ValidationSucceeded { .. }) => Validated,

        (Pending | Processing | Failed, TransitionEvent::ValidationFailed { .. }) => Failed,
        (Pending | Processing | Failed, TransitionEvent::AmountMismatch { .. }) => Failed,

        (Pending | Processing | Cancelled, TransitionEvent::PaymentCancelled { .. }) => Cancelled,

        (Valid | Validated | PartiallyRefunded, TransitionEvent::RefundSucceeded { fully_refunded, .. }) => {
            if *fully_refunded {
                Refunded
            } else {
                PartiallyRefunded
            }
        },
        (Refunded, TransitionEvent::RefundSucceeded { fully_refunded: true, .. }) => Refunded,
        // A failed refund leaves the parent where it was.
        (s, TransitionEvent::RefundFailed { .. }) if s.is_refundable() => s,

        (from, event) => return Err(InvalidTransition { from, event: event.name().to_string() }),
    };
    Ok(target)
}
