use serde::{Deserialize, Serialize};
use spg_common::Money;

use crate::db_types::TransactionId;

/// Published when an IPN reconciles successfully and the transaction reaches `Valid`/`Validated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSucceededEvent {
    pub tran_id: TransactionId,
    pub amount: Money,
}

impl PaymentSucceededEvent {
    pub fn new(tran_id: TransactionId, amount: Money) -> Self {
        Self { tran_id, amount }
    }
}

/// Published when reconciliation decides against the payment, whatever the cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFailedEvent {
    pub tran_id: TransactionId,
    pub reason: String,
}

impl PaymentFailedEvent {
    pub fn new(tran_id: TransactionId, reason: impl Into<String>) -> Self {
        Self { tran_id, reason: reason.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundSucceededEvent {
    pub refund_id: String,
}

impl RefundSucceededEvent {
    pub fn new(refund_id: impl Into<String>) -> Self {
        Self { refund_id: refund_id.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundFailedEvent {
    pub refund_id: String,
    pub reason: String,
}

impl RefundFailedEvent {
    pub fn new(refund_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { refund_id: refund_id.into(), reason: reason.into() }
    }
}
