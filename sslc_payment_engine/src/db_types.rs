//! Core data types for the payment engine.
//!
//! These are the records that backends persist and the engine mutates. `amount` and `currency` on a
//! [`Transaction`] are immutable after creation; `status` only ever changes via the state machine in
//! [`crate::state_machine`].

use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spg_common::Money;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------    TransactionId    ---------------------------------------------------------
/// The merchant-assigned transaction identifier (`tran_id`). Correlates a payment attempt with gateway callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub String);

impl FromStr for TransactionId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl<S: Into<String>> From<S> for TransactionId {
    fn from(s: S) -> Self {
        Self(s.into())
    }
}

impl Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl TransactionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------      Currency       ---------------------------------------------------------
/// Currencies the gateway settles in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Currency {
    Bdt,
    Usd,
    Eur,
    Gbp,
    Jpy,
}

impl Default for Currency {
    fn default() -> Self {
        Self::Bdt
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            Currency::Bdt => "BDT",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Jpy => "JPY",
        };
        write!(f, "{code}")
    }
}

impl FromStr for Currency {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BDT" => Ok(Self::Bdt),
            "USD" => Ok(Self::Usd),
            "EUR" => Ok(Self::Eur),
            "GBP" => Ok(Self::Gbp),
            "JPY" => Ok(Self::Jpy),
            s => Err(ConversionError(format!("Unsupported currency: {s}"))),
        }
    }
}

//--------------------------------------  TransactionStatus  ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Newly created; no gateway session or callback seen yet.
    Pending,
    /// A gateway session exists; we are waiting for the customer / the IPN.
    Processing,
    /// The IPN reconciled successfully against the validation API.
    Valid,
    /// As `Valid`, but the gateway reported the transaction as already validated on a prior attempt.
    Validated,
    /// Validation failed, or the amounts did not reconcile.
    Failed,
    /// The customer or the merchant abandoned the payment.
    Cancelled,
    /// The full captured amount has been refunded. Terminal.
    Refunded,
    /// Some, but not all, of the captured amount has been refunded.
    PartiallyRefunded,
}

impl TransactionStatus {
    /// A successful payment that has not yet been fully refunded can accept refunds.
    pub fn is_refundable(&self) -> bool {
        matches!(self, Self::Valid | Self::Validated | Self::PartiallyRefunded)
    }

    pub fn is_successful(&self) -> bool {
        matches!(self, Self::Valid | Self::Validated)
    }
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransactionStatus::Pending => "Pending",
            TransactionStatus::Processing => "Processing",
            TransactionStatus::Valid => "Valid",
            TransactionStatus::Validated => "Validated",
            TransactionStatus::Failed => "Failed",
            TransactionStatus::Cancelled => "Cancelled",
            TransactionStatus::Refunded => "Refunded",
            TransactionStatus::PartiallyRefunded => "PartiallyRefunded",
        };
        write!(f, "{s}")
    }
}

impl FromStr for TransactionStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Processing" => Ok(Self::Processing),
            "Valid" => Ok(Self::Valid),
            "Validated" => Ok(Self::Validated),
            "Failed" => Ok(Self::Failed),
            "Cancelled" => Ok(Self::Cancelled),
            "Refunded" => Ok(Self::Refunded),
            "PartiallyRefunded" => Ok(Self::PartiallyRefunded),
            s => Err(ConversionError(format!("Invalid transaction status: {s}"))),
        }
    }
}

//--------------------------------------     Transaction     ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub tran_id: TransactionId,
    /// Assigned by the gateway once a session exists; the key for authoritative validation lookups.
    pub val_id: Option<String>,
    /// Settlement-network reference. Informational, but required for issuing refunds.
    pub bank_tran_id: Option<String>,
    /// The authoritative amount owed. Never mutated by IPN processing, only compared against.
    pub amount: Money,
    pub currency: Currency,
    pub status: TransactionStatus,
    /// Incremented by exactly one per authoritative validation call.
    pub validation_attempts: u32,
    /// The most recently accepted raw notification, retained for audit.
    pub last_ipn: Option<serde_json::Value>,
    /// The most recent validation API response, retained for audit.
    pub gateway_response: Option<serde_json::Value>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_validation_at: Option<DateTime<Utc>>,
}

//--------------------------------------    NewTransaction   ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub tran_id: TransactionId,
    pub amount: Money,
    pub currency: Currency,
}

impl NewTransaction {
    pub fn new(tran_id: TransactionId, amount: Money, currency: Currency) -> Self {
        Self { tran_id, amount, currency }
    }
}

//--------------------------------------     RefundStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefundStatus {
    Pending,
    Processing,
    Succeeded,
    Failed,
}

impl Display for RefundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RefundStatus::Pending => "Pending",
            RefundStatus::Processing => "Processing",
            RefundStatus::Succeeded => "Succeeded",
            RefundStatus::Failed => "Failed",
        };
        write!(f, "{s}")
    }
}

//--------------------------------------  RefundTransaction  ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundTransaction {
    pub refund_id: String,
    pub tran_id: TransactionId,
    pub amount: Money,
    pub reason: String,
    pub status: RefundStatus,
    /// Raw gateway refund response, retained for audit.
    pub gateway_response: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

//--------------------------------------      NewRefund      ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewRefund {
    /// Caller-assigned idempotency key for the refund.
    pub refund_id: String,
    pub tran_id: TransactionId,
    pub amount: Money,
    pub reason: String,
}

impl NewRefund {
    pub fn new(refund_id: impl Into<String>, tran_id: TransactionId, amount: Money, reason: impl Into<String>) -> Self {
        Self { refund_id: refund_id.into(), tran_id, amount, reason: reason.into() }
    }
}
