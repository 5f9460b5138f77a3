use spg_common::Money;
use thiserror::Error;

use crate::{
    db_types::{NewRefund, NewTransaction, RefundStatus, RefundTransaction, Transaction, TransactionId, TransactionStatus},
    gateway::ValidationClientError,
    spe_api::ReconciliationOutcome,
    state_machine::{InvalidTransition, TransitionEvent},
};

/// The storage contract for payment engine backends.
///
/// Backends are required to make `apply_event` the only mutator of a transaction's status, and to resolve the
/// transition through [`crate::state_machine::next_status`] so the legal-transition table holds for every record
/// they hold. Serialization of concurrent access per transaction is the engine's job
/// (see [`crate::helpers::TransactionLocks`]); backends only need individual operations to be atomic.
#[allow(async_fn_in_trait)]
pub trait TransactionDatabase: Clone {
    /// Insert a brand-new transaction in `Pending` state. Fails if the `tran_id` is already taken.
    async fn insert_transaction(&self, tx: NewTransaction) -> Result<Transaction, PaymentGatewayError>;

    async fn fetch_transaction(&self, tran_id: &TransactionId) -> Result<Option<Transaction>, PaymentGatewayError>;

    /// Apply a state-machine event to the transaction, updating audit columns from the event payload.
    ///
    /// Returns the updated record. Fails with [`PaymentGatewayError::InvalidTransition`] (and changes nothing) when
    /// the legal-transition table has no edge for the transaction's current status.
    async fn apply_event(&self, tran_id: &TransactionId, event: TransitionEvent)
        -> Result<Transaction, PaymentGatewayError>;

    /// Record that an authoritative validation call was issued for this transaction.
    /// Increments `validation_attempts` by one and stamps `last_validation_at`.
    async fn record_validation_attempt(&self, tran_id: &TransactionId) -> Result<u32, PaymentGatewayError>;

    /// The terminal disposition previously produced for `(tran_id, val_id)`, if any.
    async fn cached_outcome(
        &self,
        tran_id: &TransactionId,
        val_id: &str,
    ) -> Result<Option<ReconciliationOutcome>, PaymentGatewayError>;

    /// Record the terminal disposition for `(tran_id, val_id)` so redeliveries can be answered from cache.
    async fn store_outcome(
        &self,
        tran_id: &TransactionId,
        val_id: &str,
        outcome: &ReconciliationOutcome,
    ) -> Result<(), PaymentGatewayError>;

    /// Insert a new refund record in `Pending` state. Fails if the `refund_id` is already taken.
    async fn insert_refund(&self, refund: NewRefund) -> Result<RefundTransaction, PaymentGatewayError>;

    async fn fetch_refund(&self, refund_id: &str) -> Result<Option<RefundTransaction>, PaymentGatewayError>;

    /// Move a refund to a new status, attaching the gateway response blob for audit.
    /// `processed_at` is stamped when the refund reaches `Succeeded` or `Failed`.
    async fn update_refund_status(
        &self,
        refund_id: &str,
        status: RefundStatus,
        gateway_response: Option<serde_json::Value>,
    ) -> Result<RefundTransaction, PaymentGatewayError>;

    /// The sum of all `Succeeded` refund amounts against the transaction.
    async fn refunded_total(&self, tran_id: &TransactionId) -> Result<Money, PaymentGatewayError>;
}

#[derive(Debug, Error)]
pub enum PaymentGatewayError {
    #[error("We have an internal database engine issue: {0}")]
    DatabaseError(String),
    #[error("The notification is malformed: {0}")]
    MalformedNotification(String),
    #[error("The notification signature does not match the payload for transaction {0}")]
    SignatureMismatch(TransactionId),
    #[error("The validation API call failed: {0}")]
    AdapterError(#[from] ValidationClientError),
    #[error("{0}")]
    InvalidTransition(#[from] InvalidTransition),
    #[error("Cannot insert transaction, since it already exists: {0}")]
    TransactionAlreadyExists(TransactionId),
    #[error("The requested transaction {0} does not exist")]
    TransactionNotFound(TransactionId),
    #[error("Cannot insert refund, since it already exists with id {0}")]
    RefundAlreadyExists(String),
    #[error("Refund {refund_id} was resubmitted with a different amount: {original} originally, {resubmitted} now")]
    RefundMismatch { refund_id: String, original: Money, resubmitted: Money },
    #[error("The requested refund {0} does not exist")]
    RefundNotFound(String),
    #[error("Refund amounts must be positive")]
    InvalidRefundAmount,
    #[error("Transaction in status {0} is not refundable")]
    TransactionNotRefundable(TransactionStatus),
    #[error("Transaction {0} has no bank reference, so no refund can be issued against it")]
    NoBankReference(TransactionId),
    #[error("Refund of {requested} exceeds the remaining refundable balance of {available}")]
    RefundExceedsBalance { requested: Money, available: Money },
}
