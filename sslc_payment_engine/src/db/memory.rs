use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use log::*;
use spg_common::Money;
use tokio::sync::RwLock;

use crate::{
    db_types::{
        NewRefund,
        NewTransaction,
        RefundStatus,
        RefundTransaction,
        Transaction,
        TransactionId,
        TransactionStatus,
    },
    spe_api::ReconciliationOutcome,
    state_machine::{next_status, TransitionEvent},
    traits::{PaymentGatewayError, TransactionDatabase},
};

/// In-memory storage backend.
///
/// Holds every record behind a single `RwLock`, which makes each trait operation atomic. Cross-operation
/// serialization per transaction is layered on top by the engine's lock map, not here.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    transactions: HashMap<String, Transaction>,
    refunds: HashMap<String, RefundTransaction>,
    /// Terminal reconciliation outcomes, keyed by `(tran_id, val_id)`.
    outcomes: HashMap<(String, String), ReconciliationOutcome>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransactionDatabase for MemoryDatabase {
    async fn insert_transaction(&self, tx: NewTransaction) -> Result<Transaction, PaymentGatewayError> {
        let mut inner = self.inner.write().await;
        if inner.transactions.contains_key(tx.tran_id.as_str()) {
            return Err(PaymentGatewayError::TransactionAlreadyExists(tx.tran_id));
        }
        let now = Utc::now();
        let record = Transaction {
            tran_id: tx.tran_id.clone(),
            val_id: None,
            bank_tran_id: None,
            amount: tx.amount,
            currency: tx.currency,
            status: TransactionStatus::Pending,
            validation_attempts: 0,
            last_ipn: None,
            gateway_response: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            last_validation_at: None,
        };
        inner.transactions.insert(tx.tran_id.as_str().to_string(), record.clone());
        debug!("🗃️ Transaction {} created for {} {}", record.tran_id, record.amount, record.currency);
        Ok(record)
    }

    async fn fetch_transaction(&self, tran_id: &TransactionId) -> Result<Option<Transaction>, PaymentGatewayError> {
        let inner = self.inner.read().await;
        Ok(inner.transactions.get(tran_id.as_str()).cloned())
    }

    async fn apply_event(
        &self,
        tran_id: &TransactionId,
        event: TransitionEvent,
    ) -> Result<Transaction, PaymentGatewayError> {
        let mut inner = self.inner.write().await;
        let tx = inner
            .transactions
            .get_mut(tran_id.as_str())
            .ok_or_else(|| PaymentGatewayError::TransactionNotFound(tran_id.clone()))?;
        // Resolve the edge first; on InvalidTransition the record is untouched.
        let target = next_status(tx.status, &event)?;
        let now = Utc::now();
        match event {
            TransitionEvent::SessionCreated { session_key } => {
                trace!("🗃️ Session {session_key} recorded for {tran_id}");
            },
            TransitionEvent::ValidationSucceeded { val_id, bank_tran_id, ipn, gateway_response, .. } => {
                tx.val_id = Some(val_id);
                if bank_tran_id.is_some() {
                    tx.bank_tran_id = bank_tran_id;
                }
                tx.last_ipn = Some(ipn);
                if gateway_response.is_some() {
                    tx.gateway_response = gateway_response;
                }
                tx.failure_reason = None;
                if tx.completed_at.is_none() {
                    tx.completed_at = Some(now);
                }
            },
            TransitionEvent::ValidationFailed { reason, ipn } => {
                tx.failure_reason = Some(reason);
                if ipn.is_some() {
                    tx.last_ipn = ipn;
                }
            },
            TransitionEvent::AmountMismatch { expected, actual, ipn } => {
                tx.failure_reason = Some(format!("Amount mismatch: expected {expected}, gateway reported {actual}"));
                tx.last_ipn = Some(ipn);
            },
            TransitionEvent::PaymentCancelled { reason } => {
                tx.failure_reason = Some(reason);
            },
            TransitionEvent::RefundSucceeded { .. } | TransitionEvent::RefundFailed { .. } => {},
        }
        if tx.status != target {
            debug!("🗃️ Transaction {tran_id} moves {} -> {target}", tx.status);
        }
        tx.status = target;
        tx.updated_at = now;
        Ok(tx.clone())
    }

    async fn record_validation_attempt(&self, tran_id: &TransactionId) -> Result<u32, PaymentGatewayError> {
        let mut inner = self.inner.write().await;
        let tx = inner
            .transactions
            .get_mut(tran_id.as_str())
            .ok_or_else(|| PaymentGatewayError::TransactionNotFound(tran_id.clone()))?;
        tx.validation_attempts += 1;
        tx.last_validation_at = Some(Utc::now());
        Ok(tx.validation_attempts)
    }

    async fn cached_outcome(
        &self,
        tran_id: &TransactionId,
        val_id: &str,
    ) -> Result<Option<ReconciliationOutcome>, PaymentGatewayError> {
        let inner = self.inner.read().await;
        Ok(inner.outcomes.get(&(tran_id.as_str().to_string(), val_id.to_string())).cloned())
    }

    async fn store_outcome(
        &self,
        tran_id: &TransactionId,
        val_id: &str,
        outcome: &ReconciliationOutcome,
    ) -> Result<(), PaymentGatewayError> {
        let mut inner = self.inner.write().await;
        inner.outcomes.insert((tran_id.as_str().to_string(), val_id.to_string()), outcome.clone());
        Ok(())
    }

    async fn insert_refund(&self, refund: NewRefund) -> Result<RefundTransaction, PaymentGatewayError> {
        let mut inner = self.inner.write().await;
        if inner.refunds.contains_key(&refund.refund_id) {
            return Err(PaymentGatewayError::RefundAlreadyExists(refund.refund_id));
        }
        let now = Utc::now();
        let record = RefundTransaction {
            refund_id: refund.refund_id.clone(),
            tran_id: refund.tran_id,
            amount: refund.amount,
            reason: refund.reason,
            status: RefundStatus::Pending,
            gateway_response: None,
            created_at: now,
            updated_at: now,
            processed_at: None,
        };
        inner.refunds.insert(refund.refund_id, record.clone());
        Ok(record)
    }

    async fn fetch_refund(&self, refund_id: &str) -> Result<Option<RefundTransaction>, PaymentGatewayError> {
        let inner = self.inner.read().await;
        Ok(inner.refunds.get(refund_id).cloned())
    }

    async fn update_refund_status(
        &self,
        refund_id: &str,
        status: RefundStatus,
        gateway_response: Option<serde_json::Value>,
    ) -> Result<RefundTransaction, PaymentGatewayError> {
        let mut inner = self.inner.write().await;
        let refund = inner
            .refunds
            .get_mut(refund_id)
            .ok_or_else(|| PaymentGatewayError::RefundNotFound(refund_id.to_string()))?;
        let now = Utc::now();
        refund.status = status;
        if gateway_response.is_some() {
            refund.gateway_response = gateway_response;
        }
        refund.processed_at = match status {
            RefundStatus::Succeeded | RefundStatus::Failed => Some(now),
            RefundStatus::Pending | RefundStatus::Processing => None,
        };
        refund.updated_at = now;
        Ok(refund.clone())
    }

    async fn refunded_total(&self, tran_id: &TransactionId) -> Result<Money, PaymentGatewayError> {
        let inner = self.inner.read().await;
        let total = inner
            .refunds
            .values()
            .filter(|r| r.tran_id == *tran_id && r.status == RefundStatus::Succeeded)
            .map(|r| r.amount)
            .sum();
        Ok(total)
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    fn new_tx(id: &str, amount: &str) -> NewTransaction {
        NewTransaction::new(TransactionId::from(id), amount.parse().unwrap(), Default::default())
    }

    #[tokio::test]
    async fn duplicate_transaction_ids_are_rejected() {
        let db = MemoryDatabase::new();
        db.insert_transaction(new_tx("T1", "100.00")).await.unwrap();
        let err = db.insert_transaction(new_tx("T1", "200.00")).await.unwrap_err();
        assert!(matches!(err, PaymentGatewayError::TransactionAlreadyExists(_)));
        // The original record is untouched.
        let tx = db.fetch_transaction(&TransactionId::from("T1")).await.unwrap().unwrap();
        assert_eq!(tx.amount, "100.00".parse().unwrap());
    }

    #[tokio::test]
    async fn apply_event_populates_audit_columns() {
        let db = MemoryDatabase::new();
        db.insert_transaction(new_tx("T1", "100.00")).await.unwrap();
        let tran_id = TransactionId::from("T1");
        let event = TransitionEvent::ValidationSucceeded {
            val_id: "V1".into(),
            bank_tran_id: Some("B1".into()),
            gateway_status: "VALID".into(),
            ipn: json!({"tran_id": "T1"}),
            gateway_response: Some(json!({"status": "VALID"})),
        };
        let tx = db.apply_event(&tran_id, event).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::Valid);
        assert_eq!(tx.val_id.as_deref(), Some("V1"));
        assert_eq!(tx.bank_tran_id.as_deref(), Some("B1"));
        assert!(tx.completed_at.is_some());
        assert!(tx.last_ipn.is_some());
    }

    #[tokio::test]
    async fn invalid_transition_leaves_the_record_untouched() {
        let db = MemoryDatabase::new();
        db.insert_transaction(new_tx("T1", "100.00")).await.unwrap();
        let tran_id = TransactionId::from("T1");
        db.apply_event(&tran_id, TransitionEvent::ValidationFailed { reason: "nope".into(), ipn: None })
            .await
            .unwrap();
        let err = db
            .apply_event(&tran_id, TransitionEvent::RefundSucceeded { refund_id: "R1".into(), fully_refunded: true })
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentGatewayError::InvalidTransition(_)));
        let tx = db.fetch_transaction(&tran_id).await.unwrap().unwrap();
        assert_eq!(tx.status, TransactionStatus::Failed);
        assert_eq!(tx.failure_reason.as_deref(), Some("nope"));
    }

    #[tokio::test]
    async fn refunded_total_only_counts_succeeded_refunds() {
        let db = MemoryDatabase::new();
        let tran_id = TransactionId::from("T1");
        db.insert_transaction(new_tx("T1", "500.00")).await.unwrap();
        for (id, amount, status) in
            [("R1", "100.00", RefundStatus::Succeeded), ("R2", "50.00", RefundStatus::Failed), ("R3", "25.00", RefundStatus::Succeeded)]
        {
            db.insert_refund(NewRefund::new(id, tran_id.clone(), amount.parse().unwrap(), "test")).await.unwrap();
            db.update_refund_status(id, status, None).await.unwrap();
        }
        assert_eq!(db.refunded_total(&tran_id).await.unwrap(), "125.00".parse().unwrap());
    }

    #[tokio::test]
    async fn validation_attempts_are_monotonic() {
        let db = MemoryDatabase::new();
        db.insert_transaction(new_tx("T1", "100.00")).await.unwrap();
        let tran_id = TransactionId::from("T1");
        assert_eq!(db.record_validation_attempt(&tran_id).await.unwrap(), 1);
        assert_eq!(db.record_validation_attempt(&tran_id).await.unwrap(), 2);
        let tx = db.fetch_transaction(&tran_id).await.unwrap().unwrap();
        assert!(tx.last_validation_at.is_some());
    }
}
