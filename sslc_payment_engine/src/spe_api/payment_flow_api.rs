use std::fmt::Debug;

use log::*;
use spg_common::Money;

use crate::{
    config::GatewayConfig,
    db_types::{NewRefund, NewTransaction, RefundStatus, RefundTransaction, Transaction, TransactionId},
    events::{EventProducers, PaymentFailedEvent, PaymentSucceededEvent, RefundFailedEvent, RefundSucceededEvent},
    gateway::{RefundCall, ValidationClient},
    helpers::{verify_ipn_signature, TransactionLocks},
    spe_api::{Disposition, IpnNotification, IpnPayload, ReconciliationOutcome},
    state_machine::TransitionEvent,
    traits::{PaymentGatewayError, TransactionDatabase},
};

/// `PaymentFlowApi` is the primary API for tracking transactions through their lifecycle: recording initiated
/// sessions, reconciling IPN callbacks against the gateway's authoritative record, and applying refunds against
/// the ledger invariant.
///
/// Each reconcile / refund cycle runs inside the per-transaction critical section: the lock for the `tran_id` is
/// held from the first state read across the outbound gateway call to the final state transition. Cycles for
/// different transactions proceed fully in parallel.
pub struct PaymentFlowApi<B, C> {
    db: B,
    client: C,
    config: GatewayConfig,
    producers: EventProducers,
    locks: TransactionLocks,
}

impl<B, C> Debug for PaymentFlowApi<B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentFlowApi")
    }
}

impl<B, C> PaymentFlowApi<B, C> {
    pub fn new(db: B, client: C, config: GatewayConfig, producers: EventProducers) -> Self {
        Self { db, client, config, producers, locks: TransactionLocks::new() }
    }
}

impl<B, C> PaymentFlowApi<B, C>
where
    B: TransactionDatabase,
    C: ValidationClient,
{
    /// Register a merchant-initiated payment attempt. The transaction starts out `Pending`.
    pub async fn new_transaction(&self, tx: NewTransaction) -> Result<Transaction, PaymentGatewayError> {
        self.db.insert_transaction(tx).await
    }

    pub async fn transaction(&self, tran_id: &TransactionId) -> Result<Option<Transaction>, PaymentGatewayError> {
        self.db.fetch_transaction(tran_id).await
    }

    /// Record that a gateway checkout session was created for the transaction (`Pending` -> `Processing`).
    pub async fn record_session(
        &self,
        tran_id: &TransactionId,
        session_key: &str,
    ) -> Result<Transaction, PaymentGatewayError> {
        let _guard = self.locks.acquire(tran_id).await;
        self.db.apply_event(tran_id, TransitionEvent::SessionCreated { session_key: session_key.to_string() }).await
    }

    /// Mark a payment attempt as abandoned (the gateway's cancel callback, or a merchant decision).
    pub async fn cancel_payment(
        &self,
        tran_id: &TransactionId,
        reason: &str,
    ) -> Result<Transaction, PaymentGatewayError> {
        let _guard = self.locks.acquire(tran_id).await;
        let tx = self.db.apply_event(tran_id, TransitionEvent::PaymentCancelled { reason: reason.to_string() }).await?;
        self.publish_payment_failed(tran_id.clone(), reason.to_string()).await;
        Ok(tx)
    }

    /// Reconcile an inbound IPN against the transaction lifecycle.
    ///
    /// The notification is structurally validated and (best-effort) authenticity-checked before any state is read.
    /// Redeliveries of a `(tran_id, val_id)` pair that already reached a terminal disposition are answered from
    /// the idempotency cache without a second validation call, so gateway retry storms do not amplify load.
    pub async fn reconcile_ipn(&self, payload: &IpnPayload) -> Result<ReconciliationOutcome, PaymentGatewayError> {
        let notification = IpnNotification::parse(payload)?;
        let tran_id = notification.tran_id.clone();
        debug!("📩️ IPN received for transaction {tran_id}, claiming status {}", notification.claimed_status);
        self.check_signature(payload, &notification)?;

        let _guard = self.locks.acquire(&tran_id).await;
        let tx = self
            .db
            .fetch_transaction(&tran_id)
            .await?
            .ok_or_else(|| PaymentGatewayError::TransactionNotFound(tran_id.clone()))?;

        if let Some(prior) = self.db.cached_outcome(&tran_id, &notification.val_id).await? {
            debug!(
                "📩️ IPN for {tran_id}/{} was already dispositioned as {}. Returning the prior outcome.",
                notification.val_id, prior.disposition
            );
            return Ok(prior);
        }

        let (event, disposition, detail) = self.disposition_for(&tx, &notification).await?;
        self.db.apply_event(&tran_id, event).await?;
        let outcome = ReconciliationOutcome {
            accepted: disposition == Disposition::ValidationSucceeded,
            tran_id: tran_id.clone(),
            disposition,
            detail: detail.clone(),
        };
        self.db.store_outcome(&tran_id, &notification.val_id, &outcome).await?;

        match disposition {
            Disposition::ValidationSucceeded => {
                info!("📩️ Payment for {tran_id} reconciled successfully ({})", tx.amount);
                self.publish_payment_succeeded(tran_id, tx.amount).await;
            },
            d => {
                let reason = detail.unwrap_or_else(|| d.to_string());
                warn!("📩️ Payment for {tran_id} dispositioned {d}: {reason}");
                self.publish_payment_failed(tran_id, reason).await;
            },
        }
        Ok(outcome)
    }

    /// Decide the disposition for a fresh (non-cached) notification, consulting the validation API unless it is
    /// disabled by configuration. Runs inside the transaction's critical section.
    async fn disposition_for(
        &self,
        tx: &Transaction,
        notification: &IpnNotification,
    ) -> Result<(TransitionEvent, Disposition, Option<String>), PaymentGatewayError> {
        if !self.config.auto_validate_ipn {
            // Offline mode: disposition from the notification's own claim. Nobody should run this in production.
            let claimed_ok = notification.claimed_status.eq_ignore_ascii_case("VALID")
                || notification.claimed_status.eq_ignore_ascii_case("VALIDATED");
            let result = if claimed_ok {
                (
                    TransitionEvent::ValidationSucceeded {
                        val_id: notification.val_id.clone(),
                        bank_tran_id: notification.bank_tran_id.clone(),
                        gateway_status: notification.claimed_status.clone(),
                        ipn: notification.raw.clone(),
                        gateway_response: None,
                    },
                    Disposition::ValidationSucceeded,
                    None,
                )
            } else {
                let reason = format!("Notification claims status {}", notification.claimed_status);
                (
                    TransitionEvent::ValidationFailed { reason: reason.clone(), ipn: Some(notification.raw.clone()) },
                    Disposition::ValidationFailed,
                    Some(reason),
                )
            };
            return Ok(result);
        }

        self.db.record_validation_attempt(&tx.tran_id).await?;
        let record = match self.client.validate(&notification.val_id, tx.amount).await {
            Ok(record) => record,
            Err(e) => {
                // Fail closed: an unreachable validation API never becomes a successful payment. The gateway's own
                // webhook retries are the recovery path for transient outages.
                let reason = format!("Validation call failed: {e}");
                let event =
                    TransitionEvent::ValidationFailed { reason: reason.clone(), ipn: Some(notification.raw.clone()) };
                return Ok((event, Disposition::ValidationFailed, Some(reason)));
            },
        };

        if !record.is_valid() {
            let reason = format!("Validation API reports status {}", record.status);
            let event =
                TransitionEvent::ValidationFailed { reason: reason.clone(), ipn: Some(notification.raw.clone()) };
            return Ok((event, Disposition::ValidationFailed, Some(reason)));
        }

        let authoritative = match record.amount {
            Some(a) => a,
            None => {
                let reason = "Validation API response carried no amount".to_string();
                let event =
                    TransitionEvent::ValidationFailed { reason: reason.clone(), ipn: Some(notification.raw.clone()) };
                return Ok((event, Disposition::ValidationFailed, Some(reason)));
            },
        };
        if !authoritative.reconciles_with(tx.amount, Money::CENT) {
            let detail = format!("expected {}, gateway reported {authoritative}", tx.amount);
            let event = TransitionEvent::AmountMismatch {
                expected: tx.amount,
                actual: authoritative,
                ipn: notification.raw.clone(),
            };
            return Ok((event, Disposition::AmountMismatch, Some(detail)));
        }

        let event = TransitionEvent::ValidationSucceeded {
            val_id: notification.val_id.clone(),
            bank_tran_id: record.bank_tran_id.clone().or_else(|| notification.bank_tran_id.clone()),
            gateway_status: record.status.clone(),
            ipn: notification.raw.clone(),
            gateway_response: Some(record.raw),
        };
        Ok((event, Disposition::ValidationSucceeded, None))
    }

    /// Best-effort authenticity check, preserved from the gateway contract: with no store password configured or
    /// no signature on the wire there is nothing to verify, and the notification is accepted with a warning.
    fn check_signature(&self, payload: &IpnPayload, notification: &IpnNotification) -> Result<(), PaymentGatewayError> {
        if !self.config.can_verify_signatures() {
            warn!(
                "🔏️ No store password is configured; the signature on IPN for {} was NOT verified.",
                notification.tran_id
            );
            return Ok(());
        }
        if !notification.has_signature {
            warn!(
                "🔏️ IPN for {} carries no verify_sign field; accepting it unverified (best-effort policy).",
                notification.tran_id
            );
            return Ok(());
        }
        if verify_ipn_signature(payload, &self.config.store_password) == Some(true) {
            trace!("🔏️ IPN signature for {} verified", notification.tran_id);
            Ok(())
        } else {
            Err(PaymentGatewayError::SignatureMismatch(notification.tran_id.clone()))
        }
    }

    /// Request a (possibly partial) refund against a settled transaction.
    ///
    /// The ledger invariant is enforced before any external call: the sum of succeeded refunds can never exceed
    /// the captured amount, even under concurrent requests, because the balance check and the refund call share
    /// the transaction's critical section. Idempotent by `refund_id`: a refund that already succeeded (or is
    /// still in flight) is returned as-is; a failed one may be retried.
    pub async fn request_refund(&self, refund: NewRefund) -> Result<RefundTransaction, PaymentGatewayError> {
        if !refund.amount.is_positive() {
            return Err(PaymentGatewayError::InvalidRefundAmount);
        }
        let tran_id = refund.tran_id.clone();
        let refund_id = refund.refund_id.clone();
        let _guard = self.locks.acquire(&tran_id).await;

        let mut prior = None;
        if let Some(existing) = self.db.fetch_refund(&refund_id).await? {
            if existing.status == RefundStatus::Failed {
                // A retry must carry the recorded amount; otherwise the ledger and the gateway call would
                // account for different money.
                if existing.amount != refund.amount {
                    return Err(PaymentGatewayError::RefundMismatch {
                        refund_id,
                        original: existing.amount,
                        resubmitted: refund.amount,
                    });
                }
                info!("💸️ Refund {refund_id} previously failed; retrying");
                prior = Some(existing);
            } else {
                debug!("💸️ Refund {refund_id} already {}; returning the prior record", existing.status);
                return Ok(existing);
            }
        }

        let tx = self
            .db
            .fetch_transaction(&tran_id)
            .await?
            .ok_or_else(|| PaymentGatewayError::TransactionNotFound(tran_id.clone()))?;
        if !tx.status.is_refundable() {
            return Err(PaymentGatewayError::TransactionNotRefundable(tx.status));
        }
        let bank_tran_id =
            tx.bank_tran_id.clone().ok_or_else(|| PaymentGatewayError::NoBankReference(tran_id.clone()))?;
        let refunded = self.db.refunded_total(&tran_id).await?;
        let available = tx.amount - refunded;
        if refund.amount > available {
            return Err(PaymentGatewayError::RefundExceedsBalance { requested: refund.amount, available });
        }

        let amount = refund.amount;
        // On a retry the stored record is authoritative for the remarks as well.
        let reason = match &prior {
            Some(existing) => existing.reason.clone(),
            None => refund.reason.clone(),
        };
        if prior.is_none() {
            self.db.insert_refund(refund).await?;
        }
        self.db.update_refund_status(&refund_id, RefundStatus::Processing, None).await?;

        let call = RefundCall { bank_tran_id, amount, remarks: reason, reference_id: refund_id.clone() };
        match self.client.refund(&call).await {
            Ok(record) if record.is_success() => {
                let updated =
                    self.db.update_refund_status(&refund_id, RefundStatus::Succeeded, Some(record.raw)).await?;
                let fully_refunded = refunded + amount == tx.amount;
                let event = TransitionEvent::RefundSucceeded { refund_id: refund_id.clone(), fully_refunded };
                let tx = self.db.apply_event(&tran_id, event).await?;
                info!("💸️ Refund {refund_id} of {amount} succeeded; transaction {tran_id} is now {}", tx.status);
                self.publish_refund_succeeded(refund_id).await;
                Ok(updated)
            },
            Ok(record) => {
                let reason = format!("Gateway refused the refund: {}", record.status);
                let updated = self.db.update_refund_status(&refund_id, RefundStatus::Failed, Some(record.raw)).await?;
                self.record_refund_failure(&tran_id, refund_id, reason).await?;
                Ok(updated)
            },
            Err(e) => {
                let reason = format!("Refund call failed: {e}");
                let updated = self.db.update_refund_status(&refund_id, RefundStatus::Failed, None).await?;
                self.record_refund_failure(&tran_id, refund_id, reason).await?;
                Ok(updated)
            },
        }
    }

    async fn record_refund_failure(
        &self,
        tran_id: &TransactionId,
        refund_id: String,
        reason: String,
    ) -> Result<(), PaymentGatewayError> {
        warn!("💸️ Refund {refund_id} against {tran_id} failed: {reason}");
        let event = TransitionEvent::RefundFailed { refund_id: refund_id.clone(), reason: reason.clone() };
        self.db.apply_event(tran_id, event).await?;
        self.publish_refund_failed(refund_id, reason).await;
        Ok(())
    }

    async fn publish_payment_succeeded(&self, tran_id: TransactionId, amount: Money) {
        for producer in &self.producers.payment_succeeded_producers {
            producer.publish_event(PaymentSucceededEvent::new(tran_id.clone(), amount)).await;
        }
    }

    async fn publish_payment_failed(&self, tran_id: TransactionId, reason: String) {
        for producer in &self.producers.payment_failed_producers {
            producer.publish_event(PaymentFailedEvent::new(tran_id.clone(), reason.clone())).await;
        }
    }

    async fn publish_refund_succeeded(&self, refund_id: String) {
        for producer in &self.producers.refund_succeeded_producers {
            producer.publish_event(RefundSucceededEvent::new(refund_id.clone())).await;
        }
    }

    async fn publish_refund_failed(&self, refund_id: String, reason: String) {
        for producer in &self.producers.refund_failed_producers {
            producer.publish_event(RefundFailedEvent::new(refund_id.clone(), reason.clone())).await;
        }
    }
}
