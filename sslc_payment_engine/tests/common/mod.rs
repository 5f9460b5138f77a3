#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
        Mutex,
    },
};

use log::*;
use serde_json::json;
use spg_common::Money;
use sslc_payment_engine::{
    config::GatewayConfig,
    db_types::{NewTransaction, TransactionId},
    events::EventProducers,
    gateway::{RefundCall, RefundRecord, ValidationClient, ValidationClientError, ValidationRecord},
    IpnPayload,
    MemoryDatabase,
    PaymentFlowApi,
};

pub fn prepare_test_env() {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
}

/// One scripted answer for the validation API.
#[derive(Debug, Clone)]
pub enum ScriptedValidation {
    Record(ValidationRecord),
    /// Simulates retry exhaustion on a transport failure.
    Unreachable(String),
}

#[derive(Debug, Clone)]
pub enum ScriptedRefund {
    Record(RefundRecord),
    Unreachable(String),
}

/// A scripted stand-in for the REST gateway client.
///
/// Responses are consumed front-to-back; every call is counted, so tests can assert that the idempotency cache
/// really suppressed a second validation call, or that a rejected refund never reached the gateway.
#[derive(Clone, Default)]
pub struct MockGatewayClient {
    validations: Arc<Mutex<VecDeque<ScriptedValidation>>>,
    refunds: Arc<Mutex<VecDeque<ScriptedRefund>>>,
    validate_calls: Arc<AtomicUsize>,
    refund_calls: Arc<AtomicUsize>,
}

impl MockGatewayClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a VALID validation record reporting the given amount, with a bank reference attached.
    pub fn script_valid(&self, amount: &str) -> &Self {
        self.script_validation_status("VALID", amount)
    }

    pub fn script_validation_status(&self, status: &str, amount: &str) -> &Self {
        let record = ValidationRecord {
            status: status.to_string(),
            amount: Some(amount.parse::<Money>().expect("scripted amount must parse")),
            currency: Some("BDT".to_string()),
            bank_tran_id: Some(format!("BANK-{:08X}", rand::random::<u32>())),
            raw: json!({"status": status, "amount": amount}),
        };
        self.script_validation(ScriptedValidation::Record(record))
    }

    pub fn script_validation(&self, scripted: ScriptedValidation) -> &Self {
        self.validations.lock().expect("mock poisoned").push_back(scripted);
        self
    }

    pub fn script_validation_unreachable(&self, reason: &str) -> &Self {
        self.script_validation(ScriptedValidation::Unreachable(reason.to_string()))
    }

    pub fn script_refund_success(&self) -> &Self {
        let record = RefundRecord {
            status: "SUCCESS".to_string(),
            refund_ref_id: Some(format!("RF-{:08X}", rand::random::<u32>())),
            raw: json!({"status": "SUCCESS"}),
        };
        self.refunds.lock().expect("mock poisoned").push_back(ScriptedRefund::Record(record));
        self
    }

    pub fn script_refund_refused(&self, status: &str) -> &Self {
        let record = RefundRecord { status: status.to_string(), refund_ref_id: None, raw: json!({"status": status}) };
        self.refunds.lock().expect("mock poisoned").push_back(ScriptedRefund::Record(record));
        self
    }

    pub fn script_refund_unreachable(&self, reason: &str) -> &Self {
        self.refunds.lock().expect("mock poisoned").push_back(ScriptedRefund::Unreachable(reason.to_string()));
        self
    }

    pub fn validate_calls(&self) -> usize {
        self.validate_calls.load(Ordering::SeqCst)
    }

    pub fn refund_calls(&self) -> usize {
        self.refund_calls.load(Ordering::SeqCst)
    }
}

impl ValidationClient for MockGatewayClient {
    async fn validate(&self, val_id: &str, _expected_amount: Money) -> Result<ValidationRecord, ValidationClientError> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .validations
            .lock()
            .expect("mock poisoned")
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted validation response left for val_id {val_id}"));
        match next {
            ScriptedValidation::Record(record) => Ok(record),
            ScriptedValidation::Unreachable(reason) => Err(ValidationClientError::RetriesExhausted(4, reason)),
        }
    }

    async fn refund(&self, call: &RefundCall) -> Result<RefundRecord, ValidationClientError> {
        self.refund_calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .refunds
            .lock()
            .expect("mock poisoned")
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted refund response left for {}", call.reference_id));
        match next {
            ScriptedRefund::Record(record) => Ok(record),
            ScriptedRefund::Unreachable(reason) => Err(ValidationClientError::RetriesExhausted(4, reason)),
        }
    }
}

pub type TestApi = PaymentFlowApi<MemoryDatabase, MockGatewayClient>;

pub fn test_api(config: GatewayConfig, producers: EventProducers) -> (TestApi, MemoryDatabase, MockGatewayClient) {
    let db = MemoryDatabase::new();
    let mock = MockGatewayClient::new();
    let api = PaymentFlowApi::new(db.clone(), mock.clone(), config, producers);
    (api, db, mock)
}

/// A minimal, well-formed IPN payload for the given transaction.
pub fn ipn_payload(tran_id: &str, val_id: &str, amount: &str, status: &str) -> IpnPayload {
    [("tran_id", tran_id), ("val_id", val_id), ("amount", amount), ("status", status)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn new_tx(tran_id: &str, amount: &str) -> NewTransaction {
    NewTransaction::new(TransactionId::from(tran_id), amount.parse().expect("amount must parse"), Default::default())
}
