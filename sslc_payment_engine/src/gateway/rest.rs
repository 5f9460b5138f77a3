use std::future::Future;

use log::*;
use spg_common::Money;

use crate::{
    config::GatewayConfig,
    gateway::{RefundCall, RefundRecord, ValidationClient, ValidationClientError, ValidationRecord},
};

/// The production gateway client. Talks to the validation and refund APIs over HTTPS, with a bounded per-request
/// timeout and exponential backoff on transport failures.
#[derive(Clone)]
pub struct RestGatewayClient {
    config: GatewayConfig,
    client: reqwest::Client,
}

impl RestGatewayClient {
    pub fn new(config: GatewayConfig) -> Result<Self, ValidationClientError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    async fn with_retry<T, F, Fut>(&self, op: &str, mut call: F) -> Result<T, ValidationClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ValidationClientError>>,
    {
        let mut backoff = self.config.retry_backoff;
        let mut attempt = 0u32;
        loop {
            match call().await {
                Ok(v) => return Ok(v),
                Err(ValidationClientError::RequestFailed(e)) if attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!("🌐️ {op} attempt {attempt} failed: {e}. Retrying in {backoff:?}");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                },
                Err(ValidationClientError::RequestFailed(e)) => {
                    error!("🌐️ {op} failed after {} attempts: {e}", attempt + 1);
                    return Err(ValidationClientError::RetriesExhausted(attempt + 1, e.to_string()));
                },
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_validation(&self, val_id: &str) -> Result<serde_json::Value, ValidationClientError> {
        let response = self
            .client
            .get(self.config.validation_url())
            .query(&[
                ("val_id", val_id),
                ("store_id", self.config.store_id.as_str()),
                ("store_passwd", self.config.store_password.reveal().as_str()),
                ("format", "json"),
            ])
            .send()
            .await?
            .error_for_status()?;
        let body = response.json::<serde_json::Value>().await.map_err(|e| {
            if e.is_decode() {
                ValidationClientError::InvalidResponse(e.to_string())
            } else {
                ValidationClientError::RequestFailed(e)
            }
        })?;
        Ok(body)
    }

    async fn post_refund(&self, call: &RefundCall) -> Result<serde_json::Value, ValidationClientError> {
        let amount = call.amount.to_string();
        let response = self
            .client
            .post(self.config.refund_url())
            .form(&[
                ("store_id", self.config.store_id.as_str()),
                ("store_passwd", self.config.store_password.reveal().as_str()),
                ("bank_tran_id", call.bank_tran_id.as_str()),
                ("refund_amount", amount.as_str()),
                ("refund_remarks", call.remarks.as_str()),
                ("refe_id", call.reference_id.as_str()),
                ("format", "json"),
            ])
            .send()
            .await?
            .error_for_status()?;
        let body = response.json::<serde_json::Value>().await.map_err(|e| {
            if e.is_decode() {
                ValidationClientError::InvalidResponse(e.to_string())
            } else {
                ValidationClientError::RequestFailed(e)
            }
        })?;
        Ok(body)
    }
}

fn str_field(body: &serde_json::Value, field: &str) -> Option<String> {
    body.get(field).and_then(|v| v.as_str()).map(|s| s.to_string())
}

impl ValidationClient for RestGatewayClient {
    async fn validate(&self, val_id: &str, expected_amount: Money) -> Result<ValidationRecord, ValidationClientError> {
        let body = self.with_retry("Validation lookup", || self.fetch_validation(val_id)).await?;
        let status = str_field(&body, "status")
            .ok_or_else(|| ValidationClientError::InvalidResponse("validation response has no status field".into()))?;
        let amount = str_field(&body, "amount").and_then(|s| s.parse::<Money>().ok());
        if let Some(a) = amount {
            if a != expected_amount {
                debug!("🌐️ Validation API reports {a} for {val_id}; we expected {expected_amount}");
            }
        }
        let record = ValidationRecord {
            status,
            amount,
            currency: str_field(&body, "currency"),
            bank_tran_id: str_field(&body, "bank_tran_id"),
            raw: body,
        };
        trace!("🌐️ Validation record for {val_id}: {}", record.status);
        Ok(record)
    }

    async fn refund(&self, call: &RefundCall) -> Result<RefundRecord, ValidationClientError> {
        let body = self.with_retry("Refund call", || self.post_refund(call)).await?;
        let status = str_field(&body, "status")
            .ok_or_else(|| ValidationClientError::InvalidResponse("refund response has no status field".into()))?;
        Ok(RefundRecord { status, refund_ref_id: str_field(&body, "refund_ref_id"), raw: body })
    }
}
