use spg_common::Money;

/// The gateway's authoritative record for a transaction, as returned by the validation API.
#[derive(Debug, Clone)]
pub struct ValidationRecord {
    /// The gateway's status string: "VALID", "VALIDATED", "INVALID_TRANSACTION", ...
    pub status: String,
    pub amount: Option<Money>,
    pub currency: Option<String>,
    pub bank_tran_id: Option<String>,
    /// The raw response body, retained verbatim for audit.
    pub raw: serde_json::Value,
}

impl ValidationRecord {
    /// Whether the gateway considers the transaction successfully settled.
    pub fn is_valid(&self) -> bool {
        self.status.eq_ignore_ascii_case("VALID") || self.status.eq_ignore_ascii_case("VALIDATED")
    }
}

/// The parameters of an outbound refund call.
#[derive(Debug, Clone)]
pub struct RefundCall {
    /// The settlement-network reference of the original payment.
    pub bank_tran_id: String,
    pub amount: Money,
    pub remarks: String,
    /// Merchant-side reference, echoed back by the gateway.
    pub reference_id: String,
}

/// The gateway's response to a refund call.
#[derive(Debug, Clone)]
pub struct RefundRecord {
    pub status: String,
    pub refund_ref_id: Option<String>,
    /// The raw response body, retained verbatim for audit.
    pub raw: serde_json::Value,
}

impl RefundRecord {
    pub fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case("success")
    }
}
