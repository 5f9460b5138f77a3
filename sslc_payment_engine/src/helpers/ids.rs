use chrono::Utc;

use crate::db_types::TransactionId;

/// Generate a unique merchant-side transaction id, e.g. `TXN_20260830142501_1A2B3C4D`.
pub fn generate_transaction_id(prefix: &str) -> TransactionId {
    TransactionId::from(format!("{prefix}_{}_{:08X}", Utc::now().format("%Y%m%d%H%M%S"), rand::random::<u32>()))
}

/// Generate a unique refund id, e.g. `REF_20260830142501_1A2B3C4D`.
pub fn generate_refund_id() -> String {
    format!("REF_{}_{:08X}", Utc::now().format("%Y%m%d%H%M%S"), rand::random::<u32>())
}
