mod ids;
mod ipn_signature;
mod lock_map;

pub use ids::{generate_refund_id, generate_transaction_id};
pub use ipn_signature::{compute_ipn_signature, verify_ipn_signature};
pub use lock_map::TransactionLocks;
