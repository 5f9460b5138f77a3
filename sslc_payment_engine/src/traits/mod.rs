//! Interface contracts for payment engine storage backends.
//!
//! The [`TransactionDatabase`] trait defines everything a backend must expose to support the engine: transaction
//! and refund records, the reconciliation-outcome cache, and `apply_event`, which is the single point through which
//! a transaction's status may change. This repository ships an in-memory backend
//! ([`crate::MemoryDatabase`]); a persistent backend implements the same trait.

mod transaction_database;

pub use transaction_database::{PaymentGatewayError, TransactionDatabase};
