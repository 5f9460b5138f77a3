//! The payment engine public API.
//!
//! [`PaymentFlowApi`] is the entry point the surrounding application (the web layer receiving gateway callbacks,
//! the merchant back office issuing refunds) calls into. Everything else in the crate exists in service of it.

mod ipn_objects;
mod payment_flow_api;

pub use ipn_objects::{Disposition, IpnNotification, IpnPayload, ReconciliationOutcome};
pub use payment_flow_api::PaymentFlowApi;
