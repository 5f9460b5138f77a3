//! SSLCommerz Payment Engine
//!
//! This library tracks the lifecycle of payments routed through the SSLCommerz gateway and reconciles its
//! asynchronous Instant Payment Notification (IPN) callbacks against that lifecycle. It is web-framework
//! agnostic: the routing layer that receives the gateway's HTTP callbacks hands the flat payload to
//! [`PaymentFlowApi::reconcile_ipn`] and returns whatever acknowledgement it likes.
//!
//! The library is divided into three main sections:
//! 1. Storage management ([`mod@traits`], [`mod@db_types`]). Backends implement [`TransactionDatabase`]; the
//!    in-memory [`MemoryDatabase`] ships with the crate. All transaction status changes funnel through the state
//!    machine in [`mod@state_machine`], so no backend (or caller) can produce an untracked transition.
//! 2. The engine public API ([`PaymentFlowApi`]). Reconciliation of IPNs against the gateway's authoritative
//!    validation record, and refunds against the ledger invariant (cumulative refunds never exceed the captured
//!    amount), both serialized per transaction.
//! 3. Events ([`mod@events`]). When a payment or refund reaches an outcome, a typed event is published to any
//!    registered subscribers. Subscribers are isolated: their failures are logged and never propagate back into
//!    the reconciliation that fired them.

pub mod config;
mod db;
pub mod db_types;
pub mod events;
pub mod gateway;
pub mod helpers;
mod spe_api;
pub mod state_machine;
pub mod traits;

pub use db::MemoryDatabase;
pub use spe_api::{Disposition, IpnNotification, IpnPayload, PaymentFlowApi, ReconciliationOutcome};
pub use traits::{PaymentGatewayError, TransactionDatabase};
