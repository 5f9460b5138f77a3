//! Storage backends.
//!
//! Only the in-memory backend ships here; persistent engines implement [`crate::traits::TransactionDatabase`]
//! against their own store.

mod memory;

pub use memory::MemoryDatabase;
