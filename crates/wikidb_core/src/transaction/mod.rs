//! Transactions over the document, lock and link tables.
//!
//! A transaction buffers [`Mutation`](crate::tables::Mutation)s. Commit
//! applies them to a private copy of the tables, journals them as one
//! frame, and publishes the copy. Either every mutation lands or none do.

mod manager;
mod state;

pub use manager::TransactionManager;
pub use state::{Transaction, TransactionState};
