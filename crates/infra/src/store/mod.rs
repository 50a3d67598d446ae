//! Ledger persistence boundary.
//!
//! Accounts, organizations and the operation log live behind [`LedgerStore`].
//! All mutation happens inside a [`LedgerUnit`], which either commits every
//! write or none of them.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::{InMemoryLedgerStore, InMemoryUnit};
pub use postgres::{PostgresLedgerStore, PostgresUnit};
pub use r#trait::{LedgerStore, LedgerUnit, StoreError};
