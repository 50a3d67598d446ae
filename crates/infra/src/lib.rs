//! Infrastructure layer: ledger storage, service catalog, atomic units, config.
//!
//! - `store`: account/organization/operation persistence behind an atomic-unit boundary
//! - `catalog`: read-only service pricing lookups
//! - `coordinator`: commit-or-rollback wrapper around one store unit
//! - `service`: the ledger operations (deposit, transfer, reserve, purchase, ...)
//! - `config`: environment-driven process configuration

pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod service;
pub mod store;


pub use catalog::{InMemoryServiceCatalog, PostgresServiceCatalog, ServiceCatalog};
pub use config::{ConfigError, LedgerConfig};
pub use coordinator::{AtomicUnit, TransactionCoordinator, UnitFuture};
pub use service::{LedgerService, PurchaseReceipt};
pub use store::{InMemoryLedgerStore, LedgerStore, LedgerUnit, PostgresLedgerStore, StoreError};
