//! Ledger domain (two-unit balances, carry arithmetic, audit entries).
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns.

pub mod account;
pub mod carry;
pub mod money;
pub mod operation;

pub use account::{Account, AccountSummary, Organization, Service, ServicePrice};
pub use money::{Amount, Balance, MINOR_PER_MAJOR};
pub use operation::{Operation, OperationKind};
