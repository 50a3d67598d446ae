//! `billfold-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! typed identifiers, the error taxonomy every ledger operation reports, and the
//! entity/value-object markers used by the ledger model.

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AccountId, OrganizationId, ServiceId};
pub use value_object::ValueObject;
