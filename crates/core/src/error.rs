//! Domain error model.

use thiserror::Error;

use crate::id::{AccountId, OrganizationId};

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every ledger operation returns exactly one of these. Storage failures are
/// folded into [`DomainError::Persistence`] at the infrastructure boundary so
/// callers never see a bare backend error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. minor units outside `[0, 100)`).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// An account, organization, or service does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The post-debit balance would be negative.
    #[error("insufficient funds on account {account}")]
    InsufficientFunds { account: AccountId },

    /// Purchased services resolve to more than one owning organization.
    #[error("selected services belong to {} organizations", .0.len())]
    AmbiguousOwner(Vec<OrganizationId>),

    /// Storage connectivity, lock conflict, or statement failure.
    ///
    /// `retryable` is set for lock conflicts, deadlocks, and serialization
    /// failures; the engine itself never retries.
    #[error("persistence failure: {message}")]
    Persistence { message: String, retryable: bool },
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn insufficient_funds(account: AccountId) -> Self {
        Self::InsufficientFunds { account }
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence {
            message: msg.into(),
            retryable: false,
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Persistence {
            message: msg.into(),
            retryable: true,
        }
    }

    /// Whether a caller may reasonably retry the same operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence { retryable: true, .. })
    }
}
