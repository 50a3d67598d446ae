use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use billfold_core::{AccountId, DomainError, OrganizationId};
use billfold_ledger::{Account, AccountSummary, Balance, Operation, Organization};

/// Ledger store operation error.
///
/// These are **infrastructure errors** as opposed to domain errors (validation,
/// insufficient funds). They are folded into [`DomainError`] before reaching
/// callers of the ledger service.
///
/// ## Error Categories
///
/// - **NotFound**: the addressed account or organization row does not exist
/// - **Conflict**: lock conflict, deadlock, serialization failure, duplicate key;
///   safe to retry the whole operation
/// - **Backend**: connectivity, statement failure, corrupt row data
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("storage conflict: {0}")]
    Conflict(String),

    #[error("storage failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn account_not_found(id: AccountId) -> Self {
        Self::NotFound(format!("account {id}"))
    }

    pub fn organization_not_found(id: OrganizationId) -> Self {
        Self::NotFound(format!("organization {id}"))
    }
}

impl From<StoreError> for DomainError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(what) => DomainError::not_found(what),
            StoreError::Conflict(msg) => DomainError::conflict(msg),
            StoreError::Backend(msg) => DomainError::persistence(msg),
        }
    }
}

/// Handle to the ledger's persistent state.
///
/// The store is constructed once by the process entry point and injected into
/// the ledger service. Every mutation goes through an atomic unit obtained from
/// [`LedgerStore::begin`]; the read helpers here observe committed state only.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Atomic unit type handed out by this store.
    type Unit: LedgerUnit + 'static;

    /// Open a new atomic unit.
    async fn begin(&self) -> Result<Self::Unit, StoreError>;

    /// Committed snapshot of one account.
    async fn account(&self, id: AccountId) -> Result<Account, StoreError>;

    /// All accounts as `(id, name)`, ordered by name then id.
    async fn list_accounts(&self) -> Result<Vec<AccountSummary>, StoreError>;

    /// Committed snapshot of one organization.
    async fn organization(&self, id: OrganizationId) -> Result<Organization, StoreError>;

    /// Operation log entries touching `account`, in insertion order.
    async fn history(&self, account: AccountId) -> Result<Vec<Operation>, StoreError>;
}

/// One atomic unit of reads and writes.
///
/// Reads inside a unit observe the unit's own tentative writes and nothing
/// written by other uncommitted units. Either [`LedgerUnit::commit`] makes every
/// write durable together, or none of them survive: an explicit
/// [`LedgerUnit::rollback`] and dropping the unit without committing both
/// restore the pre-unit state.
#[async_trait]
pub trait LedgerUnit: Send {
    /// Acquire row-level exclusivity on the given accounts.
    ///
    /// Implementations lock in ascending id order with duplicates removed, so two
    /// units touching the same pair of accounts cannot deadlock on each other.
    /// Missing accounts are not an error here; the subsequent read reports them.
    async fn lock_accounts(&mut self, ids: &[AccountId]) -> Result<(), StoreError>;

    /// Acquire row-level exclusivity on an organization (always after accounts).
    async fn lock_organization(&mut self, id: OrganizationId) -> Result<(), StoreError>;

    async fn account(&mut self, id: AccountId) -> Result<Account, StoreError>;

    async fn insert_account(&mut self, account: &Account) -> Result<(), StoreError>;

    async fn set_available(&mut self, id: AccountId, balance: Balance) -> Result<(), StoreError>;

    async fn set_reserved(&mut self, id: AccountId, balance: Balance) -> Result<(), StoreError>;

    async fn organization(&mut self, id: OrganizationId) -> Result<Organization, StoreError>;

    async fn set_organization_balance(
        &mut self,
        id: OrganizationId,
        balance: Balance,
    ) -> Result<(), StoreError>;

    /// Append an audit entry. There is no update or delete counterpart.
    async fn append_operation(&mut self, operation: &Operation) -> Result<(), StoreError>;

    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore,
{
    type Unit = S::Unit;

    async fn begin(&self) -> Result<Self::Unit, StoreError> {
        (**self).begin().await
    }

    async fn account(&self, id: AccountId) -> Result<Account, StoreError> {
        (**self).account(id).await
    }

    async fn list_accounts(&self) -> Result<Vec<AccountSummary>, StoreError> {
        (**self).list_accounts().await
    }

    async fn organization(&self, id: OrganizationId) -> Result<Organization, StoreError> {
        (**self).organization(id).await
    }

    async fn history(&self, account: AccountId) -> Result<Vec<Operation>, StoreError> {
        (**self).history(account).await
    }
}

/// Canonical lock order: ascending, deduplicated.
pub(crate) fn lock_order(ids: &[AccountId]) -> Vec<AccountId> {
    let mut ordered = ids.to_vec();
    ordered.sort();
    ordered.dedup();
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn lock_order_sorts_and_dedups() {
        let a = AccountId::from_uuid(Uuid::from_u128(1));
        let b = AccountId::from_uuid(Uuid::from_u128(2));
        assert_eq!(lock_order(&[b, a, b]), vec![a, b]);
    }

    #[test]
    fn store_errors_fold_into_domain_errors() {
        let id = AccountId::new();
        assert_eq!(
            DomainError::from(StoreError::account_not_found(id)),
            DomainError::NotFound(format!("account {id}"))
        );
        assert!(DomainError::from(StoreError::Conflict("deadlock".into())).is_retryable());
        assert!(!DomainError::from(StoreError::Backend("io".into())).is_retryable());
    }
}
