use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use billfold_core::{AccountId, Entity, OrganizationId};
use billfold_ledger::{Account, AccountSummary, Balance, Operation, Organization};

use super::r#trait::{LedgerStore, LedgerUnit, StoreError};

#[derive(Debug, Default)]
struct LedgerState {
    accounts: HashMap<AccountId, Account>,
    organizations: HashMap<OrganizationId, Organization>,
    operations: Vec<Operation>,
}

/// Row pre-image recorded the first time a unit touches a row.
#[derive(Debug)]
enum Undo {
    Account(AccountId, Option<Account>),
    Organization(OrganizationId, Option<Organization>),
}

/// In-memory ledger store.
///
/// Intended for tests/dev. A unit holds the state lock for its whole lifetime,
/// which serializes units (a strictly stronger isolation than row locks).
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    state: Arc<Mutex<LedgerState>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an organization (reference data, normally managed outside the engine).
    pub async fn insert_organization(&self, organization: Organization) {
        let mut state = self.state.lock().await;
        state.organizations.insert(*organization.id(), organization);
    }

    /// Total number of operation log entries (all accounts).
    pub async fn operation_count(&self) -> usize {
        self.state.lock().await.operations.len()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    type Unit = InMemoryUnit;

    async fn begin(&self) -> Result<Self::Unit, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let log_len = guard.operations.len();
        Ok(InMemoryUnit {
            guard: Some(guard),
            undo: Vec::new(),
            log_len,
        })
    }

    async fn account(&self, id: AccountId) -> Result<Account, StoreError> {
        let state = self.state.lock().await;
        state
            .accounts
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::account_not_found(id))
    }

    async fn list_accounts(&self) -> Result<Vec<AccountSummary>, StoreError> {
        let state = self.state.lock().await;
        let mut items: Vec<AccountSummary> = state.accounts.values().map(Account::summary).collect();
        items.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn organization(&self, id: OrganizationId) -> Result<Organization, StoreError> {
        let state = self.state.lock().await;
        state
            .organizations
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::organization_not_found(id))
    }

    async fn history(&self, account: AccountId) -> Result<Vec<Operation>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .operations
            .iter()
            .filter(|op| op.involves(account))
            .cloned()
            .collect())
    }
}

/// Atomic unit over [`InMemoryLedgerStore`].
///
/// Writes go straight into the locked state; the first write to each row saves
/// its pre-image. Rollback (explicit or on drop) replays the pre-images in
/// reverse and truncates the operation log back to its length at `begin`.
#[derive(Debug)]
pub struct InMemoryUnit {
    guard: Option<OwnedMutexGuard<LedgerState>>,
    undo: Vec<Undo>,
    log_len: usize,
}

impl InMemoryUnit {
    fn state(&mut self) -> Result<&mut LedgerState, StoreError> {
        self.guard
            .as_deref_mut()
            .ok_or_else(|| StoreError::Backend("atomic unit already finished".to_string()))
    }

    fn remember_account(&mut self, id: AccountId) -> Result<(), StoreError> {
        let seen = self
            .undo
            .iter()
            .any(|u| matches!(u, Undo::Account(existing, _) if *existing == id));
        if !seen {
            let pre_image = self.state()?.accounts.get(&id).cloned();
            self.undo.push(Undo::Account(id, pre_image));
        }
        Ok(())
    }

    fn remember_organization(&mut self, id: OrganizationId) -> Result<(), StoreError> {
        let seen = self
            .undo
            .iter()
            .any(|u| matches!(u, Undo::Organization(existing, _) if *existing == id));
        if !seen {
            let pre_image = self.state()?.organizations.get(&id).cloned();
            self.undo.push(Undo::Organization(id, pre_image));
        }
        Ok(())
    }

    fn account_mut(&mut self, id: AccountId) -> Result<&mut Account, StoreError> {
        if !self.state()?.accounts.contains_key(&id) {
            return Err(StoreError::account_not_found(id));
        }
        self.remember_account(id)?;
        self.state()?
            .accounts
            .get_mut(&id)
            .ok_or_else(|| StoreError::account_not_found(id))
    }

    fn restore(&mut self) {
        let Some(state) = self.guard.as_deref_mut() else {
            return;
        };
        for undo in self.undo.drain(..).rev() {
            match undo {
                Undo::Account(id, Some(account)) => {
                    state.accounts.insert(id, account);
                }
                Undo::Account(id, None) => {
                    state.accounts.remove(&id);
                }
                Undo::Organization(id, Some(org)) => {
                    state.organizations.insert(id, org);
                }
                Undo::Organization(id, None) => {
                    state.organizations.remove(&id);
                }
            }
        }
        state.operations.truncate(self.log_len);
    }
}

impl Drop for InMemoryUnit {
    fn drop(&mut self) {
        if self.guard.is_some() {
            self.restore();
        }
    }
}

#[async_trait]
impl LedgerUnit for InMemoryUnit {
    async fn lock_accounts(&mut self, _ids: &[AccountId]) -> Result<(), StoreError> {
        // The unit already owns the whole state.
        self.state().map(|_| ())
    }

    async fn lock_organization(&mut self, _id: OrganizationId) -> Result<(), StoreError> {
        self.state().map(|_| ())
    }

    async fn account(&mut self, id: AccountId) -> Result<Account, StoreError> {
        self.state()?
            .accounts
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::account_not_found(id))
    }

    async fn insert_account(&mut self, account: &Account) -> Result<(), StoreError> {
        if self.state()?.accounts.contains_key(&account.id) {
            return Err(StoreError::Conflict(format!("account {} already exists", account.id)));
        }
        self.remember_account(account.id)?;
        self.state()?.accounts.insert(*account.id(), account.clone());
        Ok(())
    }

    async fn set_available(&mut self, id: AccountId, balance: Balance) -> Result<(), StoreError> {
        self.account_mut(id)?.available = balance;
        Ok(())
    }

    async fn set_reserved(&mut self, id: AccountId, balance: Balance) -> Result<(), StoreError> {
        self.account_mut(id)?.reserved = balance;
        Ok(())
    }

    async fn organization(&mut self, id: OrganizationId) -> Result<Organization, StoreError> {
        self.state()?
            .organizations
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::organization_not_found(id))
    }

    async fn set_organization_balance(
        &mut self,
        id: OrganizationId,
        balance: Balance,
    ) -> Result<(), StoreError> {
        if !self.state()?.organizations.contains_key(&id) {
            return Err(StoreError::organization_not_found(id));
        }
        self.remember_organization(id)?;
        if let Some(org) = self.state()?.organizations.get_mut(&id) {
            org.balance = balance;
        }
        Ok(())
    }

    async fn append_operation(&mut self, operation: &Operation) -> Result<(), StoreError> {
        self.state()?.operations.push(operation.clone());
        Ok(())
    }

    async fn commit(mut self) -> Result<(), StoreError> {
        self.undo.clear();
        match self.guard.take() {
            Some(_guard) => Ok(()),
            None => Err(StoreError::Backend("atomic unit already finished".to_string())),
        }
    }

    async fn rollback(mut self) -> Result<(), StoreError> {
        self.restore();
        self.guard.take();
        Ok(())
    }
}
