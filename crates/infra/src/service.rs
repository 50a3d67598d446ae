//! Ledger operations.
//!
//! Every balance-changing operation runs inside exactly one atomic unit opened
//! by the [`TransactionCoordinator`]. Debits are optimistic: the borrow step
//! and the subtract step are written to the unit and read back, and only then
//! is the balance checked. A failed check returns `InsufficientFunds` and the
//! coordinator rolls the unit back, so no intermediate write survives.
//!
//! Locks are always taken accounts first (ascending id), organization last.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use billfold_core::{AccountId, DomainError, DomainResult, OrganizationId, ServiceId};
use billfold_ledger::{carry, Account, AccountSummary, Amount, Operation, Organization};

use crate::catalog::{self, ServiceCatalog};
use crate::coordinator::{AtomicUnit, TransactionCoordinator};
use crate::store::{LedgerStore, LedgerUnit};

/// Result of a successful purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    /// Buyer state after the purchase committed.
    pub buyer: Account,
    pub organization: OrganizationId,
    /// Aggregate price charged.
    pub amount: Amount,
    /// Distinct services bought, in request order.
    pub services: Vec<ServiceId>,
}

/// The ledger engine, over an injected store and service catalog.
#[derive(Debug, Clone)]
pub struct LedgerService<S, C> {
    coordinator: TransactionCoordinator<S>,
    catalog: C,
}

impl<S, C> LedgerService<S, C>
where
    S: LedgerStore,
    C: ServiceCatalog,
{
    pub fn new(store: S, catalog: C) -> Self {
        Self {
            coordinator: TransactionCoordinator::new(store),
            catalog,
        }
    }

    pub fn store(&self) -> &S {
        self.coordinator.store()
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Open a new account with `initial` available and nothing reserved.
    ///
    /// Creation is not an operation-log event.
    #[instrument(skip(self), err)]
    pub async fn create_account(&self, name: &str, initial: Amount) -> DomainResult<Account> {
        if name.trim().is_empty() {
            return Err(DomainError::validation("account name must not be blank"));
        }

        let account = Account::open(AccountId::new(), name, initial);
        let created = account.clone();
        self.coordinator
            .run_atomic("create_account", move |unit| Box::pin(insert_in_unit(unit, account)))
            .await?;

        info!(account_id = %created.id, "account created");
        Ok(created)
    }

    /// Committed snapshot of one account. Never writes.
    pub async fn get_account(&self, id: AccountId) -> DomainResult<Account> {
        Ok(self.store().account(id).await?)
    }

    pub async fn list_accounts(&self) -> DomainResult<Vec<AccountSummary>> {
        Ok(self.store().list_accounts().await?)
    }

    pub async fn get_organization(&self, id: OrganizationId) -> DomainResult<Organization> {
        Ok(self.store().organization(id).await?)
    }

    /// Operation log entries for an existing account, oldest first.
    pub async fn history(&self, account: AccountId) -> DomainResult<Vec<Operation>> {
        self.store().account(account).await?;
        Ok(self.store().history(account).await?)
    }

    /// Credit `amount` to the account's available balance.
    #[instrument(skip(self), fields(account_id = %id, amount = %amount), err)]
    pub async fn deposit(&self, id: AccountId, amount: Amount) -> DomainResult<Account> {
        self.coordinator
            .run_atomic("deposit", move |unit| Box::pin(deposit_in_unit(unit, id, amount)))
            .await
    }

    /// Move `amount` from one account's available balance to another's.
    ///
    /// Returns the updated source account. A self-transfer nets to zero but is
    /// still checked for funds and logged.
    #[instrument(skip(self), fields(from = %from, to = %to, amount = %amount), err)]
    pub async fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> DomainResult<Account> {
        let account = self
            .coordinator
            .run_atomic("transfer", move |unit| {
                Box::pin(transfer_in_unit(unit, from, to, amount))
            })
            .await?;
        info!("transfer committed");
        Ok(account)
    }

    /// Move `amount` from available to reserved on one account.
    #[instrument(skip(self), fields(account_id = %id, amount = %amount), err)]
    pub async fn reserve(&self, id: AccountId, amount: Amount) -> DomainResult<Account> {
        self.coordinator
            .run_atomic("reserve", move |unit| Box::pin(reserve_in_unit(unit, id, amount)))
            .await
    }

    /// Buy a set of services owned by one organization.
    ///
    /// The price is resolved before the unit opens; catalog errors therefore
    /// never touch balances.
    #[instrument(skip(self, services), fields(buyer = %buyer, services = services.len()), err)]
    pub async fn purchase(
        &self,
        buyer: AccountId,
        services: &[ServiceId],
    ) -> DomainResult<PurchaseReceipt> {
        let services = catalog::distinct(services)?;
        let price = self.catalog.price_of(&services).await?;
        let organization = price.organization;
        let amount = price.amount;

        let buyer_account = self
            .coordinator
            .run_atomic("purchase", move |unit| {
                Box::pin(purchase_in_unit(unit, buyer, organization, amount))
            })
            .await?;

        info!(org_id = %organization, amount = %amount, "purchase committed");
        Ok(PurchaseReceipt {
            buyer: buyer_account,
            organization,
            amount,
            services,
        })
    }
}

async fn insert_in_unit<U: LedgerUnit>(unit: &mut AtomicUnit<U>, account: Account) -> DomainResult<()> {
    unit.insert_account(&account).await?;
    Ok(())
}

/// Optimistic debit of `available`: borrow, write, subtract, write, verify.
async fn debit_available<U: LedgerUnit>(
    unit: &mut AtomicUnit<U>,
    id: AccountId,
    amount: Amount,
) -> DomainResult<Account> {
    let account = unit.account(id).await?;
    unit.set_available(id, carry::borrow(account.available, amount))
        .await?;

    let borrowed = unit.account(id).await?;
    unit.set_available(id, carry::subtract(borrowed.available, amount))
        .await?;

    let debited = unit.account(id).await?;
    if !debited.available.is_normalized() {
        return Err(DomainError::insufficient_funds(id));
    }
    Ok(debited)
}

async fn deposit_in_unit<U: LedgerUnit>(
    unit: &mut AtomicUnit<U>,
    id: AccountId,
    amount: Amount,
) -> DomainResult<Account> {
    unit.lock_accounts(&[id]).await?;
    let account = unit.account(id).await?;
    unit.set_available(id, carry::credit(account.available, amount)?)
        .await?;
    unit.append_operation(&Operation::add(id, amount, Utc::now()))
        .await?;
    Ok(unit.account(id).await?)
}

async fn transfer_in_unit<U: LedgerUnit>(
    unit: &mut AtomicUnit<U>,
    from: AccountId,
    to: AccountId,
    amount: Amount,
) -> DomainResult<Account> {
    unit.lock_accounts(&[from, to]).await?;
    debit_available(unit, from, amount).await?;

    let destination = unit.account(to).await?;
    unit.set_available(to, carry::credit(destination.available, amount)?)
        .await?;

    unit.append_operation(&Operation::transfer(from, to, amount, Utc::now()))
        .await?;
    Ok(unit.account(from).await?)
}

async fn reserve_in_unit<U: LedgerUnit>(
    unit: &mut AtomicUnit<U>,
    id: AccountId,
    amount: Amount,
) -> DomainResult<Account> {
    unit.lock_accounts(&[id]).await?;
    let debited = debit_available(unit, id, amount).await?;
    unit.set_reserved(id, carry::credit(debited.reserved, amount)?)
        .await?;
    unit.append_operation(&Operation::reserve(id, amount, Utc::now()))
        .await?;
    Ok(unit.account(id).await?)
}

async fn purchase_in_unit<U: LedgerUnit>(
    unit: &mut AtomicUnit<U>,
    buyer: AccountId,
    organization: OrganizationId,
    amount: Amount,
) -> DomainResult<Account> {
    unit.lock_accounts(&[buyer]).await?;
    unit.lock_organization(organization).await?;

    let debited = debit_available(unit, buyer, amount).await?;

    // Funds pass through `reserved` on their way to the organization.
    unit.set_reserved(buyer, carry::credit(debited.reserved, amount)?)
        .await?;
    let held = unit.account(buyer).await?;
    unit.set_reserved(buyer, carry::release(held.reserved, amount))
        .await?;

    let seller = unit.organization(organization).await?;
    unit.set_organization_balance(organization, carry::credit(seller.balance, amount)?)
        .await?;

    let at = Utc::now();
    unit.append_operation(&Operation::reserve(buyer, amount, at))
        .await?;
    unit.append_operation(&Operation::buy(buyer, organization, amount, at))
        .await?;

    Ok(unit.account(buyer).await?)
}
