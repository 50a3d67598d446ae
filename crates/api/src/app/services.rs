//! Ledger service handle shared by all handlers.
//!
//! The storage backend is chosen once at startup: Postgres when a database URL
//! is configured, the in-memory store otherwise.

use billfold_core::{AccountId, DomainResult, OrganizationId, ServiceId};
use billfold_infra::{
    InMemoryLedgerStore, InMemoryServiceCatalog, LedgerConfig, LedgerService,
    PostgresLedgerStore, PostgresServiceCatalog, PurchaseReceipt, StoreError,
};
use billfold_ledger::{Account, AccountSummary, Amount, Operation, Organization};

pub type InMemoryLedger = LedgerService<InMemoryLedgerStore, InMemoryServiceCatalog>;
pub type PostgresLedger = LedgerService<PostgresLedgerStore, PostgresServiceCatalog>;

enum Backend {
    InMemory(InMemoryLedger),
    Postgres(PostgresLedger),
}

pub struct AppServices {
    backend: Backend,
}

macro_rules! with_ledger {
    ($services:expr, $ledger:ident => $body:expr) => {
        match &$services.backend {
            Backend::InMemory($ledger) => $body,
            Backend::Postgres($ledger) => $body,
        }
    };
}

impl AppServices {
    pub fn in_memory(store: InMemoryLedgerStore, catalog: InMemoryServiceCatalog) -> Self {
        Self {
            backend: Backend::InMemory(LedgerService::new(store, catalog)),
        }
    }

    pub fn postgres(store: PostgresLedgerStore, catalog: PostgresServiceCatalog) -> Self {
        Self {
            backend: Backend::Postgres(LedgerService::new(store, catalog)),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            Backend::InMemory(_) => "in_memory",
            Backend::Postgres(_) => "postgres",
        }
    }

    pub async fn create_account(&self, name: &str, initial: Amount) -> DomainResult<Account> {
        with_ledger!(self, ledger => ledger.create_account(name, initial).await)
    }

    pub async fn get_account(&self, id: AccountId) -> DomainResult<Account> {
        with_ledger!(self, ledger => ledger.get_account(id).await)
    }

    pub async fn list_accounts(&self) -> DomainResult<Vec<AccountSummary>> {
        with_ledger!(self, ledger => ledger.list_accounts().await)
    }

    pub async fn history(&self, id: AccountId) -> DomainResult<Vec<Operation>> {
        with_ledger!(self, ledger => ledger.history(id).await)
    }

    pub async fn get_organization(&self, id: OrganizationId) -> DomainResult<Organization> {
        with_ledger!(self, ledger => ledger.get_organization(id).await)
    }

    pub async fn deposit(&self, id: AccountId, amount: Amount) -> DomainResult<Account> {
        with_ledger!(self, ledger => ledger.deposit(id, amount).await)
    }

    pub async fn reserve(&self, id: AccountId, amount: Amount) -> DomainResult<Account> {
        with_ledger!(self, ledger => ledger.reserve(id, amount).await)
    }

    pub async fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> DomainResult<Account> {
        with_ledger!(self, ledger => ledger.transfer(from, to, amount).await)
    }

    pub async fn purchase(
        &self,
        buyer: AccountId,
        services: &[ServiceId],
    ) -> DomainResult<PurchaseReceipt> {
        with_ledger!(self, ledger => ledger.purchase(buyer, services).await)
    }
}

/// Wire storage according to `config`.
pub async fn build_services(config: &LedgerConfig) -> Result<AppServices, StoreError> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set; using in-memory ledger store");
        return Ok(AppServices::in_memory(
            InMemoryLedgerStore::new(),
            InMemoryServiceCatalog::new(),
        ));
    };

    let mut store = PostgresLedgerStore::connect(url, config.max_connections).await?;
    if let Some(timeout) = config.lock_timeout() {
        store = store.with_lock_timeout(timeout);
    }
    if config.run_migrations {
        store.migrate().await?;
        tracing::info!("ledger schema applied");
    }

    let catalog = PostgresServiceCatalog::new(store.pool().clone());
    Ok(AppServices::postgres(store, catalog))
}
