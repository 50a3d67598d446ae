//! Postgres-backed ledger store.
//!
//! One atomic unit is one database transaction. Row exclusivity comes from
//! `SELECT ... FOR UPDATE`, always taken in ascending id order for accounts and
//! after that for the organization. Dropping a unit without committing lets
//! sqlx roll the transaction back.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database | `40P01` | `Conflict` | Deadlock detected |
//! | Database | `40001` | `Conflict` | Serialization failure |
//! | Database | `55P03` | `Conflict` | Lock not available (`lock_timeout`) |
//! | Database | `23505` | `Conflict` | Duplicate key on insert |
//! | Database | Any other | `Backend` | Constraint or statement failure |
//! | PoolTimedOut | N/A | `Conflict` | No connection available in time |
//! | Other | N/A | `Backend` | Network errors, closed pool, decode errors |

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use billfold_core::{AccountId, OrganizationId};
use billfold_ledger::{Account, AccountSummary, Amount, Balance, Operation, OperationKind, Organization};

use super::r#trait::{lock_order, LedgerStore, LedgerUnit, StoreError};

/// Postgres ledger store.
///
/// Cheap to clone; clones share the same connection pool.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: Arc<PgPool>,
    lock_timeout: Option<Duration>,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
            lock_timeout: None,
        }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Bound how long a unit waits for a row lock before failing with a
    /// retryable conflict.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the bundled schema. Idempotent.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(include_str!("../../migrations/0001_ledger.sql"))
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    /// Seed an organization row if it does not exist yet.
    #[instrument(skip(self), fields(org_id = %id), err)]
    pub async fn insert_organization(&self, id: OrganizationId) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO organizations (org_id) VALUES ($1) ON CONFLICT (org_id) DO NOTHING")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_organization", e))?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    type Unit = PostgresUnit;

    #[instrument(skip(self), err)]
    async fn begin(&self) -> Result<Self::Unit, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        if let Some(timeout) = self.lock_timeout {
            sqlx::query("SELECT set_config('lock_timeout', $1, true)")
                .bind(format!("{}ms", timeout.as_millis()))
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("set_lock_timeout", e))?;
        }

        Ok(PostgresUnit { tx })
    }

    #[instrument(skip(self), fields(account_id = %id), err)]
    async fn account(&self, id: AccountId) -> Result<Account, StoreError> {
        let row = sqlx::query(SELECT_ACCOUNT)
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_account", e))?;
        decode_account(id, row)
    }

    #[instrument(skip(self), err)]
    async fn list_accounts(&self) -> Result<Vec<AccountSummary>, StoreError> {
        let rows = sqlx::query("SELECT id, name FROM accounts ORDER BY name ASC, id ASC")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_accounts", e))?;

        rows.iter()
            .map(|row| {
                Ok(AccountSummary {
                    id: AccountId::from_uuid(row.try_get("id").map_err(decode_error)?),
                    name: row.try_get("name").map_err(decode_error)?,
                })
            })
            .collect()
    }

    #[instrument(skip(self), fields(org_id = %id), err)]
    async fn organization(&self, id: OrganizationId) -> Result<Organization, StoreError> {
        let row = sqlx::query(SELECT_ORGANIZATION)
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_organization", e))?;
        decode_organization(id, row)
    }

    #[instrument(skip(self), fields(account_id = %account), err)]
    async fn history(&self, account: AccountId) -> Result<Vec<Operation>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT occurred_at, from_id, to_id, kind, major, minor
            FROM operations
            WHERE from_id = $1 OR to_id = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(account.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_history", e))?;

        let mut operations = Vec::with_capacity(rows.len());
        for row in rows {
            let op = OperationRow::from_row(&row).map_err(decode_error)?;
            operations.push(op.try_into()?);
        }
        Ok(operations)
    }
}

/// Atomic unit backed by one Postgres transaction.
pub struct PostgresUnit {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerUnit for PostgresUnit {
    #[instrument(skip(self), fields(count = ids.len()), err)]
    async fn lock_accounts(&mut self, ids: &[AccountId]) -> Result<(), StoreError> {
        let ordered: Vec<Uuid> = lock_order(ids).iter().map(|id| *id.as_uuid()).collect();
        sqlx::query("SELECT id FROM accounts WHERE id = ANY($1) ORDER BY id FOR UPDATE")
            .bind(&ordered)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lock_accounts", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(org_id = %id), err)]
    async fn lock_organization(&mut self, id: OrganizationId) -> Result<(), StoreError> {
        sqlx::query("SELECT org_id FROM organizations WHERE org_id = $1 FOR UPDATE")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lock_organization", e))?;
        Ok(())
    }

    async fn account(&mut self, id: AccountId) -> Result<Account, StoreError> {
        let row = sqlx::query(SELECT_ACCOUNT)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("load_account", e))?;
        decode_account(id, row)
    }

    #[instrument(skip(self, account), fields(account_id = %account.id), err)]
    async fn insert_account(&mut self, account: &Account) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, name, available_major, available_minor, reserved_major, reserved_minor)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(account.id.as_uuid())
        .bind(&account.name)
        .bind(account.available.major)
        .bind(account.available.minor)
        .bind(account.reserved.major)
        .bind(account.reserved.minor)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_account", e))?;
        Ok(())
    }

    async fn set_available(&mut self, id: AccountId, balance: Balance) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE accounts SET available_major = $2, available_minor = $3 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(balance.major)
            .bind(balance.minor)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("set_available", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::account_not_found(id));
        }
        Ok(())
    }

    async fn set_reserved(&mut self, id: AccountId, balance: Balance) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE accounts SET reserved_major = $2, reserved_minor = $3 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(balance.major)
            .bind(balance.minor)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("set_reserved", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::account_not_found(id));
        }
        Ok(())
    }

    async fn organization(&mut self, id: OrganizationId) -> Result<Organization, StoreError> {
        let row = sqlx::query(SELECT_ORGANIZATION)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("load_organization", e))?;
        decode_organization(id, row)
    }

    async fn set_organization_balance(
        &mut self,
        id: OrganizationId,
        balance: Balance,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE organizations SET major = $2, minor = $3 WHERE org_id = $1")
            .bind(id.as_uuid())
            .bind(balance.major)
            .bind(balance.minor)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("set_organization_balance", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::organization_not_found(id));
        }
        Ok(())
    }

    #[instrument(skip(self, operation), fields(kind = operation.kind.as_str()), err)]
    async fn append_operation(&mut self, operation: &Operation) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO operations (occurred_at, from_id, to_id, kind, major, minor)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(operation.occurred_at)
        .bind(operation.from)
        .bind(operation.to)
        .bind(operation.kind.as_str())
        .bind(operation.amount.major())
        .bind(operation.amount.minor())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("append_operation", e))?;
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback_transaction", e))
    }
}

const SELECT_ACCOUNT: &str = r#"
    SELECT id, name, available_major, available_minor, reserved_major, reserved_minor
    FROM accounts
    WHERE id = $1
"#;

const SELECT_ORGANIZATION: &str = "SELECT org_id, major, minor FROM organizations WHERE org_id = $1";

fn decode_account(id: AccountId, row: Option<PgRow>) -> Result<Account, StoreError> {
    let row = row.ok_or_else(|| StoreError::account_not_found(id))?;
    let row = AccountRow::from_row(&row).map_err(decode_error)?;
    Ok(row.into())
}

fn decode_organization(id: OrganizationId, row: Option<PgRow>) -> Result<Organization, StoreError> {
    let row = row.ok_or_else(|| StoreError::organization_not_found(id))?;
    Ok(Organization {
        id: OrganizationId::from_uuid(row.try_get("org_id").map_err(decode_error)?),
        balance: Balance::new(
            row.try_get("major").map_err(decode_error)?,
            row.try_get("minor").map_err(decode_error)?,
        ),
    })
}

fn decode_error(err: sqlx::Error) -> StoreError {
    StoreError::Backend(format!("failed to decode row: {err}"))
}

/// Map SQLx errors to store errors.
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // deadlock, serialization failure, lock timeout, duplicate key
                Some("40P01") | Some("40001") | Some("55P03") | Some("23505") => {
                    StoreError::Conflict(msg)
                }
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Conflict(format!("connection pool timed out in {operation}"))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

#[derive(Debug)]
struct AccountRow {
    id: Uuid,
    name: String,
    available_major: i64,
    available_minor: i64,
    reserved_major: i64,
    reserved_minor: i64,
}

impl<'r> sqlx::FromRow<'r, PgRow> for AccountRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(AccountRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            available_major: row.try_get("available_major")?,
            available_minor: row.try_get("available_minor")?,
            reserved_major: row.try_get("reserved_major")?,
            reserved_minor: row.try_get("reserved_minor")?,
        })
    }
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            id: AccountId::from_uuid(row.id),
            name: row.name,
            available: Balance::new(row.available_major, row.available_minor),
            reserved: Balance::new(row.reserved_major, row.reserved_minor),
        }
    }
}

#[derive(Debug)]
struct OperationRow {
    occurred_at: DateTime<Utc>,
    from_id: Uuid,
    to_id: Uuid,
    kind: String,
    major: i64,
    minor: i64,
}

impl<'r> sqlx::FromRow<'r, PgRow> for OperationRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(OperationRow {
            occurred_at: row.try_get("occurred_at")?,
            from_id: row.try_get("from_id")?,
            to_id: row.try_get("to_id")?,
            kind: row.try_get("kind")?,
            major: row.try_get("major")?,
            minor: row.try_get("minor")?,
        })
    }
}

impl TryFrom<OperationRow> for Operation {
    type Error = StoreError;

    fn try_from(row: OperationRow) -> Result<Self, Self::Error> {
        let kind: OperationKind = row
            .kind
            .parse()
            .map_err(|e| StoreError::Backend(format!("corrupt operation row: {e}")))?;
        let amount = Amount::new(row.major, row.minor)
            .map_err(|e| StoreError::Backend(format!("corrupt operation row: {e}")))?;
        Ok(Operation {
            occurred_at: row.occurred_at,
            from: row.from_id,
            to: row.to_id,
            kind,
            amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;
    use std::fmt;

    use billfold_core::DomainError;
    use sqlx::error::{DatabaseError, ErrorKind};

    use super::*;

    /// Database error carrying a fixed SQLSTATE.
    #[derive(Debug)]
    struct SqlState(&'static str);

    impl fmt::Display for SqlState {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "sqlstate {}", self.0)
        }
    }

    impl std::error::Error for SqlState {}

    impl DatabaseError for SqlState {
        fn message(&self) -> &str {
            "simulated failure"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.0))
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            match self.0 {
                "23505" => ErrorKind::UniqueViolation,
                "23503" => ErrorKind::ForeignKeyViolation,
                _ => ErrorKind::Other,
            }
        }
    }

    fn database_error(code: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(SqlState(code)))
    }

    #[test]
    fn lock_and_serialization_failures_are_retryable_conflicts() {
        for code in ["40P01", "40001", "55P03", "23505"] {
            let mapped = map_sqlx_error("lock_accounts", database_error(code));
            assert!(matches!(mapped, StoreError::Conflict(_)), "{code} -> {mapped:?}");

            let domain: DomainError = mapped.into();
            assert!(domain.is_retryable(), "{code} should be retryable");
        }
    }

    #[test]
    fn other_sqlstates_are_permanent_backend_errors() {
        for code in ["23503", "42P01", "22003"] {
            let mapped = map_sqlx_error("append_operation", database_error(code));
            assert!(matches!(mapped, StoreError::Backend(_)), "{code} -> {mapped:?}");

            let domain: DomainError = mapped.into();
            assert!(!domain.is_retryable(), "{code} should not be retryable");
        }
    }

    #[test]
    fn pool_timeouts_are_retryable_conflicts() {
        assert!(matches!(
            map_sqlx_error("begin_transaction", sqlx::Error::PoolTimedOut),
            StoreError::Conflict(_)
        ));
    }

    #[test]
    fn other_failures_are_backend_errors() {
        assert!(matches!(
            map_sqlx_error("begin_transaction", sqlx::Error::PoolClosed),
            StoreError::Backend(_)
        ));
        assert!(matches!(
            map_sqlx_error("load_account", sqlx::Error::RowNotFound),
            StoreError::Backend(_)
        ));
    }

    #[test]
    fn corrupt_operation_rows_are_rejected() {
        let row = OperationRow {
            occurred_at: Utc::now(),
            from_id: Uuid::nil(),
            to_id: Uuid::nil(),
            kind: "refund".to_string(),
            major: 1,
            minor: 0,
        };
        assert!(matches!(Operation::try_from(row), Err(StoreError::Backend(_))));

        let row = OperationRow {
            occurred_at: Utc::now(),
            from_id: Uuid::nil(),
            to_id: Uuid::nil(),
            kind: "add".to_string(),
            major: 1,
            minor: 250,
        };
        assert!(matches!(Operation::try_from(row), Err(StoreError::Backend(_))));
    }

    /// Runs against a live database: `DATABASE_URL=... cargo test -- --ignored`.
    mod live {
        use billfold_core::{DomainError, ServiceId};
        use billfold_ledger::OperationKind;

        use super::*;
        use crate::catalog::PostgresServiceCatalog;
        use crate::service::LedgerService;

        async fn store() -> PostgresLedgerStore {
            let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
            let store = PostgresLedgerStore::connect(&url, 4).await.unwrap();
            store.migrate().await.unwrap();
            store
        }

        fn amount(major: i64, minor: i64) -> Amount {
            Amount::new(major, minor).unwrap()
        }

        #[tokio::test]
        #[ignore = "requires DATABASE_URL"]
        async fn transfer_and_purchase_round_trip() {
            let store = store().await;
            let catalog = PostgresServiceCatalog::new(store.pool().clone());
            let ledger = LedgerService::new(store.clone(), catalog);

            let org = OrganizationId::new();
            store.insert_organization(org).await.unwrap();
            store.insert_organization(org).await.unwrap();
            let service = ServiceId::new();
            sqlx::query(
                "INSERT INTO services (service_id, org_id, price_major, price_minor) VALUES ($1, $2, 1, 60)",
            )
            .bind(service.as_uuid())
            .bind(org.as_uuid())
            .execute(store.pool())
            .await
            .unwrap();

            let alice = ledger.create_account("Alice", amount(10, 50)).await.unwrap();
            let bob = ledger.create_account("Bob", Amount::ZERO).await.unwrap();

            let source = ledger.transfer(alice.id, bob.id, amount(5, 70)).await.unwrap();
            assert_eq!(source.available, Balance::new(4, 80));

            let err = ledger
                .transfer(bob.id, alice.id, amount(9, 0))
                .await
                .unwrap_err();
            assert!(matches!(err, DomainError::InsufficientFunds { .. }));
            assert_eq!(
                ledger.get_account(bob.id).await.unwrap().available,
                Balance::new(5, 70)
            );

            let receipt = ledger.purchase(alice.id, &[service]).await.unwrap();
            assert_eq!(receipt.buyer.available, Balance::new(3, 20));
            assert_eq!(receipt.buyer.reserved, Balance::ZERO);
            assert_eq!(
                ledger.get_organization(org).await.unwrap().balance,
                Balance::new(1, 60)
            );

            let kinds: Vec<OperationKind> = ledger
                .history(alice.id)
                .await
                .unwrap()
                .into_iter()
                .map(|op| op.kind)
                .collect();
            assert_eq!(
                kinds,
                vec![OperationKind::Transfer, OperationKind::Reserve, OperationKind::Buy]
            );
        }

        #[tokio::test]
        #[ignore = "requires DATABASE_URL"]
        async fn lock_wait_past_timeout_is_a_conflict() {
            let store = store().await;
            let ledger = LedgerService::new(
                store.clone(),
                PostgresServiceCatalog::new(store.pool().clone()),
            );
            let alice = ledger.create_account("Alice", amount(1, 0)).await.unwrap();

            let mut holder = store.begin().await.unwrap();
            holder.lock_accounts(&[alice.id]).await.unwrap();

            let impatient = store.clone().with_lock_timeout(Duration::from_millis(100));
            let mut waiter = impatient.begin().await.unwrap();
            let err = waiter.lock_accounts(&[alice.id]).await.unwrap_err();
            assert!(matches!(err, StoreError::Conflict(_)));

            drop(waiter);
            holder.rollback().await.unwrap();
        }
    }
}
