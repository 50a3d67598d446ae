use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use billfold_core::{DomainError, DomainResult, OrganizationId, ServiceId};
use billfold_ledger::{Amount, Service, ServicePrice};

use super::{distinct, resolve_price, ServiceCatalog};
use crate::store::postgres::map_sqlx_error;

/// Postgres service catalog over the `services` table.
///
/// Ids travel as one array parameter (`service_id = ANY($1)`); the price is
/// aggregated in Rust so minor-unit carrying matches the ledger's own rules.
#[derive(Debug, Clone)]
pub struct PostgresServiceCatalog {
    pool: Arc<PgPool>,
}

impl PostgresServiceCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl ServiceCatalog for PostgresServiceCatalog {
    #[instrument(skip(self, requested), fields(count = requested.len()), err)]
    async fn price_of(&self, requested: &[ServiceId]) -> DomainResult<ServicePrice> {
        let wanted = distinct(requested)?;
        let ids: Vec<Uuid> = wanted.iter().map(|id| *id.as_uuid()).collect();

        let rows = sqlx::query(
            r#"
            SELECT service_id, org_id, price_major, price_minor
            FROM services
            WHERE service_id = ANY($1)
            "#,
        )
        .bind(&ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| DomainError::from(map_sqlx_error("load_services", e)))?;

        let mut found = Vec::with_capacity(rows.len());
        for row in rows {
            let row = ServiceRow::from_row(&row)
                .map_err(|e| DomainError::persistence(format!("failed to decode service row: {e}")))?;
            found.push(row.try_into()?);
        }

        resolve_price(&wanted, &found)
    }
}

#[derive(Debug)]
struct ServiceRow {
    service_id: Uuid,
    org_id: Uuid,
    price_major: i64,
    price_minor: i64,
}

impl<'r> sqlx::FromRow<'r, PgRow> for ServiceRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ServiceRow {
            service_id: row.try_get("service_id")?,
            org_id: row.try_get("org_id")?,
            price_major: row.try_get("price_major")?,
            price_minor: row.try_get("price_minor")?,
        })
    }
}

impl TryFrom<ServiceRow> for Service {
    type Error = DomainError;

    fn try_from(row: ServiceRow) -> Result<Self, Self::Error> {
        let price = Amount::new(row.price_major, row.price_minor)
            .map_err(|e| DomainError::persistence(format!("corrupt service row {}: {e}", row.service_id)))?;
        Ok(Service {
            id: ServiceId::from_uuid(row.service_id),
            organization: OrganizationId::from_uuid(row.org_id),
            price,
        })
    }
}
