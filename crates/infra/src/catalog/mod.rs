//! Read-only service catalog.
//!
//! A purchase resolves its service ids to one aggregate price and the single
//! organization that owns them before any atomic unit opens.

use std::collections::{BTreeSet, HashSet};

use async_trait::async_trait;

use billfold_core::{DomainError, DomainResult, OrganizationId, ServiceId};
use billfold_ledger::{carry, Service, ServicePrice};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryServiceCatalog;
pub use postgres::PostgresServiceCatalog;

#[async_trait]
pub trait ServiceCatalog: Send + Sync {
    /// Aggregate price and owner of a set of services.
    ///
    /// Duplicate ids count once. Errors: empty set ⇒ `Validation`, unknown id ⇒
    /// `NotFound`, services from several organizations ⇒ `AmbiguousOwner`.
    async fn price_of(&self, services: &[ServiceId]) -> DomainResult<ServicePrice>;
}

#[async_trait]
impl<C> ServiceCatalog for std::sync::Arc<C>
where
    C: ServiceCatalog,
{
    async fn price_of(&self, services: &[ServiceId]) -> DomainResult<ServicePrice> {
        (**self).price_of(services).await
    }
}

/// Collapse duplicate ids, rejecting an empty request.
pub(crate) fn distinct(requested: &[ServiceId]) -> DomainResult<Vec<ServiceId>> {
    if requested.is_empty() {
        return Err(DomainError::validation("at least one service is required"));
    }
    let mut seen = HashSet::with_capacity(requested.len());
    Ok(requested.iter().copied().filter(|id| seen.insert(*id)).collect())
}

/// Fold the catalog rows found for `requested` into one price.
pub(crate) fn resolve_price(requested: &[ServiceId], found: &[Service]) -> DomainResult<ServicePrice> {
    let wanted = distinct(requested)?;

    if let Some(missing) = wanted
        .iter()
        .find(|id| !found.iter().any(|s| s.id == **id))
    {
        return Err(DomainError::not_found(format!("service {missing}")));
    }

    let matched: Vec<&Service> = found.iter().filter(|s| wanted.contains(&s.id)).collect();
    let owners: BTreeSet<OrganizationId> = matched.iter().map(|s| s.organization).collect();
    let mut owners = owners.into_iter();
    let organization = match (owners.next(), owners.next()) {
        (Some(only), None) => only,
        (Some(first), Some(second)) => {
            let mut all = vec![first, second];
            all.extend(owners);
            return Err(DomainError::AmbiguousOwner(all));
        }
        (None, _) => return Err(DomainError::validation("at least one service is required")),
    };

    let amount = carry::normalize_sum(matched.iter().map(|s| s.price))?;
    Ok(ServicePrice { amount, organization })
}
