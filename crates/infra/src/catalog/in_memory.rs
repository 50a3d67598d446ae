use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use billfold_core::{DomainError, DomainResult, ServiceId};
use billfold_ledger::{Service, ServicePrice};

use super::{distinct, resolve_price, ServiceCatalog};

/// In-memory service catalog.
///
/// Intended for tests/dev. Seed it with [`InMemoryServiceCatalog::register`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryServiceCatalog {
    services: Arc<RwLock<HashMap<ServiceId, Service>>>,
}

impl InMemoryServiceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a catalog entry.
    pub fn register(&self, service: Service) -> DomainResult<()> {
        let mut services = self
            .services
            .write()
            .map_err(|_| DomainError::persistence("service catalog lock poisoned"))?;
        services.insert(service.id, service);
        Ok(())
    }
}

#[async_trait]
impl ServiceCatalog for InMemoryServiceCatalog {
    async fn price_of(&self, requested: &[ServiceId]) -> DomainResult<ServicePrice> {
        let wanted = distinct(requested)?;
        let found: Vec<Service> = {
            let services = self
                .services
                .read()
                .map_err(|_| DomainError::persistence("service catalog lock poisoned"))?;
            wanted.iter().filter_map(|id| services.get(id).cloned()).collect()
        };
        resolve_price(&wanted, &found)
    }
}
