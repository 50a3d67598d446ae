//! Commit-or-rollback orchestration around one atomic unit.
//!
//! ```text
//! operation
//!   ↓
//! 1. Open a unit on the injected store
//!   ↓
//! 2. Run the body against the unit (locks, reads, tentative writes)
//!   ↓
//! 3a. Ok  → commit, return the body's value
//! 3b. Err → roll back, return the body's error unchanged
//! ```
//!
//! There is no retry here. A retryable persistence error is handed back to the
//! caller, who decides whether to run the whole operation again.

use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::pin::Pin;

use tracing::{debug, info_span, warn, Instrument};

use billfold_core::DomainResult;

use crate::store::{LedgerStore, LedgerUnit};

/// Boxed body future borrowing the unit for `'u`.
pub type UnitFuture<'u, T> = Pin<Box<dyn Future<Output = DomainResult<T>> + Send + 'u>>;

/// Scoped guard around a store unit.
///
/// [`AtomicUnit::commit`] consumes the guard. Dropping it without committing
/// (early return, `?`, panic, or a cancelled caller future) rolls back through
/// the underlying unit's own drop behaviour.
pub struct AtomicUnit<U> {
    unit: U,
}

impl<U: LedgerUnit> AtomicUnit<U> {
    pub async fn commit(self) -> DomainResult<()> {
        self.unit.commit().await.map_err(Into::into)
    }

    pub async fn rollback(self) -> DomainResult<()> {
        self.unit.rollback().await.map_err(Into::into)
    }
}

impl<U> Deref for AtomicUnit<U> {
    type Target = U;

    fn deref(&self) -> &Self::Target {
        &self.unit
    }
}

impl<U> DerefMut for AtomicUnit<U> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.unit
    }
}

/// Hands out atomic units on the injected store.
#[derive(Debug, Clone)]
pub struct TransactionCoordinator<S> {
    store: S,
}

impl<S: LedgerStore> TransactionCoordinator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn begin(&self) -> DomainResult<AtomicUnit<S::Unit>> {
        let unit = self.store.begin().await?;
        Ok(AtomicUnit { unit })
    }

    /// Run `body` inside a fresh unit, committing on `Ok` and rolling back on `Err`.
    ///
    /// A failed rollback is logged and the body's error is still the one
    /// returned.
    pub async fn run_atomic<T, F>(&self, operation: &'static str, body: F) -> DomainResult<T>
    where
        T: Send,
        F: for<'u> FnOnce(&'u mut AtomicUnit<S::Unit>) -> UnitFuture<'u, T> + Send,
    {
        let span = info_span!("atomic_unit", operation);
        async move {
            let mut unit = self.begin().await?;
            let outcome = body(&mut unit).await;
            match outcome {
                Ok(value) => {
                    unit.commit().await?;
                    debug!("committed");
                    Ok(value)
                }
                Err(err) => {
                    debug!(error = %err, "rolling back");
                    if let Err(rollback_err) = unit.rollback().await {
                        warn!(error = %rollback_err, "rollback failed");
                    }
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use billfold_core::{AccountId, DomainError};
    use billfold_ledger::{Account, Amount, Balance};

    use crate::store::InMemoryLedgerStore;

    async fn seeded() -> (TransactionCoordinator<InMemoryLedgerStore>, AccountId) {
        let coordinator = TransactionCoordinator::new(InMemoryLedgerStore::new());
        let account = Account::open(AccountId::new(), "Alice", Amount::new(1, 0).unwrap());
        let id = account.id;
        coordinator
            .run_atomic("seed", move |unit| {
                Box::pin(async move {
                    unit.insert_account(&account).await?;
                    Ok::<_, DomainError>(())
                })
            })
            .await
            .unwrap();
        (coordinator, id)
    }

    #[tokio::test]
    async fn ok_body_commits() {
        let (coordinator, id) = seeded().await;
        let value = coordinator
            .run_atomic("write", move |unit| {
                Box::pin(async move {
                    unit.set_available(id, Balance::new(7, 0)).await?;
                    Ok::<_, DomainError>(42)
                })
            })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(
            coordinator.store().account(id).await.unwrap().available,
            Balance::new(7, 0)
        );
    }

    #[tokio::test]
    async fn err_body_rolls_back_and_keeps_its_error() {
        let (coordinator, id) = seeded().await;
        let err = coordinator
            .run_atomic("write", move |unit| {
                Box::pin(async move {
                    unit.set_available(id, Balance::new(-3, 0)).await?;
                    Err::<(), _>(DomainError::insufficient_funds(id))
                })
            })
            .await
            .unwrap_err();

        assert_eq!(err, DomainError::insufficient_funds(id));
        assert_eq!(
            coordinator.store().account(id).await.unwrap().available,
            Balance::new(1, 0)
        );
    }

    #[tokio::test]
    async fn dropped_guard_rolls_back() {
        let (coordinator, id) = seeded().await;
        {
            let mut unit = coordinator.begin().await.unwrap();
            unit.set_available(id, Balance::new(0, 0)).await.unwrap();
        }
        assert_eq!(
            coordinator.store().account(id).await.unwrap().available,
            Balance::new(1, 0)
        );
    }
}
