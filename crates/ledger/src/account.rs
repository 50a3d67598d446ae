use serde::{Deserialize, Serialize};

use billfold_core::{AccountId, Entity, OrganizationId, ServiceId};

use crate::money::{Amount, Balance};

/// An individual balance holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    /// Spendable funds.
    pub available: Balance,
    /// Funds held back from `available`, pending release.
    pub reserved: Balance,
}

impl Account {
    /// Fresh account with the given available balance and nothing reserved.
    pub fn open(id: AccountId, name: impl Into<String>, initial: Amount) -> Self {
        Self {
            id,
            name: name.into(),
            available: initial.into(),
            reserved: Balance::ZERO,
        }
    }

    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

impl Entity for Account {
    type Id = AccountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// `(id, name)` pair returned by account listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub id: AccountId,
    pub name: String,
}

/// Counterparty credited by purchases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub balance: Balance,
}

impl Organization {
    pub fn new(id: OrganizationId) -> Self {
        Self {
            id,
            balance: Balance::ZERO,
        }
    }
}

impl Entity for Organization {
    type Id = OrganizationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Catalog record: a purchasable service and its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    pub organization: OrganizationId,
    pub price: Amount,
}

/// Aggregate price of a set of services that share one owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePrice {
    pub amount: Amount,
    pub organization: OrganizationId,
}
