use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use billfold_core::{AccountId, DomainError, OrganizationId};

use crate::money::Amount;

/// Kind of balance-affecting action recorded in the operation log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Add,
    Transfer,
    Reserve,
    Buy,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Add => "add",
            OperationKind::Transfer => "transfer",
            OperationKind::Reserve => "reserve",
            OperationKind::Buy => "buy",
        }
    }
}

impl core::str::FromStr for OperationKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(OperationKind::Add),
            "transfer" => Ok(OperationKind::Transfer),
            "reserve" => Ok(OperationKind::Reserve),
            "buy" => Ok(OperationKind::Buy),
            other => Err(DomainError::validation(format!("unknown operation kind '{other}'"))),
        }
    }
}

/// Immutable audit entry.
///
/// `from` and `to` are raw UUIDs because a `buy` entry points at an
/// organization rather than an account. Non-transfer kinds use `from == to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub occurred_at: DateTime<Utc>,
    pub from: Uuid,
    pub to: Uuid,
    pub kind: OperationKind,
    pub amount: Amount,
}

impl Operation {
    fn new(kind: OperationKind, from: Uuid, to: Uuid, amount: Amount, at: DateTime<Utc>) -> Self {
        Self {
            occurred_at: at.trunc_subsecs(0),
            from,
            to,
            kind,
            amount,
        }
    }

    pub fn add(account: AccountId, amount: Amount, at: DateTime<Utc>) -> Self {
        let id = *account.as_uuid();
        Self::new(OperationKind::Add, id, id, amount, at)
    }

    pub fn transfer(from: AccountId, to: AccountId, amount: Amount, at: DateTime<Utc>) -> Self {
        Self::new(OperationKind::Transfer, *from.as_uuid(), *to.as_uuid(), amount, at)
    }

    pub fn reserve(account: AccountId, amount: Amount, at: DateTime<Utc>) -> Self {
        let id = *account.as_uuid();
        Self::new(OperationKind::Reserve, id, id, amount, at)
    }

    pub fn buy(buyer: AccountId, seller: OrganizationId, amount: Amount, at: DateTime<Utc>) -> Self {
        Self::new(OperationKind::Buy, *buyer.as_uuid(), *seller.as_uuid(), amount, at)
    }

    /// Whether this entry touches the given account on either side.
    pub fn involves(&self, account: AccountId) -> bool {
        self.from == *account.as_uuid() || self.to == *account.as_uuid()
    }
}
