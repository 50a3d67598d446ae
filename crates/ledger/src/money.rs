use serde::{Deserialize, Serialize};

use billfold_core::{DomainError, DomainResult, ValueObject};

/// Minor units per major unit (e.g. kopecks per ruble).
pub const MINOR_PER_MAJOR: i64 = 100;

/// A validated, non-negative monetary amount.
///
/// `major >= 0` and `0 <= minor < 100` hold for every constructed value, so a
/// single borrow always suffices when debiting it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "RawAmount")]
pub struct Amount {
    major: i64,
    minor: i64,
}

#[derive(Deserialize)]
struct RawAmount {
    major: i64,
    minor: i64,
}

impl TryFrom<RawAmount> for Amount {
    type Error = DomainError;

    fn try_from(raw: RawAmount) -> Result<Self, Self::Error> {
        Amount::new(raw.major, raw.minor)
    }
}

impl Amount {
    pub const ZERO: Amount = Amount { major: 0, minor: 0 };

    /// Validate and build an amount.
    pub fn new(major: i64, minor: i64) -> DomainResult<Self> {
        if major < 0 {
            return Err(DomainError::validation(format!(
                "major units must be non-negative (got {major})"
            )));
        }
        if !(0..MINOR_PER_MAJOR).contains(&minor) {
            return Err(DomainError::validation(format!(
                "minor units must be in [0, {MINOR_PER_MAJOR}) (got {minor})"
            )));
        }
        Ok(Self { major, minor })
    }

    /// Build an amount from non-negative parts, carrying minor overflow into major.
    pub fn normalized(major: i64, minor: i64) -> DomainResult<Self> {
        if major < 0 || minor < 0 {
            return Err(DomainError::validation(format!(
                "amount parts must be non-negative (got {major}, {minor})"
            )));
        }
        let carried = major
            .checked_add(minor / MINOR_PER_MAJOR)
            .ok_or_else(|| DomainError::validation("amount overflows major units"))?;
        Self::new(carried, minor % MINOR_PER_MAJOR)
    }

    pub fn major(&self) -> i64 {
        self.major
    }

    pub fn minor(&self) -> i64 {
        self.minor
    }

    /// Total value expressed in minor units.
    pub fn total_minor(&self) -> i128 {
        self.major as i128 * MINOR_PER_MAJOR as i128 + self.minor as i128
    }
}

impl ValueObject for Amount {}

impl core::fmt::Display for Amount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{:02}", self.major, self.minor)
    }
}

/// A stored balance in major/minor form.
///
/// Unlike [`Amount`], a `Balance` may be out of range while an operation is in
/// flight (after a borrow `minor` can reach 199; after an overdrawn subtraction
/// either part can go negative). Committed balances are always normalized.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Balance {
    pub major: i64,
    pub minor: i64,
}

impl Balance {
    pub const ZERO: Balance = Balance { major: 0, minor: 0 };

    pub fn new(major: i64, minor: i64) -> Self {
        Self { major, minor }
    }

    /// `major >= 0` and `0 <= minor < 100`.
    pub fn is_normalized(&self) -> bool {
        self.major >= 0 && (0..MINOR_PER_MAJOR).contains(&self.minor)
    }

    /// Total value expressed in minor units.
    pub fn total_minor(&self) -> i128 {
        self.major as i128 * MINOR_PER_MAJOR as i128 + self.minor as i128
    }
}

impl ValueObject for Balance {}

impl From<Amount> for Balance {
    fn from(amount: Amount) -> Self {
        Self {
            major: amount.major,
            minor: amount.minor,
        }
    }
}

impl core::fmt::Display for Balance {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {})", self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_rejects_minor_out_of_range() {
        assert!(Amount::new(1, 100).is_err());
        assert!(Amount::new(1, -1).is_err());
        assert!(Amount::new(-1, 0).is_err());
        assert_eq!(Amount::new(3, 99).unwrap().minor(), 99);
    }

    #[test]
    fn normalized_carries_overflow() {
        let amount = Amount::normalized(2, 250).unwrap();
        assert_eq!((amount.major(), amount.minor()), (4, 50));
    }

    #[test]
    fn deserialization_validates_minor_units() {
        let ok: Amount = serde_json::from_str(r#"{"major":10,"minor":50}"#).unwrap();
        assert_eq!(ok, Amount::new(10, 50).unwrap());

        let bad = serde_json::from_str::<Amount>(r#"{"major":10,"minor":150}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn balance_normalization_bounds() {
        assert!(Balance::new(0, 0).is_normalized());
        assert!(Balance::new(4, 99).is_normalized());
        assert!(!Balance::new(9, 150).is_normalized());
        assert!(!Balance::new(0, -10).is_normalized());
        assert!(!Balance::new(-1, 90).is_normalized());
    }
}
