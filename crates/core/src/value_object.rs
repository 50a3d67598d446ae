//! Value object trait: equality by value, not identity.
//!
//! Monetary amounts and balances are value objects: two balances of
//! `(4, 80)` are the same balance regardless of which account holds them.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. To "modify" one,
/// build a new one (the carry normalizer returns fresh balances rather than
/// mutating its inputs).
///
/// The trait requires:
/// - **Copy/Clone**: value objects are cheap to copy
/// - **PartialEq**: compared by their attribute values
/// - **Debug**: helpful for logging and test failures
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
