//! Carry normalizer: two-unit arithmetic with borrow-on-debit.
//!
//! Every function here is pure. Debits follow an apply-then-verify policy: the
//! caller persists the result of [`borrow`] and then of [`subtract`], reads the
//! balance back, and only then checks [`Balance::is_normalized`]. A failed check
//! must abort the enclosing atomic unit so none of the intermediate writes stay
//! visible.

use billfold_core::{DomainError, DomainResult};

use crate::money::{Amount, Balance, MINOR_PER_MAJOR};

/// Convert one major unit into minor units when the minor balance alone cannot
/// cover `amount.minor`.
///
/// At most one borrow is attempted. Amounts keep `minor < 100`, so one is
/// always enough when the account can afford the debit.
pub fn borrow(balance: Balance, amount: Amount) -> Balance {
    if balance.minor < amount.minor() && balance.major >= 1 {
        Balance::new(balance.major - 1, balance.minor + MINOR_PER_MAJOR)
    } else {
        balance
    }
}

/// Component-wise subtraction with no range checks.
pub fn subtract(balance: Balance, amount: Amount) -> Balance {
    Balance::new(balance.major - amount.major(), balance.minor - amount.minor())
}

/// Borrow, subtract, and report whether the result is a valid balance.
///
/// When `ok` is false the returned candidate must be discarded and the
/// operation reported as insufficient funds.
pub fn debit(balance: Balance, amount: Amount) -> (Balance, bool) {
    let candidate = subtract(borrow(balance, amount), amount);
    let ok = candidate.major >= 0 && candidate.minor >= 0;
    (candidate, ok)
}

/// Addition; credits can only increase value.
///
/// Minor overflow carries into major so a normalized balance stays normalized.
/// A result past `i64::MAX` major units is a validation error, never a wrap.
pub fn credit(balance: Balance, amount: Amount) -> DomainResult<Balance> {
    let overflow = || DomainError::validation("credit overflows major units");
    let major = balance
        .major
        .checked_add(amount.major())
        .ok_or_else(overflow)?;
    let minor = balance
        .minor
        .checked_add(amount.minor())
        .ok_or_else(overflow)?;
    if minor >= MINOR_PER_MAJOR {
        let carried = major
            .checked_add(minor / MINOR_PER_MAJOR)
            .ok_or_else(overflow)?;
        Ok(Balance::new(carried, minor % MINOR_PER_MAJOR))
    } else {
        Ok(Balance::new(major, minor))
    }
}

/// Take `amount` back out of a balance that was just credited with it.
///
/// Used for the reserve/release pair during a purchase; the preceding credit
/// guarantees the result is non-negative.
pub fn release(balance: Balance, amount: Amount) -> Balance {
    subtract(borrow(balance, amount), amount)
}

/// Sum catalog prices and carry the minor overflow into major units.
pub fn normalize_sum<I>(amounts: I) -> DomainResult<Amount>
where
    I: IntoIterator<Item = Amount>,
{
    let overflow = || DomainError::validation("price sum overflows major units");
    let mut major: i64 = 0;
    let mut minor: i64 = 0;
    for amount in amounts {
        major = major.checked_add(amount.major()).ok_or_else(overflow)?;
        minor = minor.checked_add(amount.minor()).ok_or_else(overflow)?;
    }
    Amount::normalized(major, minor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn amount(major: i64, minor: i64) -> Amount {
        Amount::new(major, minor).unwrap()
    }

    #[test]
    fn borrow_triggers_when_minor_short_and_major_available() {
        let borrowed = borrow(Balance::new(10, 50), amount(5, 70));
        assert_eq!(borrowed, Balance::new(9, 150));
        assert_eq!(subtract(borrowed, amount(5, 70)), Balance::new(4, 80));
    }

    #[test]
    fn no_borrow_without_major_units() {
        let (candidate, ok) = debit(Balance::new(0, 10), amount(0, 20));
        assert!(!ok);
        assert_eq!(candidate, Balance::new(0, -10));
    }

    #[test]
    fn borrow_does_not_hide_major_shortfall() {
        let (candidate, ok) = debit(Balance::new(1, 10), amount(1, 20));
        assert!(!ok);
        assert_eq!(candidate, Balance::new(-1, 90));
    }

    #[test]
    fn exact_debit_reaches_zero() {
        assert_eq!(debit(Balance::new(2, 5), amount(2, 5)), (Balance::ZERO, true));
    }

    #[test]
    fn credit_carries_minor_overflow() {
        assert_eq!(credit(Balance::new(4, 80), amount(10, 50)).unwrap(), Balance::new(15, 30));
        assert_eq!(credit(Balance::ZERO, amount(5, 70)).unwrap(), Balance::new(5, 70));
    }

    #[test]
    fn credit_past_max_major_is_rejected() {
        let err = credit(Balance::new(i64::MAX, 99), amount(0, 1)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = credit(Balance::new(i64::MAX, 0), amount(1, 0)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        assert_eq!(
            credit(Balance::new(i64::MAX - 1, 99), amount(0, 1)).unwrap(),
            Balance::new(i64::MAX, 0)
        );
    }

    #[test]
    fn reserve_then_release_nets_to_zero() {
        let reserved = Balance::new(2, 0);
        let price = amount(3, 45);
        assert_eq!(release(credit(reserved, price).unwrap(), price), reserved);
    }

    #[test]
    fn price_sum_is_normalized() {
        let total = normalize_sum([amount(1, 60), amount(2, 70), amount(0, 99)]).unwrap();
        assert_eq!((total.major(), total.minor()), (5, 29));
        assert_eq!(normalize_sum(std::iter::empty()).unwrap(), Amount::ZERO);
    }

    fn balance_strategy() -> impl Strategy<Value = Balance> {
        (0i64..1_000_000, 0i64..100).prop_map(|(major, minor)| Balance::new(major, minor))
    }

    fn amount_strategy() -> impl Strategy<Value = Amount> {
        (0i64..1_000_000, 0i64..100).prop_map(|(major, minor)| Amount::new(major, minor).unwrap())
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// A successful debit yields a normalized balance and removes exactly
        /// the debited value.
        #[test]
        fn successful_debit_conserves_value(balance in balance_strategy(), amt in amount_strategy()) {
            let (after, ok) = debit(balance, amt);
            prop_assert_eq!(ok, balance.total_minor() >= amt.total_minor());
            if ok {
                prop_assert!(after.is_normalized());
                prop_assert_eq!(after.total_minor() + amt.total_minor(), balance.total_minor());
            }
        }

        /// Credits keep normalized balances normalized and add exactly the amount.
        #[test]
        fn credit_preserves_normalization(balance in balance_strategy(), amt in amount_strategy()) {
            let after = credit(balance, amt).unwrap();
            prop_assert!(after.is_normalized());
            prop_assert_eq!(after.total_minor(), balance.total_minor() + amt.total_minor());
        }

        /// Summing prices matches summing their minor-unit totals.
        #[test]
        fn normalize_sum_matches_minor_totals(prices in prop::collection::vec(amount_strategy(), 0..8)) {
            let expected: i128 = prices.iter().map(Amount::total_minor).sum();
            let total = normalize_sum(prices).unwrap();
            prop_assert_eq!(total.total_minor(), expected);
        }
    }
}
