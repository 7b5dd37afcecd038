use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, RateBps};

pub type PolicyId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Savings,
    Current,
    Fixed,
    Recurring,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Savings => "savings",
            AccountType::Current => "current",
            AccountType::Fixed => "fixed",
            AccountType::Recurring => "recurring",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "savings" => Some(AccountType::Savings),
            "current" => Some(AccountType::Current),
            "fixed" => Some(AccountType::Fixed),
            "recurring" => Some(AccountType::Recurring),
            _ => None,
        }
    }

    /// Fixed and recurring accounts carry a maturity date and are locked
    /// in until it passes.
    pub fn is_term_deposit(&self) -> bool {
        matches!(self, AccountType::Fixed | AccountType::Recurring)
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-type reference data consulted at account creation, never mutated
/// by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountPolicy {
    pub id: PolicyId,
    pub account_type: AccountType,
    pub interest_rate_bps: RateBps,
    pub minimum_amount_cents: Cents,
    pub lock_in_period_months: i64,
    pub penalty_fee_cents: Cents,
}

impl AccountPolicy {
    pub fn new(
        account_type: AccountType,
        interest_rate_bps: RateBps,
        minimum_amount_cents: Cents,
        lock_in_period_months: i64,
        penalty_fee_cents: Cents,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_type,
            interest_rate_bps,
            minimum_amount_cents,
            lock_in_period_months,
            penalty_fee_cents,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_type_roundtrip() {
        for at in [
            AccountType::Savings,
            AccountType::Current,
            AccountType::Fixed,
            AccountType::Recurring,
        ] {
            assert_eq!(AccountType::from_str(at.as_str()), Some(at));
        }
    }

    #[test]
    fn test_term_deposit_types() {
        assert!(AccountType::Fixed.is_term_deposit());
        assert!(AccountType::Recurring.is_term_deposit());
        assert!(!AccountType::Savings.is_term_deposit());
        assert!(!AccountType::Current.is_term_deposit());
    }
}
