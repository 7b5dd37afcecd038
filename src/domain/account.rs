use chrono::{DateTime, Months, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AccountType, BranchId, Cents, RateBps, UserId};

pub type AccountId = Uuid;

/// Fixed institution prefix for every account number. Together with nine
/// random digits it yields a 16-character number.
pub const ACCOUNT_NUMBER_PREFIX: &str = "2530012";

pub const ACCOUNT_NUMBER_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Inactive,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(AccountStatus::Active),
            "inactive" => Some(AccountStatus::Inactive),
            _ => None,
        }
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A customer account. Balance and status are only ever mutated by the
/// ledger processor and the accrual scheduler; everything else is fixed at
/// creation apart from the nominee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub user_id: UserId,
    pub branch_id: BranchId,
    pub account_type: AccountType,
    pub number: String,
    pub balance_cents: Cents,
    /// Copied from the account policy at creation time.
    pub interest_rate_bps: RateBps,
    pub status: AccountStatus,
    pub maturity_date: Option<DateTime<Utc>>,
    pub installment_amount_cents: Option<Cents>,
    pub principal_amount_cents: Option<Cents>,
    pub nominee_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Account {
    pub fn new(
        user_id: UserId,
        branch_id: BranchId,
        account_type: AccountType,
        number: String,
        interest_rate_bps: RateBps,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            branch_id,
            account_type,
            number,
            balance_cents: 0,
            interest_rate_bps,
            status: AccountStatus::Active,
            maturity_date: None,
            installment_amount_cents: None,
            principal_amount_cents: None,
            nominee_name: None,
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    pub fn with_nominee(mut self, nominee: impl Into<String>) -> Self {
        self.nominee_name = Some(nominee.into());
        self
    }

    pub fn with_maturity(mut self, maturity_date: DateTime<Utc>) -> Self {
        self.maturity_date = Some(maturity_date);
        self
    }

    pub fn with_principal(mut self, principal_cents: Cents) -> Self {
        self.principal_amount_cents = Some(principal_cents);
        self.balance_cents = principal_cents;
        self
    }

    pub fn with_installment(mut self, installment_cents: Cents) -> Self {
        self.installment_amount_cents = Some(installment_cents);
        self
    }

    /// True when funds are still locked in: term-deposit account whose
    /// maturity date lies beyond `now`.
    pub fn is_locked_in(&self, now: DateTime<Utc>) -> bool {
        self.account_type.is_term_deposit()
            && self.maturity_date.map(|d| d > now).unwrap_or(false)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Generate a candidate account number: the fixed prefix followed by nine
/// random digits. Uniqueness is enforced by the caller against the store.
pub fn generate_account_number() -> String {
    let mut rng = rand::thread_rng();
    let mut number = String::with_capacity(ACCOUNT_NUMBER_LEN);
    number.push_str(ACCOUNT_NUMBER_PREFIX);
    for _ in ACCOUNT_NUMBER_PREFIX.len()..ACCOUNT_NUMBER_LEN {
        number.push(char::from(b'0' + rng.gen_range(0..10)));
    }
    number
}

/// Maturity date for a term deposit: opening date plus the policy's
/// lock-in period in months.
pub fn maturity_from(opened_at: DateTime<Utc>, lock_in_months: i64) -> DateTime<Utc> {
    opened_at
        .checked_add_months(Months::new(lock_in_months as u32))
        .unwrap_or(opened_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_account_number_shape() {
        let number = generate_account_number();
        assert_eq!(number.len(), ACCOUNT_NUMBER_LEN);
        assert!(number.starts_with(ACCOUNT_NUMBER_PREFIX));
        assert!(number.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_account_numbers_vary() {
        let a = generate_account_number();
        let b = generate_account_number();
        let c = generate_account_number();
        // Three collisions in a row would be astronomically unlikely.
        assert!(a != b || b != c);
    }

    #[test]
    fn test_locked_in_before_maturity() {
        let now = Utc::now();
        let account = Account::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            AccountType::Fixed,
            generate_account_number(),
            500,
        )
        .with_maturity(now + Duration::days(365));

        assert!(account.is_locked_in(now));
        assert!(!account.is_locked_in(now + Duration::days(366)));
    }

    #[test]
    fn test_savings_never_locked_in() {
        let now = Utc::now();
        let account = Account::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            AccountType::Savings,
            generate_account_number(),
            350,
        );
        assert!(!account.is_locked_in(now));
    }

    #[test]
    fn test_maturity_from_lock_in() {
        let opened = chrono::DateTime::parse_from_rfc3339("2024-01-15T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let maturity = maturity_from(opened, 12);
        assert_eq!(maturity.date_naive().to_string(), "2025-01-15");
    }
}
