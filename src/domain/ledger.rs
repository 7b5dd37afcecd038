use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AccountId, Cents};

pub type EntryId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    Deposit,
    Withdrawal,
    Transfer,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::Deposit => "deposit",
            TxKind::Withdrawal => "withdrawal",
            TxKind::Transfer => "transfer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "deposit" => Some(TxKind::Deposit),
            "withdrawal" => Some(TxKind::Withdrawal),
            "transfer" => Some(TxKind::Transfer),
            _ => None,
        }
    }
}

impl std::fmt::Display for TxKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ledger entry status. Transitions are one-way: pending -> completed or
/// pending -> failed, terminal either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Completed,
    Failed,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Pending => "pending",
            TxStatus::Completed => "completed",
            TxStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(TxStatus::Pending),
            "completed" => Some(TxStatus::Completed),
            "failed" => Some(TxStatus::Failed),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: TxStatus) -> bool {
        matches!(
            (self, next),
            (TxStatus::Pending, TxStatus::Completed) | (TxStatus::Pending, TxStatus::Failed)
        )
    }
}

impl std::fmt::Display for TxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An immutable record of one money movement against one account.
/// A transfer produces two linked entries, one per account, each carrying
/// the other's account number in `counterparty_number`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub account_id: AccountId,
    pub kind: TxKind,
    pub amount_cents: Cents,
    pub fee_cents: Cents,
    pub balance_before_cents: Cents,
    pub balance_after_cents: Cents,
    pub counterparty_number: Option<String>,
    pub status: TxStatus,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(
        account_id: AccountId,
        kind: TxKind,
        amount_cents: Cents,
        fee_cents: Cents,
        balance_before_cents: Cents,
        balance_after_cents: Cents,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            kind,
            amount_cents,
            fee_cents,
            balance_before_cents,
            balance_after_cents,
            counterparty_number: None,
            status: TxStatus::Pending,
            created_at: Utc::now(),
        }
    }

    pub fn with_counterparty(mut self, number: impl Into<String>) -> Self {
        self.counterparty_number = Some(number.into());
        self
    }

    pub fn completed(mut self) -> Self {
        self.status = TxStatus::Completed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        for kind in [TxKind::Deposit, TxKind::Withdrawal, TxKind::Transfer] {
            assert_eq!(TxKind::from_str(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [TxStatus::Pending, TxStatus::Completed, TxStatus::Failed] {
            assert_eq!(TxStatus::from_str(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_status_transitions_are_one_way() {
        assert!(TxStatus::Pending.can_transition_to(TxStatus::Completed));
        assert!(TxStatus::Pending.can_transition_to(TxStatus::Failed));

        assert!(!TxStatus::Completed.can_transition_to(TxStatus::Failed));
        assert!(!TxStatus::Completed.can_transition_to(TxStatus::Pending));
        assert!(!TxStatus::Failed.can_transition_to(TxStatus::Completed));
        assert!(!TxStatus::Failed.can_transition_to(TxStatus::Pending));
        assert!(!TxStatus::Pending.can_transition_to(TxStatus::Pending));
    }

    #[test]
    fn test_entry_starts_pending() {
        let entry = LedgerEntry::new(Uuid::new_v4(), TxKind::Deposit, 5000, 0, 0, 5000);
        assert_eq!(entry.status, TxStatus::Pending);
        assert_eq!(entry.completed().status, TxStatus::Completed);
    }
}
