use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AccountType, UserId};

pub type ApplicationId = Uuid;

/// What the applicant is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationKind {
    Account,
    Locker,
}

impl ApplicationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationKind::Account => "account",
            ApplicationKind::Locker => "locker",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "account" => Some(ApplicationKind::Account),
            "locker" => Some(ApplicationKind::Locker),
            _ => None,
        }
    }
}

impl std::fmt::Display for ApplicationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A pending customer request for an account or a locker at a branch.
/// Created on request and consumed (soft-deleted) by the provisioning
/// workflow in the same transaction that creates the resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub user_id: UserId,
    pub branch_ifsc: String,
    pub kind: ApplicationKind,
    /// Set only for account applications.
    pub account_type: Option<AccountType>,
    pub nominee_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Application {
    pub fn for_account(
        user_id: UserId,
        branch_ifsc: String,
        account_type: AccountType,
        nominee_name: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            branch_ifsc,
            kind: ApplicationKind::Account,
            account_type: Some(account_type),
            nominee_name,
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    pub fn for_locker(user_id: UserId, branch_ifsc: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            branch_ifsc,
            kind: ApplicationKind::Locker,
            account_type: None,
            nominee_name: None,
            created_at: Utc::now(),
            deleted_at: None,
        }
    }
}
