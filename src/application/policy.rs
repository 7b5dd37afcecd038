use std::sync::Arc;

use crate::domain::{AccountPolicy, AccountType};
use crate::storage::Repository;

use super::AppError;

/// Read-only lookup of per-type reference data (interest rate, minimum
/// amount, lock-in period). Never mutates anything.
pub struct PolicyCatalog {
    repo: Arc<Repository>,
}

impl PolicyCatalog {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    pub async fn find_by_type(&self, account_type: AccountType) -> Result<AccountPolicy, AppError> {
        self.repo
            .get_policy_by_type(account_type)
            .await?
            .ok_or_else(|| AppError::PolicyNotFound(account_type.to_string()))
    }
}
