// Application layer: one service per workflow, all sharing the repository
// and the post-commit notification dispatcher.

pub mod accounts;
pub mod error;
pub mod ledger;
pub mod lockers;
pub mod policy;
pub mod scheduler;

pub use accounts::*;
pub use error::*;
pub use ledger::*;
pub use lockers::*;
pub use policy::*;
pub use scheduler::*;

use std::sync::Arc;

use crate::domain::{Actor, Branch, Role};
use crate::notify::NotificationDispatcher;
use crate::storage::Repository;

/// All engine services wired over one repository and one notification
/// dispatcher. The primary interface for any client (CLI, API, tests).
pub struct Engine {
    pub repo: Arc<Repository>,
    pub accounts: AccountService,
    pub ledger: LedgerService,
    pub lockers: LockerService,
    pub scheduler: AccrualScheduler,
}

impl Engine {
    pub fn new(repo: Arc<Repository>, notifier: Arc<dyn NotificationDispatcher>) -> Self {
        Self {
            accounts: AccountService::new(repo.clone(), notifier.clone()),
            ledger: LedgerService::new(repo.clone(), notifier.clone()),
            lockers: LockerService::new(repo.clone(), notifier),
            scheduler: AccrualScheduler::new(repo.clone()),
            repo,
        }
    }

    /// Initialize a new database at the given path (connect + migrate).
    pub async fn init(
        database_path: &str,
        notifier: Arc<dyn NotificationDispatcher>,
    ) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(Arc::new(repo), notifier))
    }

    /// Connect to an existing database.
    pub async fn connect(
        database_path: &str,
        notifier: Arc<dyn NotificationDispatcher>,
    ) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(Arc::new(repo), notifier))
    }
}

/// The branch the acting BranchManager manages. Branch-scoped operations
/// resolve this once and compare it against the target resource.
pub(crate) async fn managed_branch(
    repo: &Repository,
    actor: &Actor,
) -> Result<Branch, AppError> {
    if actor.role != Role::BranchManager {
        return Err(AppError::BranchScopeViolation);
    }
    repo.get_branch_by_manager(actor.user_id)
        .await?
        .ok_or(AppError::BranchScopeViolation)
}
