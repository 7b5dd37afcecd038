use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::domain::{interest_on, AccountStatus};
use crate::storage::Repository;

use super::AppError;

/// Accounts with a zero balance older than this are swept to inactive.
const DORMANCY_AGE_DAYS: i64 = 10;

/// Periodic batch jobs over the account base. Each job holds its own
/// mutex so overlapping runs of the same job cannot interleave.
pub struct AccrualScheduler {
    repo: Arc<Repository>,
    accrual_guard: Mutex<()>,
    sweep_guard: Mutex<()>,
}

impl AccrualScheduler {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self {
            repo,
            accrual_guard: Mutex::new(()),
            sweep_guard: Mutex::new(()),
        }
    }

    /// Yearly interest accrual over active term deposits whose maturity
    /// date is still ahead. The whole batch commits as one transaction:
    /// any failing row rolls back every account in the run.
    pub async fn run_yearly_accrual(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        let _guard = self.accrual_guard.lock().await;

        let mut tx = self.repo.begin().await?;
        let accounts = self.repo.list_accruable_accounts(&mut tx, now).await?;

        let mut accrued = 0;
        for account in &accounts {
            let interest = interest_on(account.balance_cents, account.interest_rate_bps);
            let new_balance = account.balance_cents + interest;
            if !self
                .repo
                .update_balance_guarded(
                    &mut tx,
                    account.id,
                    account.balance_cents,
                    new_balance,
                    AccountStatus::Active,
                )
                .await?
            {
                // Dropping the transaction rolls back the whole batch.
                return Err(AppError::ConcurrentUpdate);
            }
            accrued += 1;
        }

        tx.commit().await.map_err(anyhow::Error::from)?;
        tracing::info!(accounts = accrued, "yearly interest accrual complete");
        Ok(accrued)
    }

    /// Daily sweep: active accounts with a zero balance and more than ten
    /// days of age go inactive. Each update stands alone; one failure
    /// does not undo the others.
    pub async fn run_dormancy_sweep(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        let _guard = self.sweep_guard.lock().await;

        let cutoff = now - Duration::days(DORMANCY_AGE_DAYS);
        let candidates = self.repo.list_dormant_candidates(cutoff).await?;

        let mut swept = 0;
        for account in &candidates {
            // The guard skips accounts funded since the candidate read.
            if self.repo.deactivate_dormant_guarded(account.id).await? {
                swept += 1;
            }
        }

        tracing::info!(accounts = swept, "dormancy sweep complete");
        Ok(swept)
    }
}
