use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::domain::{
    Account, AccountId, AccountPolicy, AccountStatus, AccountType, Application, ApplicationId,
    ApplicationKind, AssignmentId, AssignmentStatus, Branch, BranchId, Cents, EntryId,
    LedgerEntry, Locker, LockerAssignment, LockerId, LockerStatus, Role, TxKind, TxStatus, User,
    UserId,
};

use super::MIGRATION_001_INITIAL;

/// An open storage transaction. Every multi-step mutation in the engine
/// runs on one of these; a drop without commit rolls everything back.
pub type StoreTx<'a> = sqlx::Transaction<'a, sqlx::Sqlite>;

/// Filter for account listings. Scoping decides which fields are set.
#[derive(Debug, Default, Clone)]
pub struct AccountFilter {
    pub branch_id: Option<BranchId>,
    pub user_id: Option<UserId>,
    pub page: i64,
    pub limit: i64,
}

/// Filter for ledger-entry listings, resolved from the actor's scope.
#[derive(Debug, Default, Clone)]
pub struct EntryFilter {
    pub account_id: Option<AccountId>,
    pub branch_id: Option<BranchId>,
    pub user_id: Option<UserId>,
    pub page: i64,
    pub limit: i64,
}

/// Filter for locker listings.
#[derive(Debug, Default, Clone)]
pub struct LockerFilter {
    pub branch_id: Option<BranchId>,
    pub page: i64,
    pub limit: i64,
}

fn page_window(page: i64, limit: i64) -> (i64, i64) {
    let limit = if limit <= 0 { 20 } else { limit };
    let page = if page <= 0 { 1 } else { page };
    (limit, (page - 1) * limit)
}

/// Repository for persisting and querying all engine entities.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Begin a storage transaction for a multi-step mutation.
    pub async fn begin(&self) -> Result<StoreTx<'_>> {
        self.pool
            .begin()
            .await
            .context("Failed to begin transaction")
    }

    // ========================
    // Users
    // ========================

    pub async fn save_user(&self, user: &User) -> Result<()> {
        let roles_json = serde_json::to_string(&user.roles)?;
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, roles, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&roles_json)
        .bind(user.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save user")?;
        Ok(())
    }

    pub async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, name, email, roles, created_at FROM users WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user")?;
        row.as_ref().map(row_to_user).transpose()
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row =
            sqlx::query("SELECT id, name, email, roles, created_at FROM users WHERE email = ?")
                .bind(email)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to fetch user by email")?;
        row.as_ref().map(row_to_user).transpose()
    }

    // ========================
    // Branches
    // ========================

    pub async fn save_branch(&self, branch: &Branch) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO branches (id, bank_name, name, ifsc_code, manager_user_id, total_lockers, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(branch.id.to_string())
        .bind(&branch.bank_name)
        .bind(&branch.name)
        .bind(&branch.ifsc_code)
        .bind(branch.manager_user_id.to_string())
        .bind(branch.total_lockers)
        .bind(branch.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save branch")?;
        Ok(())
    }

    pub async fn get_branch(&self, id: BranchId) -> Result<Option<Branch>> {
        let row = sqlx::query(
            "SELECT id, bank_name, name, ifsc_code, manager_user_id, total_lockers, created_at FROM branches WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch branch")?;
        row.as_ref().map(row_to_branch).transpose()
    }

    pub async fn get_branch_by_ifsc(&self, ifsc_code: &str) -> Result<Option<Branch>> {
        let row = sqlx::query(
            "SELECT id, bank_name, name, ifsc_code, manager_user_id, total_lockers, created_at FROM branches WHERE ifsc_code = ?",
        )
        .bind(ifsc_code)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch branch by IFSC")?;
        row.as_ref().map(row_to_branch).transpose()
    }

    /// The branch a BranchManager manages, if any.
    pub async fn get_branch_by_manager(&self, manager_user_id: UserId) -> Result<Option<Branch>> {
        let row = sqlx::query(
            "SELECT id, bank_name, name, ifsc_code, manager_user_id, total_lockers, created_at FROM branches WHERE manager_user_id = ?",
        )
        .bind(manager_user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch branch by manager")?;
        row.as_ref().map(row_to_branch).transpose()
    }

    // ========================
    // Account policies
    // ========================

    pub async fn save_policy(&self, policy: &AccountPolicy) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO account_policies
                (id, account_type, interest_rate_bps, minimum_amount_cents, lock_in_period_months, penalty_fee_cents)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(policy.id.to_string())
        .bind(policy.account_type.as_str())
        .bind(policy.interest_rate_bps)
        .bind(policy.minimum_amount_cents)
        .bind(policy.lock_in_period_months)
        .bind(policy.penalty_fee_cents)
        .execute(&self.pool)
        .await
        .context("Failed to save account policy")?;
        Ok(())
    }

    pub async fn get_policy_by_type(
        &self,
        account_type: AccountType,
    ) -> Result<Option<AccountPolicy>> {
        let row = sqlx::query(
            "SELECT id, account_type, interest_rate_bps, minimum_amount_cents, lock_in_period_months, penalty_fee_cents FROM account_policies WHERE account_type = ?",
        )
        .bind(account_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account policy")?;
        row.as_ref().map(row_to_policy).transpose()
    }

    // ========================
    // Applications
    // ========================

    pub async fn save_application(&self, application: &Application) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO applications (id, user_id, branch_ifsc, kind, account_type, nominee_name, created_at, deleted_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(application.id.to_string())
        .bind(application.user_id.to_string())
        .bind(&application.branch_ifsc)
        .bind(application.kind.as_str())
        .bind(application.account_type.map(|t| t.as_str()))
        .bind(&application.nominee_name)
        .bind(application.created_at.to_rfc3339())
        .bind(application.deleted_at.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await
        .context("Failed to save application")?;
        Ok(())
    }

    pub async fn get_application(&self, id: ApplicationId) -> Result<Option<Application>> {
        let row = sqlx::query(
            "SELECT id, user_id, branch_ifsc, kind, account_type, nominee_name, created_at, deleted_at FROM applications WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch application")?;
        row.as_ref().map(row_to_application).transpose()
    }

    pub async fn find_open_account_application(
        &self,
        user_id: UserId,
        branch_ifsc: &str,
        account_type: AccountType,
    ) -> Result<Option<Application>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, branch_ifsc, kind, account_type, nominee_name, created_at, deleted_at
            FROM applications
            WHERE user_id = ? AND branch_ifsc = ? AND kind = 'account' AND account_type = ?
              AND deleted_at IS NULL
            "#,
        )
        .bind(user_id.to_string())
        .bind(branch_ifsc)
        .bind(account_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up open account application")?;
        row.as_ref().map(row_to_application).transpose()
    }

    pub async fn find_open_locker_application(
        &self,
        user_id: UserId,
        branch_ifsc: &str,
    ) -> Result<Option<Application>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, branch_ifsc, kind, account_type, nominee_name, created_at, deleted_at
            FROM applications
            WHERE user_id = ? AND branch_ifsc = ? AND kind = 'locker' AND deleted_at IS NULL
            "#,
        )
        .bind(user_id.to_string())
        .bind(branch_ifsc)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up open locker application")?;
        row.as_ref().map(row_to_application).transpose()
    }

    /// Soft-delete a consumed application inside an open transaction.
    pub async fn consume_application(
        &self,
        conn: &mut SqliteConnection,
        id: ApplicationId,
    ) -> Result<()> {
        sqlx::query("UPDATE applications SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL")
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(conn)
            .await
            .context("Failed to consume application")?;
        Ok(())
    }

    // ========================
    // Accounts
    // ========================

    pub async fn insert_account(&self, conn: &mut SqliteConnection, account: &Account) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts
                (id, user_id, branch_id, account_type, number, balance_cents, interest_rate_bps,
                 status, maturity_date, installment_amount_cents, principal_amount_cents,
                 nominee_name, created_at, deleted_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(account.id.to_string())
        .bind(account.user_id.to_string())
        .bind(account.branch_id.to_string())
        .bind(account.account_type.as_str())
        .bind(&account.number)
        .bind(account.balance_cents)
        .bind(account.interest_rate_bps)
        .bind(account.status.as_str())
        .bind(account.maturity_date.map(|dt| dt.to_rfc3339()))
        .bind(account.installment_amount_cents)
        .bind(account.principal_amount_cents)
        .bind(&account.nominee_name)
        .bind(account.created_at.to_rfc3339())
        .bind(account.deleted_at.map(|dt| dt.to_rfc3339()))
        .execute(conn)
        .await
        .context("Failed to insert account")?;
        Ok(())
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        let row = sqlx::query(&format!(
            "{ACCOUNT_COLUMNS} FROM accounts WHERE id = ? AND deleted_at IS NULL"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account")?;
        row.as_ref().map(row_to_account).transpose()
    }

    pub async fn get_account_by_number(&self, number: &str) -> Result<Option<Account>> {
        let row = sqlx::query(&format!(
            "{ACCOUNT_COLUMNS} FROM accounts WHERE number = ? AND deleted_at IS NULL"
        ))
        .bind(number)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account by number")?;
        row.as_ref().map(row_to_account).transpose()
    }

    /// An account only if it belongs to the given user.
    pub async fn get_account_for_user(
        &self,
        id: AccountId,
        user_id: UserId,
    ) -> Result<Option<Account>> {
        let row = sqlx::query(&format!(
            "{ACCOUNT_COLUMNS} FROM accounts WHERE id = ? AND user_id = ? AND deleted_at IS NULL"
        ))
        .bind(id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account for user")?;
        row.as_ref().map(row_to_account).transpose()
    }

    pub async fn find_account_by_user_and_type(
        &self,
        user_id: UserId,
        account_type: AccountType,
    ) -> Result<Option<Account>> {
        let row = sqlx::query(&format!(
            "{ACCOUNT_COLUMNS} FROM accounts WHERE user_id = ? AND account_type = ? AND deleted_at IS NULL"
        ))
        .bind(user_id.to_string())
        .bind(account_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up account by user and type")?;
        row.as_ref().map(row_to_account).transpose()
    }

    pub async fn account_number_exists(
        &self,
        conn: &mut SqliteConnection,
        number: &str,
    ) -> Result<bool> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM accounts WHERE number = ?")
            .bind(number)
            .fetch_one(conn)
            .await
            .context("Failed to check account number")?;
        let count: i64 = row.get("count");
        Ok(count > 0)
    }

    pub async fn list_accounts(&self, filter: &AccountFilter) -> Result<Vec<Account>> {
        let mut query = format!("{ACCOUNT_COLUMNS} FROM accounts WHERE deleted_at IS NULL");
        if filter.branch_id.is_some() {
            query.push_str(" AND branch_id = ?");
        }
        if filter.user_id.is_some() {
            query.push_str(" AND user_id = ?");
        }
        query.push_str(" ORDER BY created_at DESC LIMIT ? OFFSET ?");

        let (limit, offset) = page_window(filter.page, filter.limit);
        let mut sql_query = sqlx::query(&query);
        if let Some(branch_id) = filter.branch_id {
            sql_query = sql_query.bind(branch_id.to_string());
        }
        if let Some(user_id) = filter.user_id {
            sql_query = sql_query.bind(user_id.to_string());
        }

        let rows = sql_query
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list accounts")?;
        rows.iter().map(row_to_account).collect()
    }

    /// Apply a balance/status read-modify-write with an optimistic guard
    /// on the previously read balance. Returns false when a concurrent
    /// writer got there first, in which case the caller must abort.
    pub async fn update_balance_guarded(
        &self,
        conn: &mut SqliteConnection,
        id: AccountId,
        expected_balance: Cents,
        new_balance: Cents,
        new_status: AccountStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE accounts SET balance_cents = ?, status = ?
            WHERE id = ? AND balance_cents = ? AND deleted_at IS NULL
            "#,
        )
        .bind(new_balance)
        .bind(new_status.as_str())
        .bind(id.to_string())
        .bind(expected_balance)
        .execute(conn)
        .await
        .context("Failed to update account balance")?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn update_account_profile(
        &self,
        id: AccountId,
        nominee_name: Option<&str>,
        status: Option<AccountStatus>,
    ) -> Result<()> {
        if let Some(nominee) = nominee_name {
            sqlx::query("UPDATE accounts SET nominee_name = ? WHERE id = ? AND deleted_at IS NULL")
                .bind(nominee)
                .bind(id.to_string())
                .execute(&self.pool)
                .await
                .context("Failed to update account nominee")?;
        }
        if let Some(status) = status {
            sqlx::query("UPDATE accounts SET status = ? WHERE id = ? AND deleted_at IS NULL")
                .bind(status.as_str())
                .bind(id.to_string())
                .execute(&self.pool)
                .await
                .context("Failed to update account status")?;
        }
        Ok(())
    }

    pub async fn soft_delete_account(&self, id: AccountId) -> Result<()> {
        sqlx::query("UPDATE accounts SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL")
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to soft-delete account")?;
        Ok(())
    }

    /// Deactivate a dormant account, guarded on active status and a still
    /// zero balance so a deposit committing after the candidate read is
    /// never clobbered. Returns false when the account no longer qualifies.
    pub async fn deactivate_dormant_guarded(&self, id: AccountId) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE accounts SET status = 'inactive'
            WHERE id = ? AND status = 'active' AND balance_cents = 0 AND deleted_at IS NULL
            "#,
        )
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to deactivate dormant account")?;
        Ok(result.rows_affected() == 1)
    }

    /// Active term-deposit accounts whose maturity date lies beyond `now`,
    /// read inside the accrual batch's transaction.
    pub async fn list_accruable_accounts(
        &self,
        conn: &mut SqliteConnection,
        now: DateTime<Utc>,
    ) -> Result<Vec<Account>> {
        let rows = sqlx::query(&format!(
            r#"
            {ACCOUNT_COLUMNS} FROM accounts
            WHERE status = 'active' AND account_type IN ('fixed', 'recurring')
              AND maturity_date IS NOT NULL AND maturity_date > ?
              AND deleted_at IS NULL
            ORDER BY created_at
            "#
        ))
        .bind(now.to_rfc3339())
        .fetch_all(conn)
        .await
        .context("Failed to list accruable accounts")?;
        rows.iter().map(row_to_account).collect()
    }

    /// Active zero-balance accounts created before the cutoff.
    pub async fn list_dormant_candidates(&self, cutoff: DateTime<Utc>) -> Result<Vec<Account>> {
        let rows = sqlx::query(&format!(
            r#"
            {ACCOUNT_COLUMNS} FROM accounts
            WHERE status = 'active' AND balance_cents = 0 AND created_at < ?
              AND deleted_at IS NULL
            ORDER BY created_at
            "#
        ))
        .bind(cutoff.to_rfc3339())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list dormant candidates")?;
        rows.iter().map(row_to_account).collect()
    }

    // ========================
    // Ledger entries
    // ========================

    pub async fn insert_entry(
        &self,
        conn: &mut SqliteConnection,
        entry: &LedgerEntry,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions
                (id, account_id, kind, amount_cents, fee_cents, balance_before_cents,
                 balance_after_cents, counterparty_number, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.account_id.to_string())
        .bind(entry.kind.as_str())
        .bind(entry.amount_cents)
        .bind(entry.fee_cents)
        .bind(entry.balance_before_cents)
        .bind(entry.balance_after_cents)
        .bind(&entry.counterparty_number)
        .bind(entry.status.as_str())
        .bind(entry.created_at.to_rfc3339())
        .execute(conn)
        .await
        .context("Failed to insert ledger entry")?;
        Ok(())
    }

    pub async fn get_entry(&self, id: EntryId) -> Result<Option<LedgerEntry>> {
        let row = sqlx::query(&format!("{ENTRY_COLUMNS} FROM transactions WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch ledger entry")?;
        row.as_ref().map(row_to_entry).transpose()
    }

    /// Promote or fail an entry, guarded on the current status so a
    /// terminal entry can never move again. Returns false on a miss.
    pub async fn set_entry_status_guarded(
        &self,
        conn: &mut SqliteConnection,
        id: EntryId,
        expected: TxStatus,
        next: TxStatus,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE transactions SET status = ? WHERE id = ? AND status = ?")
            .bind(next.as_str())
            .bind(id.to_string())
            .bind(expected.as_str())
            .execute(conn)
            .await
            .context("Failed to update ledger entry status")?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn list_entries(&self, filter: &EntryFilter) -> Result<Vec<LedgerEntry>> {
        let mut query = String::from(
            "SELECT t.id, t.account_id, t.kind, t.amount_cents, t.fee_cents, \
             t.balance_before_cents, t.balance_after_cents, t.counterparty_number, t.status, \
             t.created_at FROM transactions t JOIN accounts a ON a.id = t.account_id WHERE 1=1",
        );
        if filter.account_id.is_some() {
            query.push_str(" AND t.account_id = ?");
        }
        if filter.branch_id.is_some() {
            query.push_str(" AND a.branch_id = ?");
        }
        if filter.user_id.is_some() {
            query.push_str(" AND a.user_id = ?");
        }
        query.push_str(" ORDER BY t.created_at DESC LIMIT ? OFFSET ?");

        let (limit, offset) = page_window(filter.page, filter.limit);
        let mut sql_query = sqlx::query(&query);
        if let Some(account_id) = filter.account_id {
            sql_query = sql_query.bind(account_id.to_string());
        }
        if let Some(branch_id) = filter.branch_id {
            sql_query = sql_query.bind(branch_id.to_string());
        }
        if let Some(user_id) = filter.user_id {
            sql_query = sql_query.bind(user_id.to_string());
        }

        let rows = sql_query
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list ledger entries")?;
        rows.iter().map(row_to_entry).collect()
    }

    pub async fn count_entries_for_account(&self, account_id: AccountId) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM transactions WHERE account_id = ?")
            .bind(account_id.to_string())
            .fetch_one(&self.pool)
            .await
            .context("Failed to count ledger entries")?;
        Ok(row.get("count"))
    }

    // ========================
    // Lockers
    // ========================

    pub async fn insert_locker(&self, conn: &mut SqliteConnection, locker: &Locker) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO lockers (id, branch_id, serial_no, monthly_charge_cents, status, created_at, deleted_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(locker.id.to_string())
        .bind(locker.branch_id.to_string())
        .bind(locker.serial_no)
        .bind(locker.monthly_charge_cents)
        .bind(locker.status.as_str())
        .bind(locker.created_at.to_rfc3339())
        .bind(locker.deleted_at.map(|dt| dt.to_rfc3339()))
        .execute(conn)
        .await
        .context("Failed to insert locker")?;
        Ok(())
    }

    pub async fn get_locker(&self, id: LockerId) -> Result<Option<Locker>> {
        let row = sqlx::query(&format!(
            "{LOCKER_COLUMNS} FROM lockers WHERE id = ? AND deleted_at IS NULL"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch locker")?;
        row.as_ref().map(row_to_locker).transpose()
    }

    pub async fn get_locker_by_serial(
        &self,
        branch_id: BranchId,
        serial_no: i64,
    ) -> Result<Option<Locker>> {
        let row = sqlx::query(&format!(
            "{LOCKER_COLUMNS} FROM lockers WHERE branch_id = ? AND serial_no = ? AND deleted_at IS NULL"
        ))
        .bind(branch_id.to_string())
        .bind(serial_no)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch locker by serial")?;
        row.as_ref().map(row_to_locker).transpose()
    }

    pub async fn count_lockers_in_branch(&self, branch_id: BranchId) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM lockers WHERE branch_id = ? AND deleted_at IS NULL",
        )
        .bind(branch_id.to_string())
        .fetch_one(&self.pool)
        .await
        .context("Failed to count lockers")?;
        Ok(row.get("count"))
    }

    pub async fn max_locker_serial(&self, branch_id: BranchId) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COALESCE(MAX(serial_no), 0) as max_serial FROM lockers WHERE branch_id = ?",
        )
        .bind(branch_id.to_string())
        .fetch_one(&self.pool)
        .await
        .context("Failed to fetch max locker serial")?;
        Ok(row.get("max_serial"))
    }

    pub async fn list_lockers(&self, filter: &LockerFilter) -> Result<Vec<Locker>> {
        let mut query = format!("{LOCKER_COLUMNS} FROM lockers WHERE deleted_at IS NULL");
        if filter.branch_id.is_some() {
            query.push_str(" AND branch_id = ?");
        }
        query.push_str(" ORDER BY serial_no LIMIT ? OFFSET ?");

        let (limit, offset) = page_window(filter.page, filter.limit);
        let mut sql_query = sqlx::query(&query);
        if let Some(branch_id) = filter.branch_id {
            sql_query = sql_query.bind(branch_id.to_string());
        }

        let rows = sql_query
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list lockers")?;
        rows.iter().map(row_to_locker).collect()
    }

    /// Freeze or release a locker, guarded on its current status.
    pub async fn set_locker_status_guarded(
        &self,
        conn: &mut SqliteConnection,
        id: LockerId,
        expected: LockerStatus,
        next: LockerStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE lockers SET status = ? WHERE id = ? AND status = ? AND deleted_at IS NULL",
        )
        .bind(next.as_str())
        .bind(id.to_string())
        .bind(expected.as_str())
        .execute(conn)
        .await
        .context("Failed to update locker status")?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn update_locker_charge(&self, id: LockerId, monthly_charge_cents: Cents) -> Result<()> {
        sqlx::query(
            "UPDATE lockers SET monthly_charge_cents = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(monthly_charge_cents)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to update locker charge")?;
        Ok(())
    }

    // ========================
    // Locker assignments
    // ========================

    pub async fn insert_assignment(
        &self,
        conn: &mut SqliteConnection,
        assignment: &LockerAssignment,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO locker_assignments (id, locker_id, user_id, status, created_at, deleted_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(assignment.id.to_string())
        .bind(assignment.locker_id.to_string())
        .bind(assignment.user_id.to_string())
        .bind(assignment.status.as_str())
        .bind(assignment.created_at.to_rfc3339())
        .bind(assignment.deleted_at.map(|dt| dt.to_rfc3339()))
        .execute(conn)
        .await
        .context("Failed to insert locker assignment")?;
        Ok(())
    }

    pub async fn find_active_assignment_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<LockerAssignment>> {
        let row = sqlx::query(&format!(
            "{ASSIGNMENT_COLUMNS} FROM locker_assignments WHERE user_id = ? AND status = 'active' AND deleted_at IS NULL"
        ))
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up active assignment for user")?;
        row.as_ref().map(row_to_assignment).transpose()
    }

    pub async fn find_active_assignment_for_locker(
        &self,
        locker_id: LockerId,
    ) -> Result<Option<LockerAssignment>> {
        let row = sqlx::query(&format!(
            "{ASSIGNMENT_COLUMNS} FROM locker_assignments WHERE locker_id = ? AND status = 'active' AND deleted_at IS NULL"
        ))
        .bind(locker_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up active assignment for locker")?;
        row.as_ref().map(row_to_assignment).transpose()
    }

    pub async fn set_assignment_status_guarded(
        &self,
        conn: &mut SqliteConnection,
        id: AssignmentId,
        expected: AssignmentStatus,
        next: AssignmentStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE locker_assignments SET status = ? WHERE id = ? AND status = ? AND deleted_at IS NULL",
        )
        .bind(next.as_str())
        .bind(id.to_string())
        .bind(expected.as_str())
        .execute(conn)
        .await
        .context("Failed to update assignment status")?;
        Ok(result.rows_affected() == 1)
    }
}

// ========================
// Column lists & row mapping
// ========================

const ACCOUNT_COLUMNS: &str = "SELECT id, user_id, branch_id, account_type, number, balance_cents, \
    interest_rate_bps, status, maturity_date, installment_amount_cents, principal_amount_cents, \
    nominee_name, created_at, deleted_at";

const ENTRY_COLUMNS: &str = "SELECT id, account_id, kind, amount_cents, fee_cents, \
    balance_before_cents, balance_after_cents, counterparty_number, status, created_at";

const LOCKER_COLUMNS: &str =
    "SELECT id, branch_id, serial_no, monthly_charge_cents, status, created_at, deleted_at";

const ASSIGNMENT_COLUMNS: &str =
    "SELECT id, locker_id, user_id, status, created_at, deleted_at";

fn parse_uuid(row: &SqliteRow, column: &str) -> Result<Uuid> {
    let value: String = row.get(column);
    Uuid::parse_str(&value).with_context(|| format!("Invalid uuid in column {column}"))
}

fn parse_datetime(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>> {
    let value: String = row.get(column);
    Ok(DateTime::parse_from_rfc3339(&value)
        .with_context(|| format!("Invalid timestamp in column {column}"))?
        .with_timezone(&Utc))
}

fn parse_optional_datetime(row: &SqliteRow, column: &str) -> Result<Option<DateTime<Utc>>> {
    let value: Option<String> = row.get(column);
    value
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .with_context(|| format!("Invalid timestamp in column {column}"))
        })
        .transpose()
}

fn row_to_user(row: &SqliteRow) -> Result<User> {
    let roles_json: String = row.get("roles");
    let roles: Vec<Role> =
        serde_json::from_str(&roles_json).context("Invalid roles column")?;
    Ok(User {
        id: parse_uuid(row, "id")?,
        name: row.get("name"),
        email: row.get("email"),
        roles,
        created_at: parse_datetime(row, "created_at")?,
    })
}

fn row_to_branch(row: &SqliteRow) -> Result<Branch> {
    Ok(Branch {
        id: parse_uuid(row, "id")?,
        bank_name: row.get("bank_name"),
        name: row.get("name"),
        ifsc_code: row.get("ifsc_code"),
        manager_user_id: parse_uuid(row, "manager_user_id")?,
        total_lockers: row.get("total_lockers"),
        created_at: parse_datetime(row, "created_at")?,
    })
}

fn row_to_policy(row: &SqliteRow) -> Result<AccountPolicy> {
    let type_str: String = row.get("account_type");
    Ok(AccountPolicy {
        id: parse_uuid(row, "id")?,
        account_type: AccountType::from_str(&type_str)
            .ok_or_else(|| anyhow::anyhow!("Invalid account type: {}", type_str))?,
        interest_rate_bps: row.get("interest_rate_bps"),
        minimum_amount_cents: row.get("minimum_amount_cents"),
        lock_in_period_months: row.get("lock_in_period_months"),
        penalty_fee_cents: row.get("penalty_fee_cents"),
    })
}

fn row_to_application(row: &SqliteRow) -> Result<Application> {
    let kind_str: String = row.get("kind");
    let type_str: Option<String> = row.get("account_type");
    Ok(Application {
        id: parse_uuid(row, "id")?,
        user_id: parse_uuid(row, "user_id")?,
        branch_ifsc: row.get("branch_ifsc"),
        kind: ApplicationKind::from_str(&kind_str)
            .ok_or_else(|| anyhow::anyhow!("Invalid application kind: {}", kind_str))?,
        account_type: type_str
            .map(|s| {
                AccountType::from_str(&s)
                    .ok_or_else(|| anyhow::anyhow!("Invalid account type: {}", s))
            })
            .transpose()?,
        nominee_name: row.get("nominee_name"),
        created_at: parse_datetime(row, "created_at")?,
        deleted_at: parse_optional_datetime(row, "deleted_at")?,
    })
}

fn row_to_account(row: &SqliteRow) -> Result<Account> {
    let type_str: String = row.get("account_type");
    let status_str: String = row.get("status");
    Ok(Account {
        id: parse_uuid(row, "id")?,
        user_id: parse_uuid(row, "user_id")?,
        branch_id: parse_uuid(row, "branch_id")?,
        account_type: AccountType::from_str(&type_str)
            .ok_or_else(|| anyhow::anyhow!("Invalid account type: {}", type_str))?,
        number: row.get("number"),
        balance_cents: row.get("balance_cents"),
        interest_rate_bps: row.get("interest_rate_bps"),
        status: AccountStatus::from_str(&status_str)
            .ok_or_else(|| anyhow::anyhow!("Invalid account status: {}", status_str))?,
        maturity_date: parse_optional_datetime(row, "maturity_date")?,
        installment_amount_cents: row.get("installment_amount_cents"),
        principal_amount_cents: row.get("principal_amount_cents"),
        nominee_name: row.get("nominee_name"),
        created_at: parse_datetime(row, "created_at")?,
        deleted_at: parse_optional_datetime(row, "deleted_at")?,
    })
}

fn row_to_entry(row: &SqliteRow) -> Result<LedgerEntry> {
    let kind_str: String = row.get("kind");
    let status_str: String = row.get("status");
    Ok(LedgerEntry {
        id: parse_uuid(row, "id")?,
        account_id: parse_uuid(row, "account_id")?,
        kind: TxKind::from_str(&kind_str)
            .ok_or_else(|| anyhow::anyhow!("Invalid transaction kind: {}", kind_str))?,
        amount_cents: row.get("amount_cents"),
        fee_cents: row.get("fee_cents"),
        balance_before_cents: row.get("balance_before_cents"),
        balance_after_cents: row.get("balance_after_cents"),
        counterparty_number: row.get("counterparty_number"),
        status: TxStatus::from_str(&status_str)
            .ok_or_else(|| anyhow::anyhow!("Invalid transaction status: {}", status_str))?,
        created_at: parse_datetime(row, "created_at")?,
    })
}

fn row_to_locker(row: &SqliteRow) -> Result<Locker> {
    let status_str: String = row.get("status");
    Ok(Locker {
        id: parse_uuid(row, "id")?,
        branch_id: parse_uuid(row, "branch_id")?,
        serial_no: row.get("serial_no"),
        monthly_charge_cents: row.get("monthly_charge_cents"),
        status: LockerStatus::from_str(&status_str)
            .ok_or_else(|| anyhow::anyhow!("Invalid locker status: {}", status_str))?,
        created_at: parse_datetime(row, "created_at")?,
        deleted_at: parse_optional_datetime(row, "deleted_at")?,
    })
}

fn row_to_assignment(row: &SqliteRow) -> Result<LockerAssignment> {
    let status_str: String = row.get("status");
    Ok(LockerAssignment {
        id: parse_uuid(row, "id")?,
        locker_id: parse_uuid(row, "locker_id")?,
        user_id: parse_uuid(row, "user_id")?,
        status: AssignmentStatus::from_str(&status_str)
            .ok_or_else(|| anyhow::anyhow!("Invalid assignment status: {}", status_str))?,
        created_at: parse_datetime(row, "created_at")?,
        deleted_at: parse_optional_datetime(row, "deleted_at")?,
    })
}
