use std::sync::Arc;

use crate::domain::{
    generate_account_number, maturity_from, scope_for, Account, AccountId, AccountStatus,
    AccountType, Action, Actor, Application, Cents, Role, Scope,
};
use crate::notify::NotificationDispatcher;
use crate::storage::{AccountFilter, Repository};

use super::{managed_branch, AppError, PolicyCatalog};

/// Request to open an account against a previously filed application.
#[derive(Debug, Clone)]
pub struct OpenAccountRequest {
    pub customer_email: String,
    pub branch_ifsc: String,
    pub account_type: AccountType,
    pub nominee_name: Option<String>,
    /// Opening principal for fixed deposits.
    pub principal_cents: Option<Cents>,
    /// Monthly installment for recurring deposits.
    pub installment_cents: Option<Cents>,
}

/// Partial mutation of an account's profile fields.
#[derive(Debug, Clone, Default)]
pub struct AccountPatch {
    pub nominee_name: Option<String>,
    pub status: Option<AccountStatus>,
}

/// Turns approved applications into accounts and owns the account's
/// non-monetary lifecycle (profile updates, soft deletion).
pub struct AccountService {
    repo: Arc<Repository>,
    catalog: PolicyCatalog,
    notifier: Arc<dyn NotificationDispatcher>,
}

impl AccountService {
    pub fn new(repo: Arc<Repository>, notifier: Arc<dyn NotificationDispatcher>) -> Self {
        let catalog = PolicyCatalog::new(repo.clone());
        Self {
            repo,
            catalog,
            notifier,
        }
    }

    /// File an account application on behalf of the acting customer.
    /// At most one open application per (user, branch, type).
    pub async fn apply(
        &self,
        actor: &Actor,
        branch_ifsc: &str,
        account_type: AccountType,
        nominee_name: Option<String>,
    ) -> Result<Application, AppError> {
        let user = self
            .repo
            .get_user(actor.user_id)
            .await?
            .filter(|u| u.has_role(Role::Customer))
            .ok_or_else(|| AppError::UserNotFound(actor.user_id.to_string()))?;
        let branch = self
            .repo
            .get_branch_by_ifsc(branch_ifsc)
            .await?
            .ok_or_else(|| AppError::BranchNotFound(branch_ifsc.to_string()))?;

        if self
            .repo
            .find_open_account_application(user.id, branch_ifsc, account_type)
            .await?
            .is_some()
        {
            return Err(AppError::ApplicationAlreadyOpen);
        }

        let application = Application::for_account(
            user.id,
            branch.ifsc_code.clone(),
            account_type,
            nominee_name,
        );
        self.repo.save_application(&application).await?;

        if let Some(manager) = self.repo.get_user(branch.manager_user_id).await? {
            if let Err(err) = self
                .notifier
                .application_request(&manager.email, &user.name, application.kind)
                .await
            {
                tracing::warn!(error = %err, "application notification failed");
            }
        }

        Ok(application)
    }

    /// Provision an account from an open application. Preconditions run
    /// in order and each failure leaves the store untouched; the account
    /// insert and the application consumption commit as one unit.
    pub async fn create(
        &self,
        request: &OpenAccountRequest,
        actor: &Actor,
    ) -> Result<Account, AppError> {
        if scope_for(Action::CreateAccount, actor.role) == Scope::Denied {
            return Err(AppError::RoleDenied);
        }

        let user = self
            .repo
            .get_user_by_email(&request.customer_email)
            .await?
            .filter(|u| u.has_role(Role::Customer))
            .ok_or_else(|| AppError::UserNotFound(request.customer_email.clone()))?;

        let branch = self
            .repo
            .get_branch_by_ifsc(&request.branch_ifsc)
            .await?
            .ok_or_else(|| AppError::BranchNotFound(request.branch_ifsc.clone()))?;

        let application = self
            .repo
            .find_open_account_application(user.id, &branch.ifsc_code, request.account_type)
            .await?
            .ok_or(AppError::ApplicationNotFound)?;

        if actor.role == Role::BranchManager {
            let managed = managed_branch(&self.repo, actor).await?;
            if managed.id != branch.id {
                return Err(AppError::BranchScopeViolation);
            }
        }

        if self
            .repo
            .find_account_by_user_and_type(user.id, request.account_type)
            .await?
            .is_some()
        {
            return Err(AppError::DuplicateAccountType(
                request.account_type.to_string(),
            ));
        }

        let policy = self.catalog.find_by_type(request.account_type).await?;

        // Term deposits must commit at least the policy minimum up front:
        // the principal for fixed, the monthly installment for recurring.
        if request.account_type.is_term_deposit() {
            let committed = if request.account_type == AccountType::Fixed {
                request.principal_cents.unwrap_or(0)
            } else {
                request.installment_cents.unwrap_or(0)
            };
            if committed < policy.minimum_amount_cents {
                return Err(AppError::BelowMinimum {
                    minimum: policy.minimum_amount_cents,
                });
            }
        }

        let mut tx = self.repo.begin().await?;

        let number = loop {
            let candidate = generate_account_number();
            if !self.repo.account_number_exists(&mut tx, &candidate).await? {
                break candidate;
            }
        };

        let mut account = Account::new(
            user.id,
            branch.id,
            request.account_type,
            number,
            policy.interest_rate_bps,
        );
        let nominee = request
            .nominee_name
            .clone()
            .or_else(|| application.nominee_name.clone());
        if let Some(nominee) = nominee {
            account = account.with_nominee(nominee);
        }
        if request.account_type.is_term_deposit() {
            let maturity = maturity_from(account.created_at, policy.lock_in_period_months);
            account = account.with_maturity(maturity);
            if let Some(principal) = request.principal_cents {
                account = account.with_principal(principal);
            }
            if let Some(installment) = request.installment_cents {
                account = account.with_installment(installment);
            }
        }

        self.repo.insert_account(&mut tx, &account).await?;
        self.repo.consume_application(&mut tx, application.id).await?;
        tx.commit().await.map_err(anyhow::Error::from)?;

        if let Err(err) = self
            .notifier
            .account_creation(&user.email, account.account_type.as_str(), &account.number)
            .await
        {
            tracing::warn!(error = %err, "account creation notification failed");
        }

        tracing::info!(
            account = %account.number,
            account_type = %account.account_type,
            branch = %branch.ifsc_code,
            "account provisioned"
        );

        Ok(account)
    }

    /// Role-scoped listing: Admin sees all (optionally narrowed to one
    /// branch by IFSC), BranchManager their branch, Customer their own.
    pub async fn list(
        &self,
        actor: &Actor,
        branch_ifsc: Option<&str>,
        page: i64,
        limit: i64,
    ) -> Result<Vec<Account>, AppError> {
        let mut filter = AccountFilter {
            page,
            limit,
            ..Default::default()
        };
        match scope_for(Action::ReadAccounts, actor.role) {
            Scope::All => {
                if let Some(ifsc) = branch_ifsc {
                    let branch = self
                        .repo
                        .get_branch_by_ifsc(ifsc)
                        .await?
                        .ok_or_else(|| AppError::BranchNotFound(ifsc.to_string()))?;
                    filter.branch_id = Some(branch.id);
                }
            }
            Scope::Branch => {
                filter.branch_id = Some(managed_branch(&self.repo, actor).await?.id);
            }
            Scope::Own => filter.user_id = Some(actor.user_id),
            Scope::Denied => return Err(AppError::RoleDenied),
        }
        Ok(self.repo.list_accounts(&filter).await?)
    }

    /// Single-account read under the same scoping as `list`. Out-of-scope
    /// accounts are indistinguishable from missing ones.
    pub async fn view(&self, account_id: AccountId, actor: &Actor) -> Result<Account, AppError> {
        let account = self
            .repo
            .get_account(account_id)
            .await?
            .ok_or(AppError::AccountNotFound)?;
        match scope_for(Action::ReadAccounts, actor.role) {
            Scope::All => Ok(account),
            Scope::Branch => {
                let managed = managed_branch(&self.repo, actor).await?;
                if account.branch_id == managed.id {
                    Ok(account)
                } else {
                    Err(AppError::AccountNotFound)
                }
            }
            Scope::Own => {
                if account.user_id == actor.user_id {
                    Ok(account)
                } else {
                    Err(AppError::AccountNotFound)
                }
            }
            Scope::Denied => Err(AppError::RoleDenied),
        }
    }

    pub async fn update(
        &self,
        account_id: AccountId,
        patch: &AccountPatch,
        actor: &Actor,
    ) -> Result<Account, AppError> {
        let account = self.authorize_mutation(Action::UpdateAccount, account_id, actor).await?;
        self.repo
            .update_account_profile(account.id, patch.nominee_name.as_deref(), patch.status)
            .await?;
        self.repo
            .get_account(account.id)
            .await?
            .ok_or(AppError::AccountNotFound)
    }

    /// Soft delete; ledger history stays behind the tombstone.
    pub async fn remove(&self, account_id: AccountId, actor: &Actor) -> Result<(), AppError> {
        let account = self.authorize_mutation(Action::RemoveAccount, account_id, actor).await?;
        self.repo.soft_delete_account(account.id).await?;
        tracing::info!(account = %account.number, "account soft-deleted");
        Ok(())
    }

    async fn authorize_mutation(
        &self,
        action: Action,
        account_id: AccountId,
        actor: &Actor,
    ) -> Result<Account, AppError> {
        let account = self
            .repo
            .get_account(account_id)
            .await?
            .ok_or(AppError::AccountNotFound)?;
        match scope_for(action, actor.role) {
            Scope::All => Ok(account),
            Scope::Branch => {
                let managed = managed_branch(&self.repo, actor).await?;
                if account.branch_id == managed.id {
                    Ok(account)
                } else {
                    Err(AppError::BranchScopeViolation)
                }
            }
            Scope::Own | Scope::Denied => Err(AppError::RoleDenied),
        }
    }
}
