use std::sync::Arc;

use crate::domain::{
    scope_for, Account, AccountId, AccountStatus, Action, Actor, Cents, EntryId, LedgerEntry,
    Scope, TxKind, TxStatus,
};
use crate::notify::NotificationDispatcher;
use crate::storage::{EntryFilter, Repository};

use super::{managed_branch, AppError};

/// A money-movement request against one account.
#[derive(Debug, Clone)]
pub struct TransactionRequest {
    pub kind: TxKind,
    pub amount_cents: Cents,
    pub fee_cents: Cents,
    /// Destination account number, required for transfers.
    pub to_account_number: Option<String>,
}

/// Outcome of a committed money movement: the entry on the source account
/// and, for transfers, the mirrored entry on the destination.
#[derive(Debug, Clone)]
pub struct TransactionOutcome {
    pub entry: LedgerEntry,
    pub counterpart: Option<LedgerEntry>,
}

/// The core money-movement state machine. Every balance mutation and the
/// ledger entries describing it commit as one storage transaction; entries
/// are inserted pending and promoted to completed inside that same scope,
/// so a rollback can never leave a dangling pending record.
pub struct LedgerService {
    repo: Arc<Repository>,
    notifier: Arc<dyn NotificationDispatcher>,
}

impl LedgerService {
    pub fn new(repo: Arc<Repository>, notifier: Arc<dyn NotificationDispatcher>) -> Self {
        Self { repo, notifier }
    }

    pub async fn create(
        &self,
        account_id: AccountId,
        request: &TransactionRequest,
        actor: &Actor,
    ) -> Result<TransactionOutcome, AppError> {
        if scope_for(Action::CreateTransaction, actor.role) != Scope::Own {
            return Err(AppError::RoleDenied);
        }
        if request.amount_cents <= 0 || request.fee_cents < 0 {
            return Err(AppError::InvalidAmount);
        }

        // Ownership scoping doubles as existence check.
        let account = self
            .repo
            .get_account_for_user(account_id, actor.user_id)
            .await?
            .ok_or(AppError::AccountNotFound)?;

        // Locked-in funds reject every transaction kind until maturity.
        if account.is_locked_in(chrono::Utc::now()) {
            return Err(AppError::MaturityLock);
        }

        let outcome = match request.kind {
            TxKind::Withdrawal => self.withdraw(&account, request).await?,
            TxKind::Deposit => self.deposit(&account, request).await?,
            TxKind::Transfer => self.transfer(&account, request).await?,
        };

        self.notify_outcome(&account, &outcome).await;
        Ok(outcome)
    }

    async fn withdraw(
        &self,
        account: &Account,
        request: &TransactionRequest,
    ) -> Result<TransactionOutcome, AppError> {
        if account.status != AccountStatus::Active {
            return Err(AppError::AccountInactive);
        }
        let required = request
            .amount_cents
            .checked_add(request.fee_cents)
            .ok_or(AppError::InvalidAmount)?;
        if account.balance_cents < required {
            return Err(AppError::InsufficientFunds {
                balance: account.balance_cents,
                required,
            });
        }

        let before = account.balance_cents;
        let after = before - required;
        let entry = LedgerEntry::new(
            account.id,
            TxKind::Withdrawal,
            request.amount_cents,
            request.fee_cents,
            before,
            after,
        );

        let mut tx = self.repo.begin().await?;
        self.repo.insert_entry(&mut tx, &entry).await?;
        if !self
            .repo
            .update_balance_guarded(&mut tx, account.id, before, after, AccountStatus::Active)
            .await?
        {
            return Err(AppError::ConcurrentUpdate);
        }
        self.repo
            .set_entry_status_guarded(&mut tx, entry.id, TxStatus::Pending, TxStatus::Completed)
            .await?;
        tx.commit().await.map_err(anyhow::Error::from)?;

        Ok(TransactionOutcome {
            entry: entry.completed(),
            counterpart: None,
        })
    }

    async fn deposit(
        &self,
        account: &Account,
        request: &TransactionRequest,
    ) -> Result<TransactionOutcome, AppError> {
        let before = account.balance_cents;
        let after = before
            .checked_add(request.amount_cents)
            .ok_or(AppError::InvalidAmount)?;
        let entry = LedgerEntry::new(account.id, TxKind::Deposit, request.amount_cents, 0, before, after);

        let mut tx = self.repo.begin().await?;
        self.repo.insert_entry(&mut tx, &entry).await?;
        // Deposits reactivate dormant accounts.
        if !self
            .repo
            .update_balance_guarded(&mut tx, account.id, before, after, AccountStatus::Active)
            .await?
        {
            return Err(AppError::ConcurrentUpdate);
        }
        self.repo
            .set_entry_status_guarded(&mut tx, entry.id, TxStatus::Pending, TxStatus::Completed)
            .await?;
        tx.commit().await.map_err(anyhow::Error::from)?;

        Ok(TransactionOutcome {
            entry: entry.completed(),
            counterpart: None,
        })
    }

    async fn transfer(
        &self,
        source: &Account,
        request: &TransactionRequest,
    ) -> Result<TransactionOutcome, AppError> {
        if source.status != AccountStatus::Active {
            return Err(AppError::AccountInactive);
        }
        let destination_number = request
            .to_account_number
            .as_deref()
            .filter(|n| !n.is_empty())
            .ok_or(AppError::MissingDestination)?;
        if destination_number == source.number {
            return Err(AppError::SelfTransfer);
        }
        let destination = self
            .repo
            .get_account_by_number(destination_number)
            .await?
            .ok_or(AppError::AccountNotFound)?;

        let required = request
            .amount_cents
            .checked_add(request.fee_cents)
            .ok_or(AppError::InvalidAmount)?;
        if source.balance_cents < required {
            return Err(AppError::InsufficientFunds {
                balance: source.balance_cents,
                required,
            });
        }

        let source_before = source.balance_cents;
        let source_after = source_before - required;
        let dest_before = destination.balance_cents;
        let dest_after = dest_before
            .checked_add(request.amount_cents)
            .ok_or(AppError::InvalidAmount)?;

        let debit = LedgerEntry::new(
            source.id,
            TxKind::Transfer,
            request.amount_cents,
            request.fee_cents,
            source_before,
            source_after,
        )
        .with_counterparty(destination.number.clone());
        let credit = LedgerEntry::new(
            destination.id,
            TxKind::Transfer,
            request.amount_cents,
            0,
            dest_before,
            dest_after,
        )
        .with_counterparty(source.number.clone());

        let mut tx = self.repo.begin().await?;
        self.repo.insert_entry(&mut tx, &debit).await?;
        self.repo.insert_entry(&mut tx, &credit).await?;
        if !self
            .repo
            .update_balance_guarded(
                &mut tx,
                source.id,
                source_before,
                source_after,
                AccountStatus::Active,
            )
            .await?
        {
            return Err(AppError::ConcurrentUpdate);
        }
        // The credited account reactivates on receipt, like a deposit.
        if !self
            .repo
            .update_balance_guarded(
                &mut tx,
                destination.id,
                dest_before,
                dest_after,
                AccountStatus::Active,
            )
            .await?
        {
            return Err(AppError::ConcurrentUpdate);
        }
        self.repo
            .set_entry_status_guarded(&mut tx, debit.id, TxStatus::Pending, TxStatus::Completed)
            .await?;
        self.repo
            .set_entry_status_guarded(&mut tx, credit.id, TxStatus::Pending, TxStatus::Completed)
            .await?;
        tx.commit().await.map_err(anyhow::Error::from)?;

        // Credit-side owner gets their own notification.
        if let Some(owner) = self.repo.get_user(destination.user_id).await? {
            if let Err(err) = self
                .notifier
                .transaction(
                    &owner.email,
                    TxKind::Transfer,
                    request.amount_cents,
                    dest_before,
                    dest_after,
                )
                .await
            {
                tracing::warn!(error = %err, "transfer credit notification failed");
            }
        }

        Ok(TransactionOutcome {
            entry: debit.completed(),
            counterpart: Some(credit.completed()),
        })
    }

    async fn notify_outcome(&self, account: &Account, outcome: &TransactionOutcome) {
        let owner = match self.repo.get_user(account.user_id).await {
            Ok(Some(owner)) => owner,
            Ok(None) => return,
            Err(err) => {
                tracing::warn!(error = %err, "owner lookup for notification failed");
                return;
            }
        };
        if let Err(err) = self
            .notifier
            .transaction(
                &owner.email,
                outcome.entry.kind,
                outcome.entry.amount_cents,
                outcome.entry.balance_before_cents,
                outcome.entry.balance_after_cents,
            )
            .await
        {
            tracing::warn!(error = %err, "transaction notification failed");
        }
    }

    /// Role-scoped listing, most recent first.
    pub async fn list(
        &self,
        actor: &Actor,
        account_id: Option<AccountId>,
        page: i64,
        limit: i64,
    ) -> Result<Vec<LedgerEntry>, AppError> {
        let mut filter = EntryFilter {
            account_id,
            page,
            limit,
            ..Default::default()
        };
        match scope_for(Action::ReadTransactions, actor.role) {
            Scope::All => {}
            Scope::Branch => {
                filter.branch_id = Some(managed_branch(&self.repo, actor).await?.id);
            }
            Scope::Own => filter.user_id = Some(actor.user_id),
            Scope::Denied => return Err(AppError::RoleDenied),
        }
        Ok(self.repo.list_entries(&filter).await?)
    }

    pub async fn view(&self, entry_id: EntryId, actor: &Actor) -> Result<LedgerEntry, AppError> {
        let entry = self
            .repo
            .get_entry(entry_id)
            .await?
            .ok_or(AppError::TransactionNotFound)?;
        self.authorize_entry(&entry, actor, Action::ReadTransactions)
            .await?;
        Ok(entry)
    }

    /// The only mutation a ledger entry admits: pending -> failed. Any
    /// other current status is rejected without touching the row.
    pub async fn mark_failed(
        &self,
        entry_id: EntryId,
        actor: &Actor,
    ) -> Result<LedgerEntry, AppError> {
        let entry = self
            .repo
            .get_entry(entry_id)
            .await?
            .ok_or(AppError::TransactionNotFound)?;
        let account = self
            .authorize_entry(&entry, actor, Action::FailTransaction)
            .await?;

        if !entry.status.can_transition_to(TxStatus::Failed) {
            return Err(AppError::InvalidStatusTransition(entry.status));
        }

        let mut tx = self.repo.begin().await?;
        if !self
            .repo
            .set_entry_status_guarded(&mut tx, entry.id, TxStatus::Pending, TxStatus::Failed)
            .await?
        {
            return Err(AppError::InvalidStatusTransition(entry.status));
        }
        tx.commit().await.map_err(anyhow::Error::from)?;

        if let Some(owner) = self.repo.get_user(account.user_id).await? {
            if let Err(err) = self
                .notifier
                .failed_transaction(&owner.email, entry.kind, entry.amount_cents)
                .await
            {
                tracing::warn!(error = %err, "failed-transaction notification failed");
            }
        }

        let mut failed = entry;
        failed.status = TxStatus::Failed;
        Ok(failed)
    }

    async fn authorize_entry(
        &self,
        entry: &LedgerEntry,
        actor: &Actor,
        action: Action,
    ) -> Result<Account, AppError> {
        let account = self
            .repo
            .get_account(entry.account_id)
            .await?
            .ok_or(AppError::AccountNotFound)?;
        match scope_for(action, actor.role) {
            Scope::All => Ok(account),
            Scope::Branch => {
                let managed = managed_branch(&self.repo, actor).await?;
                if account.branch_id == managed.id {
                    Ok(account)
                } else {
                    Err(AppError::TransactionNotFound)
                }
            }
            Scope::Own => {
                if account.user_id == actor.user_id {
                    Ok(account)
                } else {
                    Err(AppError::TransactionNotFound)
                }
            }
            Scope::Denied => Err(AppError::RoleDenied),
        }
    }
}
