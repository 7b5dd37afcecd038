use std::sync::Arc;

use crate::domain::{
    scope_for, Action, Actor, Application, AssignmentStatus, Branch, Cents, Locker,
    LockerAssignment, LockerId, LockerStatus, Role, Scope,
};
use crate::notify::NotificationDispatcher;
use crate::storage::{LockerFilter, Repository};

use super::{managed_branch, AppError};

/// Provisions lockers per branch and turns locker applications into
/// assignments; the mirror of the account workflow for physical lockers.
pub struct LockerService {
    repo: Arc<Repository>,
    notifier: Arc<dyn NotificationDispatcher>,
}

impl LockerService {
    pub fn new(repo: Arc<Repository>, notifier: Arc<dyn NotificationDispatcher>) -> Self {
        Self { repo, notifier }
    }

    /// File a locker application on behalf of the acting customer.
    pub async fn apply(&self, actor: &Actor, branch_ifsc: &str) -> Result<Application, AppError> {
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
            .find_open_locker_application(user.id, &branch.ifsc_code)
            .await?
            .is_some()
        {
            return Err(AppError::ApplicationAlreadyOpen);
        }

        let application = Application::for_locker(user.id, branch.ifsc_code.clone());
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

    /// Bind a locker to a customer who holds an open application at the
    /// acting manager's branch. Assignment, freeze, and application
    /// consumption commit as one unit.
    pub async fn assign(
        &self,
        customer_email: &str,
        locker_serial_no: i64,
        actor: &Actor,
    ) -> Result<LockerAssignment, AppError> {
        if scope_for(Action::AssignLocker, actor.role) == Scope::Denied {
            return Err(AppError::RoleDenied);
        }

        let customer = self
            .repo
            .get_user_by_email(customer_email)
            .await?
            .filter(|u| u.has_role(Role::Customer))
            .ok_or_else(|| AppError::UserNotFound(customer_email.to_string()))?;

        let branch = managed_branch(&self.repo, actor).await?;
        if branch.total_lockers == 0 {
            return Err(AppError::LockerCapacityExceeded {
                existing: 0,
                requested: 1,
                capacity: 0,
            });
        }

        let application = self
            .repo
            .find_open_locker_application(customer.id, &branch.ifsc_code)
            .await?
            .ok_or(AppError::ApplicationNotFound)?;

        let locker = self
            .repo
            .get_locker_by_serial(branch.id, locker_serial_no)
            .await?
            .ok_or(AppError::LockerNotFound)?;
        if locker.status == LockerStatus::Freezed {
            return Err(AppError::LockerFreezed);
        }

        if self
            .repo
            .find_active_assignment_for_user(customer.id)
            .await?
            .is_some()
        {
            return Err(AppError::ActiveLockerExists);
        }

        let assignment = LockerAssignment::new(locker.id, customer.id);

        let mut tx = self.repo.begin().await?;
        self.repo.insert_assignment(&mut tx, &assignment).await?;
        if !self
            .repo
            .set_locker_status_guarded(
                &mut tx,
                locker.id,
                LockerStatus::Available,
                LockerStatus::Freezed,
            )
            .await?
        {
            return Err(AppError::ConcurrentUpdate);
        }
        self.repo.consume_application(&mut tx, application.id).await?;
        tx.commit().await.map_err(anyhow::Error::from)?;

        if let Err(err) = self
            .notifier
            .locker_assigned(&customer.email, locker.serial_no)
            .await
        {
            tracing::warn!(error = %err, "locker assignment notification failed");
        }

        tracing::info!(
            serial_no = locker.serial_no,
            branch = %branch.ifsc_code,
            "locker assigned"
        );

        Ok(assignment)
    }

    /// Bulk-provision serially numbered lockers, bounded by the branch's
    /// fixed capacity.
    pub async fn provision(
        &self,
        number_of_lockers: i64,
        monthly_charge_cents: Cents,
        branch_ifsc: Option<&str>,
        actor: &Actor,
    ) -> Result<Vec<Locker>, AppError> {
        if number_of_lockers <= 0 {
            return Err(AppError::InvalidAmount);
        }
        let branch = self
            .resolve_branch(Action::ProvisionLockers, branch_ifsc, actor)
            .await?;

        let existing = self.repo.count_lockers_in_branch(branch.id).await?;
        if existing + number_of_lockers > branch.total_lockers {
            return Err(AppError::LockerCapacityExceeded {
                existing,
                requested: number_of_lockers,
                capacity: branch.total_lockers,
            });
        }

        let next_serial = self.repo.max_locker_serial(branch.id).await? + 1;
        let lockers: Vec<Locker> = (0..number_of_lockers)
            .map(|i| Locker::new(branch.id, next_serial + i, monthly_charge_cents))
            .collect();

        let mut tx = self.repo.begin().await?;
        for locker in &lockers {
            self.repo.insert_locker(&mut tx, locker).await?;
        }
        tx.commit().await.map_err(anyhow::Error::from)?;

        tracing::info!(
            count = number_of_lockers,
            branch = %branch.ifsc_code,
            "lockers provisioned"
        );

        Ok(lockers)
    }

    /// Role-scoped listing: Admin all (optional branch filter),
    /// BranchManager their branch, Customer only the locker backing their
    /// active assignment.
    pub async fn list(
        &self,
        actor: &Actor,
        branch_ifsc: Option<&str>,
        page: i64,
        limit: i64,
    ) -> Result<Vec<Locker>, AppError> {
        match scope_for(Action::ReadLockers, actor.role) {
            Scope::All => {
                let mut filter = LockerFilter {
                    page,
                    limit,
                    ..Default::default()
                };
                if let Some(ifsc) = branch_ifsc {
                    let branch = self
                        .repo
                        .get_branch_by_ifsc(ifsc)
                        .await?
                        .ok_or_else(|| AppError::BranchNotFound(ifsc.to_string()))?;
                    filter.branch_id = Some(branch.id);
                }
                Ok(self.repo.list_lockers(&filter).await?)
            }
            Scope::Branch => {
                let branch = managed_branch(&self.repo, actor).await?;
                let filter = LockerFilter {
                    branch_id: Some(branch.id),
                    page,
                    limit,
                };
                Ok(self.repo.list_lockers(&filter).await?)
            }
            Scope::Own => {
                let Some(assignment) = self
                    .repo
                    .find_active_assignment_for_user(actor.user_id)
                    .await?
                else {
                    return Ok(Vec::new());
                };
                let locker = self
                    .repo
                    .get_locker(assignment.locker_id)
                    .await?
                    .ok_or(AppError::LockerNotFound)?;
                Ok(vec![locker])
            }
            Scope::Denied => Err(AppError::RoleDenied),
        }
    }

    pub async fn view(&self, locker_id: LockerId, actor: &Actor) -> Result<Locker, AppError> {
        let locker = self
            .repo
            .get_locker(locker_id)
            .await?
            .ok_or(AppError::LockerNotFound)?;
        match scope_for(Action::ReadLockers, actor.role) {
            Scope::All => Ok(locker),
            Scope::Branch => {
                let branch = managed_branch(&self.repo, actor).await?;
                if locker.branch_id == branch.id {
                    Ok(locker)
                } else {
                    Err(AppError::LockerNotFound)
                }
            }
            Scope::Own => {
                let owns = self
                    .repo
                    .find_active_assignment_for_user(actor.user_id)
                    .await?
                    .map(|a| a.locker_id == locker.id)
                    .unwrap_or(false);
                if owns {
                    Ok(locker)
                } else {
                    Err(AppError::LockerNotFound)
                }
            }
            Scope::Denied => Err(AppError::RoleDenied),
        }
    }

    /// Branch-scoped mutation of the monthly charge.
    pub async fn update_charge(
        &self,
        locker_id: LockerId,
        monthly_charge_cents: Cents,
        actor: &Actor,
    ) -> Result<Locker, AppError> {
        let locker = self
            .repo
            .get_locker(locker_id)
            .await?
            .ok_or(AppError::LockerNotFound)?;
        match scope_for(Action::UpdateLocker, actor.role) {
            Scope::All => {}
            Scope::Branch => {
                let branch = managed_branch(&self.repo, actor).await?;
                if locker.branch_id != branch.id {
                    return Err(AppError::BranchScopeViolation);
                }
            }
            Scope::Own | Scope::Denied => return Err(AppError::RoleDenied),
        }
        self.repo
            .update_locker_charge(locker.id, monthly_charge_cents)
            .await?;
        self.repo
            .get_locker(locker.id)
            .await?
            .ok_or(AppError::LockerNotFound)
    }

    /// Release a locker: assignment goes inactive, locker becomes
    /// available again, atomically.
    pub async fn deallocate(
        &self,
        locker_id: LockerId,
        actor: &Actor,
    ) -> Result<(), AppError> {
        let locker = self
            .repo
            .get_locker(locker_id)
            .await?
            .ok_or(AppError::LockerNotFound)?;
        match scope_for(Action::DeallocateLocker, actor.role) {
            Scope::All => {}
            Scope::Branch => {
                let branch = managed_branch(&self.repo, actor).await?;
                if locker.branch_id != branch.id {
                    return Err(AppError::BranchScopeViolation);
                }
            }
            Scope::Own | Scope::Denied => return Err(AppError::RoleDenied),
        }

        let assignment = self
            .repo
            .find_active_assignment_for_locker(locker.id)
            .await?
            .ok_or(AppError::LockerNotAssigned)?;

        let mut tx = self.repo.begin().await?;
        if !self
            .repo
            .set_assignment_status_guarded(
                &mut tx,
                assignment.id,
                AssignmentStatus::Active,
                AssignmentStatus::Inactive,
            )
            .await?
        {
            return Err(AppError::ConcurrentUpdate);
        }
        if !self
            .repo
            .set_locker_status_guarded(
                &mut tx,
                locker.id,
                LockerStatus::Freezed,
                LockerStatus::Available,
            )
            .await?
        {
            return Err(AppError::ConcurrentUpdate);
        }
        tx.commit().await.map_err(anyhow::Error::from)?;

        tracing::info!(serial_no = locker.serial_no, "locker deallocated");
        Ok(())
    }

    async fn resolve_branch(
        &self,
        action: Action,
        branch_ifsc: Option<&str>,
        actor: &Actor,
    ) -> Result<Branch, AppError> {
        match scope_for(action, actor.role) {
            Scope::All => {
                let ifsc = branch_ifsc.ok_or_else(|| {
                    AppError::BranchNotFound("branch IFSC required".to_string())
                })?;
                self.repo
                    .get_branch_by_ifsc(ifsc)
                    .await?
                    .ok_or_else(|| AppError::BranchNotFound(ifsc.to_string()))
            }
            Scope::Branch => managed_branch(&self.repo, actor).await,
            Scope::Own | Scope::Denied => Err(AppError::RoleDenied),
        }
    }
}
