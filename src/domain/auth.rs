use super::Role;

/// Operations the engine exposes. Authorization is decided once per
/// request from this closed table, not inline inside service functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateAccount,
    ReadAccounts,
    UpdateAccount,
    RemoveAccount,
    CreateTransaction,
    ReadTransactions,
    FailTransaction,
    AssignLocker,
    ProvisionLockers,
    ReadLockers,
    UpdateLocker,
    DeallocateLocker,
}

/// How far an allowed action reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Everything, optionally narrowed by a branch filter.
    All,
    /// Resources belonging to the branch the actor manages.
    Branch,
    /// Resources owned by the actor themself.
    Own,
    Denied,
}

/// The (action, role) -> scope table.
pub fn scope_for(action: Action, role: Role) -> Scope {
    use Action::*;
    use Role::*;
    match (action, role) {
        (ReadAccounts | ReadTransactions | ReadLockers, Admin) => Scope::All,
        (ReadAccounts | ReadTransactions | ReadLockers, BranchManager) => Scope::Branch,
        (ReadAccounts | ReadTransactions | ReadLockers, Customer) => Scope::Own,

        (CreateAccount, Admin) => Scope::All,
        (CreateAccount, BranchManager) => Scope::Branch,
        (CreateAccount, Customer) => Scope::Denied,

        (UpdateAccount | RemoveAccount, Admin) => Scope::All,
        (UpdateAccount | RemoveAccount, BranchManager) => Scope::Branch,
        (UpdateAccount | RemoveAccount, Customer) => Scope::Denied,

        // Money movement is initiated by the account owner.
        (CreateTransaction, Customer) => Scope::Own,
        (CreateTransaction, Admin | BranchManager) => Scope::Denied,

        (FailTransaction, Admin) => Scope::All,
        (FailTransaction, BranchManager) => Scope::Branch,
        (FailTransaction, Customer) => Scope::Denied,

        // Assignment consumes an application at the acting manager's own
        // branch, so it has no admin-wide form.
        (AssignLocker, BranchManager) => Scope::Branch,
        (AssignLocker, Admin | Customer) => Scope::Denied,

        (ProvisionLockers | DeallocateLocker, BranchManager) => Scope::Branch,
        (ProvisionLockers | DeallocateLocker, Admin) => Scope::All,
        (ProvisionLockers | DeallocateLocker, Customer) => Scope::Denied,

        (UpdateLocker, Admin) => Scope::All,
        (UpdateLocker, BranchManager) => Scope::Branch,
        (UpdateLocker, Customer) => Scope::Denied,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_are_scoped_by_role() {
        assert_eq!(scope_for(Action::ReadAccounts, Role::Admin), Scope::All);
        assert_eq!(
            scope_for(Action::ReadAccounts, Role::BranchManager),
            Scope::Branch
        );
        assert_eq!(scope_for(Action::ReadAccounts, Role::Customer), Scope::Own);
    }

    #[test]
    fn test_customers_cannot_provision() {
        assert_eq!(scope_for(Action::CreateAccount, Role::Customer), Scope::Denied);
        assert_eq!(
            scope_for(Action::ProvisionLockers, Role::Customer),
            Scope::Denied
        );
    }

    #[test]
    fn test_only_customers_move_money() {
        assert_eq!(scope_for(Action::CreateTransaction, Role::Customer), Scope::Own);
        assert_eq!(
            scope_for(Action::CreateTransaction, Role::BranchManager),
            Scope::Denied
        );
        assert_eq!(scope_for(Action::CreateTransaction, Role::Admin), Scope::Denied);
    }
}
