// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use corebank::application::{Engine, OpenAccountRequest, TransactionRequest};
use corebank::domain::{
    parse_cents, Account, AccountPolicy, AccountType, Actor, Branch, Role, TxKind, User,
};
use corebank::notify::LogDispatcher;
use tempfile::TempDir;

pub const BRANCH_IFSC: &str = "FDRL0001234";
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const MANAGER_EMAIL: &str = "manager@example.com";
pub const CUSTOMER_EMAIL: &str = "ravi@example.com";
pub const SECOND_CUSTOMER_EMAIL: &str = "meera@example.com";

/// Helper to create a test engine with a temporary database
pub async fn test_engine() -> Result<(Engine, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let engine = Engine::init(db_path.to_str().unwrap(), Arc::new(LogDispatcher)).await?;
    Ok((engine, temp_dir))
}

/// Acting identities created by `seed`.
pub struct Fixture {
    pub admin: Actor,
    pub manager: Actor,
    pub customer: Actor,
    pub second_customer: Actor,
}

/// Standard test fixture: one branch with a manager and five lockers of
/// capacity, two customers, an admin, and policies for all account types.
/// Savings and fixed both carry a 5.00% rate; fixed locks in for a year.
pub async fn seed(engine: &Engine) -> Result<Fixture> {
    let admin = User::new("Asha".into(), ADMIN_EMAIL.into(), vec![Role::Admin]);
    let manager = User::new(
        "Manoj".into(),
        MANAGER_EMAIL.into(),
        vec![Role::BranchManager],
    );
    let customer = User::new("Ravi".into(), CUSTOMER_EMAIL.into(), vec![Role::Customer]);
    let second = User::new(
        "Meera".into(),
        SECOND_CUSTOMER_EMAIL.into(),
        vec![Role::Customer],
    );
    for user in [&admin, &manager, &customer, &second] {
        engine.repo.save_user(user).await?;
    }

    let branch = Branch::new(
        "Federal Bank".into(),
        "MG Road".into(),
        BRANCH_IFSC.into(),
        manager.id,
        5,
    );
    engine.repo.save_branch(&branch).await?;

    for policy in [
        AccountPolicy::new(AccountType::Savings, 500, 0, 0, 0),
        AccountPolicy::new(AccountType::Current, 0, 0, 0, 0),
        AccountPolicy::new(AccountType::Fixed, 500, 100_000, 12, 5_000),
        AccountPolicy::new(AccountType::Recurring, 600, 0, 24, 2_500),
    ] {
        engine.repo.save_policy(&policy).await?;
    }

    Ok(Fixture {
        admin: Actor::new(admin.id, Role::Admin),
        manager: Actor::new(manager.id, Role::BranchManager),
        customer: Actor::new(customer.id, Role::Customer),
        second_customer: Actor::new(second.id, Role::Customer),
    })
}

/// Apply for and open an account of the given type, the full workflow a
/// customer and manager go through.
pub async fn open_account(
    engine: &Engine,
    customer: &Actor,
    customer_email: &str,
    account_type: AccountType,
    principal: Option<&str>,
) -> Result<Account> {
    engine
        .accounts
        .apply(customer, BRANCH_IFSC, account_type, None)
        .await?;
    let manager = engine
        .repo
        .get_user_by_email(MANAGER_EMAIL)
        .await?
        .unwrap();
    let request = OpenAccountRequest {
        customer_email: customer_email.to_string(),
        branch_ifsc: BRANCH_IFSC.to_string(),
        account_type,
        nominee_name: None,
        principal_cents: principal.map(|p| parse_cents(p).unwrap()),
        installment_cents: None,
    };
    let account = engine
        .accounts
        .create(&request, &Actor::new(manager.id, Role::BranchManager))
        .await?;
    Ok(account)
}

/// Deposit a decimal amount into an account as its owner.
pub async fn deposit(
    engine: &Engine,
    owner: &Actor,
    account: &Account,
    amount: &str,
) -> Result<()> {
    let request = TransactionRequest {
        kind: TxKind::Deposit,
        amount_cents: parse_cents(amount).unwrap(),
        fee_cents: 0,
        to_account_number: None,
    };
    engine.ledger.create(account.id, &request, owner).await?;
    Ok(())
}

pub fn withdrawal(amount: &str, fee: &str) -> TransactionRequest {
    TransactionRequest {
        kind: TxKind::Withdrawal,
        amount_cents: parse_cents(amount).unwrap(),
        fee_cents: parse_cents(fee).unwrap(),
        to_account_number: None,
    }
}

pub fn transfer(amount: &str, to_number: &str) -> TransactionRequest {
    TransactionRequest {
        kind: TxKind::Transfer,
        amount_cents: parse_cents(amount).unwrap(),
        fee_cents: 0,
        to_account_number: Some(to_number.to_string()),
    }
}
