mod common;

use anyhow::Result;
use common::{
    open_account, seed, test_engine, BRANCH_IFSC, CUSTOMER_EMAIL, SECOND_CUSTOMER_EMAIL,
};
use corebank::application::{AccountPatch, AppError, ErrorKind, OpenAccountRequest};
use corebank::domain::{
    generate_account_number, Account, AccountStatus, AccountType, ACCOUNT_NUMBER_LEN,
    ACCOUNT_NUMBER_PREFIX,
};

#[tokio::test]
async fn test_end_to_end_account_opening() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let fx = seed(&engine).await?;

    let application = engine
        .accounts
        .apply(&fx.customer, BRANCH_IFSC, AccountType::Savings, None)
        .await?;
    assert_eq!(application.branch_ifsc, BRANCH_IFSC);

    let request = OpenAccountRequest {
        customer_email: CUSTOMER_EMAIL.to_string(),
        branch_ifsc: BRANCH_IFSC.to_string(),
        account_type: AccountType::Savings,
        nominee_name: None,
        principal_cents: None,
        installment_cents: None,
    };
    let account = engine.accounts.create(&request, &fx.manager).await?;

    // Number shape: fixed prefix plus random digits, 16 characters total
    assert_eq!(account.number.len(), ACCOUNT_NUMBER_LEN);
    assert!(account.number.starts_with(ACCOUNT_NUMBER_PREFIX));
    assert!(account.number.chars().all(|c| c.is_ascii_digit()));

    // Rate copied from the savings policy, opened active with zero balance
    assert_eq!(account.interest_rate_bps, 500);
    assert_eq!(account.status, AccountStatus::Active);
    assert_eq!(account.balance_cents, 0);

    // The application was consumed by the same commit
    let open = engine
        .repo
        .find_open_account_application(fx.customer.user_id, BRANCH_IFSC, AccountType::Savings)
        .await?;
    assert!(open.is_none());

    Ok(())
}

#[tokio::test]
async fn test_duplicate_application_rejected() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let fx = seed(&engine).await?;

    engine
        .accounts
        .apply(&fx.customer, BRANCH_IFSC, AccountType::Savings, None)
        .await?;
    let err = engine
        .accounts
        .apply(&fx.customer, BRANCH_IFSC, AccountType::Savings, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ApplicationAlreadyOpen));
    assert_eq!(err.kind(), ErrorKind::Conflict);

    // A different type at the same branch is still fine
    engine
        .accounts
        .apply(&fx.customer, BRANCH_IFSC, AccountType::Current, None)
        .await?;

    Ok(())
}

#[tokio::test]
async fn test_create_without_application_rejected() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let fx = seed(&engine).await?;

    let request = OpenAccountRequest {
        customer_email: CUSTOMER_EMAIL.to_string(),
        branch_ifsc: BRANCH_IFSC.to_string(),
        account_type: AccountType::Savings,
        nominee_name: None,
        principal_cents: None,
        installment_cents: None,
    };
    let err = engine.accounts.create(&request, &fx.manager).await.unwrap_err();
    assert!(matches!(err, AppError::ApplicationNotFound));
    assert_eq!(err.kind(), ErrorKind::Conflict);

    Ok(())
}

#[tokio::test]
async fn test_duplicate_account_type_leaves_application_open() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let fx = seed(&engine).await?;

    open_account(&engine, &fx.customer, CUSTOMER_EMAIL, AccountType::Savings, None).await?;

    // A second savings application can be filed, but provisioning it fails
    engine
        .accounts
        .apply(&fx.customer, BRANCH_IFSC, AccountType::Savings, None)
        .await?;
    let request = OpenAccountRequest {
        customer_email: CUSTOMER_EMAIL.to_string(),
        branch_ifsc: BRANCH_IFSC.to_string(),
        account_type: AccountType::Savings,
        nominee_name: None,
        principal_cents: None,
        installment_cents: None,
    };
    let err = engine.accounts.create(&request, &fx.manager).await.unwrap_err();
    assert!(matches!(err, AppError::DuplicateAccountType(_)));
    assert_eq!(err.kind(), ErrorKind::Conflict);

    // The failed provisioning did not consume the application
    let open = engine
        .repo
        .find_open_account_application(fx.customer.user_id, BRANCH_IFSC, AccountType::Savings)
        .await?;
    assert!(open.is_some());

    Ok(())
}

#[tokio::test]
async fn test_application_survives_aborted_provisioning() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let fx = seed(&engine).await?;

    let application = engine
        .accounts
        .apply(&fx.customer, BRANCH_IFSC, AccountType::Savings, None)
        .await?;

    // Abort provisioning mid-transaction: the account insert and the
    // application consumption must vanish together
    let branch = engine.repo.get_branch_by_ifsc(BRANCH_IFSC).await?.unwrap();
    let account = Account::new(
        fx.customer.user_id,
        branch.id,
        AccountType::Savings,
        generate_account_number(),
        500,
    );
    let mut tx = engine.repo.begin().await?;
    engine.repo.insert_account(&mut tx, &account).await?;
    engine.repo.consume_application(&mut tx, application.id).await?;
    tx.rollback().await?;

    assert!(engine.repo.get_account(account.id).await?.is_none());
    assert!(engine
        .repo
        .find_open_account_application(fx.customer.user_id, BRANCH_IFSC, AccountType::Savings)
        .await?
        .is_some());

    // The surviving application can still be provisioned normally
    let request = OpenAccountRequest {
        customer_email: CUSTOMER_EMAIL.to_string(),
        branch_ifsc: BRANCH_IFSC.to_string(),
        account_type: AccountType::Savings,
        nominee_name: None,
        principal_cents: None,
        installment_cents: None,
    };
    engine.accounts.create(&request, &fx.manager).await?;

    Ok(())
}

#[tokio::test]
async fn test_customer_cannot_provision_accounts() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let fx = seed(&engine).await?;

    engine
        .accounts
        .apply(&fx.customer, BRANCH_IFSC, AccountType::Savings, None)
        .await?;
    let request = OpenAccountRequest {
        customer_email: CUSTOMER_EMAIL.to_string(),
        branch_ifsc: BRANCH_IFSC.to_string(),
        account_type: AccountType::Savings,
        nominee_name: None,
        principal_cents: None,
        installment_cents: None,
    };
    let err = engine
        .accounts
        .create(&request, &fx.customer)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::RoleDenied));
    assert_eq!(err.kind().status_code(), 403);

    Ok(())
}

#[tokio::test]
async fn test_fixed_account_gets_maturity_and_principal() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let fx = seed(&engine).await?;

    let account = open_account(
        &engine,
        &fx.customer,
        CUSTOMER_EMAIL,
        AccountType::Fixed,
        Some("1000.00"),
    )
    .await?;

    assert_eq!(account.balance_cents, 100_000);
    assert_eq!(account.principal_amount_cents, Some(100_000));
    let maturity = account.maturity_date.unwrap();
    // Twelve-month lock-in from the opening date
    assert!(maturity > account.created_at + chrono::Duration::days(300));
    assert!(account.is_locked_in(chrono::Utc::now()));

    Ok(())
}

#[tokio::test]
async fn test_fixed_principal_below_minimum_rejected() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let fx = seed(&engine).await?;

    engine
        .accounts
        .apply(&fx.customer, BRANCH_IFSC, AccountType::Fixed, None)
        .await?;

    // Fixed policy minimum is 1000.00
    let mut request = OpenAccountRequest {
        customer_email: CUSTOMER_EMAIL.to_string(),
        branch_ifsc: BRANCH_IFSC.to_string(),
        account_type: AccountType::Fixed,
        nominee_name: None,
        principal_cents: Some(50_000),
        installment_cents: None,
    };
    let err = engine.accounts.create(&request, &fx.manager).await.unwrap_err();
    assert!(matches!(err, AppError::BelowMinimum { .. }));
    assert_eq!(err.kind().status_code(), 400);

    // Omitting the principal entirely does not dodge the minimum
    request.principal_cents = None;
    let err = engine.accounts.create(&request, &fx.manager).await.unwrap_err();
    assert!(matches!(err, AppError::BelowMinimum { .. }));

    // The application stays open for a compliant retry
    assert!(engine
        .repo
        .find_open_account_application(fx.customer.user_id, BRANCH_IFSC, AccountType::Fixed)
        .await?
        .is_some());
    request.principal_cents = Some(100_000);
    engine.accounts.create(&request, &fx.manager).await?;

    Ok(())
}

#[tokio::test]
async fn test_list_scoping() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let fx = seed(&engine).await?;

    open_account(&engine, &fx.customer, CUSTOMER_EMAIL, AccountType::Savings, None).await?;
    open_account(
        &engine,
        &fx.second_customer,
        SECOND_CUSTOMER_EMAIL,
        AccountType::Savings,
        None,
    )
    .await?;

    let all = engine.accounts.list(&fx.admin, None, 1, 20).await?;
    assert_eq!(all.len(), 2);

    let own = engine.accounts.list(&fx.customer, None, 1, 20).await?;
    assert_eq!(own.len(), 1);
    assert_eq!(own[0].user_id, fx.customer.user_id);

    let branch = engine.accounts.list(&fx.manager, None, 1, 20).await?;
    assert_eq!(branch.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_view_out_of_scope_reads_as_missing() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let fx = seed(&engine).await?;

    let account =
        open_account(&engine, &fx.customer, CUSTOMER_EMAIL, AccountType::Savings, None).await?;

    let err = engine
        .accounts
        .view(account.id, &fx.second_customer)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AccountNotFound));
    assert_eq!(err.kind().status_code(), 404);

    Ok(())
}

#[tokio::test]
async fn test_update_nominee() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let fx = seed(&engine).await?;

    let account =
        open_account(&engine, &fx.customer, CUSTOMER_EMAIL, AccountType::Savings, None).await?;

    let patch = AccountPatch {
        nominee_name: Some("Lakshmi".to_string()),
        status: None,
    };
    let updated = engine.accounts.update(account.id, &patch, &fx.manager).await?;
    assert_eq!(updated.nominee_name.as_deref(), Some("Lakshmi"));
    assert_eq!(updated.status, AccountStatus::Active);

    Ok(())
}

#[tokio::test]
async fn test_remove_is_soft_delete() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let fx = seed(&engine).await?;

    let account =
        open_account(&engine, &fx.customer, CUSTOMER_EMAIL, AccountType::Savings, None).await?;

    engine.accounts.remove(account.id, &fx.admin).await?;

    // The tombstoned account disappears from every read path
    assert!(engine.repo.get_account(account.id).await?.is_none());
    let listed = engine.accounts.list(&fx.admin, None, 1, 20).await?;
    assert!(listed.is_empty());

    Ok(())
}
