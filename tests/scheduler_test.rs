mod common;

use anyhow::Result;
use chrono::{Duration, Utc};
use common::{
    deposit, open_account, seed, test_engine, CUSTOMER_EMAIL, SECOND_CUSTOMER_EMAIL,
};
use corebank::domain::{AccountStatus, AccountType};

#[tokio::test]
async fn test_yearly_accrual_credits_interest() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let fx = seed(&engine).await?;

    // 1000.00 at the fixed policy's 5.00% rate
    let account = open_account(
        &engine,
        &fx.customer,
        CUSTOMER_EMAIL,
        AccountType::Fixed,
        Some("1000.00"),
    )
    .await?;

    let accrued = engine.scheduler.run_yearly_accrual(Utc::now()).await?;
    assert_eq!(accrued, 1);

    let account = engine.accounts.view(account.id, &fx.customer).await?;
    assert_eq!(account.balance_cents, 105_000); // 1050.00

    Ok(())
}

#[tokio::test]
async fn test_accrual_skips_matured_accounts() -> Result<()> {
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

    // Run as if two years have passed: the 12-month lock-in has matured
    let later = Utc::now() + Duration::days(730);
    let accrued = engine.scheduler.run_yearly_accrual(later).await?;
    assert_eq!(accrued, 0);

    let account = engine.accounts.view(account.id, &fx.customer).await?;
    assert_eq!(account.balance_cents, 100_000);

    Ok(())
}

#[tokio::test]
async fn test_accrual_skips_non_term_accounts() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let fx = seed(&engine).await?;

    let savings =
        open_account(&engine, &fx.customer, CUSTOMER_EMAIL, AccountType::Savings, None).await?;
    deposit(&engine, &fx.customer, &savings, "500.00").await?;

    let accrued = engine.scheduler.run_yearly_accrual(Utc::now()).await?;
    assert_eq!(accrued, 0);

    let savings = engine.accounts.view(savings.id, &fx.customer).await?;
    assert_eq!(savings.balance_cents, 50_000);

    Ok(())
}

#[tokio::test]
async fn test_accrual_covers_the_whole_batch() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let fx = seed(&engine).await?;

    open_account(
        &engine,
        &fx.customer,
        CUSTOMER_EMAIL,
        AccountType::Fixed,
        Some("1000.00"),
    )
    .await?;
    open_account(
        &engine,
        &fx.second_customer,
        SECOND_CUSTOMER_EMAIL,
        AccountType::Fixed,
        Some("2000.00"),
    )
    .await?;

    let accrued = engine.scheduler.run_yearly_accrual(Utc::now()).await?;
    assert_eq!(accrued, 2);

    let accounts = engine.accounts.list(&fx.admin, None, 1, 20).await?;
    let mut balances: Vec<i64> = accounts.iter().map(|a| a.balance_cents).collect();
    balances.sort();
    assert_eq!(balances, vec![105_000, 210_000]);

    Ok(())
}

#[tokio::test]
async fn test_dormancy_sweep_deactivates_old_empty_accounts() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let fx = seed(&engine).await?;

    let empty =
        open_account(&engine, &fx.customer, CUSTOMER_EMAIL, AccountType::Savings, None).await?;
    let funded = open_account(
        &engine,
        &fx.second_customer,
        SECOND_CUSTOMER_EMAIL,
        AccountType::Savings,
        None,
    )
    .await?;
    deposit(&engine, &fx.second_customer, &funded, "1.00").await?;

    // Run as if eleven days have passed since both were opened
    let later = Utc::now() + Duration::days(11);
    let swept = engine.scheduler.run_dormancy_sweep(later).await?;
    assert_eq!(swept, 1);

    let empty = engine.accounts.view(empty.id, &fx.customer).await?;
    assert_eq!(empty.status, AccountStatus::Inactive);
    let funded = engine.accounts.view(funded.id, &fx.second_customer).await?;
    assert_eq!(funded.status, AccountStatus::Active);

    Ok(())
}

#[tokio::test]
async fn test_sweep_guard_spares_freshly_funded_accounts() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let fx = seed(&engine).await?;

    let funded =
        open_account(&engine, &fx.customer, CUSTOMER_EMAIL, AccountType::Savings, None).await?;
    let empty = open_account(
        &engine,
        &fx.second_customer,
        SECOND_CUSTOMER_EMAIL,
        AccountType::Savings,
        None,
    )
    .await?;

    // A deposit lands after the account would have been read as a dormancy
    // candidate; the guarded write must then refuse to deactivate it
    deposit(&engine, &fx.customer, &funded, "5.00").await?;
    assert!(!engine.repo.deactivate_dormant_guarded(funded.id).await?);

    let funded = engine.accounts.view(funded.id, &fx.customer).await?;
    assert_eq!(funded.status, AccountStatus::Active);

    // A still-empty account qualifies
    assert!(engine.repo.deactivate_dormant_guarded(empty.id).await?);
    let empty = engine.accounts.view(empty.id, &fx.second_customer).await?;
    assert_eq!(empty.status, AccountStatus::Inactive);

    Ok(())
}

#[tokio::test]
async fn test_dormancy_sweep_spares_recent_accounts() -> Result<()> {
    let (engine, _temp) = test_engine().await?;
    let fx = seed(&engine).await?;

    let account =
        open_account(&engine, &fx.customer, CUSTOMER_EMAIL, AccountType::Savings, None).await?;

    let swept = engine.scheduler.run_dormancy_sweep(Utc::now()).await?;
    assert_eq!(swept, 0);

    let account = engine.accounts.view(account.id, &fx.customer).await?;
    assert_eq!(account.status, AccountStatus::Active);

    Ok(())
}
