use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::application::{AccountPatch, Engine, OpenAccountRequest, TransactionRequest};
use crate::domain::{
    format_cents, format_rate, parse_cents, AccountPolicy, AccountStatus, AccountType, Actor,
    Branch, Role, TxKind, User,
};
use crate::notify::LogDispatcher;

/// Corebank - retail-banking ledger & lifecycle engine
#[derive(Parser)]
#[command(name = "corebank")]
#[command(about = "A retail-banking ledger and account lifecycle engine")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "corebank.db")]
    pub database: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Register a user
    AddUser {
        name: String,
        email: String,
        /// Role codes: admin, branch_manager, customer
        #[arg(long, value_delimiter = ',', default_value = "customer")]
        roles: Vec<String>,
    },

    /// Register a branch
    AddBranch {
        bank_name: String,
        name: String,
        ifsc_code: String,
        /// Email of the managing BranchManager
        #[arg(long)]
        manager: String,
        #[arg(long, default_value_t = 0)]
        total_lockers: i64,
    },

    /// Register an account policy
    AddPolicy {
        /// savings, current, fixed or recurring
        account_type: String,
        /// Interest rate percentage, e.g. "5.00"
        #[arg(long)]
        rate: String,
        /// Minimum amount, e.g. "1000.00"
        #[arg(long, default_value = "0")]
        minimum: String,
        #[arg(long, default_value_t = 0)]
        lock_in_months: i64,
        #[arg(long, default_value = "0")]
        penalty: String,
    },

    /// File an account application as a customer
    ApplyAccount {
        #[arg(long = "as")]
        as_user: String,
        ifsc_code: String,
        account_type: String,
        #[arg(long)]
        nominee: Option<String>,
    },

    /// File a locker application as a customer
    ApplyLocker {
        #[arg(long = "as")]
        as_user: String,
        ifsc_code: String,
    },

    /// Open an account from a pending application (staff)
    OpenAccount {
        #[arg(long = "as")]
        as_user: String,
        customer: String,
        ifsc_code: String,
        account_type: String,
        #[arg(long)]
        nominee: Option<String>,
        /// Opening principal for fixed deposits, e.g. "10000.00"
        #[arg(long)]
        principal: Option<String>,
        /// Monthly installment for recurring deposits
        #[arg(long)]
        installment: Option<String>,
    },

    /// List accounts visible to the acting user
    Accounts {
        #[arg(long = "as")]
        as_user: String,
        #[arg(long)]
        branch: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Update an account's nominee or status (staff)
    UpdateAccount {
        #[arg(long = "as")]
        as_user: String,
        account_id: String,
        #[arg(long)]
        nominee: Option<String>,
        /// active or inactive
        #[arg(long)]
        status: Option<String>,
    },

    /// Soft-delete an account (staff)
    RemoveAccount {
        #[arg(long = "as")]
        as_user: String,
        account_id: String,
    },

    /// Deposit into an account
    Deposit {
        #[arg(long = "as")]
        as_user: String,
        account_id: String,
        amount: String,
    },

    /// Withdraw from an account
    Withdraw {
        #[arg(long = "as")]
        as_user: String,
        account_id: String,
        amount: String,
        #[arg(long, default_value = "0")]
        fee: String,
    },

    /// Transfer between accounts
    Transfer {
        #[arg(long = "as")]
        as_user: String,
        account_id: String,
        amount: String,
        /// Destination account number
        #[arg(long)]
        to: String,
        #[arg(long, default_value = "0")]
        fee: String,
    },

    /// List ledger entries visible to the acting user
    Transactions {
        #[arg(long = "as")]
        as_user: String,
        #[arg(long)]
        account_id: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Mark a pending ledger entry failed (staff)
    FailTransaction {
        #[arg(long = "as")]
        as_user: String,
        transaction_id: String,
    },

    /// Bulk-provision lockers for a branch (staff)
    ProvisionLockers {
        #[arg(long = "as")]
        as_user: String,
        count: i64,
        /// Monthly charge, e.g. "25.00"
        #[arg(long)]
        charge: String,
        #[arg(long)]
        branch: Option<String>,
    },

    /// Assign a locker to a customer with a pending application (manager)
    AssignLocker {
        #[arg(long = "as")]
        as_user: String,
        customer: String,
        serial_no: i64,
    },

    /// List lockers visible to the acting user
    Lockers {
        #[arg(long = "as")]
        as_user: String,
        #[arg(long)]
        branch: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Release a locker back to the available pool (staff)
    DeallocateLocker {
        #[arg(long = "as")]
        as_user: String,
        locker_id: String,
    },

    /// Run the yearly interest accrual batch
    Accrue,

    /// Run the daily dormancy sweep
    Sweep,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let notifier = Arc::new(LogDispatcher);

        if matches!(self.command, Commands::Init) {
            Engine::init(&self.database, notifier).await?;
            println!("Initialized database at {}", self.database);
            return Ok(());
        }

        let engine = Engine::connect(&self.database, notifier).await?;

        match self.command {
            Commands::Init => unreachable!(),

            Commands::AddUser { name, email, roles } => {
                let roles = roles
                    .iter()
                    .map(|r| Role::from_str(r).with_context(|| format!("Unknown role: {r}")))
                    .collect::<Result<Vec<_>>>()?;
                let user = User::new(name, email, roles);
                engine.repo.save_user(&user).await?;
                println!("Created user {} <{}>", user.name, user.email);
            }

            Commands::AddBranch {
                bank_name,
                name,
                ifsc_code,
                manager,
                total_lockers,
            } => {
                let manager = engine
                    .repo
                    .get_user_by_email(&manager)
                    .await?
                    .with_context(|| format!("Manager not found: {manager}"))?;
                let branch = Branch::new(bank_name, name, ifsc_code, manager.id, total_lockers);
                engine.repo.save_branch(&branch).await?;
                println!("Created branch {} ({})", branch.name, branch.ifsc_code);
            }

            Commands::AddPolicy {
                account_type,
                rate,
                minimum,
                lock_in_months,
                penalty,
            } => {
                let account_type = parse_account_type(&account_type)?;
                let policy = AccountPolicy::new(
                    account_type,
                    parse_cents(&rate)?,
                    parse_cents(&minimum)?,
                    lock_in_months,
                    parse_cents(&penalty)?,
                );
                engine.repo.save_policy(&policy).await?;
                println!(
                    "Created {} policy at {}%",
                    policy.account_type,
                    format_rate(policy.interest_rate_bps)
                );
            }

            Commands::ApplyAccount {
                as_user,
                ifsc_code,
                account_type,
                nominee,
            } => {
                let actor = resolve_actor(&engine, &as_user).await?;
                let account_type = parse_account_type(&account_type)?;
                let application = engine
                    .accounts
                    .apply(&actor, &ifsc_code, account_type, nominee)
                    .await?;
                println!("Filed application {}", application.id);
            }

            Commands::ApplyLocker { as_user, ifsc_code } => {
                let actor = resolve_actor(&engine, &as_user).await?;
                let application = engine.lockers.apply(&actor, &ifsc_code).await?;
                println!("Filed application {}", application.id);
            }

            Commands::OpenAccount {
                as_user,
                customer,
                ifsc_code,
                account_type,
                nominee,
                principal,
                installment,
            } => {
                let actor = resolve_actor(&engine, &as_user).await?;
                let request = OpenAccountRequest {
                    customer_email: customer,
                    branch_ifsc: ifsc_code,
                    account_type: parse_account_type(&account_type)?,
                    nominee_name: nominee,
                    principal_cents: principal.as_deref().map(parse_cents).transpose()?,
                    installment_cents: installment.as_deref().map(parse_cents).transpose()?,
                };
                let account = engine.accounts.create(&request, &actor).await?;
                println!(
                    "Opened {} account {} (balance {})",
                    account.account_type,
                    account.number,
                    format_cents(account.balance_cents)
                );
            }

            Commands::Accounts {
                as_user,
                branch,
                page,
                limit,
            } => {
                let actor = resolve_actor(&engine, &as_user).await?;
                let accounts = engine
                    .accounts
                    .list(&actor, branch.as_deref(), page, limit)
                    .await?;
                for account in accounts {
                    println!(
                        "{}  {:9}  {:8}  {}  {}",
                        account.id,
                        account.account_type.as_str(),
                        account.status.as_str(),
                        account.number,
                        format_cents(account.balance_cents)
                    );
                }
            }

            Commands::UpdateAccount {
                as_user,
                account_id,
                nominee,
                status,
            } => {
                let actor = resolve_actor(&engine, &as_user).await?;
                let status = status
                    .as_deref()
                    .map(|s| {
                        AccountStatus::from_str(s)
                            .with_context(|| format!("Unknown status: {s}"))
                    })
                    .transpose()?;
                let patch = AccountPatch {
                    nominee_name: nominee,
                    status,
                };
                let account = engine
                    .accounts
                    .update(parse_id(&account_id)?, &patch, &actor)
                    .await?;
                println!("Updated account {}", account.number);
            }

            Commands::RemoveAccount { as_user, account_id } => {
                let actor = resolve_actor(&engine, &as_user).await?;
                engine
                    .accounts
                    .remove(parse_id(&account_id)?, &actor)
                    .await?;
                println!("Removed account");
            }

            Commands::Deposit {
                as_user,
                account_id,
                amount,
            } => {
                let actor = resolve_actor(&engine, &as_user).await?;
                let request = TransactionRequest {
                    kind: TxKind::Deposit,
                    amount_cents: parse_cents(&amount)?,
                    fee_cents: 0,
                    to_account_number: None,
                };
                let outcome = engine
                    .ledger
                    .create(parse_id(&account_id)?, &request, &actor)
                    .await?;
                println!(
                    "Deposited {} (balance {})",
                    format_cents(outcome.entry.amount_cents),
                    format_cents(outcome.entry.balance_after_cents)
                );
            }

            Commands::Withdraw {
                as_user,
                account_id,
                amount,
                fee,
            } => {
                let actor = resolve_actor(&engine, &as_user).await?;
                let request = TransactionRequest {
                    kind: TxKind::Withdrawal,
                    amount_cents: parse_cents(&amount)?,
                    fee_cents: parse_cents(&fee)?,
                    to_account_number: None,
                };
                let outcome = engine
                    .ledger
                    .create(parse_id(&account_id)?, &request, &actor)
                    .await?;
                println!(
                    "Withdrew {} (balance {})",
                    format_cents(outcome.entry.amount_cents),
                    format_cents(outcome.entry.balance_after_cents)
                );
            }

            Commands::Transfer {
                as_user,
                account_id,
                amount,
                to,
                fee,
            } => {
                let actor = resolve_actor(&engine, &as_user).await?;
                let request = TransactionRequest {
                    kind: TxKind::Transfer,
                    amount_cents: parse_cents(&amount)?,
                    fee_cents: parse_cents(&fee)?,
                    to_account_number: Some(to),
                };
                let outcome = engine
                    .ledger
                    .create(parse_id(&account_id)?, &request, &actor)
                    .await?;
                println!(
                    "Transferred {} (balance {})",
                    format_cents(outcome.entry.amount_cents),
                    format_cents(outcome.entry.balance_after_cents)
                );
            }

            Commands::Transactions {
                as_user,
                account_id,
                page,
                limit,
            } => {
                let actor = resolve_actor(&engine, &as_user).await?;
                let account_id = account_id.as_deref().map(parse_id).transpose()?;
                let entries = engine.ledger.list(&actor, account_id, page, limit).await?;
                for entry in entries {
                    println!(
                        "{}  {:10}  {:9}  {}  ->  {}",
                        entry.id,
                        entry.kind.as_str(),
                        entry.status.as_str(),
                        format_cents(entry.amount_cents),
                        format_cents(entry.balance_after_cents)
                    );
                }
            }

            Commands::FailTransaction {
                as_user,
                transaction_id,
            } => {
                let actor = resolve_actor(&engine, &as_user).await?;
                let entry = engine
                    .ledger
                    .mark_failed(parse_id(&transaction_id)?, &actor)
                    .await?;
                println!("Marked transaction {} failed", entry.id);
            }

            Commands::ProvisionLockers {
                as_user,
                count,
                charge,
                branch,
            } => {
                let actor = resolve_actor(&engine, &as_user).await?;
                let lockers = engine
                    .lockers
                    .provision(count, parse_cents(&charge)?, branch.as_deref(), &actor)
                    .await?;
                println!("Provisioned {} lockers", lockers.len());
            }

            Commands::AssignLocker {
                as_user,
                customer,
                serial_no,
            } => {
                let actor = resolve_actor(&engine, &as_user).await?;
                let assignment = engine.lockers.assign(&customer, serial_no, &actor).await?;
                println!("Assigned locker (assignment {})", assignment.id);
            }

            Commands::Lockers {
                as_user,
                branch,
                page,
                limit,
            } => {
                let actor = resolve_actor(&engine, &as_user).await?;
                let lockers = engine
                    .lockers
                    .list(&actor, branch.as_deref(), page, limit)
                    .await?;
                for locker in lockers {
                    println!(
                        "{}  #{:4}  {:9}  {}/month",
                        locker.id,
                        locker.serial_no,
                        locker.status.as_str(),
                        format_cents(locker.monthly_charge_cents)
                    );
                }
            }

            Commands::DeallocateLocker { as_user, locker_id } => {
                let actor = resolve_actor(&engine, &as_user).await?;
                engine
                    .lockers
                    .deallocate(parse_id(&locker_id)?, &actor)
                    .await?;
                println!("Deallocated locker");
            }

            Commands::Accrue => {
                let count = engine.scheduler.run_yearly_accrual(chrono::Utc::now()).await?;
                println!("Accrued interest on {count} accounts");
            }

            Commands::Sweep => {
                let count = engine.scheduler.run_dormancy_sweep(chrono::Utc::now()).await?;
                println!("Swept {count} dormant accounts");
            }
        }

        Ok(())
    }
}

/// Resolve a `--as` email into an acting identity using the user's
/// highest role, the same precedence the authorization table expects.
async fn resolve_actor(engine: &Engine, email: &str) -> Result<Actor> {
    let user = engine
        .repo
        .get_user_by_email(email)
        .await?
        .with_context(|| format!("User not found: {email}"))?;
    let role = user
        .highest_role()
        .with_context(|| format!("User has no roles: {email}"))?;
    Ok(Actor::new(user.id, role))
}

fn parse_account_type(s: &str) -> Result<AccountType> {
    AccountType::from_str(s).with_context(|| format!("Unknown account type: {s}"))
}

fn parse_id(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).with_context(|| format!("Invalid id: {s}"))
}
