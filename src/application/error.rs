use thiserror::Error;

use crate::domain::{format_cents, Cents, TxStatus};

/// Status class attached to every expected business failure, mirroring
/// the HTTP classes the calling layer maps them to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    BadRequest,
    Forbidden,
    Internal,
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::BadRequest => 400,
            ErrorKind::Forbidden => 403,
            ErrorKind::Internal => 500,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Branch not found: {0}")]
    BranchNotFound(String),

    #[error("Account not found")]
    AccountNotFound,

    #[error("Transaction not found")]
    TransactionNotFound,

    #[error("Locker not found")]
    LockerNotFound,

    #[error("No policy defined for account type: {0}")]
    PolicyNotFound(String),

    #[error("No open application found for this request")]
    ApplicationNotFound,

    #[error("An application for this request is already open")]
    ApplicationAlreadyOpen,

    #[error("User already holds an account of type {0}")]
    DuplicateAccountType(String),

    #[error("Insufficient funds: balance {}, required {}", format_cents(*balance), format_cents(*required))]
    InsufficientFunds { balance: Cents, required: Cents },

    #[error("Locker is already freezed")]
    LockerFreezed,

    #[error("Locker capacity exceeded: {existing} existing + {requested} requested > {capacity}")]
    LockerCapacityExceeded {
        existing: i64,
        requested: i64,
        capacity: i64,
    },

    #[error("User already holds an active locker assignment")]
    ActiveLockerExists,

    #[error("Funds are locked in until maturity")]
    MaturityLock,

    #[error("Destination account number is required for a transfer")]
    MissingDestination,

    #[error("Cannot transfer to the same account")]
    SelfTransfer,

    #[error("Account is not active")]
    AccountInactive,

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Opening amount is below the policy minimum of {}", format_cents(*minimum))]
    BelowMinimum { minimum: Cents },

    #[error("Transaction is {0}, only pending transactions can be marked failed")]
    InvalidStatusTransition(TxStatus),

    #[error("Locker is not currently assigned")]
    LockerNotAssigned,

    #[error("Operation not permitted outside the managed branch")]
    BranchScopeViolation,

    #[error("Role is not permitted to perform this operation")]
    RoleDenied,

    #[error("Concurrent update detected, operation aborted")]
    ConcurrentUpdate,

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::UserNotFound(_)
            | AppError::BranchNotFound(_)
            | AppError::AccountNotFound
            | AppError::TransactionNotFound
            | AppError::LockerNotFound => ErrorKind::NotFound,

            // Missing reference data is a state conflict from the caller's
            // point of view, not a lookup miss.
            AppError::PolicyNotFound(_)
            | AppError::ApplicationNotFound
            | AppError::ApplicationAlreadyOpen
            | AppError::DuplicateAccountType(_)
            | AppError::InsufficientFunds { .. }
            | AppError::LockerFreezed
            | AppError::LockerCapacityExceeded { .. }
            | AppError::ActiveLockerExists
            | AppError::ConcurrentUpdate => ErrorKind::Conflict,

            AppError::MaturityLock
            | AppError::MissingDestination
            | AppError::SelfTransfer
            | AppError::AccountInactive
            | AppError::InvalidAmount
            | AppError::BelowMinimum { .. }
            | AppError::InvalidStatusTransition(_)
            | AppError::LockerNotAssigned => ErrorKind::BadRequest,

            AppError::BranchScopeViolation | AppError::RoleDenied => ErrorKind::Forbidden,

            AppError::Storage(_) => ErrorKind::Internal,
        }
    }
}
