use async_trait::async_trait;

use crate::domain::{format_cents, ApplicationKind, Cents, TxKind};

/// Outbound side-effect channel (email/OTP). Implementations are invoked
/// strictly after the owning storage transaction commits; the engine never
/// awaits their success and never rolls back on their failure.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send_otp(&self, email: &str) -> anyhow::Result<()>;

    async fn account_creation(
        &self,
        email: &str,
        account_type: &str,
        account_number: &str,
    ) -> anyhow::Result<()>;

    async fn transaction(
        &self,
        email: &str,
        kind: TxKind,
        amount_cents: Cents,
        balance_before_cents: Cents,
        balance_after_cents: Cents,
    ) -> anyhow::Result<()>;

    async fn failed_transaction(
        &self,
        email: &str,
        kind: TxKind,
        amount_cents: Cents,
    ) -> anyhow::Result<()>;

    async fn locker_assigned(&self, email: &str, serial_no: i64) -> anyhow::Result<()>;

    async fn application_request(
        &self,
        manager_email: &str,
        customer_name: &str,
        kind: ApplicationKind,
    ) -> anyhow::Result<()>;

    async fn application_success(&self, email: &str, kind: ApplicationKind)
        -> anyhow::Result<()>;
}

/// Default dispatcher: writes structured log lines instead of email.
/// Stands in for the real mail gateway in the CLI and in tests.
pub struct LogDispatcher;

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn send_otp(&self, email: &str) -> anyhow::Result<()> {
        tracing::info!(email, "otp dispatched");
        Ok(())
    }

    async fn account_creation(
        &self,
        email: &str,
        account_type: &str,
        account_number: &str,
    ) -> anyhow::Result<()> {
        tracing::info!(email, account_type, account_number, "account created");
        Ok(())
    }

    async fn transaction(
        &self,
        email: &str,
        kind: TxKind,
        amount_cents: Cents,
        balance_before_cents: Cents,
        balance_after_cents: Cents,
    ) -> anyhow::Result<()> {
        tracing::info!(
            email,
            kind = %kind,
            amount = %format_cents(amount_cents),
            balance_before = %format_cents(balance_before_cents),
            balance_after = %format_cents(balance_after_cents),
            "transaction completed"
        );
        Ok(())
    }

    async fn failed_transaction(
        &self,
        email: &str,
        kind: TxKind,
        amount_cents: Cents,
    ) -> anyhow::Result<()> {
        tracing::info!(
            email,
            kind = %kind,
            amount = %format_cents(amount_cents),
            "transaction failed"
        );
        Ok(())
    }

    async fn locker_assigned(&self, email: &str, serial_no: i64) -> anyhow::Result<()> {
        tracing::info!(email, serial_no, "locker assigned");
        Ok(())
    }

    async fn application_request(
        &self,
        manager_email: &str,
        customer_name: &str,
        kind: ApplicationKind,
    ) -> anyhow::Result<()> {
        tracing::info!(manager_email, customer_name, kind = %kind, "application received");
        Ok(())
    }

    async fn application_success(
        &self,
        email: &str,
        kind: ApplicationKind,
    ) -> anyhow::Result<()> {
        tracing::info!(email, kind = %kind, "application approved");
        Ok(())
    }
}
