//! Ledger service.

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;

use crate::{
    database::Db,
    domain::{
        history::{models::HistoryRecord, repository::PgHistoryRepository},
        ledger::{
            errors::LedgerServiceError,
            models::{LedgerRecord, Reconciliation},
            repository::PgLedgerRepository,
        },
    },
};

#[derive(Debug, Clone)]
pub struct PgLedgerService {
    db: Db,
    repository: PgLedgerRepository,
    history_repository: PgHistoryRepository,
}

impl PgLedgerService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            repository: PgLedgerRepository::new(),
            history_repository: PgHistoryRepository::new(),
        }
    }
}

#[async_trait]
impl LedgerService for PgLedgerService {
    async fn list_for_identifier(
        &self,
        identifier: u64,
    ) -> Result<Vec<LedgerRecord>, LedgerServiceError> {
        let mut tx = self.db.begin().await?;

        let entries = self.repository.list_for_identifier(&mut tx, identifier).await?;

        tx.commit().await?;

        Ok(entries)
    }

    async fn list_for_user(&self, userid: u64) -> Result<Vec<LedgerRecord>, LedgerServiceError> {
        let mut tx = self.db.begin().await?;

        let entries = self.repository.list_for_user(&mut tx, userid).await?;

        tx.commit().await?;

        Ok(entries)
    }

    async fn count_rebookings_since(
        &self,
        userid: u64,
        since: Timestamp,
    ) -> Result<u64, LedgerServiceError> {
        let mut tx = self.db.begin().await?;

        let count = self
            .repository
            .count_rebookings_since(&mut tx, userid, since)
            .await?;

        tx.commit().await?;

        Ok(count)
    }

    async fn unreconciled_history(&self) -> Result<Vec<HistoryRecord>, LedgerServiceError> {
        let mut tx = self.db.begin().await?;

        let records = self.history_repository.list_unreconciled(&mut tx).await?;

        tx.commit().await?;

        Ok(records)
    }

    async fn reconcile(&self, identifier: u64) -> Result<Reconciliation, LedgerServiceError> {
        let mut tx = self.db.begin().await?;

        let history = self
            .history_repository
            .list_for_identifier(&mut tx, identifier)
            .await?;

        let ledger = self.repository.list_for_identifier(&mut tx, identifier).await?;

        tx.commit().await?;

        Ok(Reconciliation::compute(identifier, &history, &ledger))
    }
}

#[automock]
#[async_trait]
pub trait LedgerService: Send + Sync {
    async fn list_for_identifier(
        &self,
        identifier: u64,
    ) -> Result<Vec<LedgerRecord>, LedgerServiceError>;

    /// Newest first.
    async fn list_for_user(&self, userid: u64) -> Result<Vec<LedgerRecord>, LedgerServiceError>;

    /// Rebookings the user completed since `since`.
    async fn count_rebookings_since(
        &self,
        userid: u64,
        since: Timestamp,
    ) -> Result<u64, LedgerServiceError>;

    /// Paid history rows that have no purchase row in the ledger.
    async fn unreconciled_history(&self) -> Result<Vec<HistoryRecord>, LedgerServiceError>;

    /// Compare history and ledger sums of one checkout.
    async fn reconcile(&self, identifier: u64) -> Result<Reconciliation, LedgerServiceError>;
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use shopcart::payments::PaymentMethod;
    use testresult::TestResult;

    use crate::{
        domain::{
            accounting::{AccountingService, models::ConfirmPurchase},
            history::HistoryService,
        },
        test::{TestContext, helpers::pending_row},
    };

    use super::*;

    #[tokio::test]
    async fn confirmed_checkouts_reconcile() -> TestResult {
        let ctx = TestContext::new().await;
        let identifier = ctx.history.next_identifier().await?;

        ctx.history
            .create_pending(vec![pending_row(identifier, 4, 1, dec!(30))])
            .await?;
        ctx.accounting
            .confirm_purchase(ConfirmPurchase {
                identifier,
                method: PaymentMethod::Online,
                reference: Some("tx-1".to_string()),
                account_id: Some("acct-1".to_string()),
                rebooking_fee: Decimal::ZERO,
                confirmed_by: 4,
                confirmed_at: Timestamp::UNIX_EPOCH,
            })
            .await?;

        let reconciliation = ctx.ledger.reconcile(identifier).await?;

        assert!(reconciliation.is_balanced());
        assert_eq!(reconciliation.ledger_total, dec!(30));
        assert!(ctx.ledger.unreconciled_history().await?.is_empty());
        assert_eq!(ctx.ledger.list_for_user(4).await?.len(), 1);

        Ok(())
    }
}
