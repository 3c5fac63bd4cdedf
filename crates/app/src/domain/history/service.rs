//! History service.

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;

use crate::{
    database::Db,
    domain::history::{
        errors::HistoryServiceError,
        models::{HistoryRecord, NewHistoryRecord},
        repository::PgHistoryRepository,
    },
};

#[derive(Debug, Clone)]
pub struct PgHistoryService {
    db: Db,
    repository: PgHistoryRepository,
}

impl PgHistoryService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            repository: PgHistoryRepository::new(),
        }
    }
}

#[async_trait]
impl HistoryService for PgHistoryService {
    async fn next_identifier(&self) -> Result<u64, HistoryServiceError> {
        let mut tx = self.db.begin().await?;

        let identifier = self.repository.next_identifier(&mut tx).await?;

        tx.commit().await?;

        Ok(identifier)
    }

    async fn create_pending(
        &self,
        records: Vec<NewHistoryRecord>,
    ) -> Result<Vec<HistoryRecord>, HistoryServiceError> {
        let mut tx = self.db.begin().await?;
        let mut created = Vec::with_capacity(records.len());

        for record in records {
            created.push(self.repository.create_history(&mut tx, record).await?);
        }

        tx.commit().await?;

        Ok(created)
    }

    async fn get(&self, id: u64) -> Result<HistoryRecord, HistoryServiceError> {
        let mut tx = self.db.begin().await?;

        let record = self.repository.get_history(&mut tx, id).await?;

        tx.commit().await?;

        Ok(record)
    }

    async fn list_for_identifier(
        &self,
        identifier: u64,
    ) -> Result<Vec<HistoryRecord>, HistoryServiceError> {
        let mut tx = self.db.begin().await?;

        let records = self.repository.list_for_identifier(&mut tx, identifier).await?;

        tx.commit().await?;

        Ok(records)
    }

    async fn list_for_user(&self, userid: u64) -> Result<Vec<HistoryRecord>, HistoryServiceError> {
        let mut tx = self.db.begin().await?;

        let records = self.repository.list_for_user(&mut tx, userid).await?;

        tx.commit().await?;

        Ok(records)
    }

    async fn abort_pending(
        &self,
        identifier: u64,
    ) -> Result<Vec<HistoryRecord>, HistoryServiceError> {
        let mut tx = self.db.begin().await?;

        let aborted = self.repository.abort_pending(&mut tx, identifier).await?;

        tx.commit().await?;

        Ok(aborted)
    }

    async fn has_paid_booking_fee(&self, userid: u64) -> Result<bool, HistoryServiceError> {
        let mut tx = self.db.begin().await?;

        let paid = self.repository.has_paid_booking_fee(&mut tx, userid).await?;

        tx.commit().await?;

        Ok(paid)
    }

    async fn mark_installment_paid(
        &self,
        id: u64,
        paid_at: Timestamp,
    ) -> Result<HistoryRecord, HistoryServiceError> {
        let mut tx = self.db.begin().await?;

        let record = self.repository.get_history_for_update(&mut tx, id).await?;
        let mut plan = record
            .installments
            .ok_or(HistoryServiceError::NoInstallmentPlan)?;

        let index = plan
            .next_open()
            .ok_or(HistoryServiceError::NoInstallmentPlan)?;

        plan.mark_paid(index, paid_at)?;

        let updated = self
            .repository
            .update_installments(&mut tx, id, &plan)
            .await?;

        tx.commit().await?;

        Ok(updated)
    }

    async fn erase_user(&self, userid: u64) -> Result<u64, HistoryServiceError> {
        let mut tx = self.db.begin().await?;

        let erased = self.repository.erase_user(&mut tx, userid).await?;

        tx.commit().await?;

        Ok(erased)
    }
}

#[automock]
#[async_trait]
pub trait HistoryService: Send + Sync {
    /// Reserve a fresh checkout identifier.
    async fn next_identifier(&self) -> Result<u64, HistoryServiceError>;

    /// Store the pending rows of one checkout atomically.
    async fn create_pending(
        &self,
        records: Vec<NewHistoryRecord>,
    ) -> Result<Vec<HistoryRecord>, HistoryServiceError>;

    async fn get(&self, id: u64) -> Result<HistoryRecord, HistoryServiceError>;

    async fn list_for_identifier(
        &self,
        identifier: u64,
    ) -> Result<Vec<HistoryRecord>, HistoryServiceError>;

    /// Newest first.
    async fn list_for_user(&self, userid: u64) -> Result<Vec<HistoryRecord>, HistoryServiceError>;

    /// Move the still pending rows of a checkout to aborted.
    async fn abort_pending(
        &self,
        identifier: u64,
    ) -> Result<Vec<HistoryRecord>, HistoryServiceError>;

    async fn has_paid_booking_fee(&self, userid: u64) -> Result<bool, HistoryServiceError>;

    /// Mark the next open installment of a purchase as paid.
    async fn mark_installment_paid(
        &self,
        id: u64,
        paid_at: Timestamp,
    ) -> Result<HistoryRecord, HistoryServiceError>;

    /// Delete every history row of a user, returning how many were removed.
    async fn erase_user(&self, userid: u64) -> Result<u64, HistoryServiceError>;
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use shopcart::payments::PaymentStatus;
    use testresult::TestResult;

    use crate::test::{TestContext, helpers::pending_row};

    use super::*;

    #[tokio::test]
    async fn identifiers_increase() -> TestResult {
        let ctx = TestContext::new().await;

        let first = ctx.history.next_identifier().await?;
        let second = ctx.history.next_identifier().await?;

        assert!(second > first);

        Ok(())
    }

    #[tokio::test]
    async fn aborting_only_touches_pending_rows() -> TestResult {
        let ctx = TestContext::new().await;
        let identifier = ctx.history.next_identifier().await?;

        let stored = ctx
            .history
            .create_pending(vec![
                pending_row(identifier, 7, 1, dec!(30)),
                pending_row(identifier, 7, 2, dec!(20)),
            ])
            .await?;
        assert_eq!(stored.len(), 2);

        let aborted = ctx.history.abort_pending(identifier).await?;
        assert_eq!(aborted.len(), 2);
        assert!(
            aborted
                .iter()
                .all(|record| record.payment_status == PaymentStatus::Aborted)
        );

        assert!(ctx.history.abort_pending(identifier).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn unknown_rows_are_not_found() {
        let ctx = TestContext::new().await;

        let result = ctx.history.get(404).await;

        assert!(
            matches!(result, Err(HistoryServiceError::NotFound)),
            "expected NotFound, got {result:?}"
        );
    }

    #[tokio::test]
    async fn erasure_is_per_user() -> TestResult {
        let ctx = TestContext::new().await;
        let identifier = ctx.history.next_identifier().await?;
        let other = ctx.history.next_identifier().await?;

        ctx.history
            .create_pending(vec![pending_row(identifier, 7, 1, dec!(30))])
            .await?;
        ctx.history
            .create_pending(vec![pending_row(other, 8, 1, dec!(30))])
            .await?;

        assert_eq!(ctx.history.erase_user(7).await?, 1);
        assert!(ctx.history.list_for_user(7).await?.is_empty());
        assert_eq!(ctx.history.list_for_user(8).await?.len(), 1);

        Ok(())
    }
}
