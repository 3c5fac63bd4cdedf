use async_trait::async_trait;
use jiff::Timestamp;
use shopcart::{
    items::{LOCAL_COMPONENT, REBOOK_ITEM_AREA},
    payments::{LedgerEntryKind, PaymentStatus},
};

use crate::{
    domain::{
        history::models::HistoryRecord,
        ledger::{
            LedgerService, LedgerServiceError,
            models::{LedgerRecord, Reconciliation},
        },
    },
    memory::MemoryStore,
};

#[async_trait]
impl LedgerService for MemoryStore {
    async fn list_for_identifier(
        &self,
        identifier: u64,
    ) -> Result<Vec<LedgerRecord>, LedgerServiceError> {
        Ok(self
            .state
            .lock()
            .await
            .ledger
            .iter()
            .filter(|entry| entry.identifier == identifier)
            .cloned()
            .collect())
    }

    async fn list_for_user(&self, userid: u64) -> Result<Vec<LedgerRecord>, LedgerServiceError> {
        Ok(self
            .state
            .lock()
            .await
            .ledger
            .iter()
            .rev()
            .filter(|entry| entry.userid == userid)
            .cloned()
            .collect())
    }

    async fn count_rebookings_since(
        &self,
        userid: u64,
        since: Timestamp,
    ) -> Result<u64, LedgerServiceError> {
        let count = self
            .state
            .lock()
            .await
            .ledger
            .iter()
            .filter(|entry| {
                entry.userid == userid
                    && entry.kind == LedgerEntryKind::Purchase
                    && entry.component == LOCAL_COMPONENT
                    && entry.area == REBOOK_ITEM_AREA
                    && entry.created_at >= since
            })
            .count();

        Ok(u64::try_from(count)?)
    }

    async fn unreconciled_history(&self) -> Result<Vec<HistoryRecord>, LedgerServiceError> {
        let state = self.state.lock().await;

        Ok(state
            .history
            .iter()
            .filter(|record| {
                matches!(
                    record.payment_status,
                    PaymentStatus::Success | PaymentStatus::Canceled
                )
            })
            .filter(|record| {
                !state.ledger.iter().any(|entry| {
                    entry.kind == LedgerEntryKind::Purchase
                        && entry.identifier == record.identifier
                        && entry.item_id == record.item_id
                        && entry.component == record.component
                        && entry.area == record.area
                })
            })
            .cloned()
            .collect())
    }

    async fn reconcile(&self, identifier: u64) -> Result<Reconciliation, LedgerServiceError> {
        let state = self.state.lock().await;

        let history: Vec<HistoryRecord> = state
            .history
            .iter()
            .filter(|record| record.identifier == identifier)
            .cloned()
            .collect();

        let ledger: Vec<LedgerRecord> = state
            .ledger
            .iter()
            .filter(|entry| entry.identifier == identifier)
            .cloned()
            .collect();

        Ok(Reconciliation::compute(identifier, &history, &ledger))
    }
}
