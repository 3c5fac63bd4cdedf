use async_trait::async_trait;
use jiff::Timestamp;
use rustc_hash::FxHashSet;
use shopcart::{
    items::{BOOKING_FEE_AREA, LOCAL_COMPONENT},
    payments::PaymentStatus,
};

use crate::{
    domain::history::{
        HistoryService, HistoryServiceError,
        models::{HistoryRecord, NewHistoryRecord},
    },
    memory::{MemoryState, MemoryStore},
};

fn same_line(record: &HistoryRecord, new: &NewHistoryRecord) -> bool {
    record.identifier == new.identifier
        && record.item_id == new.item_id
        && record.component == new.component
        && record.area == new.area
}

#[async_trait]
impl HistoryService for MemoryStore {
    async fn next_identifier(&self) -> Result<u64, HistoryServiceError> {
        Ok(self.state.lock().await.take_identifier())
    }

    async fn create_pending(
        &self,
        records: Vec<NewHistoryRecord>,
    ) -> Result<Vec<HistoryRecord>, HistoryServiceError> {
        let now = self.now();
        let mut state = self.state.lock().await;

        let mut keys = FxHashSet::default();

        for record in &records {
            let fresh = keys.insert((
                record.identifier,
                record.item_id,
                record.component.as_str(),
                record.area.as_str(),
            ));

            if !fresh || state.history.iter().any(|existing| same_line(existing, record)) {
                return Err(HistoryServiceError::AlreadyExists);
            }
        }

        let mut created = Vec::with_capacity(records.len());

        for record in records {
            let id = MemoryState::next_id(&state.history, |record| record.id);
            let stored = record.into_record(id, now);

            state.history.push(stored.clone());
            created.push(stored);
        }

        Ok(created)
    }

    async fn get(&self, id: u64) -> Result<HistoryRecord, HistoryServiceError> {
        self.state
            .lock()
            .await
            .history
            .iter()
            .find(|record| record.id == id)
            .cloned()
            .ok_or(HistoryServiceError::NotFound)
    }

    async fn list_for_identifier(
        &self,
        identifier: u64,
    ) -> Result<Vec<HistoryRecord>, HistoryServiceError> {
        Ok(self
            .state
            .lock()
            .await
            .history
            .iter()
            .filter(|record| record.identifier == identifier)
            .cloned()
            .collect())
    }

    async fn list_for_user(&self, userid: u64) -> Result<Vec<HistoryRecord>, HistoryServiceError> {
        Ok(self
            .state
            .lock()
            .await
            .history
            .iter()
            .rev()
            .filter(|record| record.userid == userid)
            .cloned()
            .collect())
    }

    async fn abort_pending(
        &self,
        identifier: u64,
    ) -> Result<Vec<HistoryRecord>, HistoryServiceError> {
        let now = self.now();
        let mut state = self.state.lock().await;

        Ok(state
            .history
            .iter_mut()
            .filter(|record| {
                record.identifier == identifier && record.payment_status.is_pending()
            })
            .map(|record| {
                record.payment_status = PaymentStatus::Aborted;
                record.updated_at = now;
                record.clone()
            })
            .collect())
    }

    async fn has_paid_booking_fee(&self, userid: u64) -> Result<bool, HistoryServiceError> {
        Ok(self.state.lock().await.history.iter().any(|record| {
            record.userid == userid
                && record.component == LOCAL_COMPONENT
                && record.area == BOOKING_FEE_AREA
                && record.payment_status == PaymentStatus::Success
        }))
    }

    async fn mark_installment_paid(
        &self,
        id: u64,
        paid_at: Timestamp,
    ) -> Result<HistoryRecord, HistoryServiceError> {
        let mut state = self.state.lock().await;

        let record = state.history_mut(id).ok_or(HistoryServiceError::NotFound)?;
        let plan = record
            .installments
            .as_mut()
            .ok_or(HistoryServiceError::NoInstallmentPlan)?;
        let index = plan
            .next_open()
            .ok_or(HistoryServiceError::NoInstallmentPlan)?;

        plan.mark_paid(index, paid_at)?;
        record.updated_at = paid_at;

        Ok(record.clone())
    }

    async fn erase_user(&self, userid: u64) -> Result<u64, HistoryServiceError> {
        let mut state = self.state.lock().await;
        let before = state.history.len();

        state.history.retain(|record| record.userid != userid);

        Ok(u64::try_from(before - state.history.len())?)
    }
}
