use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::{
    domain::credits::{
        CreditsService, CreditsServiceError,
        models::{CreditRecord, NewCredit},
    },
    memory::MemoryStore,
};

#[async_trait]
impl CreditsService for MemoryStore {
    async fn balance(&self, userid: u64) -> Result<Decimal, CreditsServiceError> {
        Ok(self.state.lock().await.balance(userid))
    }

    async fn history(&self, userid: u64) -> Result<Vec<CreditRecord>, CreditsServiceError> {
        Ok(self
            .state
            .lock()
            .await
            .credits
            .iter()
            .rev()
            .filter(|credit| credit.userid == userid)
            .cloned()
            .collect())
    }

    async fn add(&self, credit: NewCredit) -> Result<CreditRecord, CreditsServiceError> {
        let now = self.now();

        self.state.lock().await.push_credit(credit, now)
    }
}
