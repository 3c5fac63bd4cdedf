//! Credits service.

use async_trait::async_trait;
use mockall::automock;
use rust_decimal::Decimal;

use crate::{
    database::Db,
    domain::credits::{
        errors::CreditsServiceError,
        models::{CreditRecord, NewCredit},
        repository::PgCreditsRepository,
    },
};

#[derive(Debug, Clone)]
pub struct PgCreditsService {
    db: Db,
    repository: PgCreditsRepository,
}

impl PgCreditsService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            repository: PgCreditsRepository::new(),
        }
    }
}

#[async_trait]
impl CreditsService for PgCreditsService {
    async fn balance(&self, userid: u64) -> Result<Decimal, CreditsServiceError> {
        let mut tx = self.db.begin().await?;

        let balance = self.repository.get_balance(&mut tx, userid).await?;

        tx.commit().await?;

        Ok(balance)
    }

    async fn history(&self, userid: u64) -> Result<Vec<CreditRecord>, CreditsServiceError> {
        let mut tx = self.db.begin().await?;

        let credits = self.repository.list_for_user(&mut tx, userid).await?;

        tx.commit().await?;

        Ok(credits)
    }

    async fn add(&self, credit: NewCredit) -> Result<CreditRecord, CreditsServiceError> {
        let mut tx = self.db.begin().await?;

        self.repository.lock_user(&mut tx, credit.userid).await?;

        let created = self.repository.insert_credit(&mut tx, credit).await?;

        tx.commit().await?;

        Ok(created)
    }
}

#[automock]
#[async_trait]
pub trait CreditsService: Send + Sync {
    /// Current balance, zero for users without credit rows.
    async fn balance(&self, userid: u64) -> Result<Decimal, CreditsServiceError>;

    /// Newest first.
    async fn history(&self, userid: u64) -> Result<Vec<CreditRecord>, CreditsServiceError>;

    /// Book a signed amount onto the balance.
    async fn add(&self, credit: NewCredit) -> Result<CreditRecord, CreditsServiceError>;
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use testresult::TestResult;

    use crate::{
        domain::credits::models::{CreditReason, NewCredit},
        test::TestContext,
    };

    use super::*;

    fn credit(amount: Decimal) -> NewCredit {
        NewCredit {
            userid: 7,
            amount,
            currency: "EUR".to_string(),
            reason: CreditReason::Manual,
            identifier: None,
            created_by: 1,
        }
    }

    #[tokio::test]
    async fn rows_carry_the_running_balance() -> TestResult {
        let ctx = TestContext::new().await;

        ctx.credits.add(credit(dec!(20))).await?;
        let last = ctx.credits.add(credit(dec!(-5))).await?;

        assert_eq!(last.balance, dec!(15));
        assert_eq!(ctx.credits.balance(7).await?, dec!(15));
        assert_eq!(ctx.credits.history(7).await?.len(), 2);
        assert_eq!(ctx.credits.balance(8).await?, Decimal::ZERO);

        Ok(())
    }
}
