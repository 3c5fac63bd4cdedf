//! Credits Repository

use jiff_sqlx::Timestamp as SqlxTimestamp;
use rust_decimal::Decimal;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as};

use crate::{
    database::{from_db_id, to_db_id},
    domain::{
        credits::{
            errors::CreditsServiceError,
            models::{CreditReason, CreditRecord, NewCredit},
        },
        history::repository::decode_error,
    },
};

const LOCK_USER_CREDITS_SQL: &str = include_str!("sql/lock_user_credits.sql");
const GET_BALANCE_SQL: &str = include_str!("sql/get_balance.sql");
const INSERT_CREDIT_SQL: &str = include_str!("sql/insert_credit.sql");
const LIST_CREDITS_FOR_USER_SQL: &str = include_str!("sql/list_credits_for_user.sql");

#[derive(Debug, Clone, Default)]
pub(crate) struct PgCreditsRepository;

impl PgCreditsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    /// Serialise balance updates of one user until the transaction ends.
    pub(crate) async fn lock_user(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        userid: u64,
    ) -> Result<(), CreditsServiceError> {
        query(LOCK_USER_CREDITS_SQL)
            .bind(to_db_id(userid)?)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    pub(crate) async fn get_balance(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        userid: u64,
    ) -> Result<Decimal, CreditsServiceError> {
        let row = query(GET_BALANCE_SQL)
            .bind(to_db_id(userid)?)
            .fetch_one(&mut **tx)
            .await?;

        Ok(row.try_get("balance")?)
    }

    /// Append a row; the caller must hold the user lock.
    pub(crate) async fn insert_credit(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        credit: NewCredit,
    ) -> Result<CreditRecord, CreditsServiceError> {
        let identifier = credit.identifier.map(to_db_id).transpose()?;

        query_as::<Postgres, CreditRecord>(INSERT_CREDIT_SQL)
            .bind(to_db_id(credit.userid)?)
            .bind(credit.amount)
            .bind(credit.currency)
            .bind(credit.reason.as_str())
            .bind(identifier)
            .bind(to_db_id(credit.created_by)?)
            .fetch_one(&mut **tx)
            .await
            .map_err(CreditsServiceError::from)
    }

    pub(crate) async fn list_for_user(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        userid: u64,
    ) -> Result<Vec<CreditRecord>, CreditsServiceError> {
        query_as::<Postgres, CreditRecord>(LIST_CREDITS_FOR_USER_SQL)
            .bind(to_db_id(userid)?)
            .fetch_all(&mut **tx)
            .await
            .map_err(CreditsServiceError::from)
    }
}

impl<'r> FromRow<'r, PgRow> for CreditRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let reason = row
            .try_get::<String, _>("reason")?
            .parse::<CreditReason>()
            .map_err(|error| decode_error("reason", error))?;

        let identifier = row
            .try_get::<Option<i64>, _>("identifier")?
            .map(u64::try_from)
            .transpose()
            .map_err(|error| decode_error("identifier", error))?;

        Ok(Self {
            id: from_db_id(row, "id")?,
            userid: from_db_id(row, "userid")?,
            amount: row.try_get("amount")?,
            balance: row.try_get("balance")?,
            currency: row.try_get("currency")?,
            reason,
            identifier,
            created_by: from_db_id(row, "created_by")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
        })
    }
}
