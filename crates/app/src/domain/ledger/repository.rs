//! Ledger Repository

use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use shopcart::payments::{LedgerEntryKind, PaymentMethod, PaymentStatus};
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as};

use crate::{
    database::{from_db_id, to_db_id},
    domain::{
        history::repository::decode_error,
        ledger::{
            errors::LedgerServiceError,
            models::{LedgerRecord, NewLedgerRecord},
        },
    },
};

const INSERT_LEDGER_SQL: &str = include_str!("sql/insert_ledger.sql");
const LIST_LEDGER_FOR_IDENTIFIER_SQL: &str = include_str!("sql/list_ledger_for_identifier.sql");
const LIST_LEDGER_FOR_USER_SQL: &str = include_str!("sql/list_ledger_for_user.sql");
const COUNT_REBOOKINGS_SINCE_SQL: &str = include_str!("sql/count_rebookings_since.sql");

#[derive(Debug, Clone, Default)]
pub(crate) struct PgLedgerRepository;

impl PgLedgerRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    /// Insert a row unless one with the same identifier, item and kind exists.
    ///
    /// Returns `None` when the row was already there.
    pub(crate) async fn insert_ledger(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        entry: NewLedgerRecord,
    ) -> Result<Option<LedgerRecord>, LedgerServiceError> {
        let history_id = entry.history_id.map(to_db_id).transpose()?;

        query_as::<Postgres, LedgerRecord>(INSERT_LEDGER_SQL)
            .bind(history_id)
            .bind(entry.kind.code())
            .bind(to_db_id(entry.userid)?)
            .bind(to_db_id(entry.item_id)?)
            .bind(entry.item_name)
            .bind(entry.price)
            .bind(entry.tax)
            .bind(entry.tax_percentage)
            .bind(entry.discount)
            .bind(entry.credits)
            .bind(entry.fee)
            .bind(entry.currency)
            .bind(entry.component)
            .bind(entry.area)
            .bind(to_db_id(entry.identifier)?)
            .bind(entry.payment_method.code())
            .bind(entry.payment_status.code())
            .bind(entry.account_id)
            .bind(entry.annotation)
            .bind(to_db_id(entry.created_by)?)
            .fetch_optional(&mut **tx)
            .await
            .map_err(LedgerServiceError::from)
    }

    pub(crate) async fn list_for_identifier(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        identifier: u64,
    ) -> Result<Vec<LedgerRecord>, LedgerServiceError> {
        query_as::<Postgres, LedgerRecord>(LIST_LEDGER_FOR_IDENTIFIER_SQL)
            .bind(to_db_id(identifier)?)
            .fetch_all(&mut **tx)
            .await
            .map_err(LedgerServiceError::from)
    }

    pub(crate) async fn list_for_user(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        userid: u64,
    ) -> Result<Vec<LedgerRecord>, LedgerServiceError> {
        query_as::<Postgres, LedgerRecord>(LIST_LEDGER_FOR_USER_SQL)
            .bind(to_db_id(userid)?)
            .fetch_all(&mut **tx)
            .await
            .map_err(LedgerServiceError::from)
    }

    pub(crate) async fn count_rebookings_since(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        userid: u64,
        since: Timestamp,
    ) -> Result<u64, LedgerServiceError> {
        let row = query(COUNT_REBOOKINGS_SINCE_SQL)
            .bind(to_db_id(userid)?)
            .bind(SqlxTimestamp::from(since))
            .fetch_one(&mut **tx)
            .await?;

        let count: i64 = row.try_get("rebookings")?;

        Ok(u64::try_from(count)?)
    }
}

impl<'r> FromRow<'r, PgRow> for LedgerRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let kind = LedgerEntryKind::from_code(row.try_get("entry_kind")?)
            .map_err(|error| decode_error("entry_kind", error))?;

        let payment_method = PaymentMethod::from_code(row.try_get("payment_method")?)
            .map_err(|error| decode_error("payment_method", error))?;

        let payment_status = PaymentStatus::from_code(row.try_get("payment_status")?)
            .map_err(|error| decode_error("payment_status", error))?;

        let history_id = row
            .try_get::<Option<i64>, _>("history_id")?
            .map(u64::try_from)
            .transpose()
            .map_err(|error| decode_error("history_id", error))?;

        Ok(Self {
            id: from_db_id(row, "id")?,
            history_id,
            kind,
            userid: from_db_id(row, "userid")?,
            item_id: from_db_id(row, "itemid")?,
            item_name: row.try_get("itemname")?,
            price: row.try_get("price")?,
            tax: row.try_get("tax")?,
            tax_percentage: row.try_get("taxpercentage")?,
            discount: row.try_get("discount")?,
            credits: row.try_get("credits")?,
            fee: row.try_get("fee")?,
            currency: row.try_get("currency")?,
            component: row.try_get("componentname")?,
            area: row.try_get("area")?,
            identifier: from_db_id(row, "identifier")?,
            payment_method,
            payment_status,
            account_id: row.try_get("accountid")?,
            annotation: row.try_get("annotation")?,
            created_by: from_db_id(row, "created_by")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
        })
    }
}
