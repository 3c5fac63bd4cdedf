//! History Repository

use jiff_sqlx::Timestamp as SqlxTimestamp;
use shopcart::{
    payments::{PaymentMethod, PaymentStatus},
    pricing::InstallmentPlan,
};
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as, types::Json};

use crate::{
    database::{from_db_id, to_db_id},
    domain::history::{
        errors::HistoryServiceError,
        models::{HistoryRecord, NewHistoryRecord},
    },
};

const NEXT_IDENTIFIER_SQL: &str = include_str!("sql/next_identifier.sql");
const CREATE_HISTORY_SQL: &str = include_str!("sql/create_history.sql");
const GET_HISTORY_SQL: &str = include_str!("sql/get_history.sql");
const GET_HISTORY_FOR_UPDATE_SQL: &str = include_str!("sql/get_history_for_update.sql");
const LIST_HISTORY_FOR_IDENTIFIER_SQL: &str = include_str!("sql/list_history_for_identifier.sql");
const LOCK_HISTORY_FOR_IDENTIFIER_SQL: &str = include_str!("sql/lock_history_for_identifier.sql");
const LIST_HISTORY_FOR_USER_SQL: &str = include_str!("sql/list_history_for_user.sql");
const ABORT_PENDING_HISTORY_SQL: &str = include_str!("sql/abort_pending_history.sql");
const CONFIRM_PENDING_HISTORY_SQL: &str = include_str!("sql/confirm_pending_history.sql");
const CANCEL_HISTORY_SQL: &str = include_str!("sql/cancel_history.sql");
const HAS_PAID_BOOKING_FEE_SQL: &str = include_str!("sql/has_paid_booking_fee.sql");
const UPDATE_INSTALLMENTS_SQL: &str = include_str!("sql/update_installments.sql");
const ERASE_USER_HISTORY_SQL: &str = include_str!("sql/erase_user_history.sql");
const LIST_UNRECONCILED_HISTORY_SQL: &str = include_str!("sql/list_unreconciled_history.sql");

#[derive(Debug, Clone, Default)]
pub(crate) struct PgHistoryRepository;

impl PgHistoryRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn next_identifier(
        &self,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<u64, HistoryServiceError> {
        let row = query(NEXT_IDENTIFIER_SQL).fetch_one(&mut **tx).await?;

        Ok(from_db_id(&row, "identifier")?)
    }

    pub(crate) async fn create_history(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        record: NewHistoryRecord,
    ) -> Result<HistoryRecord, HistoryServiceError> {
        let related = record.related_history_id.map(to_db_id).transpose()?;

        query_as::<Postgres, HistoryRecord>(CREATE_HISTORY_SQL)
            .bind(to_db_id(record.userid)?)
            .bind(to_db_id(record.item_id)?)
            .bind(record.item_name)
            .bind(record.price)
            .bind(record.tax)
            .bind(record.tax_percentage)
            .bind(record.discount)
            .bind(record.credits)
            .bind(record.currency)
            .bind(record.component)
            .bind(record.area)
            .bind(to_db_id(record.identifier)?)
            .bind(record.payment_method.code())
            .bind(record.service_period_start.map(SqlxTimestamp::from))
            .bind(record.service_period_end.map(SqlxTimestamp::from))
            .bind(record.cancel_until.map(SqlxTimestamp::from))
            .bind(record.use_credit)
            .bind(record.cost_center)
            .bind(record.installments.map(Json))
            .bind(related)
            .bind(to_db_id(record.created_by)?)
            .fetch_one(&mut **tx)
            .await
            .map_err(HistoryServiceError::from)
    }

    pub(crate) async fn get_history(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: u64,
    ) -> Result<HistoryRecord, HistoryServiceError> {
        query_as::<Postgres, HistoryRecord>(GET_HISTORY_SQL)
            .bind(to_db_id(id)?)
            .fetch_one(&mut **tx)
            .await
            .map_err(HistoryServiceError::from)
    }

    pub(crate) async fn get_history_for_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: u64,
    ) -> Result<HistoryRecord, HistoryServiceError> {
        query_as::<Postgres, HistoryRecord>(GET_HISTORY_FOR_UPDATE_SQL)
            .bind(to_db_id(id)?)
            .fetch_one(&mut **tx)
            .await
            .map_err(HistoryServiceError::from)
    }

    pub(crate) async fn list_for_identifier(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        identifier: u64,
    ) -> Result<Vec<HistoryRecord>, HistoryServiceError> {
        query_as::<Postgres, HistoryRecord>(LIST_HISTORY_FOR_IDENTIFIER_SQL)
            .bind(to_db_id(identifier)?)
            .fetch_all(&mut **tx)
            .await
            .map_err(HistoryServiceError::from)
    }

    pub(crate) async fn lock_for_identifier(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        identifier: u64,
    ) -> Result<Vec<HistoryRecord>, HistoryServiceError> {
        query_as::<Postgres, HistoryRecord>(LOCK_HISTORY_FOR_IDENTIFIER_SQL)
            .bind(to_db_id(identifier)?)
            .fetch_all(&mut **tx)
            .await
            .map_err(HistoryServiceError::from)
    }

    pub(crate) async fn list_for_user(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        userid: u64,
    ) -> Result<Vec<HistoryRecord>, HistoryServiceError> {
        query_as::<Postgres, HistoryRecord>(LIST_HISTORY_FOR_USER_SQL)
            .bind(to_db_id(userid)?)
            .fetch_all(&mut **tx)
            .await
            .map_err(HistoryServiceError::from)
    }

    pub(crate) async fn abort_pending(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        identifier: u64,
    ) -> Result<Vec<HistoryRecord>, HistoryServiceError> {
        query_as::<Postgres, HistoryRecord>(ABORT_PENDING_HISTORY_SQL)
            .bind(to_db_id(identifier)?)
            .fetch_all(&mut **tx)
            .await
            .map_err(HistoryServiceError::from)
    }

    pub(crate) async fn confirm_pending(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        identifier: u64,
        method: PaymentMethod,
        reference: Option<&str>,
    ) -> Result<Vec<HistoryRecord>, HistoryServiceError> {
        query_as::<Postgres, HistoryRecord>(CONFIRM_PENDING_HISTORY_SQL)
            .bind(to_db_id(identifier)?)
            .bind(method.code())
            .bind(reference)
            .fetch_all(&mut **tx)
            .await
            .map_err(HistoryServiceError::from)
    }

    pub(crate) async fn cancel(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: u64,
    ) -> Result<HistoryRecord, HistoryServiceError> {
        query_as::<Postgres, HistoryRecord>(CANCEL_HISTORY_SQL)
            .bind(to_db_id(id)?)
            .fetch_one(&mut **tx)
            .await
            .map_err(HistoryServiceError::from)
    }

    pub(crate) async fn has_paid_booking_fee(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        userid: u64,
    ) -> Result<bool, HistoryServiceError> {
        let row = query(HAS_PAID_BOOKING_FEE_SQL)
            .bind(to_db_id(userid)?)
            .fetch_one(&mut **tx)
            .await?;

        Ok(row.try_get("paid")?)
    }

    pub(crate) async fn update_installments(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: u64,
        plan: &InstallmentPlan,
    ) -> Result<HistoryRecord, HistoryServiceError> {
        query_as::<Postgres, HistoryRecord>(UPDATE_INSTALLMENTS_SQL)
            .bind(to_db_id(id)?)
            .bind(Json(plan))
            .fetch_one(&mut **tx)
            .await
            .map_err(HistoryServiceError::from)
    }

    pub(crate) async fn erase_user(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        userid: u64,
    ) -> Result<u64, HistoryServiceError> {
        let result = query(ERASE_USER_HISTORY_SQL)
            .bind(to_db_id(userid)?)
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected())
    }

    pub(crate) async fn list_unreconciled(
        &self,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Vec<HistoryRecord>, HistoryServiceError> {
        query_as::<Postgres, HistoryRecord>(LIST_UNRECONCILED_HISTORY_SQL)
            .fetch_all(&mut **tx)
            .await
            .map_err(HistoryServiceError::from)
    }
}

pub(crate) fn decode_error(
    column: &str,
    error: impl std::error::Error + Send + Sync + 'static,
) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(error),
    }
}

impl<'r> FromRow<'r, PgRow> for HistoryRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let payment_method = PaymentMethod::from_code(row.try_get("payment_method")?)
            .map_err(|error| decode_error("payment_method", error))?;

        let payment_status = PaymentStatus::from_code(row.try_get("payment_status")?)
            .map_err(|error| decode_error("payment_status", error))?;

        let related_history_id = row
            .try_get::<Option<i64>, _>("related_history_id")?
            .map(u64::try_from)
            .transpose()
            .map_err(|error| decode_error("related_history_id", error))?;

        Ok(Self {
            id: from_db_id(row, "id")?,
            userid: from_db_id(row, "userid")?,
            item_id: from_db_id(row, "itemid")?,
            item_name: row.try_get("itemname")?,
            price: row.try_get("price")?,
            tax: row.try_get("tax")?,
            tax_percentage: row.try_get("taxpercentage")?,
            discount: row.try_get("discount")?,
            credits: row.try_get("credits")?,
            currency: row.try_get("currency")?,
            component: row.try_get("componentname")?,
            area: row.try_get("area")?,
            identifier: from_db_id(row, "identifier")?,
            payment_method,
            payment_status,
            payment_reference: row.try_get("payment_reference")?,
            service_period_start: row
                .try_get::<Option<SqlxTimestamp>, _>("serviceperiod_start")?
                .map(SqlxTimestamp::to_jiff),
            service_period_end: row
                .try_get::<Option<SqlxTimestamp>, _>("serviceperiod_end")?
                .map(SqlxTimestamp::to_jiff),
            cancel_until: row
                .try_get::<Option<SqlxTimestamp>, _>("canceluntil")?
                .map(SqlxTimestamp::to_jiff),
            use_credit: row.try_get("usecredit")?,
            cost_center: row.try_get("costcenter")?,
            installments: row
                .try_get::<Option<Json<InstallmentPlan>>, _>("installments")?
                .map(|plan| plan.0),
            related_history_id,
            created_by: from_db_id(row, "created_by")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
        })
    }
}
