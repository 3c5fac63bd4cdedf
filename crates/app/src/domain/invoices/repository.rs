//! Invoices Repository

use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as};

use crate::{
    database::{from_db_id, to_db_id},
    domain::invoices::{errors::InvoicesServiceError, models::InvoiceRecord},
};

const LOCK_INVOICE_NUMBERS_SQL: &str = include_str!("sql/lock_invoice_numbers.sql");
const GET_INVOICE_FOR_IDENTIFIER_SQL: &str = include_str!("sql/get_invoice_for_identifier.sql");
const LIST_INVOICE_IDS_WITH_PREFIX_SQL: &str = include_str!("sql/list_invoice_ids_with_prefix.sql");
const CREATE_INVOICE_SQL: &str = include_str!("sql/create_invoice.sql");

#[derive(Debug, Clone, Default)]
pub(crate) struct PgInvoicesRepository;

impl PgInvoicesRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    /// Serialise number allocation for one prefix until the transaction ends.
    pub(crate) async fn lock_prefix(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        prefix: &str,
    ) -> Result<(), InvoicesServiceError> {
        query(LOCK_INVOICE_NUMBERS_SQL)
            .bind(prefix)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    pub(crate) async fn get_for_identifier(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        identifier: u64,
    ) -> Result<Option<InvoiceRecord>, InvoicesServiceError> {
        query_as::<Postgres, InvoiceRecord>(GET_INVOICE_FOR_IDENTIFIER_SQL)
            .bind(to_db_id(identifier)?)
            .fetch_optional(&mut **tx)
            .await
            .map_err(InvoicesServiceError::from)
    }

    pub(crate) async fn list_ids_with_prefix(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        prefix: &str,
    ) -> Result<Vec<String>, InvoicesServiceError> {
        let rows = query(LIST_INVOICE_IDS_WITH_PREFIX_SQL)
            .bind(prefix)
            .fetch_all(&mut **tx)
            .await?;

        rows.iter()
            .map(|row| row.try_get("invoiceid").map_err(InvoicesServiceError::from))
            .collect()
    }

    pub(crate) async fn create_invoice(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        identifier: u64,
        invoice_id: &str,
        provider: &str,
    ) -> Result<InvoiceRecord, InvoicesServiceError> {
        query_as::<Postgres, InvoiceRecord>(CREATE_INVOICE_SQL)
            .bind(to_db_id(identifier)?)
            .bind(invoice_id)
            .bind(provider)
            .fetch_one(&mut **tx)
            .await
            .map_err(InvoicesServiceError::from)
    }
}

impl<'r> FromRow<'r, PgRow> for InvoiceRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: from_db_id(row, "id")?,
            identifier: from_db_id(row, "identifier")?,
            invoice_id: row.try_get("invoiceid")?,
            provider: row.try_get("provider")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
        })
    }
}
