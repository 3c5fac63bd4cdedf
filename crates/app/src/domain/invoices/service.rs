//! Invoices service.

use async_trait::async_trait;
use mockall::automock;
use shopcart::invoices::next_invoice_number;

use crate::{
    database::Db,
    domain::invoices::{
        errors::InvoicesServiceError, models::InvoiceRecord, repository::PgInvoicesRepository,
    },
};

#[derive(Debug, Clone)]
pub struct PgInvoicesService {
    db: Db,
    repository: PgInvoicesRepository,
}

impl PgInvoicesService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            repository: PgInvoicesRepository::new(),
        }
    }
}

#[async_trait]
impl InvoicesService for PgInvoicesService {
    async fn issue_invoice_number(
        &self,
        identifier: u64,
        prefix: &str,
        provider: &str,
    ) -> Result<InvoiceRecord, InvoicesServiceError> {
        let mut tx = self.db.begin().await?;

        self.repository.lock_prefix(&mut tx, prefix).await?;

        if let Some(existing) = self.repository.get_for_identifier(&mut tx, identifier).await? {
            tx.commit().await?;

            return Ok(existing);
        }

        let issued = self.repository.list_ids_with_prefix(&mut tx, prefix).await?;
        let invoice_id = next_invoice_number(prefix, issued.iter().map(String::as_str));

        let created = self
            .repository
            .create_invoice(&mut tx, identifier, &invoice_id, provider)
            .await?;

        tx.commit().await?;

        Ok(created)
    }

    async fn record_invoice(
        &self,
        identifier: u64,
        invoice_id: &str,
        provider: &str,
    ) -> Result<InvoiceRecord, InvoicesServiceError> {
        let mut tx = self.db.begin().await?;

        let created = self
            .repository
            .create_invoice(&mut tx, identifier, invoice_id, provider)
            .await?;

        tx.commit().await?;

        Ok(created)
    }

    async fn get_for_identifier(
        &self,
        identifier: u64,
    ) -> Result<Option<InvoiceRecord>, InvoicesServiceError> {
        let mut tx = self.db.begin().await?;

        let invoice = self.repository.get_for_identifier(&mut tx, identifier).await?;

        tx.commit().await?;

        Ok(invoice)
    }
}

#[automock]
#[async_trait]
pub trait InvoicesService: Send + Sync {
    /// Issue the next number for `prefix` to a checkout, or return the one it already has.
    async fn issue_invoice_number(
        &self,
        identifier: u64,
        prefix: &str,
        provider: &str,
    ) -> Result<InvoiceRecord, InvoicesServiceError>;

    /// Store a number assigned by an external invoicing system.
    async fn record_invoice(
        &self,
        identifier: u64,
        invoice_id: &str,
        provider: &str,
    ) -> Result<InvoiceRecord, InvoicesServiceError>;

    async fn get_for_identifier(
        &self,
        identifier: u64,
    ) -> Result<Option<InvoiceRecord>, InvoicesServiceError>;
}
