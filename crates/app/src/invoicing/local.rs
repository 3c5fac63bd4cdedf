//! Locally numbered invoices.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::domain::{history::HistoryService, invoices::InvoicesService};

use super::{InvoiceData, InvoiceError, InvoiceProvider};

pub struct LocalInvoiceProvider {
    history: Arc<dyn HistoryService>,
    invoices: Arc<dyn InvoicesService>,
    prefix: String,
}

impl LocalInvoiceProvider {
    pub fn new(
        history: Arc<dyn HistoryService>,
        invoices: Arc<dyn InvoicesService>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            history,
            invoices,
            prefix: prefix.into(),
        }
    }
}

#[async_trait]
impl InvoiceProvider for LocalInvoiceProvider {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn create_invoice(&self, identifier: u64) -> Result<bool, InvoiceError> {
        let records = self.history.list_for_identifier(identifier).await?;

        if InvoiceData::from_records(identifier, &records).is_none() {
            return Ok(false);
        }

        let invoice = self
            .invoices
            .issue_invoice_number(identifier, &self.prefix, self.name())
            .await?;

        info!(identifier, invoice_id = %invoice.invoice_id, "invoice issued");

        Ok(true)
    }
}

impl std::fmt::Debug for LocalInvoiceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalInvoiceProvider")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use shopcart::settings::CartSettings;
    use testresult::TestResult;

    use crate::{catalog::InMemoryCatalog, test::helpers::TestShop};

    use super::*;

    #[tokio::test]
    async fn paid_checkouts_get_one_number_each() -> TestResult {
        let shop = TestShop::new(CartSettings::default(), InMemoryCatalog::new())?;
        let provider = LocalInvoiceProvider::new(shop.store.clone(), shop.store.clone(), "R-");

        shop.paid_purchase(7, 1, dec!(30)).await?;
        let first = HistoryService::list_for_user(&*shop.store, 7)
            .await?
            .first()
            .map(|record| record.identifier)
            .ok_or("no purchase")?;

        assert!(provider.create_invoice(first).await?);
        assert!(provider.create_invoice(first).await?);

        let invoice = shop
            .store
            .get_for_identifier(first)
            .await?
            .ok_or("no invoice")?;
        assert_eq!(invoice.invoice_id, "R-1");
        assert_eq!(invoice.provider, "local");

        Ok(())
    }

    #[tokio::test]
    async fn unknown_checkouts_have_nothing_to_invoice() -> TestResult {
        let shop = TestShop::new(CartSettings::default(), InMemoryCatalog::new())?;
        let provider = LocalInvoiceProvider::new(shop.store.clone(), shop.store.clone(), "R-");

        assert!(!provider.create_invoice(404).await?);

        Ok(())
    }
}
