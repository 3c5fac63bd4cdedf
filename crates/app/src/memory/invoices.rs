use async_trait::async_trait;
use shopcart::invoices::next_invoice_number;

use crate::{
    domain::invoices::{InvoicesService, InvoicesServiceError, models::InvoiceRecord},
    memory::{MemoryState, MemoryStore},
};

#[async_trait]
impl InvoicesService for MemoryStore {
    async fn issue_invoice_number(
        &self,
        identifier: u64,
        prefix: &str,
        provider: &str,
    ) -> Result<InvoiceRecord, InvoicesServiceError> {
        let now = self.now();
        let mut state = self.state.lock().await;

        if let Some(existing) = state
            .invoices
            .iter()
            .find(|invoice| invoice.identifier == identifier)
        {
            return Ok(existing.clone());
        }

        let invoice_id = next_invoice_number(
            prefix,
            state.invoices.iter().map(|invoice| invoice.invoice_id.as_str()),
        );

        let invoice = InvoiceRecord {
            id: MemoryState::next_id(&state.invoices, |invoice| invoice.id),
            identifier,
            invoice_id,
            provider: provider.to_string(),
            created_at: now,
        };

        state.invoices.push(invoice.clone());

        Ok(invoice)
    }

    async fn record_invoice(
        &self,
        identifier: u64,
        invoice_id: &str,
        provider: &str,
    ) -> Result<InvoiceRecord, InvoicesServiceError> {
        let now = self.now();
        let mut state = self.state.lock().await;

        let taken = state.invoices.iter().any(|invoice| {
            invoice.identifier == identifier || invoice.invoice_id == invoice_id
        });

        if taken {
            return Err(InvoicesServiceError::AlreadyExists);
        }

        let invoice = InvoiceRecord {
            id: MemoryState::next_id(&state.invoices, |invoice| invoice.id),
            identifier,
            invoice_id: invoice_id.to_string(),
            provider: provider.to_string(),
            created_at: now,
        };

        state.invoices.push(invoice.clone());

        Ok(invoice)
    }

    async fn get_for_identifier(
        &self,
        identifier: u64,
    ) -> Result<Option<InvoiceRecord>, InvoicesServiceError> {
        Ok(self
            .state
            .lock()
            .await
            .invoices
            .iter()
            .find(|invoice| invoice.identifier == identifier)
            .cloned())
    }
}
