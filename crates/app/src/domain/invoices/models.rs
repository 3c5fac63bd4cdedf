//! Invoice Models

use jiff::Timestamp;

/// Invoice Model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceRecord {
    pub id: u64,
    pub identifier: u64,
    pub invoice_id: String,

    /// Name of the invoice provider that issued the number.
    pub provider: String,
    pub created_at: Timestamp,
}
