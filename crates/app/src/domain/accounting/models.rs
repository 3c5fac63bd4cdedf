//! Accounting Models

use jiff::Timestamp;
use rust_decimal::Decimal;
use shopcart::payments::PaymentMethod;

use crate::domain::{
    credits::models::CreditRecord, history::models::HistoryRecord, ledger::models::LedgerRecord,
};

/// Confirm every pending row of a checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmPurchase {
    pub identifier: u64,
    pub method: PaymentMethod,

    /// Gateway transaction or cashier receipt reference.
    pub reference: Option<String>,
    pub account_id: Option<String>,

    /// Fee kept back when a rebooked purchase is cancelled.
    pub rebooking_fee: Decimal,
    pub confirmed_by: u64,
    pub confirmed_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Confirmation {
    /// False when the rows had been confirmed before; nothing changed then.
    pub newly_confirmed: bool,
    pub records: Vec<HistoryRecord>,

    /// Earlier purchases cancelled because they were rebooked in this checkout.
    pub rebooked: Vec<HistoryRecord>,
}

/// Cancel one paid history row.
#[derive(Debug, Clone, PartialEq)]
pub struct CancelPurchase {
    pub history_id: u64,
    pub fee: Decimal,

    /// Credit handed back to the buyer.
    pub credit: Decimal,

    /// Book `credit` onto the credit balance.
    pub refund_to_balance: bool,
    pub canceled_by: u64,
    pub annotation: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cancellation {
    pub record: HistoryRecord,
    pub ledger: LedgerRecord,
    pub credit: Option<CreditRecord>,
}

/// Pay out the complete credit balance of a user.
#[derive(Debug, Clone, PartialEq)]
pub struct PayBack {
    pub userid: u64,
    pub method: PaymentMethod,
    pub currency: String,
    pub paid_by: u64,
    pub annotation: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaidBack {
    pub amount: Decimal,
    pub ledger: LedgerRecord,
    pub credit: CreditRecord,
}
