//! Ledger Models

use jiff::Timestamp;
use rust_decimal::Decimal;
use shopcart::{
    items::LOCAL_COMPONENT,
    payments::{LedgerEntryKind, PaymentMethod, PaymentStatus},
};

use crate::domain::history::models::HistoryRecord;

/// Area of ledger rows that move a credit balance without an item.
pub const CREDITS_AREA: &str = "credits";

/// Ledger Model
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRecord {
    pub id: u64,
    pub history_id: Option<u64>,
    pub kind: LedgerEntryKind,
    pub userid: u64,
    pub item_id: u64,
    pub item_name: String,
    pub price: Decimal,
    pub tax: Option<Decimal>,
    pub tax_percentage: Option<Decimal>,
    pub discount: Decimal,
    pub credits: Decimal,
    pub fee: Decimal,
    pub currency: String,
    pub component: String,
    pub area: String,
    pub identifier: u64,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub account_id: Option<String>,
    pub annotation: Option<String>,
    pub created_by: u64,
    pub created_at: Timestamp,
}

/// New Ledger Model
#[derive(Debug, Clone, PartialEq)]
pub struct NewLedgerRecord {
    pub history_id: Option<u64>,
    pub kind: LedgerEntryKind,
    pub userid: u64,
    pub item_id: u64,
    pub item_name: String,
    pub price: Decimal,
    pub tax: Option<Decimal>,
    pub tax_percentage: Option<Decimal>,
    pub discount: Decimal,
    pub credits: Decimal,
    pub fee: Decimal,
    pub currency: String,
    pub component: String,
    pub area: String,
    pub identifier: u64,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub account_id: Option<String>,
    pub annotation: Option<String>,
    pub created_by: u64,
}

impl NewLedgerRecord {
    /// Purchase row mirroring a confirmed history row.
    pub fn purchase(record: &HistoryRecord, account_id: Option<String>, created_by: u64) -> Self {
        Self {
            history_id: Some(record.id),
            kind: LedgerEntryKind::Purchase,
            userid: record.userid,
            item_id: record.item_id,
            item_name: record.item_name.clone(),
            price: record.price,
            tax: record.tax,
            tax_percentage: record.tax_percentage,
            discount: record.discount,
            credits: record.credits,
            fee: Decimal::ZERO,
            currency: record.currency.clone(),
            component: record.component.clone(),
            area: record.area.clone(),
            identifier: record.identifier,
            payment_method: record.payment_method,
            payment_status: PaymentStatus::Success,
            account_id,
            annotation: None,
            created_by,
        }
    }

    /// Reversal of a purchase: the price is negated, the retained fee and the refunded credit
    /// are recorded next to it.
    pub fn cancellation(
        record: &HistoryRecord,
        fee: Decimal,
        credit: Decimal,
        created_by: u64,
        annotation: Option<String>,
    ) -> Self {
        Self {
            history_id: Some(record.id),
            kind: LedgerEntryKind::Cancellation,
            userid: record.userid,
            item_id: record.item_id,
            item_name: record.item_name.clone(),
            price: -record.price,
            tax: record.tax.map(|tax| -tax),
            tax_percentage: record.tax_percentage,
            discount: record.discount,
            credits: credit,
            fee,
            currency: record.currency.clone(),
            component: record.component.clone(),
            area: record.area.clone(),
            identifier: record.identifier,
            payment_method: record.payment_method,
            payment_status: PaymentStatus::Canceled,
            account_id: None,
            annotation,
            created_by,
        }
    }

    /// Manual balance movement, such as paying out credits.
    pub fn correction(
        userid: u64,
        identifier: u64,
        amount: Decimal,
        currency: &str,
        method: PaymentMethod,
        created_by: u64,
        annotation: Option<String>,
    ) -> Self {
        Self {
            history_id: None,
            kind: LedgerEntryKind::Correction,
            userid,
            item_id: 0,
            item_name: method_label(method).to_string(),
            price: amount,
            tax: None,
            tax_percentage: None,
            discount: Decimal::ZERO,
            credits: amount,
            fee: Decimal::ZERO,
            currency: currency.to_string(),
            component: LOCAL_COMPONENT.to_string(),
            area: CREDITS_AREA.to_string(),
            identifier,
            payment_method: method,
            payment_status: PaymentStatus::Success,
            account_id: None,
            annotation,
            created_by,
        }
    }
}

impl NewLedgerRecord {
    /// The row as stored under `id`.
    pub(crate) fn into_record(self, id: u64, created_at: Timestamp) -> LedgerRecord {
        LedgerRecord {
            id,
            history_id: self.history_id,
            kind: self.kind,
            userid: self.userid,
            item_id: self.item_id,
            item_name: self.item_name,
            price: self.price,
            tax: self.tax,
            tax_percentage: self.tax_percentage,
            discount: self.discount,
            credits: self.credits,
            fee: self.fee,
            currency: self.currency,
            component: self.component,
            area: self.area,
            identifier: self.identifier,
            payment_method: self.payment_method,
            payment_status: self.payment_status,
            account_id: self.account_id,
            annotation: self.annotation,
            created_by: self.created_by,
            created_at,
        }
    }

    /// Key rows are deduplicated on.
    pub(crate) fn conflict_key(&self) -> (u64, u64, &str, &str, LedgerEntryKind) {
        (
            self.identifier,
            self.item_id,
            self.component.as_str(),
            self.area.as_str(),
            self.kind,
        )
    }
}

fn method_label(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::CreditsPaidBackByCash => "Credits paid back by cash",
        PaymentMethod::CreditsPaidBackByTransfer => "Credits paid back by transfer",
        _ => "Credits correction",
    }
}

/// History and ledger totals of one identifier side by side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub identifier: u64,

    /// Sum of prices of history rows that were ever paid.
    pub history_total: Decimal,

    /// Credit spent on those rows according to history.
    pub history_credits: Decimal,

    /// Sum of prices of purchase ledger rows.
    pub ledger_total: Decimal,

    /// Credit spent according to the purchase ledger rows.
    pub ledger_credits: Decimal,

    /// Fees retained on cancellation.
    pub fees: Decimal,

    /// Credit handed back on cancellation.
    pub refunded: Decimal,

    /// Paid history rows without a purchase ledger row.
    pub missing: Vec<u64>,
}

impl Reconciliation {
    pub fn compute(identifier: u64, history: &[HistoryRecord], ledger: &[LedgerRecord]) -> Self {
        let paid: Vec<&HistoryRecord> = history
            .iter()
            .filter(|record| {
                matches!(
                    record.payment_status,
                    PaymentStatus::Success | PaymentStatus::Canceled
                )
            })
            .collect();

        let purchases = || {
            ledger
                .iter()
                .filter(|entry| entry.kind == LedgerEntryKind::Purchase)
        };

        let cancellations = || {
            ledger
                .iter()
                .filter(|entry| entry.kind == LedgerEntryKind::Cancellation)
        };

        let missing = paid
            .iter()
            .filter(|record| {
                !purchases().any(|entry| {
                    entry.item_id == record.item_id
                        && entry.component == record.component
                        && entry.area == record.area
                })
            })
            .map(|record| record.id)
            .collect();

        Self {
            identifier,
            history_total: paid.iter().map(|record| record.price).sum(),
            history_credits: paid.iter().map(|record| record.credits).sum(),
            ledger_total: purchases().map(|entry| entry.price).sum(),
            ledger_credits: purchases().map(|entry| entry.credits).sum(),
            fees: cancellations().map(|entry| entry.fee).sum(),
            refunded: cancellations().map(|entry| entry.credits).sum(),
            missing,
        }
    }

    /// Whether every paid row is in the ledger and the sums agree.
    pub fn is_balanced(&self) -> bool {
        self.missing.is_empty()
            && self.history_total == self.ledger_total
            && self.history_credits == self.ledger_credits
    }
}
