//! Invoicing
//!
//! Paid checkouts get an invoice, either numbered locally or created in an external invoicing
//! system. Creation runs as a deferred task scheduled when a payment is confirmed, so a failing
//! invoicing system never blocks delivery.

use std::sync::Arc;

use async_trait::async_trait;
use mockall::automock;
use rust_decimal::Decimal;
use serde::Serialize;
use shopcart::{
    events::{DomainEvent, EventKind},
    items::{LOCAL_COMPONENT, REBOOK_ITEM_AREA},
    payments::PaymentStatus,
};
use thiserror::Error;
use tracing::debug;

use crate::{
    clock::Clock,
    domain::{
        history::{HistoryServiceError, models::HistoryRecord},
        invoices::InvoicesServiceError,
    },
    events::{EventObserver, ObserverError},
    tasks::{TaskPayload, TaskScheduler},
};

mod local;
mod rest;

pub use local::LocalInvoiceProvider;
pub use rest::{RestInvoiceConfig, RestInvoiceProvider};

#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("invoicing request failed")]
    Http(#[from] reqwest::Error),

    #[error("invoicing system rejected the request to {url}")]
    Rejected { url: String },

    #[error("item {0} does not exist in the invoicing system")]
    UnknownItem(String),

    #[error(transparent)]
    History(#[from] HistoryServiceError),

    #[error(transparent)]
    Invoices(#[from] InvoicesServiceError),
}

#[automock]
#[async_trait]
pub trait InvoiceProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Create the invoice of a checkout.
    ///
    /// Returns `false` when the checkout has nothing to invoice. Creating an invoice twice
    /// returns the existing one.
    async fn create_invoice(&self, identifier: u64) -> Result<bool, InvoiceError>;
}

/// One invoiced row of a checkout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceLine {
    pub item_code: String,
    pub item_name: String,

    /// Price as charged.
    pub gross: Decimal,
    pub net: Decimal,
    pub tax: Decimal,
    pub tax_percentage: Option<Decimal>,
}

/// The paid part of a checkout, ready to be sent to an invoicing system.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceData {
    pub identifier: u64,
    pub userid: u64,
    pub currency: String,

    /// Whether any line carries tax; net and gross then differ.
    pub taxes_included: bool,
    pub lines: Vec<InvoiceLine>,

    /// Credit lines, as a positive amount taken off the total.
    pub discount: Decimal,
}

impl InvoiceData {
    /// Collect the paid rows of one checkout; `None` when nothing was paid.
    pub fn from_records(identifier: u64, records: &[HistoryRecord]) -> Option<Self> {
        let paid: Vec<&HistoryRecord> = records
            .iter()
            .filter(|record| record.identifier == identifier)
            .filter(|record| record.payment_status == PaymentStatus::Success)
            .filter(|record| {
                !(record.component == LOCAL_COMPONENT && record.area == REBOOK_ITEM_AREA)
            })
            .collect();

        let first = paid.first()?;

        let lines: Vec<InvoiceLine> = paid
            .iter()
            .filter(|record| record.price > Decimal::ZERO)
            .map(|record| {
                let tax = record.tax.unwrap_or_default();

                InvoiceLine {
                    item_code: item_code(record),
                    item_name: record.item_name.clone(),
                    gross: record.price,
                    net: record.price - tax,
                    tax,
                    tax_percentage: record.tax_percentage,
                }
            })
            .collect();

        if lines.is_empty() {
            return None;
        }

        let discount = -paid
            .iter()
            .map(|record| record.price)
            .filter(|price| *price < Decimal::ZERO)
            .sum::<Decimal>();

        Some(Self {
            identifier,
            userid: first.userid,
            currency: first.currency.clone(),
            taxes_included: lines.iter().any(|line| line.tax > Decimal::ZERO),
            lines,
            discount,
        })
    }

    pub fn gross_total(&self) -> Decimal {
        self.lines.iter().map(|line| line.gross).sum::<Decimal>() - self.discount
    }
}

/// Item code shared with the invoicing system; local pseudo items use their area.
fn item_code(record: &HistoryRecord) -> String {
    if record.component == LOCAL_COMPONENT {
        record.area.clone()
    } else {
        format!("{}-{}-{}", record.component, record.area, record.item_id)
    }
}

/// Schedules invoice creation when a payment is confirmed.
pub struct InvoiceObserver {
    tasks: Arc<dyn TaskScheduler>,
    clock: Arc<dyn Clock>,
}

impl InvoiceObserver {
    pub fn new(tasks: Arc<dyn TaskScheduler>, clock: Arc<dyn Clock>) -> Self {
        Self { tasks, clock }
    }

    /// Queue the invoice task for the checkout `event` confirms.
    ///
    /// # Errors
    ///
    /// Returns an error when the task cannot be stored.
    pub async fn create_invoice_task(&self, event: &DomainEvent) -> Result<bool, ObserverError> {
        let (EventKind::PaymentConfirmed, Some(identifier)) = (event.kind, event.other.identifier)
        else {
            return Ok(false);
        };

        self.tasks
            .reschedule_or_queue(
                event.relateduserid,
                TaskPayload::CreateInvoice { identifier },
                self.clock.now(),
            )
            .await
            .map_err(|error| ObserverError {
                observer: "invoice",
                source: Box::new(error),
            })?;

        debug!(identifier, "invoice task queued");

        Ok(true)
    }
}

#[async_trait]
impl EventObserver for InvoiceObserver {
    fn name(&self) -> &'static str {
        "invoice"
    }

    async fn observe(&self, event: &DomainEvent) -> Result<(), ObserverError> {
        self.create_invoice_task(event).await.map(|_| ())
    }
}

impl std::fmt::Debug for InvoiceObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvoiceObserver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;
    use mockall::predicate::{always, eq};
    use rust_decimal_macros::dec;
    use shopcart::{
        items::{BOOKING_FEE_AREA, REBOOKING_CREDIT_AREA},
        payments::PaymentMethod,
    };
    use testresult::TestResult;

    use crate::{
        clock::FixedClock,
        tasks::{MockTaskScheduler, ScheduledTask, TaskUuid},
        test::helpers::paid_record,
    };

    use super::*;

    fn checkout() -> Vec<HistoryRecord> {
        let mut yoga = paid_record(1, 7, "option", 4);
        yoga.identifier = 500;
        yoga.price = dec!(119);
        yoga.tax = Some(dec!(19));
        yoga.tax_percentage = Some(dec!(19));

        let mut fee = paid_record(2, 7, BOOKING_FEE_AREA, 0);
        fee.component = LOCAL_COMPONENT.to_string();
        fee.identifier = 500;
        fee.price = dec!(2);

        let mut credit = paid_record(3, 7, REBOOKING_CREDIT_AREA, 0);
        credit.component = LOCAL_COMPONENT.to_string();
        credit.identifier = 500;
        credit.price = dec!(-20);

        let mut marker = paid_record(4, 7, REBOOK_ITEM_AREA, 41);
        marker.component = LOCAL_COMPONENT.to_string();
        marker.identifier = 500;
        marker.price = dec!(0);

        vec![yoga, fee, credit, marker]
    }

    #[test]
    fn collects_paid_lines_and_credit() -> TestResult {
        let data = InvoiceData::from_records(500, &checkout()).ok_or("nothing to invoice")?;

        assert_eq!(data.userid, 7);
        assert!(data.taxes_included);
        assert_eq!(data.discount, dec!(20));
        assert_eq!(data.gross_total(), dec!(101));

        let codes: Vec<&str> = data.lines.iter().map(|line| line.item_code.as_str()).collect();
        assert_eq!(codes, vec!["mod_booking-option-4", BOOKING_FEE_AREA]);

        let yoga = data.lines.first().ok_or("no lines")?;
        assert_eq!(yoga.net, dec!(100));

        Ok(())
    }

    #[test]
    fn pending_checkouts_have_nothing_to_invoice() {
        let mut records = checkout();
        for record in &mut records {
            record.payment_status = PaymentStatus::Pending;
        }

        assert_eq!(InvoiceData::from_records(500, &records), None);
    }

    #[tokio::test]
    async fn confirmed_payments_queue_an_invoice_task() -> TestResult {
        let now = Timestamp::from_second(1_800_000_000)?;

        let mut tasks = MockTaskScheduler::new();
        tasks
            .expect_reschedule_or_queue()
            .with(eq(7), eq(TaskPayload::CreateInvoice { identifier: 500 }), always())
            .times(1)
            .returning(|userid, payload, run_at| {
                Ok(ScheduledTask {
                    uuid: TaskUuid::now_v7(),
                    userid,
                    payload,
                    run_at,
                    attempts: 0,
                    last_error: None,
                })
            });

        let observer = InvoiceObserver::new(Arc::new(tasks), Arc::new(FixedClock::new(now)));

        assert!(
            observer
                .create_invoice_task(&DomainEvent::payment_confirmed(
                    2,
                    7,
                    500,
                    PaymentMethod::CashierCash
                ))
                .await?
        );
        assert!(
            !observer
                .create_invoice_task(&DomainEvent::checkout_completed(2, 7, 500))
                .await?
        );

        Ok(())
    }
}
