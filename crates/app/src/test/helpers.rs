//! Test Helpers

use std::sync::Arc;

use jiff::Timestamp;
use rust_decimal::Decimal;
use shopcart::{
    data::CartLine,
    items::CartItem,
    payments::{PaymentMethod, PaymentStatus},
    pricing::InstallmentPlan,
    settings::CartSettings,
};
use testresult::TestResult;

use crate::{
    catalog::{CatalogRegistry, InMemoryCatalog},
    clock::{Clock, FixedClock},
    context::ShopContext,
    domain::{
        accounting::{
            AccountingService,
            models::{ConfirmPurchase, Confirmation},
        },
        credits::{
            CreditsService,
            models::{CreditReason, CreditRecord, NewCredit},
        },
        history::{
            HistoryService,
            models::{HistoryRecord, NewHistoryRecord},
        },
    },
    events::RecordingEventObserver,
    memory::MemoryStore,
};

/// 2026-01-01T00:00:00Z
pub(crate) const START: i64 = 1_767_225_600;

/// A `mod_booking` option priced in EUR.
pub(crate) fn booking_item(item_id: u64, name: &str, price: Decimal) -> CartItem {
    CartItem::new("mod_booking", "option", item_id, name, price, "EUR")
}

/// A pending row for a `mod_booking` option.
pub(crate) fn pending_row(identifier: u64, userid: u64, item_id: u64, price: Decimal) -> NewHistoryRecord {
    NewHistoryRecord::from_line(
        &CartLine::new(booking_item(item_id, "Yoga", price)),
        identifier,
        userid,
        userid,
    )
}

/// A paid history row that was never stored.
pub(crate) fn paid_record(id: u64, userid: u64, area: &str, item_id: u64) -> HistoryRecord {
    let mut item = booking_item(item_id, "Yoga", Decimal::from(50));
    item.area = area.to_string();

    let mut record = NewHistoryRecord::from_line(&CartLine::new(item), 500, userid, userid)
        .into_record(id, Timestamp::UNIX_EPOCH);
    record.payment_status = PaymentStatus::Success;
    record
}

/// An in-memory shop on a frozen clock, recording every event.
pub(crate) struct TestShop {
    pub context: ShopContext,
    pub store: Arc<MemoryStore>,
    pub catalog: Arc<InMemoryCatalog>,
    pub clock: Arc<FixedClock>,
    pub events: Arc<RecordingEventObserver>,
}

impl TestShop {
    pub fn new(settings: CartSettings, catalog: InMemoryCatalog) -> TestResult<Self> {
        let clock = Arc::new(FixedClock::new(Timestamp::from_second(START)?));
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        let catalog = Arc::new(catalog);
        let events = Arc::new(RecordingEventObserver::new());

        let context = ShopContext::from_memory_store(
            settings,
            CatalogRegistry::new().with_provider("mod_booking", catalog.clone()),
            clock.clone(),
            store.clone(),
        )
        .with_observer(events.clone());

        Ok(Self {
            context,
            store,
            catalog,
            clock,
            events,
        })
    }

    pub async fn confirm(&self, identifier: u64) -> TestResult<Confirmation> {
        Ok(self
            .store
            .confirm_purchase(ConfirmPurchase {
                identifier,
                method: PaymentMethod::CashierCash,
                reference: None,
                account_id: None,
                rebooking_fee: Decimal::ZERO,
                confirmed_by: 1,
                confirmed_at: self.clock.now(),
            })
            .await?)
    }

    /// Store and confirm a single purchase, returning its history id.
    pub async fn paid_purchase(&self, userid: u64, item_id: u64, price: Decimal) -> TestResult<u64> {
        let identifier = self.store.next_identifier().await?;
        let record = NewHistoryRecord::from_line(
            &CartLine::new(booking_item(item_id, "Yoga", price)),
            identifier,
            userid,
            userid,
        );

        let stored = self.store.create_pending(vec![record]).await?;
        self.confirm(identifier).await?;

        Ok(stored.first().map(|record| record.id).ok_or("nothing stored")?)
    }

    pub async fn paid_installment_purchase(
        &self,
        userid: u64,
        item_id: u64,
        plan: InstallmentPlan,
    ) -> TestResult<u64> {
        let identifier = self.store.next_identifier().await?;
        let mut record = NewHistoryRecord::from_line(
            &CartLine::new(booking_item(item_id, "Yoga", plan.down_payment)),
            identifier,
            userid,
            userid,
        );
        record.installments = Some(plan);

        let stored = self.store.create_pending(vec![record]).await?;
        self.confirm(identifier).await?;

        Ok(stored.first().map(|record| record.id).ok_or("nothing stored")?)
    }

    pub async fn grant_credit(&self, userid: u64, amount: Decimal) -> TestResult<CreditRecord> {
        Ok(self
            .store
            .add(NewCredit {
                userid,
                amount,
                currency: "EUR".to_string(),
                reason: CreditReason::Manual,
                identifier: None,
                created_by: 1,
            })
            .await?)
    }
}
