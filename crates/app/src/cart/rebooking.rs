//! Rebooking checks that need storage.

use shopcart::rebooking::{RebookCandidate, RebookingDenial};
use tracing::debug;

use crate::{cart::CartStoreError, context::ShopContext, domain::history::models::HistoryRecord};

/// Decides whether a paid purchase may be rebooked onto another item.
#[derive(Debug, Clone, Copy)]
pub struct RebookingService<'a> {
    context: &'a ShopContext,
}

impl<'a> RebookingService<'a> {
    pub fn new(context: &'a ShopContext) -> Self {
        Self { context }
    }

    /// Whether `record` may be rebooked by `userid`.
    ///
    /// # Errors
    ///
    /// Returns an error when the catalog or the ledger cannot be reached.
    pub async fn allow_rebooking(
        &self,
        record: &HistoryRecord,
        userid: u64,
    ) -> Result<bool, CartStoreError> {
        Ok(self.rebooking_denial(record, userid, 0).await?.is_none())
    }

    /// The reason `record` may not be rebooked, if any.
    ///
    /// `in_cart` rebookings already waiting in the cart count towards the limit. The rolling
    /// count is read last.
    ///
    /// # Errors
    ///
    /// Returns an error when the catalog or the ledger cannot be reached.
    pub async fn rebooking_denial(
        &self,
        record: &HistoryRecord,
        userid: u64,
        in_cart: usize,
    ) -> Result<Option<RebookingDenial>, CartStoreError> {
        let policy = &self.context.settings.rebooking;
        let now = self.context.clock.now();

        let candidate = RebookCandidate {
            component: &record.component,
            area: &record.area,
            status: record.payment_status,
            service_period_end: record.service_period_end,
        };

        if let Err(denial) = policy.precheck(&candidate, now) {
            debug!(history_id = record.id, %denial, "rebooking denied");
            return Ok(Some(denial));
        }

        let provider = self.context.catalog.provider(&record.component)?;

        if !provider
            .allow_rebooking(&record.area, record.item_id, userid)
            .await?
        {
            return Ok(Some(RebookingDenial::ItemDisallowed));
        }

        if policy.max_number == 0 {
            return Ok(None);
        }

        let since = policy.window_start(now)?;
        let done = self.context.ledger.count_rebookings_since(userid, since).await?;
        let waiting = u64::try_from(in_cart).unwrap_or(u64::MAX);

        if policy.within_limit(done.saturating_add(waiting)) {
            Ok(None)
        } else {
            Ok(Some(RebookingDenial::LimitReached))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use jiff::Timestamp;
    use mockall::predicate::{always, eq};
    use rust_decimal_macros::dec;
    use shopcart::{
        items::{BOOKING_FEE_AREA, CartItem, LOCAL_COMPONENT},
        payments::PaymentStatus,
        rebooking::RebookingPolicy,
        settings::CartSettings,
    };
    use testresult::TestResult;

    use crate::{
        catalog::{CatalogRegistry, InMemoryCatalog},
        clock::FixedClock,
        domain::ledger::MockLedgerService,
        test::helpers::paid_record,
    };

    use super::*;

    fn context(max_number: u32, ledger: MockLedgerService) -> TestResult<ShopContext> {
        let mut settings = CartSettings::default();
        settings.rebooking = RebookingPolicy {
            enabled: true,
            max_number,
            period_days: 30,
            fee: dec!(0),
        };

        let catalog = InMemoryCatalog::new()
            .with_item(CartItem::new("mod_booking", "option", 1, "Yoga", dec!(50), "EUR"))
            .with_item(CartItem::new("mod_booking", "option", 2, "Pilates", dec!(50), "EUR"))
            .without_rebooking("option", 2);

        let mut context = ShopContext::in_memory(
            settings,
            CatalogRegistry::new().with_provider("mod_booking", Arc::new(catalog)),
            Arc::new(FixedClock::new(Timestamp::from_second(1_800_000_000)?)),
        );
        context.ledger = Arc::new(ledger);

        Ok(context)
    }

    fn counting(rebookings: u64) -> MockLedgerService {
        let mut ledger = MockLedgerService::new();
        ledger
            .expect_count_rebookings_since()
            .with(eq(7), always())
            .returning(move |_, _| Ok(rebookings));
        ledger
    }

    fn context_with_count(rebookings: u64) -> TestResult<ShopContext> {
        context(2, counting(rebookings))
    }

    #[tokio::test]
    async fn third_rebooking_in_the_window_is_denied() -> TestResult {
        let record = paid_record(11, 7, "option", 1);

        let context = context_with_count(1)?;
        assert!(RebookingService::new(&context).allow_rebooking(&record, 7).await?);

        let context = context_with_count(2)?;
        assert_eq!(
            RebookingService::new(&context)
                .rebooking_denial(&record, 7, 0)
                .await?,
            Some(RebookingDenial::LimitReached)
        );

        Ok(())
    }

    #[tokio::test]
    async fn rebookings_waiting_in_the_cart_count() -> TestResult {
        let record = paid_record(11, 7, "option", 1);
        let context = context_with_count(1)?;

        assert_eq!(
            RebookingService::new(&context)
                .rebooking_denial(&record, 7, 1)
                .await?,
            Some(RebookingDenial::LimitReached)
        );

        Ok(())
    }

    #[tokio::test]
    async fn cheap_checks_run_before_the_count() -> TestResult {
        let mut ledger = MockLedgerService::new();
        ledger.expect_count_rebookings_since().never();
        let context = context(2, ledger)?;
        let service = RebookingService::new(&context);

        let mut canceled = paid_record(11, 7, "option", 1);
        canceled.payment_status = PaymentStatus::Canceled;
        assert_eq!(
            service.rebooking_denial(&canceled, 7, 0).await?,
            Some(RebookingDenial::NotPaid)
        );

        let mut over = paid_record(11, 7, "option", 1);
        over.service_period_end = Some(Timestamp::from_second(1_700_000_000)?);
        assert_eq!(
            service.rebooking_denial(&over, 7, 0).await?,
            Some(RebookingDenial::ServicePeriodOver)
        );

        let mut fee = paid_record(11, 7, BOOKING_FEE_AREA, 0);
        fee.component = LOCAL_COMPONENT.to_string();
        assert_eq!(
            service.rebooking_denial(&fee, 7, 0).await?,
            Some(RebookingDenial::PseudoItem)
        );

        assert_eq!(
            service
                .rebooking_denial(&paid_record(12, 7, "option", 2), 7, 0)
                .await?,
            Some(RebookingDenial::ItemDisallowed)
        );

        Ok(())
    }

    #[tokio::test]
    async fn unlimited_policy_skips_the_count() -> TestResult {
        let mut ledger = MockLedgerService::new();
        ledger.expect_count_rebookings_since().never();
        let context = context(0, ledger)?;

        let record = paid_record(11, 7, "option", 1);
        assert!(RebookingService::new(&context).allow_rebooking(&record, 7).await?);

        Ok(())
    }
}
