//! End-to-end checkout flows on the in-memory backend

use std::sync::Arc;

use jiff::{SignedDuration, Timestamp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use shopcart::{
    items::{BOOKING_FEE_AREA, CartItem},
    payments::{PaymentMethod, PaymentStatus},
    settings::CartSettings,
    status::CartStatus,
};
use shopcart_app::{
    cart::CartStore,
    catalog::{CatalogRegistry, InMemoryCatalog},
    checkout::{CheckoutManager, CheckoutService, StepAction, StepInput, StepKind},
    clock::{Clock, FixedClock},
    context::ShopContext,
    domain::{
        addresses::{AddressesService, models::NewAddress},
        credits::CreditsService,
        history::HistoryService,
        invoices::InvoicesService,
        ledger::LedgerService,
    },
    events::RecordingEventObserver,
    memory::MemoryStore,
    payments::{CashierService, PAYMENT_AREA, PaymentService},
    tasks::{ShopTaskHandler, TaskRunner},
};
use testresult::TestResult;

/// 2026-01-01T00:00:00Z
const START: i64 = 1_767_225_600;

const USER: u64 = 7;
const CASHIER: u64 = 99;

fn course(item_id: u64, name: &str, price: Decimal) -> CartItem {
    CartItem::new("mod_booking", "option", item_id, name, price, "EUR")
}

struct Shop {
    context: ShopContext,
    store: Arc<MemoryStore>,
    catalog: Arc<InMemoryCatalog>,
    clock: Arc<FixedClock>,
    events: Arc<RecordingEventObserver>,
}

fn shop(settings: CartSettings, first_identifier: u64) -> TestResult<Shop> {
    let clock = Arc::new(FixedClock::new(Timestamp::from_second(START)?));
    let store =
        Arc::new(MemoryStore::with_clock(clock.clone()).with_next_identifier(first_identifier));
    let catalog = Arc::new(
        InMemoryCatalog::new()
            .with_item(course(1, "Yoga", dec!(10)))
            .with_item(course(2, "Open day", dec!(0)))
            .with_item(course(3, "Pilates", dec!(25))),
    );
    let events = Arc::new(RecordingEventObserver::new());

    let context = ShopContext::from_memory_store(
        settings,
        CatalogRegistry::new().with_provider("mod_booking", catalog.clone()),
        clock.clone(),
        store.clone(),
    )
    .with_observer(events.clone());

    Ok(Shop {
        context,
        store,
        catalog,
        clock,
        events,
    })
}

fn with_booking_fee() -> CartSettings {
    CartSettings {
        booking_fee: dec!(2),
        ..CartSettings::default()
    }
}

async fn count(events: &RecordingEventObserver, name: &str) -> usize {
    events
        .names()
        .await
        .into_iter()
        .filter(|event| *event == name)
        .count()
}

#[tokio::test]
async fn booking_fee_follows_the_paid_items() -> TestResult {
    let shop = shop(with_booking_fee(), 1)?;
    let cart = CartStore::new(&shop.context, USER);

    assert_eq!(
        cart.add_item("mod_booking", "option", 1).await?.status,
        CartStatus::Success
    );

    let data = cart.get_data().await?;
    let areas: Vec<&str> = data.items.iter().map(|line| line.item.area.as_str()).collect();
    assert_eq!(areas, vec![BOOKING_FEE_AREA, "option"]);
    assert_eq!(data.price, dec!(12));

    // The cart already holds a paid item, so the fee stays.
    cart.add_item("mod_booking", "option", 2).await?;
    let data = cart.get_data().await?;
    assert_eq!(data.items.len(), 3);
    assert_eq!(data.price, dec!(12));

    cart.delete_item("mod_booking", "option", 2, true).await?;
    cart.delete_item("mod_booking", "option", 1, true).await?;

    let data = cart.get_data().await?;
    assert!(data.items.is_empty());
    assert_eq!(data.price, Decimal::ZERO);
    assert!(!shop.catalog.is_held("option", 1, USER).await);

    Ok(())
}

#[tokio::test]
async fn fee_leaves_with_the_last_paid_item() -> TestResult {
    let shop = shop(with_booking_fee(), 1)?;
    let cart = CartStore::new(&shop.context, USER);

    cart.add_item("mod_booking", "option", 1).await?;
    cart.add_item("mod_booking", "option", 2).await?;

    assert!(cart.delete_item("mod_booking", "option", 1, true).await?);

    let data = cart.get_data().await?;
    let left: Vec<(&str, u64)> = data
        .items
        .iter()
        .map(|line| (line.item.area.as_str(), line.item.item_id))
        .collect();
    assert_eq!(left, vec![("option", 2)]);
    assert_eq!(data.price, Decimal::ZERO);
    assert!(!shop.catalog.is_held("option", 1, USER).await);
    assert!(shop.catalog.is_held("option", 2, USER).await);

    Ok(())
}

#[tokio::test]
async fn cashier_confirms_a_cash_payment() -> TestResult {
    let shop = shop(CartSettings::default(), 12345)?;
    let cart = CartStore::new(&shop.context, USER);
    cart.add_item("mod_booking", "option", 1).await?;
    cart.add_item("mod_booking", "option", 3).await?;

    let identifier = CashierService::new(&shop.context, CASHIER)
        .confirm_payment(USER, PaymentMethod::CashierCash, None)
        .await?;
    assert_eq!(identifier, 12345);

    let history = HistoryService::list_for_identifier(&*shop.store, identifier).await?;
    assert_eq!(history.len(), 2);
    assert!(
        history
            .iter()
            .all(|record| record.payment_status == PaymentStatus::Success)
    );

    let ledger = LedgerService::list_for_user(&*shop.store, USER).await?;
    assert_eq!(ledger.len(), 2);
    assert!(
        ledger
            .iter()
            .all(|entry| entry.payment_method == PaymentMethod::CashierCash
                && entry.identifier == identifier)
    );

    assert_eq!(count(&shop.events, "payment_added").await, 1);
    assert_eq!(count(&shop.events, "payment_confirmed").await, 1);
    assert_eq!(count(&shop.events, "item_bought").await, 2);

    assert!(shop.catalog.is_booked("option", 1, USER).await);
    assert!(shop.catalog.is_booked("option", 3, USER).await);
    assert!(cart.get_data().await?.items.is_empty());

    assert!(shop.context.ledger.reconcile(identifier).await?.is_balanced());

    Ok(())
}

#[tokio::test]
async fn gateway_payment_after_the_wizard() -> TestResult {
    let settings = CartSettings {
        accept_terms: true,
        terms_text: "Be nice.".to_string(),
        ..with_booking_fee()
    };
    let shop = shop(settings, 500)?;

    let cart = CartStore::new(&shop.context, USER);
    cart.add_item("mod_booking", "option", 3).await?;

    let checkout = CheckoutService::new(&shop.context, USER);
    assert!(checkout.prepare_checkout().await.is_err());

    let billing = AddressesService::create(
        &*shop.store,
        NewAddress {
            userid: USER,
            name: "Ada".to_string(),
            street: "Main St 1".to_string(),
            zip: "1010".to_string(),
            city: "Vienna".to_string(),
            country: "AT".to_string(),
        },
    )
    .await?;

    let manager = CheckoutManager::new(&shop.context, USER);
    manager
        .check_status(
            StepKind::Addresses,
            &[StepInput::BillingAddress {
                address_id: billing.id,
            }],
        )
        .await?;
    manager
        .check_status(
            StepKind::TermsAndConditions,
            &[StepInput::AcceptTerms { accepted: true }],
        )
        .await?;
    manager.render_overview(StepAction::Stay).await?;
    manager.render_overview(StepAction::Next).await?;
    let overview = manager.render_overview(StepAction::Next).await?;
    assert!(overview.checkout_validation);

    let prepared = checkout.prepare_checkout().await?;
    assert_eq!(prepared.identifier, 500);

    // Preparing again with the same cart keeps the identifier.
    assert_eq!(checkout.prepare_checkout().await?.identifier, 500);

    let payments = PaymentService::new(&shop.context);
    let payable = payments.get_payable(PAYMENT_AREA, 500).await?;
    assert_eq!(payable.amount, dec!(27));

    assert!(
        payments
            .get_success_url(PAYMENT_AREA, 500)?
            .ends_with("identifier=500")
    );

    assert!(payments.deliver_order(PAYMENT_AREA, 500, "pay-1", USER).await?);
    assert!(payments.deliver_order(PAYMENT_AREA, 500, "pay-1", USER).await?);

    assert_eq!(count(&shop.events, "payment_confirmed").await, 1);
    assert_eq!(count(&shop.events, "checkout_completed").await, 1);
    assert!(shop.catalog.is_booked("option", 3, USER).await);

    let runner = TaskRunner::new(
        shop.context.tasks.clone(),
        Arc::new(ShopTaskHandler::new(shop.context.clone())),
    );
    let report = runner.run_due(shop.clock.now()).await?;
    assert_eq!(report.failed, 0);

    let invoice = InvoicesService::get_for_identifier(&*shop.store, 500)
        .await?
        .ok_or("no invoice issued")?;
    assert!(invoice.invoice_id.starts_with("INV-"));

    Ok(())
}

#[tokio::test]
async fn cancelled_purchase_pays_for_the_next_one() -> TestResult {
    let shop = shop(CartSettings::default(), 1)?;
    let cart = CartStore::new(&shop.context, USER);
    cart.add_item("mod_booking", "option", 3).await?;

    let cashier = CashierService::new(&shop.context, CASHIER);
    let identifier = cashier
        .confirm_payment(USER, PaymentMethod::CashierCash, None)
        .await?;

    let history_id = HistoryService::list_for_identifier(&*shop.store, identifier)
        .await?
        .first()
        .map(|record| record.id)
        .ok_or("no history row")?;

    cashier.cancel_purchase(history_id, Some(dec!(5)), None).await?;
    assert_eq!(CreditsService::balance(&*shop.store, USER).await?, dec!(20));
    assert!(!shop.catalog.is_booked("option", 3, USER).await);

    cart.add_item("mod_booking", "option", 1).await?;
    cart.set_use_credit(true).await?;

    let paid = CheckoutService::at_cashier(&shop.context, USER, CASHIER)
        .checkout_with_credits()
        .await?;

    assert!(shop.catalog.is_booked("option", 1, USER).await);
    assert_eq!(CreditsService::balance(&*shop.store, USER).await?, dec!(10));

    let history = HistoryService::list_for_identifier(&*shop.store, paid).await?;
    assert!(history.iter().all(|record| {
        record.payment_method == PaymentMethod::Credits
            && record.payment_status == PaymentStatus::Success
    }));

    Ok(())
}

#[tokio::test]
async fn expired_items_are_released_by_the_task_runner() -> TestResult {
    let shop = shop(CartSettings::default(), 1)?;
    let cart = CartStore::new(&shop.context, USER);
    cart.add_item("mod_booking", "option", 1).await?;
    assert!(shop.catalog.is_held("option", 1, USER).await);

    shop.clock.advance(SignedDuration::from_mins(16));

    let runner = TaskRunner::new(
        shop.context.tasks.clone(),
        Arc::new(ShopTaskHandler::new(shop.context.clone())),
    );
    let report = runner.run_due(shop.clock.now()).await?;

    assert_eq!(report.completed, 1);
    assert!(!shop.catalog.is_held("option", 1, USER).await);
    assert!(cart.get_data().await?.items.is_empty());

    Ok(())
}
