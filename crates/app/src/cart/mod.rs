//! Cart store
//!
//! Per-request access to one user's cart. The snapshot lives in the cart cache namespace; every
//! operation reads it, changes it and writes it back, so two concurrent requests of the same
//! user race and the last write wins.
//!
//! Fee and credit lines are maintained here: the booking fee is present while the cart holds a
//! paid regular item (and, when configured, until the user paid a fee once), and the rebooking
//! credit line mirrors the rebook markers.

use jiff::{SignedDuration, Timestamp};
use rand::{Rng, distributions::Alphanumeric};
use rust_decimal::Decimal;
use shopcart::{
    cart::CartSnapshot,
    data::CartData,
    events::DomainEvent,
    items::{
        BOOKING_FEE_AREA, CartItem, INSTALLMENT_AREA, LOCAL_COMPONENT, REBOOK_ITEM_AREA,
        REBOOKING_CREDIT_AREA, cache_key, is_pseudo_item,
    },
    modifiers::ModifierContext,
    payments::PaymentStatus,
    pricing::ensure_currency,
    rebooking::{RebookingDenial, rebooking_credit},
    status::CartStatus,
};
use smallvec::{SmallVec, smallvec};
use tracing::{info, warn};

use crate::{
    cache::{CacheError, CacheNamespace, cart_key},
    catalog::UnloadOutcome,
    context::ShopContext,
    domain::history::models::HistoryRecord,
    tasks::TaskPayload,
};

mod errors;
mod rebooking;

pub use errors::{CartStoreError, GENERIC_ERROR_MESSAGE};
pub use rebooking::RebookingService;

const CHECKBOX_ID_LENGTH: usize = 12;

/// Outcome of [`CartStore::add_item`].
#[derive(Debug, Clone, PartialEq)]
pub struct AddItemResult {
    pub status: CartStatus,

    /// The added item, or a zero priced stub when the add was rejected.
    pub item: CartItem,
    pub expiration: Option<Timestamp>,
}

/// Outcome of [`CartStore::add_rebook_item`].
#[derive(Debug, Clone, PartialEq)]
pub enum RebookOutcome {
    Added(CartItem),
    AlreadyInCart,
    Denied(RebookingDenial),
}

/// Inputs of a cart projection besides the cart itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataOptions {
    /// Country of the selected billing address.
    pub country: Option<String>,

    /// Identifier of the checkout being prepared.
    pub checkout_identifier: Option<u64>,
}

/// One user's cart for the duration of a request.
#[derive(Debug, Clone, Copy)]
pub struct CartStore<'a> {
    context: &'a ShopContext,
    userid: u64,

    /// User performing the operations; differs from `userid` at the cashier desk.
    actor: u64,
}

impl<'a> CartStore<'a> {
    pub fn new(context: &'a ShopContext, userid: u64) -> Self {
        Self::acting_as(context, userid, userid)
    }

    pub fn acting_as(context: &'a ShopContext, userid: u64, actor: u64) -> Self {
        Self {
            context,
            userid,
            actor,
        }
    }

    pub fn userid(&self) -> u64 {
        self.userid
    }

    /// Add a catalog item.
    ///
    /// Business-rule rejections come back as a status with a stub item.
    ///
    /// # Errors
    ///
    /// Returns an error when the component is unknown or a backend fails.
    pub async fn add_item(
        &self,
        component: &str,
        area: &str,
        item_id: u64,
    ) -> Result<AddItemResult, CartStoreError> {
        let now = self.context.clock.now();
        let mut snapshot = self.load_current(now).await?;

        let status = self.add_status(&snapshot, component, area, item_id).await?;

        if !status.is_success() {
            return Ok(self.rejected(status, &snapshot, component, area, item_id));
        }

        let provider = self.context.catalog.provider(component)?;
        let mut item = provider.get_cartitem(area, item_id, self.userid).await?;

        if self.context.settings.same_cost_center_required && cost_center_conflict(&snapshot, &item)
        {
            self.release(&item).await?;

            return Ok(self.rejected(CartStatus::CostCenter, &snapshot, component, area, item_id));
        }

        if let Err(error) = ensure_currency([&item], &self.context.settings.currency) {
            self.release(&item).await?;

            return Err(error.into());
        }

        if !self.context.settings.installments_enabled {
            item.installment = None;
        }

        snapshot.insert(item.clone());
        let expiration = self.touch(&mut snapshot, now).await?;

        info!(
            userid = self.userid,
            item = %item.cache_key(),
            price = %item.price,
            "item added to cart"
        );

        self.context
            .events
            .trigger(DomainEvent::item_added(self.actor, self.userid, &item))
            .await;

        Ok(AddItemResult {
            status,
            item,
            expiration: Some(expiration),
        })
    }

    /// Remove an item, and whatever the provider cascades to when `unload` is set.
    ///
    /// Returns whether the item was in the cart. Fee and credit lines cannot be removed.
    ///
    /// # Errors
    ///
    /// Returns an error when a provider or the cache fails.
    pub async fn delete_item(
        &self,
        component: &str,
        area: &str,
        item_id: u64,
        unload: bool,
    ) -> Result<bool, CartStoreError> {
        let now = self.context.clock.now();
        let mut snapshot = self.load_current(now).await?;
        let key = cache_key(component, area, item_id);

        if snapshot.get(&key).is_none_or(|item| item.no_delete) {
            return Ok(false);
        }

        self.remove_cascading(&mut snapshot, key, unload).await?;
        self.settle(&mut snapshot).await?;

        Ok(true)
    }

    /// Empty the cart, returning how many items were removed.
    ///
    /// Paid carts are emptied without `unload`, since the providers already handed the items
    /// over.
    ///
    /// # Errors
    ///
    /// Returns an error when a provider or the cache fails.
    pub async fn delete_all_items(&self, unload: bool) -> Result<usize, CartStoreError> {
        let now = self.context.clock.now();
        let mut snapshot = self.load_current(now).await?;

        let keys: Vec<String> = snapshot
            .items()
            .iter()
            .filter(|item| !item.is_fee_or_credit())
            .map(CartItem::cache_key)
            .collect();

        let mut removed = 0;
        for key in keys {
            removed += self.remove_cascading(&mut snapshot, key, unload).await?;
        }

        snapshot.clear();
        self.save(&snapshot).await?;

        Ok(removed)
    }

    /// Display-ready cart.
    ///
    /// # Errors
    ///
    /// Returns an error when the cache or the credit store fails.
    pub async fn get_data(&self) -> Result<CartData, CartStoreError> {
        self.get_data_with(&DataOptions::default()).await
    }

    /// Display-ready cart for a billing country or a checkout being prepared.
    ///
    /// # Errors
    ///
    /// Returns an error when the cache or the credit store fails.
    pub async fn get_data_with(&self, options: &DataOptions) -> Result<CartData, CartStoreError> {
        let settings = &*self.context.settings;
        let now = self.context.clock.now();
        let snapshot = self.load_current(now).await?;
        let balance = self.context.credits.balance(self.userid).await?;

        let mut modifiers = ModifierContext::new(settings, now)
            .with_credit_balance(balance)
            .with_country(options.country.as_deref());

        if let Some(identifier) = options.checkout_identifier {
            modifiers = modifiers.with_checkout_identifier(identifier);
        }

        let mut data = CartData::from_snapshot(self.userid, &snapshot, settings, now);
        self.context.pipeline.apply(&mut data, &modifiers);
        data.checkbox_id = checkbox_id();

        Ok(data)
    }

    /// Remember whether the user pays with their credit balance.
    ///
    /// # Errors
    ///
    /// Returns an error when the cache or the credit store fails.
    pub async fn set_use_credit(&self, use_credit: bool) -> Result<CartData, CartStoreError> {
        let now = self.context.clock.now();
        let mut snapshot = self.load_current(now).await?;

        snapshot.use_credit = Some(use_credit);
        self.save(&snapshot).await?;

        self.get_data().await
    }

    /// Put a marker for rebooking a paid purchase into the cart.
    ///
    /// # Errors
    ///
    /// Returns an error when the purchase is unknown or belongs to someone else, or a backend
    /// fails.
    pub async fn add_rebook_item(&self, history_id: u64) -> Result<RebookOutcome, CartStoreError> {
        let record = self.owned_record(history_id).await?;
        let now = self.context.clock.now();
        let mut snapshot = self.load_current(now).await?;

        if snapshot.contains(&cache_key(LOCAL_COMPONENT, REBOOK_ITEM_AREA, history_id)) {
            return Ok(RebookOutcome::AlreadyInCart);
        }

        let waiting = snapshot.rebook_markers().count();

        if let Some(denial) = RebookingService::new(self.context)
            .rebooking_denial(&record, self.userid, waiting)
            .await?
        {
            info!(userid = self.userid, history_id, %denial, "rebooking denied");
            return Ok(RebookOutcome::Denied(denial));
        }

        let mut marker = CartItem::new(
            LOCAL_COMPONENT,
            REBOOK_ITEM_AREA,
            history_id,
            record.item_name.clone(),
            Decimal::ZERO,
            record.currency.clone(),
        );
        marker.refundable = self.context.settings.rebooking.refundable(record.price);
        marker.description = cache_key(&record.component, &record.area, record.item_id);

        snapshot.insert(marker.clone());
        self.touch(&mut snapshot, now).await?;

        self.context
            .events
            .trigger(DomainEvent::item_added(self.actor, self.userid, &marker))
            .await;

        Ok(RebookOutcome::Added(marker))
    }

    /// Put a line paying the next open installment of a purchase into the cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartStoreError::NoOpenInstallment`] when nothing is left to pay.
    pub async fn add_installment_payment(
        &self,
        history_id: u64,
    ) -> Result<CartItem, CartStoreError> {
        let record = self.owned_record(history_id).await?;

        let plan = record
            .installments
            .as_ref()
            .filter(|_| record.payment_status == PaymentStatus::Success)
            .ok_or(CartStoreError::NoOpenInstallment(history_id))?;
        let index = plan
            .next_open()
            .ok_or(CartStoreError::NoOpenInstallment(history_id))?;
        let payment = plan.payment(index)?;

        let mut line = CartItem::new(
            LOCAL_COMPONENT,
            INSTALLMENT_AREA,
            history_id,
            format!("{} ({}. installment)", record.item_name, index + 1),
            payment.amount,
            record.currency.clone(),
        );
        line.cost_center.clone_from(&record.cost_center);

        let now = self.context.clock.now();
        let mut snapshot = self.load_current(now).await?;

        snapshot.insert(line.clone());
        self.touch(&mut snapshot, now).await?;

        self.context
            .events
            .trigger(DomainEvent::item_added(self.actor, self.userid, &line))
            .await;

        Ok(line)
    }

    /// Drop the cart the item belongs to if its time ran out.
    ///
    /// Runs from the deferred delete task. A cart that was touched after the task was queued
    /// is left alone. Returns whether the item was removed.
    ///
    /// # Errors
    ///
    /// Returns an error when the cache fails.
    pub async fn expire_item(
        &self,
        component: &str,
        area: &str,
        item_id: u64,
    ) -> Result<bool, CartStoreError> {
        let now = self.context.clock.now();
        let mut snapshot = self.load().await?;

        if snapshot.expiration.is_some_and(|expiration| expiration > now) {
            return Ok(false);
        }

        let present = snapshot.contains(&cache_key(component, area, item_id));

        if !snapshot.is_empty() {
            self.wipe_expired(&mut snapshot).await?;
        }

        Ok(present)
    }

    async fn add_status(
        &self,
        snapshot: &CartSnapshot,
        component: &str,
        area: &str,
        item_id: u64,
    ) -> Result<CartStatus, CartStoreError> {
        if is_pseudo_item(component, area) {
            return Ok(CartStatus::Error);
        }

        if snapshot.contains(&cache_key(component, area, item_id)) {
            return Ok(CartStatus::AlreadyInCart);
        }

        if snapshot.regular_count() >= self.context.settings.max_items {
            return Ok(CartStatus::CartIsFull);
        }

        Ok(self
            .context
            .catalog
            .provider(component)?
            .allow_add_item_to_cart(area, item_id, self.userid)
            .await?)
    }

    fn rejected(
        &self,
        status: CartStatus,
        snapshot: &CartSnapshot,
        component: &str,
        area: &str,
        item_id: u64,
    ) -> AddItemResult {
        info!(
            userid = self.userid,
            item = %cache_key(component, area, item_id),
            ?status,
            "item not added to cart"
        );

        AddItemResult {
            status,
            item: CartItem::stub(component, area, item_id, &self.context.settings.currency),
            expiration: snapshot.expiration,
        }
    }

    async fn owned_record(&self, history_id: u64) -> Result<HistoryRecord, CartStoreError> {
        let record = self.context.history.get(history_id).await?;

        if record.userid != self.userid {
            return Err(CartStoreError::NotOwned {
                history_id,
                userid: self.userid,
            });
        }

        Ok(record)
    }

    /// Remove `key` and everything its unload cascades to; returns how many items went.
    async fn remove_cascading(
        &self,
        snapshot: &mut CartSnapshot,
        key: String,
        unload: bool,
    ) -> Result<usize, CartStoreError> {
        let mut pending: SmallVec<[String; 4]> = smallvec![key];
        let mut removed = 0;

        while let Some(key) = pending.pop() {
            let Some(item) = snapshot.remove(&key) else {
                continue;
            };
            removed += 1;

            let released = if unload && !item.is_pseudo() {
                let outcome = self.release(&item).await?;

                pending.extend(
                    outcome
                        .cascade
                        .iter()
                        .map(|(component, area, item_id)| cache_key(component, area, *item_id)),
                );

                outcome.success
            } else {
                unload
            };

            if released {
                self.context
                    .events
                    .trigger(DomainEvent::item_deleted(self.actor, self.userid, &item))
                    .await;
            }

            info!(userid = self.userid, item = %key, released, "item removed from cart");
        }

        Ok(removed)
    }

    /// Recompute fee lines after a removal, dropping the cart when nothing real is left.
    async fn settle(&self, snapshot: &mut CartSnapshot) -> Result<(), CartStoreError> {
        if !snapshot.is_empty() && !snapshot.has_only_fee_or_credit_lines() {
            self.refresh_fee_lines(snapshot).await?;
        }

        if snapshot.has_only_fee_or_credit_lines() {
            snapshot.clear();
        }

        self.save(snapshot).await
    }

    /// Refresh fee lines and the expiration, save, and move the expiry tasks.
    async fn touch(
        &self,
        snapshot: &mut CartSnapshot,
        now: Timestamp,
    ) -> Result<Timestamp, CartStoreError> {
        self.refresh_fee_lines(snapshot).await?;

        let expiration =
            now.checked_add(SignedDuration::from_mins(self.context.settings.expiration_minutes))?;
        snapshot.expiration = Some(expiration);

        self.save(snapshot).await?;

        for item in snapshot.items().iter().filter(|item| !item.is_fee_or_credit()) {
            self.context
                .tasks
                .reschedule_or_queue(
                    self.userid,
                    TaskPayload::DeleteItem {
                        component: item.component.clone(),
                        area: item.area.clone(),
                        item_id: item.item_id,
                    },
                    expiration,
                )
                .await?;
        }

        Ok(expiration)
    }

    async fn refresh_fee_lines(&self, snapshot: &mut CartSnapshot) -> Result<(), CartStoreError> {
        let settings = &*self.context.settings;

        if self.booking_fee_due(snapshot).await? {
            snapshot.insert_first(CartItem::booking_fee(settings.booking_fee, &settings.currency));
        } else {
            snapshot.remove(&cache_key(LOCAL_COMPONENT, BOOKING_FEE_AREA, 0));
        }

        let credit = rebooking_credit(
            snapshot.rebook_markers().map(|marker| marker.refundable),
            snapshot.regular_total(),
        );

        snapshot.remove(&cache_key(LOCAL_COMPONENT, REBOOKING_CREDIT_AREA, 0));

        if credit > Decimal::ZERO {
            snapshot.insert(CartItem::rebooking_credit(credit, &settings.currency));
        }

        Ok(())
    }

    async fn booking_fee_due(&self, snapshot: &CartSnapshot) -> Result<bool, CartStoreError> {
        let settings = &*self.context.settings;

        if settings.booking_fee <= Decimal::ZERO {
            return Ok(false);
        }

        if !snapshot.regular_items().any(|item| item.price > Decimal::ZERO) {
            return Ok(false);
        }

        if settings.booking_fee_only_once
            && self.context.history.has_paid_booking_fee(self.userid).await?
        {
            return Ok(false);
        }

        Ok(true)
    }

    async fn release(&self, item: &CartItem) -> Result<UnloadOutcome, CartStoreError> {
        Ok(self
            .context
            .catalog
            .provider(&item.component)?
            .unload_cartitem(&item.area, item.item_id, self.userid)
            .await?)
    }

    async fn load(&self) -> Result<CartSnapshot, CartStoreError> {
        let cached = self
            .context
            .cache
            .get(CacheNamespace::ShoppingCart, &cart_key(self.userid))
            .await?;

        match cached {
            Some(value) => Ok(serde_json::from_value(value).map_err(CacheError::from)?),
            None => Ok(CartSnapshot::new()),
        }
    }

    /// The snapshot, wiped first when it ran out before `now`.
    async fn load_current(&self, now: Timestamp) -> Result<CartSnapshot, CartStoreError> {
        let mut snapshot = self.load().await?;

        if snapshot.is_expired(now) {
            self.wipe_expired(&mut snapshot).await?;
        }

        Ok(snapshot)
    }

    async fn save(&self, snapshot: &CartSnapshot) -> Result<(), CartStoreError> {
        let key = cart_key(self.userid);

        if snapshot.is_empty() {
            self.context
                .cache
                .delete(CacheNamespace::ShoppingCart, &key)
                .await?;
        } else {
            let value = serde_json::to_value(snapshot).map_err(CacheError::from)?;

            self.context
                .cache
                .set(CacheNamespace::ShoppingCart, &key, value)
                .await?;
        }

        Ok(())
    }

    async fn wipe_expired(&self, snapshot: &mut CartSnapshot) -> Result<(), CartStoreError> {
        let expired = snapshot.items().to_vec();

        snapshot.clear();
        self.save(snapshot).await?;

        info!(userid = self.userid, items = expired.len(), "cart expired");

        for item in expired.iter().filter(|item| !item.is_fee_or_credit()) {
            if !item.is_pseudo()
                && let Err(error) = self.release(item).await
            {
                warn!(
                    userid = self.userid,
                    item = %item.cache_key(),
                    %error,
                    "failed to release expired item"
                );
            }

            self.context
                .events
                .trigger(DomainEvent::item_expired(self.userid, item))
                .await;
        }

        Ok(())
    }
}

fn cost_center_conflict(snapshot: &CartSnapshot, item: &CartItem) -> bool {
    let Some(center) = item.cost_center.as_deref().filter(|center| !center.is_empty()) else {
        return false;
    };

    snapshot
        .regular_items()
        .filter_map(|existing| existing.cost_center.as_deref())
        .any(|existing| !existing.is_empty() && existing != center)
}

fn checkbox_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CHECKBOX_ID_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use jiff::SignedDuration;
    use rust_decimal_macros::dec;
    use shopcart::{
        data::CartLine,
        pricing::{InstallmentPayment, InstallmentPlan},
        rebooking::RebookingPolicy,
        settings::CartSettings,
    };
    use testresult::TestResult;

    use crate::{
        catalog::InMemoryCatalog,
        domain::history::{HistoryService, models::NewHistoryRecord},
        tasks::TaskScheduler,
        test::helpers::{TestShop, booking_item},
    };

    use super::*;

    fn settings() -> CartSettings {
        let mut settings = CartSettings::default();
        settings.max_items = 3;
        settings.expiration_minutes = 15;
        settings.booking_fee = dec!(2);
        settings
    }

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::new()
            .with_item(booking_item(1, "Yoga", dec!(30)))
            .with_item(booking_item(2, "Pilates", dec!(20)))
            .with_item(booking_item(3, "Open day", dec!(0)))
            .with_item(booking_item(4, "Zumba", dec!(10)))
            .with_item(booking_item(5, "Spinning", dec!(10)))
            .with_places("option", 4, 0)
    }

    fn shop(settings: CartSettings) -> TestResult<TestShop> {
        TestShop::new(settings, catalog())
    }

    #[tokio::test]
    async fn first_paid_item_brings_the_booking_fee() -> TestResult {
        let shop = shop(settings())?;
        let cart = CartStore::new(&shop.context, 2);

        let added = cart.add_item("mod_booking", "option", 1).await?;
        assert_eq!(added.status, CartStatus::Success);
        assert_eq!(added.item.price, dec!(30));

        let data = cart.get_data().await?;
        assert_eq!(data.items.len(), 2);
        assert_eq!(
            data.items.first().map(|line| line.item.area.as_str()),
            Some(BOOKING_FEE_AREA)
        );
        assert_eq!(data.count, 1);
        assert_eq!(data.price, dec!(32));
        assert_eq!(data.checkbox_id.len(), CHECKBOX_ID_LENGTH);

        assert_eq!(shop.events.names().await, vec!["item_added"]);

        Ok(())
    }

    #[tokio::test]
    async fn free_item_alone_carries_no_fee() -> TestResult {
        let shop = shop(settings())?;
        let cart = CartStore::new(&shop.context, 2);

        cart.add_item("mod_booking", "option", 3).await?;
        let data = cart.get_data().await?;
        assert_eq!(data.items.len(), 1);
        assert_eq!(data.price, Decimal::ZERO);

        cart.add_item("mod_booking", "option", 2).await?;
        assert_eq!(cart.get_data().await?.price, dec!(22));

        cart.delete_item("mod_booking", "option", 2, true).await?;
        let data = cart.get_data().await?;
        assert_eq!(data.items.len(), 1);
        assert_eq!(data.price, Decimal::ZERO);

        Ok(())
    }

    #[tokio::test]
    async fn fee_is_charged_only_once_when_configured() -> TestResult {
        let mut settings = settings();
        settings.booking_fee_only_once = true;
        let shop = shop(settings)?;

        let identifier = shop.store.next_identifier().await?;
        let fee = NewHistoryRecord::from_line(
            &CartLine::new(CartItem::booking_fee(dec!(2), "EUR")),
            identifier,
            2,
            2,
        );
        shop.store.create_pending(vec![fee]).await?;
        shop.confirm(identifier).await?;

        let cart = CartStore::new(&shop.context, 2);
        cart.add_item("mod_booking", "option", 1).await?;

        assert_eq!(cart.get_data().await?.price, dec!(30));

        Ok(())
    }

    #[tokio::test]
    async fn rejections_are_statuses_with_a_stub() -> TestResult {
        let shop = shop(settings())?;
        let cart = CartStore::new(&shop.context, 2);

        assert!(matches!(
            cart.add_item("mod_unknown", "option", 1).await,
            Err(CartStoreError::Catalog(_))
        ));

        cart.add_item("mod_booking", "option", 1).await?;

        let again = cart.add_item("mod_booking", "option", 1).await?;
        assert_eq!(again.status, CartStatus::AlreadyInCart);
        assert_eq!(again.item.price, Decimal::ZERO);

        let full = cart.add_item("mod_booking", "option", 4).await?;
        assert_eq!(full.status, CartStatus::FullyBooked);

        cart.add_item("mod_booking", "option", 2).await?;
        cart.add_item("mod_booking", "option", 3).await?;
        let over = cart.add_item("mod_booking", "option", 5).await?;
        assert_eq!(over.status, CartStatus::CartIsFull);

        let pseudo = cart
            .add_item(LOCAL_COMPONENT, BOOKING_FEE_AREA, 0)
            .await?;
        assert_eq!(pseudo.status, CartStatus::Error);

        Ok(())
    }

    #[tokio::test]
    async fn items_of_another_cost_center_are_refused() -> TestResult {
        let mut settings = settings();
        settings.same_cost_center_required = true;

        let mut sports = booking_item(1, "Yoga", dec!(30));
        sports.cost_center = Some("sports".to_string());
        let mut music = booking_item(2, "Piano", dec!(30));
        music.cost_center = Some("music".to_string());

        let shop = TestShop::new(settings, InMemoryCatalog::new().with_item(sports).with_item(music))?;
        let cart = CartStore::new(&shop.context, 2);

        cart.add_item("mod_booking", "option", 1).await?;
        let refused = cart.add_item("mod_booking", "option", 2).await?;

        assert_eq!(refused.status, CartStatus::CostCenter);
        assert!(!shop.catalog.is_held("option", 2, 2).await);
        assert_eq!(cart.get_data().await?.count, 1);

        Ok(())
    }

    #[tokio::test]
    async fn unload_cascades_and_last_item_drops_the_cart() -> TestResult {
        let catalog = catalog().with_cascade(
            "option",
            1,
            vec![("mod_booking".to_string(), "option".to_string(), 2)],
        );
        let shop = TestShop::new(settings(), catalog)?;
        let cart = CartStore::new(&shop.context, 2);

        cart.add_item("mod_booking", "option", 1).await?;
        cart.add_item("mod_booking", "option", 2).await?;

        assert!(cart.delete_item("mod_booking", "option", 1, true).await?);

        let data = cart.get_data().await?;
        assert!(data.items.is_empty());
        assert!(!shop.catalog.is_held("option", 2, 2).await);
        assert_eq!(
            shop.events.names().await,
            vec!["item_added", "item_added", "item_deleted", "item_deleted"]
        );

        Ok(())
    }

    #[tokio::test]
    async fn delete_without_unload_emits_nothing() -> TestResult {
        let shop = shop(settings())?;
        let cart = CartStore::new(&shop.context, 2);

        cart.add_item("mod_booking", "option", 1).await?;
        assert!(cart.delete_item("mod_booking", "option", 1, false).await?);
        assert!(!cart.delete_item("mod_booking", "option", 1, false).await?);

        assert_eq!(shop.events.names().await, vec!["item_added"]);

        Ok(())
    }

    #[tokio::test]
    async fn fee_line_cannot_be_deleted() -> TestResult {
        let shop = shop(settings())?;
        let cart = CartStore::new(&shop.context, 2);

        cart.add_item("mod_booking", "option", 1).await?;

        assert!(!cart.delete_item(LOCAL_COMPONENT, BOOKING_FEE_AREA, 0, true).await?);
        assert_eq!(cart.get_data().await?.items.len(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn expired_cart_is_wiped_on_read() -> TestResult {
        let shop = shop(settings())?;
        let cart = CartStore::new(&shop.context, 2);

        cart.add_item("mod_booking", "option", 1).await?;
        shop.clock.advance(SignedDuration::from_mins(16));

        let data = cart.get_data().await?;

        assert!(data.items.is_empty());
        assert_eq!(data.count, 0);
        assert!(!shop.catalog.is_held("option", 1, 2).await);
        assert_eq!(shop.events.names().await, vec!["item_added", "item_expired"]);

        Ok(())
    }

    #[tokio::test]
    async fn adding_moves_the_expiry_task() -> TestResult {
        let shop = shop(settings())?;
        let cart = CartStore::new(&shop.context, 2);

        cart.add_item("mod_booking", "option", 1).await?;
        shop.clock.advance(SignedDuration::from_mins(10));
        let added = cart.add_item("mod_booking", "option", 2).await?;

        let tasks = shop.store.pending(2).await?;
        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|task| Some(task.run_at) == added.expiration));

        assert!(!cart.expire_item("mod_booking", "option", 1).await?);

        shop.clock.advance(SignedDuration::from_mins(15));
        assert!(cart.expire_item("mod_booking", "option", 1).await?);
        assert!(cart.get_data().await?.items.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn rebook_marker_adds_a_capped_credit_line() -> TestResult {
        let mut settings = settings();
        settings.booking_fee = Decimal::ZERO;
        settings.rebooking = RebookingPolicy {
            enabled: true,
            max_number: 0,
            period_days: 30,
            fee: dec!(5),
        };
        let shop = shop(settings)?;
        let history_id = shop.paid_purchase(2, 1, dec!(30)).await?;

        let cart = CartStore::new(&shop.context, 2);
        let outcome = cart.add_rebook_item(history_id).await?;
        assert!(matches!(outcome, RebookOutcome::Added(ref marker) if marker.refundable == dec!(25)));
        assert_eq!(cart.add_rebook_item(history_id).await?, RebookOutcome::AlreadyInCart);

        // nothing to offset yet
        assert_eq!(cart.get_data().await?.price, Decimal::ZERO);

        cart.add_item("mod_booking", "option", 2).await?;
        let data = cart.get_data().await?;
        assert_eq!(data.price, Decimal::ZERO);
        assert!(data.items.iter().any(|line| line.item.area == REBOOKING_CREDIT_AREA
            && line.price == dec!(-20)));

        cart.add_item("mod_booking", "option", 5).await?;
        assert_eq!(cart.get_data().await?.price, dec!(5));

        Ok(())
    }

    #[tokio::test]
    async fn foreign_purchases_cannot_be_rebooked() -> TestResult {
        let mut settings = settings();
        settings.rebooking.enabled = true;
        let shop = shop(settings)?;
        let history_id = shop.paid_purchase(3, 1, dec!(30)).await?;

        assert!(matches!(
            CartStore::new(&shop.context, 2).add_rebook_item(history_id).await,
            Err(CartStoreError::NotOwned { .. })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn next_open_installment_can_be_paid() -> TestResult {
        let mut settings = settings();
        settings.installments_enabled = true;
        let shop = shop(settings)?;

        let plan = InstallmentPlan {
            down_payment: dec!(10),
            payments: vec![
                InstallmentPayment {
                    due: Timestamp::UNIX_EPOCH,
                    amount: dec!(10),
                    paid_at: Some(Timestamp::UNIX_EPOCH),
                },
                InstallmentPayment {
                    due: Timestamp::UNIX_EPOCH,
                    amount: dec!(15),
                    paid_at: None,
                },
            ],
        };
        let history_id = shop.paid_installment_purchase(2, 1, plan).await?;

        let cart = CartStore::new(&shop.context, 2);
        let line = cart.add_installment_payment(history_id).await?;

        assert_eq!(line.price, dec!(15));
        assert!(line.item_name.ends_with("(2. installment)"));
        // installment lines are no regular items, so no booking fee
        assert_eq!(cart.get_data().await?.price, dec!(15));

        let paid = shop.paid_purchase(2, 2, dec!(20)).await?;
        assert!(matches!(
            cart.add_installment_payment(paid).await,
            Err(CartStoreError::NoOpenInstallment(id)) if id == paid
        ));

        Ok(())
    }

    #[tokio::test]
    async fn use_credit_is_remembered() -> TestResult {
        let shop = shop(settings())?;
        shop.grant_credit(2, dec!(50)).await?;
        let cart = CartStore::new(&shop.context, 2);

        cart.add_item("mod_booking", "option", 1).await?;
        let data = cart.set_use_credit(true).await?;

        assert!(data.use_credit);
        assert_eq!(data.deductible, dec!(32));
        assert_eq!(data.price, Decimal::ZERO);
        assert_eq!(data.remaining_credit, dec!(18));

        Ok(())
    }

    #[tokio::test]
    async fn delete_all_items_empties_the_cart() -> TestResult {
        let shop = shop(settings())?;
        let cart = CartStore::new(&shop.context, 2);

        cart.add_item("mod_booking", "option", 1).await?;
        cart.add_item("mod_booking", "option", 2).await?;

        assert_eq!(cart.delete_all_items(false).await?, 2);
        assert!(cart.get_data().await?.items.is_empty());
        assert!(shop.catalog.is_held("option", 1, 2).await);

        Ok(())
    }
}
