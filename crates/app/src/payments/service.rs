//! Gateway-facing payment service.

use rust_decimal::Decimal;
use serde::Serialize;
use shopcart::{
    events::DomainEvent,
    payments::{PaymentMethod, PaymentStatus},
    pricing::round_price,
    rebooking::cancellation_credit,
};
use tracing::{error, info, warn};

use crate::{
    cache::{CacheNamespace, checkout_key},
    cart::CartStore,
    context::ShopContext,
    domain::{
        accounting::models::{ConfirmPurchase, Confirmation},
        history::models::HistoryRecord,
    },
};

use super::PaymentError;

/// The only payment area a checkout is paid in.
pub const PAYMENT_AREA: &str = "main";

/// What the gateway has to collect for a checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Payable {
    pub amount: Decimal,
    pub currency: String,

    /// Gateway account to pay into.
    pub account: String,
}

/// A confirmed payment to turn into bookings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub identifier: u64,
    pub userid: u64,

    /// Who confirmed the payment; the buyer or a cashier.
    pub actor: u64,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub account_id: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct PaymentService<'a> {
    context: &'a ShopContext,
}

impl<'a> PaymentService<'a> {
    pub fn new(context: &'a ShopContext) -> Self {
        Self { context }
    }

    fn check_area(area: &str) -> Result<(), PaymentError> {
        if area == PAYMENT_AREA {
            Ok(())
        } else {
            Err(PaymentError::UnknownPaymentArea(area.to_string()))
        }
    }

    async fn records(&self, identifier: u64) -> Result<Vec<HistoryRecord>, PaymentError> {
        let records = self.context.history.list_for_identifier(identifier).await?;

        if records.is_empty() {
            return Err(PaymentError::UnknownIdentifier(identifier));
        }

        Ok(records)
    }

    /// Amount still to collect for a checkout, after credits.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown area or identifier.
    pub async fn get_payable(&self, area: &str, identifier: u64) -> Result<Payable, PaymentError> {
        Self::check_area(area)?;

        let records = self.records(identifier).await?;

        let amount = records
            .iter()
            .filter(|record| record.payment_status == PaymentStatus::Pending)
            .map(HistoryRecord::amount_due)
            .sum::<Decimal>();

        let currency = records
            .first()
            .map_or_else(|| self.context.settings.currency.clone(), |record| record.currency.clone());

        Ok(Payable {
            amount: round_price(amount.max(Decimal::ZERO)),
            currency,
            account: self.context.settings.payment_account.clone(),
        })
    }

    /// Page the gateway sends the user to once the payment went through.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown area.
    pub fn get_success_url(&self, area: &str, identifier: u64) -> Result<String, PaymentError> {
        Self::check_area(area)?;

        let base = &self.context.settings.success_url;
        let separator = if base.contains('?') { '&' } else { '?' };

        Ok(format!("{base}{separator}identifier={identifier}"))
    }

    /// Deliver a checkout the gateway reports as paid.
    ///
    /// Delivering the same checkout twice changes nothing. Returns whether every item was
    /// handed over by its catalog provider.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown area or identifier, a checkout of another user, or a
    /// storage failure.
    pub async fn deliver_order(
        &self,
        area: &str,
        identifier: u64,
        payment_id: &str,
        userid: u64,
    ) -> Result<bool, PaymentError> {
        Self::check_area(area)?;

        let records = self.records(identifier).await?;

        if records.iter().any(|record| record.userid != userid) {
            return Err(PaymentError::NotOwned { identifier, userid });
        }

        let account = &self.context.settings.payment_account;

        self.deliver(Delivery {
            identifier,
            userid,
            actor: userid,
            method: PaymentMethod::Online,
            reference: Some(payment_id.to_string()),
            account_id: (!account.is_empty()).then(|| account.clone()),
        })
        .await
    }

    /// Confirm the rows of a checkout, hand the items over and clear the cart.
    ///
    /// # Errors
    ///
    /// Returns an error when confirming fails. Catalog failures on single items are reported
    /// as `item_not_bought` and a `false` result instead.
    pub async fn deliver(&self, delivery: Delivery) -> Result<bool, PaymentError> {
        let context = self.context;
        let Delivery {
            identifier,
            userid,
            actor,
            method,
            ..
        } = delivery;

        let confirmation = context
            .accounting
            .confirm_purchase(ConfirmPurchase {
                identifier,
                method,
                reference: delivery.reference.clone(),
                account_id: delivery.account_id.clone(),
                rebooking_fee: context.settings.rebooking.fee,
                confirmed_by: actor,
                confirmed_at: context.clock.now(),
            })
            .await?;

        if !confirmation.newly_confirmed {
            info!(identifier, userid, "checkout already delivered");
            return Ok(true);
        }

        let payment_id = delivery.reference.as_deref().unwrap_or_default();
        let delivered = self.hand_over(&confirmation, &delivery, payment_id).await;

        self.cancel_rebooked(&confirmation, &delivery).await;

        context
            .events
            .trigger(DomainEvent::payment_confirmed(actor, userid, identifier, method))
            .await;
        context
            .events
            .trigger(DomainEvent::checkout_completed(actor, userid, identifier))
            .await;

        CartStore::acting_as(context, userid, actor)
            .delete_all_items(false)
            .await?;
        context.reservations.delete_reservation(userid).await?;
        context
            .cache
            .delete(CacheNamespace::CheckoutSession, &checkout_key(userid))
            .await?;

        info!(identifier, userid, ?method, delivered, "checkout delivered");

        Ok(delivered)
    }

    async fn hand_over(&self, confirmation: &Confirmation, delivery: &Delivery, payment_id: &str) -> bool {
        let mut delivered = true;

        for record in confirmation.records.iter().filter(|record| !record.is_pseudo()) {
            let item = record.to_cart_item();

            let handed_over = match self.context.catalog.provider(&record.component) {
                Ok(provider) => provider
                    .successful_checkout(&record.area, record.item_id, payment_id, delivery.userid)
                    .await
                    .unwrap_or_else(|source| {
                        error!(history_id = record.id, %source, "catalog could not deliver item");
                        false
                    }),
                Err(source) => {
                    error!(history_id = record.id, %source, "catalog could not deliver item");
                    false
                }
            };

            let event = if handed_over {
                DomainEvent::item_bought(delivery.actor, delivery.userid, &item, delivery.identifier)
            } else {
                delivered = false;
                DomainEvent::item_not_bought(delivery.actor, delivery.userid, &item, delivery.identifier)
            };

            self.context.events.trigger(event).await;
        }

        delivered
    }

    /// Release the places of purchases that were rebooked in this checkout.
    async fn cancel_rebooked(&self, confirmation: &Confirmation, delivery: &Delivery) {
        let fee = self.context.settings.rebooking.fee;

        for record in &confirmation.rebooked {
            let item = record.to_cart_item();

            let released = match self.context.catalog.provider(&record.component) {
                Ok(provider) => provider
                    .cancel_purchase(&record.area, record.item_id, record.userid)
                    .await
                    .map_err(|source| source.to_string()),
                Err(source) => Err(source.to_string()),
            };

            if let Err(reason) = released {
                warn!(history_id = record.id, %reason, "rebooked purchase not released by catalog");
            }

            self.context
                .events
                .trigger(DomainEvent::item_canceled(
                    delivery.actor,
                    record.userid,
                    &item,
                    cancellation_credit(record.price, fee, None),
                ))
                .await;
        }
    }
}
