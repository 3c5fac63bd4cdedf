//! Checkout service
//!
//! Turns a validated cart into pending history rows under one checkout identifier.

use rust_decimal::Decimal;
use shopcart::{
    data::CartData,
    events::DomainEvent,
    payments::{PaymentMethod, PaymentStatus, allocate_credits},
};
use tracing::{debug, info};

use crate::{
    cart::{CartStore, DataOptions},
    context::ShopContext,
    domain::{
        history::models::{HistoryRecord, NewHistoryRecord},
        reservations::{different_cart_with_same_identifier, models::NewReservation},
    },
    payments::{Delivery, PaymentService},
};

use super::{CheckoutError, CheckoutManager};

/// A checkout waiting for payment.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedCheckout {
    pub identifier: u64,
    pub data: CartData,
    pub records: Vec<HistoryRecord>,

    /// Whether an earlier, unchanged checkout was picked up again.
    pub reused: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct CheckoutService<'a> {
    context: &'a ShopContext,
    userid: u64,
    actor: u64,

    /// The cashier desk skips the wizard.
    enforce_steps: bool,
}

impl<'a> CheckoutService<'a> {
    pub fn new(context: &'a ShopContext, userid: u64) -> Self {
        Self {
            context,
            userid,
            actor: userid,
            enforce_steps: true,
        }
    }

    /// Checkout prepared by `cashier` on behalf of `userid`.
    pub fn at_cashier(context: &'a ShopContext, userid: u64, cashier: u64) -> Self {
        Self {
            context,
            userid,
            actor: cashier,
            enforce_steps: false,
        }
    }

    fn cart(&self) -> CartStore<'a> {
        CartStore::acting_as(self.context, self.userid, self.actor)
    }

    async fn data_for(
        &self,
        country: Option<&str>,
        identifier: Option<u64>,
    ) -> Result<CartData, CheckoutError> {
        Ok(self
            .cart()
            .get_data_with(&DataOptions {
                country: country.map(str::to_string),
                checkout_identifier: identifier,
            })
            .await?)
    }

    /// Identifier of a reserved checkout whose rows are still pending and whose cart did not
    /// change since.
    async fn reusable(
        &self,
        identifier: u64,
        country: Option<&str>,
    ) -> Result<Option<(CartData, Vec<HistoryRecord>)>, CheckoutError> {
        let records = self.context.history.list_for_identifier(identifier).await?;

        let pending = !records.is_empty()
            && records
                .iter()
                .all(|record| record.payment_status == PaymentStatus::Pending);

        if !pending {
            return Ok(None);
        }

        let data = self.data_for(country, Some(identifier)).await?;

        let diverged = different_cart_with_same_identifier(
            self.context.reservations.as_ref(),
            &data,
            identifier,
            false,
            data.expiration,
            self.context.clock.now(),
        )
        .await?;

        Ok((!diverged).then_some((data, records)))
    }

    /// Write the pending rows of a checkout and reserve the cart under its identifier.
    ///
    /// A reserved checkout is picked up again while its cart is unchanged; otherwise its
    /// pending rows are aborted and a new identifier is drawn.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::StepIncomplete`] or [`CheckoutError::StepsNotViewed`] when the
    /// wizard is not done, [`CheckoutError::EmptyCart`] for an empty cart, or a storage error.
    pub async fn prepare_checkout(&self) -> Result<PreparedCheckout, CheckoutError> {
        let manager = CheckoutManager::new(self.context, self.userid);

        if self.enforce_steps {
            manager.ensure_valid().await?;
        }

        let country = manager.billing_country().await?;
        let country = country.as_deref();

        let reserved = self
            .context
            .reservations
            .get_reservation(self.userid)
            .await?
            .and_then(|reservation| reservation.identifier);

        if let Some(identifier) = reserved {
            if let Some((data, records)) = self.reusable(identifier, country).await? {
                debug!(userid = self.userid, identifier, "reusing checkout");

                return Ok(PreparedCheckout {
                    identifier,
                    data,
                    records,
                    reused: true,
                });
            }

            let aborted = self.context.history.abort_pending(identifier).await?;
            self.context.reservations.delete_reservation(self.userid).await?;

            info!(
                userid = self.userid,
                identifier,
                rows = aborted.len(),
                "replaced stale checkout"
            );
        }

        let identifier = self.context.history.next_identifier().await?;
        let data = self.data_for(country, Some(identifier)).await?;

        if data.items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let credits = if data.use_credit {
            let prices: Vec<Decimal> = data.items.iter().map(|line| line.price).collect();
            allocate_credits(&prices, data.deductible)
        } else {
            vec![Decimal::ZERO; data.items.len()]
        };

        let rows = data
            .items
            .iter()
            .zip(credits)
            .map(|(line, credit)| {
                let mut row = NewHistoryRecord::from_line(line, identifier, self.userid, self.actor);
                row.credits = credit;
                row.use_credit = data.use_credit;
                row
            })
            .collect();

        let records = self.context.history.create_pending(rows).await?;

        let reserved = self
            .context
            .reservations
            .save_reservation(
                NewReservation {
                    userid: self.userid,
                    identifier: Some(identifier),
                    data: serde_json::to_value(&data)?,
                    expires_at: data.expiration,
                },
                self.context.clock.now(),
            )
            .await?;

        info!(
            userid = self.userid,
            identifier,
            rows = records.len(),
            price = %data.price,
            reserved,
            "checkout prepared"
        );

        Ok(PreparedCheckout {
            identifier,
            data,
            records,
            reused: false,
        })
    }

    /// Complete a checkout paid entirely from the credit balance, returning its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::NotCoveredByCredits`] when anything is left to pay, or any error
    /// of preparation and delivery.
    pub async fn checkout_with_credits(&self) -> Result<u64, CheckoutError> {
        let prepared = self.prepare_checkout().await?;

        if prepared.data.price > Decimal::ZERO {
            return Err(CheckoutError::NotCoveredByCredits {
                price: prepared.data.price,
            });
        }

        PaymentService::new(self.context)
            .deliver(Delivery {
                identifier: prepared.identifier,
                userid: self.userid,
                actor: self.actor,
                method: PaymentMethod::Credits,
                reference: None,
                account_id: None,
            })
            .await?;

        Ok(prepared.identifier)
    }

    /// Give up on a checkout: its pending rows become aborted and the wizard starts over.
    ///
    /// The cart itself is kept.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::NotOwned`] for someone else's checkout, or a storage error.
    pub async fn abort_checkout(&self, identifier: u64) -> Result<Vec<HistoryRecord>, CheckoutError> {
        let records = self.context.history.list_for_identifier(identifier).await?;

        if records.iter().any(|record| record.userid != self.userid) {
            return Err(CheckoutError::NotOwned {
                identifier,
                userid: self.userid,
            });
        }

        let aborted = self.context.history.abort_pending(identifier).await?;

        for record in aborted.iter().filter(|record| !record.is_pseudo()) {
            self.context
                .events
                .trigger(DomainEvent::item_not_bought(
                    self.actor,
                    self.userid,
                    &record.to_cart_item(),
                    identifier,
                ))
                .await;
        }

        let reserved = self
            .context
            .reservations
            .get_reservation(self.userid)
            .await?
            .is_some_and(|reservation| reservation.identifier == Some(identifier));

        if reserved {
            self.context.reservations.delete_reservation(self.userid).await?;
        }

        CheckoutManager::new(self.context, self.userid).reset().await?;

        info!(userid = self.userid, identifier, rows = aborted.len(), "checkout aborted");

        Ok(aborted)
    }
}
