//! Cashier desk
//!
//! Payments taken in person on behalf of a user, cancellations with refund credit, and paying
//! out credit balances.

use rust_decimal::Decimal;
use shopcart::{
    events::DomainEvent,
    payments::{PaymentMethod, PaymentStatus},
    rebooking::{cancellation_credit, consumed_fraction},
};
use tracing::info;

use crate::{
    checkout::{CheckoutError, CheckoutService},
    context::ShopContext,
    domain::accounting::{
        AccountingError,
        models::{CancelPurchase, Cancellation, PaidBack, PayBack},
    },
};

use super::{Delivery, PaymentError, PaymentService};

#[derive(Debug, Clone, Copy)]
pub struct CashierService<'a> {
    context: &'a ShopContext,
    cashier: u64,
}

impl<'a> CashierService<'a> {
    pub fn new(context: &'a ShopContext, cashier: u64) -> Self {
        Self { context, cashier }
    }

    /// Check out `userid`'s cart, paid at the desk with `method`. Returns the identifier.
    ///
    /// # Errors
    ///
    /// Returns an error when `method` is not a cashier method, the cart is empty, or a backend
    /// fails.
    pub async fn confirm_payment(
        &self,
        userid: u64,
        method: PaymentMethod,
        reference: Option<String>,
    ) -> Result<u64, CheckoutError> {
        if !method.is_cashier_method() {
            return Err(PaymentError::InvalidMethod(method).into());
        }

        let prepared = CheckoutService::at_cashier(self.context, userid, self.cashier)
            .prepare_checkout()
            .await?;

        self.context
            .events
            .trigger(DomainEvent::payment_added(
                self.cashier,
                userid,
                prepared.identifier,
                method,
                prepared.data.price,
            ))
            .await;

        PaymentService::new(self.context)
            .deliver(Delivery {
                identifier: prepared.identifier,
                userid,
                actor: self.cashier,
                method,
                reference,
                account_id: None,
            })
            .await?;

        Ok(prepared.identifier)
    }

    /// Cancel a paid purchase and refund its credit to the user's balance.
    ///
    /// `fee` defaults to the configured cancellation fee. With consumption-based credits the
    /// refund shrinks with the part of the service period already over.
    ///
    /// # Errors
    ///
    /// Returns an error when the purchase is not paid, or a backend fails.
    pub async fn cancel_purchase(
        &self,
        history_id: u64,
        fee: Option<Decimal>,
        annotation: Option<String>,
    ) -> Result<Cancellation, PaymentError> {
        let settings = &self.context.settings;
        let record = self.context.history.get(history_id).await?;

        if record.payment_status != PaymentStatus::Success {
            return Err(AccountingError::NotCancelable(record.payment_status).into());
        }

        let fee = fee.unwrap_or(settings.cancellation_fee).max(Decimal::ZERO);
        let consumed = settings.calculate_consumption.then(|| {
            consumed_fraction(
                record.service_period_start,
                record.service_period_end,
                self.context.clock.now(),
            )
        });
        let credit = cancellation_credit(record.price, fee, consumed);

        let cancellation = self
            .context
            .accounting
            .cancel_purchase(CancelPurchase {
                history_id,
                fee,
                credit,
                refund_to_balance: true,
                canceled_by: self.cashier,
                annotation,
            })
            .await?;

        if !record.is_pseudo() {
            self.context
                .catalog
                .provider(&record.component)?
                .cancel_purchase(&record.area, record.item_id, record.userid)
                .await?;
        }

        self.context
            .events
            .trigger(DomainEvent::item_canceled(
                self.cashier,
                record.userid,
                &record.to_cart_item(),
                credit,
            ))
            .await;

        info!(history_id, cashier = self.cashier, %fee, %credit, "purchase cancelled at the desk");

        Ok(cancellation)
    }

    /// Pay out `userid`'s whole credit balance in cash or by transfer.
    ///
    /// # Errors
    ///
    /// Returns an error for other methods, an empty balance, or a storage failure.
    pub async fn pay_back_credits(
        &self,
        userid: u64,
        method: PaymentMethod,
        annotation: Option<String>,
    ) -> Result<PaidBack, PaymentError> {
        if !method.is_pay_back() {
            return Err(PaymentError::InvalidMethod(method));
        }

        Ok(self
            .context
            .accounting
            .pay_back_credits(PayBack {
                userid,
                method,
                currency: self.context.settings.currency.clone(),
                paid_by: self.cashier,
                annotation,
            })
            .await?)
    }
}
