//! Prices

use jiff::Timestamp;
use rust_decimal::{Decimal, RoundingStrategy};
use rusty_money::{Money, iso};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::items::CartItem;

/// Errors that can occur while working with prices.
#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    /// The currency code is not a known ISO 4217 code.
    #[error("unknown currency code {0}")]
    UnknownCurrency(String),

    /// An item's currency differs from the cart currency (item key, item currency, cart currency).
    #[error("item {0} has currency {1}, but cart has currency {2}")]
    CurrencyMismatch(String, String, String),

    /// The installment index does not exist in the plan.
    #[error("installment {0} does not exist")]
    InstallmentNotFound(usize),

    /// The installment was already paid.
    #[error("installment {0} is already paid")]
    InstallmentAlreadyPaid(usize),
}

/// Round an amount to cents, half away from zero.
pub fn round_price(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Calculates the total price of a list of items.
pub fn total_price<'a>(items: impl IntoIterator<Item = &'a CartItem>) -> Decimal {
    round_price(items.into_iter().map(|item| item.price).sum())
}

/// Ensures every item is priced in `currency`.
///
/// # Errors
///
/// Returns [`PricingError::CurrencyMismatch`] for the first offending item.
pub fn ensure_currency<'a>(
    items: impl IntoIterator<Item = &'a CartItem>,
    currency: &str,
) -> Result<(), PricingError> {
    items.into_iter().try_for_each(|item| {
        if item.currency.eq_ignore_ascii_case(currency) {
            Ok(())
        } else {
            Err(PricingError::CurrencyMismatch(
                item.cache_key(),
                item.currency.clone(),
                currency.to_string(),
            ))
        }
    })
}

/// Look up an ISO currency by code.
///
/// # Errors
///
/// Returns [`PricingError::UnknownCurrency`] when the code is unknown.
pub fn find_currency(code: &str) -> Result<&'static iso::Currency, PricingError> {
    iso::find(&code.to_ascii_uppercase()).ok_or_else(|| PricingError::UnknownCurrency(code.to_string()))
}

/// Formats an amount in the given currency for display.
///
/// # Errors
///
/// Returns [`PricingError::UnknownCurrency`] when the code is unknown.
pub fn format_price(amount: Decimal, currency: &str) -> Result<String, PricingError> {
    let currency = find_currency(currency)?;

    Ok(Money::from_decimal(round_price(amount), currency).to_string())
}

/// One scheduled installment of an installment plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentPayment {
    pub due: Timestamp,
    pub amount: Decimal,
    #[serde(default)]
    pub paid_at: Option<Timestamp>,
}

impl InstallmentPayment {
    /// Whether this installment has been paid.
    pub fn is_paid(&self) -> bool {
        self.paid_at.is_some()
    }
}

/// Down payment plus scheduled installments for one purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentPlan {
    pub down_payment: Decimal,
    pub payments: Vec<InstallmentPayment>,
}

impl InstallmentPlan {
    /// Sum of all installments not paid yet.
    pub fn open_amount(&self) -> Decimal {
        self.payments
            .iter()
            .filter(|payment| !payment.is_paid())
            .map(|payment| payment.amount)
            .sum()
    }

    /// Index of the earliest unpaid installment.
    pub fn next_open(&self) -> Option<usize> {
        self.payments.iter().position(|payment| !payment.is_paid())
    }

    /// The installment at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::InstallmentNotFound`] when the index is out of range.
    pub fn payment(&self, index: usize) -> Result<&InstallmentPayment, PricingError> {
        self.payments
            .get(index)
            .ok_or(PricingError::InstallmentNotFound(index))
    }

    /// Marks the installment at `index` as paid.
    ///
    /// # Errors
    ///
    /// Returns an error when the index does not exist or was already paid.
    pub fn mark_paid(&mut self, index: usize, at: Timestamp) -> Result<(), PricingError> {
        let payment = self
            .payments
            .get_mut(index)
            .ok_or(PricingError::InstallmentNotFound(index))?;

        if payment.is_paid() {
            return Err(PricingError::InstallmentAlreadyPaid(index));
        }

        payment.paid_at = Some(at);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use testresult::TestResult;

    use super::*;

    fn item(price: Decimal, currency: &str) -> CartItem {
        CartItem::new("mod_booking", "option", 1, "Course", price, currency)
    }

    #[test]
    fn test_total_price() {
        let items = [item(dec!(10.005), "EUR"), item(dec!(2), "EUR")];

        assert_eq!(total_price(&items), dec!(12.01));
    }

    #[test]
    fn test_total_price_empty() {
        let items: [CartItem; 0] = [];

        assert_eq!(total_price(&items), Decimal::ZERO);
    }

    #[test]
    fn ensure_currency_reports_mismatch() {
        let items = [item(dec!(1), "EUR"), item(dec!(1), "USD")];

        assert!(matches!(
            ensure_currency(&items, "EUR"),
            Err(PricingError::CurrencyMismatch(_, currency, _)) if currency == "USD"
        ));
    }

    #[test]
    fn unknown_currency_is_rejected() {
        assert!(matches!(
            format_price(dec!(1), "XXQ"),
            Err(PricingError::UnknownCurrency(_))
        ));
    }

    #[test]
    fn marking_installments_paid() -> TestResult {
        let mut plan = InstallmentPlan {
            down_payment: dec!(40),
            payments: vec![
                InstallmentPayment {
                    due: Timestamp::UNIX_EPOCH,
                    amount: dec!(30),
                    paid_at: None,
                },
                InstallmentPayment {
                    due: Timestamp::UNIX_EPOCH,
                    amount: dec!(30),
                    paid_at: None,
                },
            ],
        };

        plan.mark_paid(0, Timestamp::UNIX_EPOCH)?;

        assert_eq!(plan.open_amount(), dec!(30));
        assert_eq!(
            plan.mark_paid(0, Timestamp::UNIX_EPOCH),
            Err(PricingError::InstallmentAlreadyPaid(0))
        );
        assert_eq!(
            plan.mark_paid(5, Timestamp::UNIX_EPOCH),
            Err(PricingError::InstallmentNotFound(5))
        );

        Ok(())
    }
}
