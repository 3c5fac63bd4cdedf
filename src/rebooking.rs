//! Rebooking and cancellation credits
//!
//! Pure arithmetic and checks behind rebooking a purchase onto another item and refunding
//! cancelled purchases as credit. The checks that need storage (the rolling rebooking count
//! and per-item catalog metadata) live in the service layer and run after [`RebookingPolicy::precheck`].

use jiff::{SignedDuration, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{items::is_pseudo_item, payments::PaymentStatus, pricing::round_price};

/// Why a purchase may not be rebooked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RebookingDenial {
    #[error("rebooking is disabled")]
    Disabled,

    #[error("fees, credits and rebookings themselves cannot be rebooked")]
    PseudoItem,

    #[error("the purchase is not paid or was cancelled")]
    NotPaid,

    #[error("the service period is over")]
    ServicePeriodOver,

    #[error("the item does not allow rebooking")]
    ItemDisallowed,

    #[error("the maximum number of rebookings in the period was reached")]
    LimitReached,
}

/// The facts about a purchase the rebooking checks look at.
#[derive(Debug, Clone, Copy)]
pub struct RebookCandidate<'a> {
    pub component: &'a str,
    pub area: &'a str,
    pub status: PaymentStatus,
    pub service_period_end: Option<Timestamp>,
}

/// Rebooking configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RebookingPolicy {
    pub enabled: bool,

    /// Rebookings allowed within the trailing period; zero means unlimited.
    pub max_number: u32,

    /// Length of the trailing period in days.
    pub period_days: u32,

    /// Fee retained from the refunded amount of a rebooked purchase.
    pub fee: Decimal,
}

impl Default for RebookingPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            max_number: 0,
            period_days: 30,
            fee: Decimal::ZERO,
        }
    }
}

impl RebookingPolicy {
    /// Checks that need no storage access, cheapest first.
    ///
    /// # Errors
    ///
    /// Returns the first [`RebookingDenial`] that applies.
    pub fn precheck(
        &self,
        candidate: &RebookCandidate<'_>,
        now: Timestamp,
    ) -> Result<(), RebookingDenial> {
        if !self.enabled {
            return Err(RebookingDenial::Disabled);
        }

        if is_pseudo_item(candidate.component, candidate.area) {
            return Err(RebookingDenial::PseudoItem);
        }

        if candidate.status != PaymentStatus::Success {
            return Err(RebookingDenial::NotPaid);
        }

        if candidate.service_period_end.is_some_and(|end| end < now) {
            return Err(RebookingDenial::ServicePeriodOver);
        }

        Ok(())
    }

    /// Start of the trailing window rebookings are counted in.
    ///
    /// # Errors
    ///
    /// Returns an error when the window start is out of the representable range.
    pub fn window_start(&self, now: Timestamp) -> Result<Timestamp, jiff::Error> {
        now.checked_sub(SignedDuration::from_hours(i64::from(self.period_days) * 24))
    }

    /// Whether another rebooking fits given the number already made in the window.
    pub fn within_limit(&self, rebookings_in_window: u64) -> bool {
        self.max_number == 0 || rebookings_in_window < u64::from(self.max_number)
    }

    /// Amount a rebooked purchase contributes towards the new one.
    pub fn refundable(&self, paid_price: Decimal) -> Decimal {
        round_price((paid_price - self.fee).max(Decimal::ZERO))
    }
}

/// Fraction of the service period consumed at `now`, clamped to `[0, 1]`.
///
/// Purchases without a complete service period count as unconsumed.
pub fn consumed_fraction(
    start: Option<Timestamp>,
    end: Option<Timestamp>,
    now: Timestamp,
) -> Decimal {
    let (Some(start), Some(end)) = (start, end) else {
        return Decimal::ZERO;
    };

    if now <= start {
        return Decimal::ZERO;
    }

    if now >= end || end <= start {
        return Decimal::ONE;
    }

    let total = Decimal::from(end.as_second() - start.as_second());
    let elapsed = Decimal::from(now.as_second() - start.as_second());

    (elapsed / total).clamp(Decimal::ZERO, Decimal::ONE)
}

/// Credit refunded when cancelling a purchase: the unconsumed part of the price minus the fee.
pub fn cancellation_credit(price: Decimal, fee: Decimal, consumed: Option<Decimal>) -> Decimal {
    let remaining = match consumed {
        Some(consumed) => price * (Decimal::ONE - consumed.clamp(Decimal::ZERO, Decimal::ONE)),
        None => price,
    };

    round_price((remaining - fee).max(Decimal::ZERO))
}

/// Credit granted for rebook markers, never more than the regular items cost.
pub fn rebooking_credit(refundables: impl IntoIterator<Item = Decimal>, regular_total: Decimal) -> Decimal {
    let refundable: Decimal = refundables.into_iter().sum();

    round_price(refundable.min(regular_total.max(Decimal::ZERO)).max(Decimal::ZERO))
}
