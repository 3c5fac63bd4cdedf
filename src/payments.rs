//! Payments
//!
//! Payment lifecycle states and methods shared by history and ledger rows.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pricing::round_price;

/// Errors raised while decoding stored payment values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaymentCodeError {
    #[error("unknown payment status code {0}")]
    UnknownStatus(i16),

    #[error("unknown payment method code {0}")]
    UnknownMethod(i16),

    #[error("unknown ledger entry kind {0}")]
    UnknownEntryKind(i16),
}

/// Lifecycle of a history row.
///
/// Rows start [`PaymentStatus::Pending`] and move once to one of the final states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Aborted,
    Success,
    Canceled,
}

impl PaymentStatus {
    pub const fn code(self) -> i16 {
        match self {
            Self::Pending => 0,
            Self::Aborted => 1,
            Self::Success => 2,
            Self::Canceled => 3,
        }
    }

    /// Decode a stored status.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentCodeError::UnknownStatus`] for codes outside the known set.
    pub const fn from_code(code: i16) -> Result<Self, PaymentCodeError> {
        match code {
            0 => Ok(Self::Pending),
            1 => Ok(Self::Aborted),
            2 => Ok(Self::Success),
            3 => Ok(Self::Canceled),
            other => Err(PaymentCodeError::UnknownStatus(other)),
        }
    }

    /// Whether the row may still move to another state.
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Success | Self::Aborted | Self::Canceled)
                | (Self::Success, Self::Canceled)
        )
    }
}

/// How a payment was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Online,
    Credits,
    CashierCash,
    CashierCreditCard,
    CashierDebitCard,
    CashierManual,
    CashierTransfer,
    CreditsPaidBackByCash,
    CreditsPaidBackByTransfer,
    CreditsCorrection,
}

impl PaymentMethod {
    pub const fn code(self) -> i16 {
        match self {
            Self::Online => 0,
            Self::Credits => 1,
            Self::CashierCash => 2,
            Self::CashierCreditCard => 3,
            Self::CashierDebitCard => 4,
            Self::CashierManual => 5,
            Self::CashierTransfer => 6,
            Self::CreditsPaidBackByCash => 7,
            Self::CreditsPaidBackByTransfer => 8,
            Self::CreditsCorrection => 9,
        }
    }

    /// Decode a stored method.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentCodeError::UnknownMethod`] for codes outside the known set.
    pub const fn from_code(code: i16) -> Result<Self, PaymentCodeError> {
        match code {
            0 => Ok(Self::Online),
            1 => Ok(Self::Credits),
            2 => Ok(Self::CashierCash),
            3 => Ok(Self::CashierCreditCard),
            4 => Ok(Self::CashierDebitCard),
            5 => Ok(Self::CashierManual),
            6 => Ok(Self::CashierTransfer),
            7 => Ok(Self::CreditsPaidBackByCash),
            8 => Ok(Self::CreditsPaidBackByTransfer),
            9 => Ok(Self::CreditsCorrection),
            other => Err(PaymentCodeError::UnknownMethod(other)),
        }
    }

    /// Whether a cashier may confirm a purchase with this method.
    pub const fn is_cashier_method(self) -> bool {
        matches!(
            self,
            Self::CashierCash
                | Self::CashierCreditCard
                | Self::CashierDebitCard
                | Self::CashierManual
                | Self::CashierTransfer
        )
    }

    /// Whether this method pays out a credit balance.
    pub const fn is_pay_back(self) -> bool {
        matches!(
            self,
            Self::CreditsPaidBackByCash | Self::CreditsPaidBackByTransfer
        )
    }
}

/// The financial event a ledger row records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryKind {
    Purchase,
    Cancellation,
    Correction,
}

impl LedgerEntryKind {
    pub const fn code(self) -> i16 {
        match self {
            Self::Purchase => 0,
            Self::Cancellation => 1,
            Self::Correction => 2,
        }
    }

    /// Decode a stored entry kind.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentCodeError::UnknownEntryKind`] for codes outside the known set.
    pub const fn from_code(code: i16) -> Result<Self, PaymentCodeError> {
        match code {
            0 => Ok(Self::Purchase),
            1 => Ok(Self::Cancellation),
            2 => Ok(Self::Correction),
            other => Err(PaymentCodeError::UnknownEntryKind(other)),
        }
    }
}

/// Spread a credit amount over item prices in order, never exceeding a price.
///
/// Returns the credit assigned to each price; whatever does not fit stays unassigned.
pub fn allocate_credits(prices: &[Decimal], credit: Decimal) -> Vec<Decimal> {
    let mut remaining = credit.max(Decimal::ZERO);

    prices
        .iter()
        .map(|price| {
            let share = remaining.min((*price).max(Decimal::ZERO));
            remaining -= share;
            round_price(share)
        })
        .collect()
}
