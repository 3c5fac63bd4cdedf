//! Credits Models

use std::{fmt, str::FromStr};

use jiff::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a credit balance moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditReason {
    /// Refund of a cancelled purchase.
    Cancellation,

    /// Credit spent on a checkout.
    Checkout,

    /// Balance paid out by a cashier.
    PaidBack,

    /// Manual booking by a cashier.
    Manual,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown credit reason {0:?}")]
pub struct UnknownCreditReason(pub String);

impl CreditReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cancellation => "cancellation",
            Self::Checkout => "checkout",
            Self::PaidBack => "paid_back",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for CreditReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CreditReason {
    type Err = UnknownCreditReason;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "cancellation" => Ok(Self::Cancellation),
            "checkout" => Ok(Self::Checkout),
            "paid_back" => Ok(Self::PaidBack),
            "manual" => Ok(Self::Manual),
            other => Err(UnknownCreditReason(other.to_string())),
        }
    }
}

/// Credit Model
#[derive(Debug, Clone, PartialEq)]
pub struct CreditRecord {
    pub id: u64,
    pub userid: u64,
    pub amount: Decimal,

    /// Balance after this row.
    pub balance: Decimal,
    pub currency: String,
    pub reason: CreditReason,
    pub identifier: Option<u64>,
    pub created_by: u64,
    pub created_at: Timestamp,
}

/// New Credit Model
#[derive(Debug, Clone, PartialEq)]
pub struct NewCredit {
    pub userid: u64,

    /// Signed; negative amounts spend credit.
    pub amount: Decimal,
    pub currency: String,
    pub reason: CreditReason,
    pub identifier: Option<u64>,
    pub created_by: u64,
}
