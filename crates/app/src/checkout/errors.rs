//! Checkout errors.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    cache::CacheError,
    cart::{CartStoreError, GENERIC_ERROR_MESSAGE},
    domain::{
        addresses::AddressesServiceError, history::HistoryServiceError,
        reservations::ReservationsServiceError,
    },
    payments::PaymentError,
    vat::VatError,
};

use super::StepKind;

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("mandatory checkout step {} is not complete", .0.name())]
    StepIncomplete(StepKind),

    #[error("not every checkout step was viewed")]
    StepsNotViewed,

    #[error("the cart is empty")]
    EmptyCart,

    #[error("{price} left to pay after credits")]
    NotCoveredByCredits { price: Decimal },

    #[error("checkout {identifier} does not belong to user {userid}")]
    NotOwned { identifier: u64, userid: u64 },

    #[error(transparent)]
    Cart(#[from] CartStoreError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    History(#[from] HistoryServiceError),

    #[error(transparent)]
    Reservations(#[from] ReservationsServiceError),

    #[error(transparent)]
    Addresses(#[from] AddressesServiceError),

    #[error(transparent)]
    Vat(#[from] VatError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error("checkout data could not be encoded")]
    Json(#[from] serde_json::Error),
}

impl CheckoutError {
    /// Message safe to show to the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::StepIncomplete(_) | Self::StepsNotViewed => {
                "Please complete all required checkout steps."
            }
            Self::EmptyCart => "Your shopping cart is empty.",
            Self::NotCoveredByCredits { .. } => "Your credit does not cover this purchase.",
            Self::Addresses(AddressesServiceError::NotOwned(_) | AddressesServiceError::NotFound) => {
                "The selected address is not available."
            }
            Self::Cart(error) => error.user_message(),
            Self::Payment(error) => error.user_message(),
            _ => GENERIC_ERROR_MESSAGE,
        }
    }
}
