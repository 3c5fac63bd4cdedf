//! Payment errors.

use shopcart::payments::PaymentMethod;
use thiserror::Error;

use crate::{
    cache::CacheError,
    cart::{CartStoreError, GENERIC_ERROR_MESSAGE},
    catalog::CatalogError,
    domain::{
        accounting::AccountingError, history::HistoryServiceError,
        reservations::ReservationsServiceError,
    },
};

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("no checkout with identifier {0}")]
    UnknownIdentifier(u64),

    #[error("unknown payment area {0}")]
    UnknownPaymentArea(String),

    #[error("checkout {identifier} does not belong to user {userid}")]
    NotOwned { identifier: u64, userid: u64 },

    #[error("{0:?} cannot be used here")]
    InvalidMethod(PaymentMethod),

    #[error(transparent)]
    History(#[from] HistoryServiceError),

    #[error(transparent)]
    Accounting(#[from] AccountingError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Cart(#[from] CartStoreError),

    #[error(transparent)]
    Reservations(#[from] ReservationsServiceError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl PaymentError {
    /// Text safe to show to the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidMethod(_) | Self::Accounting(AccountingError::InvalidMethod(_)) => {
                "This payment method is not available here."
            }
            Self::Accounting(AccountingError::NothingToPayBack) => {
                "There is no credit left to pay back."
            }
            Self::Accounting(AccountingError::NotCancelable(_)) => {
                "This purchase cannot be cancelled."
            }
            Self::Cart(error) => error.user_message(),
            _ => GENERIC_ERROR_MESSAGE,
        }
    }
}
