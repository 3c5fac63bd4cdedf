//! Cart store errors.

use shopcart::pricing::PricingError;
use thiserror::Error;

use crate::{
    cache::CacheError,
    catalog::CatalogError,
    domain::{credits::CreditsServiceError, history::HistoryServiceError, ledger::LedgerServiceError},
    tasks::TaskError,
};

/// Message shown to users for every failure that is not theirs to fix.
pub const GENERIC_ERROR_MESSAGE: &str =
    "Something went wrong. Please contact an administrator.";

#[derive(Debug, Error)]
pub enum CartStoreError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    History(#[from] HistoryServiceError),

    #[error(transparent)]
    Ledger(#[from] LedgerServiceError),

    #[error(transparent)]
    Credits(#[from] CreditsServiceError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error("cart expiration out of range")]
    Time(#[from] jiff::Error),

    #[error("history row {history_id} does not belong to user {userid}")]
    NotOwned { history_id: u64, userid: u64 },

    #[error("history row {0} has no open installment")]
    NoOpenInstallment(u64),
}

impl CartStoreError {
    /// Text safe to show to the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NoOpenInstallment(_) => "There is no open installment left to pay.",
            _ => GENERIC_ERROR_MESSAGE,
        }
    }
}
