//! Accounting errors.

use shopcart::{
    payments::{PaymentMethod, PaymentStatus},
    pricing::PricingError,
};
use thiserror::Error;

use crate::domain::{
    credits::CreditsServiceError, history::HistoryServiceError, ledger::LedgerServiceError,
};

#[derive(Debug, Error)]
pub enum AccountingError {
    #[error("no history rows for identifier {0}")]
    UnknownIdentifier(u64),

    #[error("purchase in state {0:?} cannot be cancelled")]
    NotCancelable(PaymentStatus),

    #[error("{0:?} cannot be used here")]
    InvalidMethod(PaymentMethod),

    #[error("no credit balance to pay back")]
    NothingToPayBack,

    #[error(transparent)]
    History(#[from] HistoryServiceError),

    #[error(transparent)]
    Ledger(#[from] LedgerServiceError),

    #[error(transparent)]
    Credits(#[from] CreditsServiceError),

    #[error(transparent)]
    Installment(#[from] PricingError),

    #[error("storage error")]
    Sql(#[from] sqlx::Error),
}
