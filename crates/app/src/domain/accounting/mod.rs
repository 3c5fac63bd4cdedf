//! Accounting
//!
//! State changes that touch history, ledger and credits together. Each operation runs in one
//! transaction, so a confirmed history row always has its ledger row.

pub mod errors;
pub mod models;
pub mod service;

pub use errors::AccountingError;
pub use service::*;
