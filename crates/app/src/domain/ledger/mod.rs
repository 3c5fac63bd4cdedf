//! Ledger
//!
//! Append-only record of every financial event. Rows are inserted once per
//! `(identifier, item, kind)` and never updated.

pub mod errors;
pub mod models;
pub(crate) mod repository;
pub mod service;

pub use errors::LedgerServiceError;
pub use service::*;
