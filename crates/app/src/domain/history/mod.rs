//! History
//!
//! One row per purchased or pending item of a checkout. Rows are created pending when a
//! checkout is prepared and move once to success, aborted or canceled.

pub mod errors;
pub mod models;
pub(crate) mod repository;
pub mod service;

pub use errors::HistoryServiceError;
pub use service::*;
