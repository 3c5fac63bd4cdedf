//! Invoices
//!
//! Invoice numbers issued per checkout, one per identifier.

pub mod errors;
pub mod models;
pub(crate) mod repository;
pub mod service;

pub use errors::InvoicesServiceError;
pub use service::*;
