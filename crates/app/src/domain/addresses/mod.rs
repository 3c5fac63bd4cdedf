//! Addresses
//!
//! Billing addresses of a user. The country of the selected address drives tax lookup.

pub mod errors;
pub mod models;
pub(crate) mod repository;
pub mod service;

pub use errors::AddressesServiceError;
pub use service::*;
