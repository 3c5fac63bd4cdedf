//! Credits
//!
//! Per-user credit balance kept as append-only rows, each carrying the running balance.

pub mod errors;
pub mod models;
pub(crate) mod repository;
pub mod service;

pub use errors::CreditsServiceError;
pub use service::*;
