//! Reservations
//!
//! Durable copy of the cart projection a checkout was prepared from, one per user.

pub mod errors;
pub mod models;
pub(crate) mod repository;
pub mod service;

pub use errors::ReservationsServiceError;
pub use service::*;
