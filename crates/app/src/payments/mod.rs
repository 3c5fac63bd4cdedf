//! Payments
//!
//! The contract a payment gateway calls ([`PaymentService`]) and the cashier desk
//! ([`CashierService`]). Both confirm checkouts through the same delivery path.

mod cashier;
mod errors;
mod service;

pub use cashier::CashierService;
pub use errors::PaymentError;
pub use service::{Delivery, PAYMENT_AREA, Payable, PaymentService};
