//! Durable checkout state

pub mod accounting;
pub mod addresses;
pub mod credits;
pub mod history;
pub mod invoices;
pub mod ledger;
pub mod reservations;
