//! Shop services: carts, checkout, payments and the purchase ledger, with `PostgreSQL` and
//! in-memory persistence.

pub mod cache;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod clock;
pub mod config;
pub mod context;
pub mod database;
pub mod domain;
pub mod events;
pub mod invoicing;
pub mod memory;
pub mod observability;
pub mod payments;
pub mod tasks;
pub mod vat;

#[cfg(test)]
mod test;

