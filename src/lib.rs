//! Shopcart
//!
//! Shopcart is the pure domain core of a shopping cart, checkout and payment ledger engine:
//! cart snapshots, the ordered price modifier pipeline, rebooking and credit arithmetic,
//! reservation divergence checks and the vocabulary shared with the service layer.

pub mod cart;
pub mod data;
pub mod events;
pub mod invoices;
pub mod items;
pub mod modifiers;
pub mod payments;
pub mod prelude;
pub mod pricing;
pub mod rebooking;
pub mod reservation;
pub mod settings;
pub mod status;
pub mod taxes;
pub mod vat;
