//! Address Models

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Address Model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: u64,
    pub userid: u64,
    pub name: String,
    pub street: String,
    pub zip: String,
    pub city: String,

    /// ISO 3166 alpha-2 code.
    pub country: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// New Address Model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAddress {
    pub userid: u64,
    pub name: String,
    pub street: String,
    pub zip: String,
    pub city: String,
    pub country: String,
}

/// Address Update Model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressUpdate {
    pub name: String,
    pub street: String,
    pub zip: String,
    pub city: String,
    pub country: String,
}
