//! Reservation Models

use jiff::Timestamp;
use serde_json::Value;

/// Reservation Model
#[derive(Debug, Clone, PartialEq)]
pub struct ReservationRecord {
    pub userid: u64,

    /// Checkout identifier; `None` until the reservation is bound to a checkout.
    pub identifier: Option<u64>,
    pub data: Value,
    pub expires_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl ReservationRecord {
    /// Bound reservations are never overwritten by a save; they have to be deleted first.
    pub fn is_bound(&self) -> bool {
        self.identifier.is_some()
    }
}

/// New Reservation Model
#[derive(Debug, Clone, PartialEq)]
pub struct NewReservation {
    pub userid: u64,
    pub identifier: Option<u64>,
    pub data: Value,
    pub expires_at: Option<Timestamp>,
}
