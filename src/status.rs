//! Cart Status Codes

use serde::{Deserialize, Serialize};

/// Outcome of trying to add an item to a cart.
///
/// Every value except [`CartStatus::Success`] is a business-rule rejection the caller is
/// expected to branch on; none of them are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CartStatus {
    /// The item could not be added for an unspecified reason.
    Error,

    /// The item was added.
    Success,

    /// The cart already holds the maximum number of items.
    CartIsFull,

    /// The item belongs to a different cost center than the items already in the cart.
    CostCenter,

    /// The item has no places left.
    FullyBooked,

    /// The user already booked this item.
    AlreadyBooked,

    /// The item is already in the cart.
    AlreadyInCart,
}

impl CartStatus {
    /// Numeric code used on the wire.
    pub const fn code(self) -> u8 {
        match self {
            Self::Error => 0,
            Self::Success => 1,
            Self::CartIsFull => 2,
            Self::CostCenter => 3,
            Self::FullyBooked => 4,
            Self::AlreadyBooked => 5,
            Self::AlreadyInCart => 6,
        }
    }

    /// Status for a numeric code; unknown codes map to [`CartStatus::Error`].
    pub const fn from_code(code: u8) -> Self {
        match code {
            1 => Self::Success,
            2 => Self::CartIsFull,
            3 => Self::CostCenter,
            4 => Self::FullyBooked,
            5 => Self::AlreadyBooked,
            6 => Self::AlreadyInCart,
            _ => Self::Error,
        }
    }

    /// Whether the item was added.
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Message shown next to the rejected item.
    pub const fn message(self) -> &'static str {
        match self {
            Self::Error => "The item could not be added to your cart.",
            Self::Success => "The item was added to your cart.",
            Self::CartIsFull => "Your cart is full.",
            Self::CostCenter => "Items from different cost centers cannot be bought together.",
            Self::FullyBooked => "This item is fully booked.",
            Self::AlreadyBooked => "You have already booked this item.",
            Self::AlreadyInCart => "This item is already in your cart.",
        }
    }
}
