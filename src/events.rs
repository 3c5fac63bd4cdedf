//! Domain events
//!
//! Fire-and-forget notifications about cart and payment state changes.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{items::CartItem, payments::PaymentMethod};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ItemAdded,
    ItemDeleted,
    ItemExpired,
    ItemBought,
    ItemNotBought,
    ItemCanceled,
    PaymentAdded,
    PaymentConfirmed,
    CheckoutCompleted,
}

impl EventKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::ItemAdded => "item_added",
            Self::ItemDeleted => "item_deleted",
            Self::ItemExpired => "item_expired",
            Self::ItemBought => "item_bought",
            Self::ItemNotBought => "item_not_bought",
            Self::ItemCanceled => "item_canceled",
            Self::PaymentAdded => "payment_added",
            Self::PaymentConfirmed => "payment_confirmed",
            Self::CheckoutCompleted => "checkout_completed",
        }
    }
}

/// Event specific details.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
}

/// A domain event.
///
/// `userid` is the acting user, `relateduserid` the user the event is about (they differ when a
/// cashier acts for someone else).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub kind: EventKind,
    pub userid: u64,
    pub relateduserid: u64,
    pub other: EventDetails,
}

impl DomainEvent {
    pub fn new(kind: EventKind, userid: u64, relateduserid: u64, other: EventDetails) -> Self {
        Self {
            kind,
            userid,
            relateduserid,
            other,
        }
    }

    fn for_item(kind: EventKind, userid: u64, relateduserid: u64, item: &CartItem) -> Self {
        Self::new(
            kind,
            userid,
            relateduserid,
            EventDetails {
                item_id: Some(item.item_id),
                component: Some(item.component.clone()),
                area: Some(item.area.clone()),
                ..EventDetails::default()
            },
        )
    }

    pub fn item_added(userid: u64, relateduserid: u64, item: &CartItem) -> Self {
        Self::for_item(EventKind::ItemAdded, userid, relateduserid, item)
    }

    pub fn item_deleted(userid: u64, relateduserid: u64, item: &CartItem) -> Self {
        Self::for_item(EventKind::ItemDeleted, userid, relateduserid, item)
    }

    pub fn item_expired(relateduserid: u64, item: &CartItem) -> Self {
        Self::for_item(EventKind::ItemExpired, 0, relateduserid, item)
    }

    pub fn item_bought(userid: u64, relateduserid: u64, item: &CartItem, identifier: u64) -> Self {
        let mut event = Self::for_item(EventKind::ItemBought, userid, relateduserid, item);
        event.other.identifier = Some(identifier);
        event
    }

    pub fn item_not_bought(
        userid: u64,
        relateduserid: u64,
        item: &CartItem,
        identifier: u64,
    ) -> Self {
        let mut event = Self::for_item(EventKind::ItemNotBought, userid, relateduserid, item);
        event.other.identifier = Some(identifier);
        event
    }

    pub fn item_canceled(userid: u64, relateduserid: u64, item: &CartItem, credit: Decimal) -> Self {
        let mut event = Self::for_item(EventKind::ItemCanceled, userid, relateduserid, item);
        event.other.amount = Some(credit);
        event
    }

    pub fn payment_added(
        userid: u64,
        relateduserid: u64,
        identifier: u64,
        method: PaymentMethod,
        amount: Decimal,
    ) -> Self {
        Self::new(
            EventKind::PaymentAdded,
            userid,
            relateduserid,
            EventDetails {
                identifier: Some(identifier),
                payment_method: Some(method),
                amount: Some(amount),
                ..EventDetails::default()
            },
        )
    }

    pub fn payment_confirmed(
        userid: u64,
        relateduserid: u64,
        identifier: u64,
        method: PaymentMethod,
    ) -> Self {
        Self::new(
            EventKind::PaymentConfirmed,
            userid,
            relateduserid,
            EventDetails {
                identifier: Some(identifier),
                payment_method: Some(method),
                ..EventDetails::default()
            },
        )
    }

    pub fn checkout_completed(userid: u64, relateduserid: u64, identifier: u64) -> Self {
        Self::new(
            EventKind::CheckoutCompleted,
            userid,
            relateduserid,
            EventDetails {
                identifier: Some(identifier),
                ..EventDetails::default()
            },
        )
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}
