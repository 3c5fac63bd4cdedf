//! Cart

use jiff::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{items::CartItem, pricing::total_price};

/// Cache-resident state of one user's cart.
///
/// Items are unique by [`CartItem::cache_key`]; inserting an item whose key is already present
/// replaces the existing entry in place, so insertion order is kept for display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CartSnapshot {
    items: Vec<CartItem>,

    /// Point in time after which the whole cart is wiped.
    #[serde(default)]
    pub expiration: Option<Timestamp>,

    /// Whether the user chose to pay with their credit balance; `None` until decided.
    #[serde(default)]
    pub use_credit: Option<bool>,
}

impl CartSnapshot {
    /// Create an empty cart.
    pub fn new() -> Self {
        Self::default()
    }

    /// All items in insertion order.
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Items that are neither fees, credits nor rebook markers.
    pub fn regular_items(&self) -> impl Iterator<Item = &CartItem> {
        self.items.iter().filter(|item| !item.is_pseudo())
    }

    /// Rebook markers held in the cart.
    pub fn rebook_markers(&self) -> impl Iterator<Item = &CartItem> {
        self.items.iter().filter(|item| item.is_rebook_marker())
    }

    /// Number of items counted against the cart capacity.
    pub fn regular_count(&self) -> usize {
        self.regular_items().count()
    }

    /// Look up an item by key.
    pub fn get(&self, key: &str) -> Option<&CartItem> {
        self.items.iter().find(|item| item.cache_key() == key)
    }

    /// Whether an item with the given key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert an item, replacing any item with the same key. Returns the replaced item.
    pub fn insert(&mut self, item: CartItem) -> Option<CartItem> {
        let key = item.cache_key();

        match self.items.iter_mut().find(|existing| existing.cache_key() == key) {
            Some(existing) => Some(std::mem::replace(existing, item)),
            None => {
                self.items.push(item);
                None
            }
        }
    }

    /// Insert an item in front of all others, replacing any item with the same key.
    pub fn insert_first(&mut self, item: CartItem) -> Option<CartItem> {
        let replaced = self.remove(&item.cache_key());
        self.items.insert(0, item);
        replaced
    }

    /// Remove an item by key.
    pub fn remove(&mut self, key: &str) -> Option<CartItem> {
        let position = self.items.iter().position(|item| item.cache_key() == key)?;

        Some(self.items.remove(position))
    }

    /// Whether the cart holds no items at all.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether every remaining item is a fee or credit line maintained by the cart.
    pub fn has_only_fee_or_credit_lines(&self) -> bool {
        !self.items.is_empty() && self.items.iter().all(CartItem::is_fee_or_credit)
    }

    /// Drop all items and the expiration.
    pub fn clear(&mut self) {
        self.items.clear();
        self.expiration = None;
    }

    /// Whether the cart expired before `now`.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expiration.is_some_and(|expiration| expiration < now)
    }

    /// Wipe the cart if it expired before `now`. Returns whether it was wiped.
    pub fn expire_if_due(&mut self, now: Timestamp) -> bool {
        if self.is_expired(now) {
            self.clear();
            return true;
        }

        false
    }

    /// Sum of all item prices.
    pub fn total(&self) -> Decimal {
        total_price(&self.items)
    }

    /// Sum of the prices of regular items.
    pub fn regular_total(&self) -> Decimal {
        total_price(self.regular_items())
    }
}

#[cfg(test)]
mod tests {
    use jiff::SignedDuration;
    use rust_decimal_macros::dec;
    use testresult::TestResult;

    use super::*;

    fn course(id: u64, price: Decimal) -> CartItem {
        CartItem::new("mod_booking", "option", id, format!("Course {id}"), price, "EUR")
    }

    #[test]
    fn inserting_same_key_twice_keeps_one_entry() {
        let mut cart = CartSnapshot::new();

        cart.insert(course(1, dec!(10)));
        let replaced = cart.insert(course(1, dec!(12)));

        assert_eq!(cart.items().len(), 1);
        assert_eq!(replaced.map(|item| item.price), Some(dec!(10)));
        assert_eq!(cart.total(), dec!(12));
    }

    #[test]
    fn insert_first_puts_item_in_front() {
        let mut cart = CartSnapshot::new();

        cart.insert(course(1, dec!(10)));
        cart.insert_first(CartItem::booking_fee(dec!(2), "EUR"));

        assert!(cart.items().first().is_some_and(CartItem::is_fee_or_credit));
        assert_eq!(cart.regular_count(), 1);
    }

    #[test]
    fn fee_only_cart_is_detected() {
        let mut cart = CartSnapshot::new();

        cart.insert(CartItem::booking_fee(dec!(2), "EUR"));
        assert!(cart.has_only_fee_or_credit_lines());

        cart.insert(course(1, dec!(10)));
        assert!(!cart.has_only_fee_or_credit_lines());
    }

    #[test]
    fn empty_cart_is_not_fee_only() {
        assert!(!CartSnapshot::new().has_only_fee_or_credit_lines());
    }

    #[test]
    fn expire_if_due_wipes_items_and_expiration() -> TestResult {
        let now = Timestamp::UNIX_EPOCH.checked_add(SignedDuration::from_hours(1))?;
        let mut cart = CartSnapshot::new();

        cart.insert(course(1, dec!(10)));
        cart.expiration = Some(Timestamp::UNIX_EPOCH);

        assert!(cart.expire_if_due(now));
        assert!(cart.is_empty());
        assert_eq!(cart.expiration, None);

        Ok(())
    }

    #[test]
    fn expiration_in_the_future_keeps_items() {
        let mut cart = CartSnapshot::new();

        cart.insert(course(1, dec!(10)));
        cart.expiration = Some(Timestamp::MAX);

        assert!(!cart.expire_if_due(Timestamp::UNIX_EPOCH));
        assert_eq!(cart.items().len(), 1);
    }
}
