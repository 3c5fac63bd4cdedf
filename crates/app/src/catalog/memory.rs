//! In-process catalog.

use async_trait::async_trait;
use rustc_hash::{FxHashMap, FxHashSet};
use shopcart::{items::CartItem, status::CartStatus};
use tokio::sync::RwLock;

use super::{CatalogError, CatalogProvider, UnloadOutcome};

#[derive(Debug, Clone)]
struct Offer {
    item: CartItem,
    places: Option<usize>,
    rebookable: bool,
    cascade: Vec<(String, String, u64)>,
}

#[derive(Debug, Default)]
struct CatalogState {
    offers: FxHashMap<(String, u64), Offer>,

    /// `(area, item id, user)` holding a provisional reservation.
    held: FxHashSet<(String, u64, u64)>,

    /// `(area, item id, user)` that bought the item.
    booked: FxHashSet<(String, u64, u64)>,
}

impl CatalogState {
    fn offer(&self, area: &str, item_id: u64) -> Result<&Offer, CatalogError> {
        self.offers
            .get(&(area.to_string(), item_id))
            .ok_or(CatalogError::ItemNotFound(item_id))
    }

    fn taken_by_others(&self, area: &str, item_id: u64, userid: u64) -> usize {
        self.held
            .iter()
            .chain(self.booked.iter())
            .filter(|(a, i, u)| a == area && *i == item_id && *u != userid)
            .count()
    }
}

/// Catalog of fixed items kept in memory, with optional place limits.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    state: RwLock<CatalogState>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer an item without a place limit.
    #[must_use]
    pub fn with_item(mut self, item: CartItem) -> Self {
        self.state.get_mut().offers.insert(
            (item.area.clone(), item.item_id),
            Offer {
                item,
                places: None,
                rebookable: true,
                cascade: Vec::new(),
            },
        );
        self
    }

    /// Limit an offered item to `places` bookings.
    #[must_use]
    pub fn with_places(mut self, area: &str, item_id: u64, places: usize) -> Self {
        if let Some(offer) = self.state.get_mut().offers.get_mut(&(area.to_string(), item_id)) {
            offer.places = Some(places);
        }
        self
    }

    #[must_use]
    pub fn without_rebooking(mut self, area: &str, item_id: u64) -> Self {
        if let Some(offer) = self.state.get_mut().offers.get_mut(&(area.to_string(), item_id)) {
            offer.rebookable = false;
        }
        self
    }

    /// Removing the item from a cart also removes `dependents`.
    #[must_use]
    pub fn with_cascade(
        mut self,
        area: &str,
        item_id: u64,
        dependents: Vec<(String, String, u64)>,
    ) -> Self {
        if let Some(offer) = self.state.get_mut().offers.get_mut(&(area.to_string(), item_id)) {
            offer.cascade = dependents;
        }
        self
    }

    pub async fn is_held(&self, area: &str, item_id: u64, userid: u64) -> bool {
        self.state
            .read()
            .await
            .held
            .contains(&(area.to_string(), item_id, userid))
    }

    pub async fn is_booked(&self, area: &str, item_id: u64, userid: u64) -> bool {
        self.state
            .read()
            .await
            .booked
            .contains(&(area.to_string(), item_id, userid))
    }
}

#[async_trait]
impl CatalogProvider for InMemoryCatalog {
    async fn allow_add_item_to_cart(
        &self,
        area: &str,
        item_id: u64,
        userid: u64,
    ) -> Result<CartStatus, CatalogError> {
        let state = self.state.read().await;
        let offer = state.offer(area, item_id)?;

        if state.booked.contains(&(area.to_string(), item_id, userid)) {
            return Ok(CartStatus::AlreadyBooked);
        }

        if offer
            .places
            .is_some_and(|places| state.taken_by_others(area, item_id, userid) >= places)
        {
            return Ok(CartStatus::FullyBooked);
        }

        Ok(CartStatus::Success)
    }

    async fn get_cartitem(
        &self,
        area: &str,
        item_id: u64,
        userid: u64,
    ) -> Result<CartItem, CatalogError> {
        let mut state = self.state.write().await;
        let item = state.offer(area, item_id)?.item.clone();

        state.held.insert((area.to_string(), item_id, userid));

        Ok(item)
    }

    async fn unload_cartitem(
        &self,
        area: &str,
        item_id: u64,
        userid: u64,
    ) -> Result<UnloadOutcome, CatalogError> {
        let mut state = self.state.write().await;
        let cascade = state.offer(area, item_id)?.cascade.clone();

        let success = state.held.remove(&(area.to_string(), item_id, userid));

        Ok(UnloadOutcome { success, cascade })
    }

    async fn successful_checkout(
        &self,
        area: &str,
        item_id: u64,
        _payment_id: &str,
        userid: u64,
    ) -> Result<bool, CatalogError> {
        let mut state = self.state.write().await;
        state.offer(area, item_id)?;

        let key = (area.to_string(), item_id, userid);
        state.held.remove(&key);

        Ok(state.booked.insert(key))
    }

    async fn cancel_purchase(
        &self,
        area: &str,
        item_id: u64,
        userid: u64,
    ) -> Result<bool, CatalogError> {
        Ok(self
            .state
            .write()
            .await
            .booked
            .remove(&(area.to_string(), item_id, userid)))
    }

    async fn allow_rebooking(
        &self,
        area: &str,
        item_id: u64,
        _userid: u64,
    ) -> Result<bool, CatalogError> {
        Ok(self.state.read().await.offer(area, item_id)?.rebookable)
    }
}
