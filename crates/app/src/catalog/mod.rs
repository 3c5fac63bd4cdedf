//! Catalog providers
//!
//! Every component that sells items implements [`CatalogProvider`]; the cart only talks to
//! components through it.

use std::sync::Arc;

use async_trait::async_trait;
use mockall::automock;
use rustc_hash::FxHashMap;
use shopcart::{items::CartItem, status::CartStatus};
use thiserror::Error;

mod memory;

pub use memory::InMemoryCatalog;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("no catalog provider registered for component {0}")]
    UnknownComponent(String),

    #[error("item {0} not found")]
    ItemNotFound(u64),

    #[error("catalog provider failed")]
    Provider(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Result of releasing an item's provisional reservation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnloadOutcome {
    pub success: bool,

    /// Further items of the same cart that have to go as well, as `(component, area, item id)`.
    pub cascade: Vec<(String, String, u64)>,
}

impl UnloadOutcome {
    pub fn released() -> Self {
        Self {
            success: true,
            cascade: Vec::new(),
        }
    }
}

#[automock]
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Whether the user may add the item, as a cart status.
    async fn allow_add_item_to_cart(
        &self,
        area: &str,
        item_id: u64,
        userid: u64,
    ) -> Result<CartStatus, CatalogError>;

    /// Load the priced item and reserve it provisionally for the user.
    async fn get_cartitem(
        &self,
        area: &str,
        item_id: u64,
        userid: u64,
    ) -> Result<CartItem, CatalogError>;

    /// Release the provisional reservation.
    async fn unload_cartitem(
        &self,
        area: &str,
        item_id: u64,
        userid: u64,
    ) -> Result<UnloadOutcome, CatalogError>;

    /// Hand the paid item over to the user.
    async fn successful_checkout(
        &self,
        area: &str,
        item_id: u64,
        payment_id: &str,
        userid: u64,
    ) -> Result<bool, CatalogError>;

    /// Take a cancelled purchase back.
    async fn cancel_purchase(
        &self,
        area: &str,
        item_id: u64,
        userid: u64,
    ) -> Result<bool, CatalogError>;

    /// Whether this item may be rebooked; items allow it unless their metadata says otherwise.
    async fn allow_rebooking(&self, area: &str, item_id: u64, userid: u64) -> Result<bool, CatalogError>;
}

/// Providers keyed by component name.
#[derive(Clone, Default)]
pub struct CatalogRegistry {
    providers: FxHashMap<String, Arc<dyn CatalogProvider>>,
}

impl CatalogRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_provider(mut self, component: impl Into<String>, provider: Arc<dyn CatalogProvider>) -> Self {
        self.register(component, provider);
        self
    }

    pub fn register(&mut self, component: impl Into<String>, provider: Arc<dyn CatalogProvider>) {
        self.providers.insert(component.into(), provider);
    }

    /// Provider of a component.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownComponent`] when nothing is registered for it.
    pub fn provider(&self, component: &str) -> Result<&Arc<dyn CatalogProvider>, CatalogError> {
        self.providers
            .get(component)
            .ok_or_else(|| CatalogError::UnknownComponent(component.to_string()))
    }
}

impl std::fmt::Debug for CatalogRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.providers.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_component_is_an_error() {
        let registry = CatalogRegistry::new().with_provider("mod_booking", Arc::new(MockCatalogProvider::new()));

        assert!(registry.provider("mod_booking").is_ok());
        assert!(matches!(
            registry.provider("mod_other"),
            Err(CatalogError::UnknownComponent(component)) if component == "mod_other"
        ));
    }
}
