//! Cache
//!
//! Short lived per-user state lives in a key-value cache with two namespaces. Writes are last
//! write wins: concurrent requests of the same user may overwrite each other, and nothing here
//! offers compare-and-swap. The reservation store is the durable backstop at checkout.

use async_trait::async_trait;
use mockall::automock;
use serde_json::Value;
use thiserror::Error;

mod memory;

pub use memory::MemoryCache;

/// Independent cache namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    /// Cart snapshots, keyed by [`cart_key`].
    ShoppingCart,

    /// Checkout wizard state, keyed by [`checkout_key`].
    CheckoutSession,
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable")]
    Unavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("cached value could not be decoded")]
    Decode(#[from] serde_json::Error),
}

/// Key of a user's cart snapshot.
pub fn cart_key(userid: u64) -> String {
    format!("{userid}_shopping_cart")
}

/// Key of a user's checkout session.
pub fn checkout_key(userid: u64) -> String {
    userid.to_string()
}

#[automock]
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, namespace: CacheNamespace, key: &str) -> Result<Option<Value>, CacheError>;

    async fn set(&self, namespace: CacheNamespace, key: &str, value: Value) -> Result<(), CacheError>;

    async fn delete(&self, namespace: CacheNamespace, key: &str) -> Result<(), CacheError>;
}
