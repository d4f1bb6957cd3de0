//! Cart and wishlist persistence
//!
//! Authenticated full-overwrite stores keyed by user id: last write wins, no
//! merge logic. The identity provider seam supplies the session's user from a
//! bearer credential.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::AppResult;

/// A single cart or wishlist line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartItem {
    pub product_id: String,
    pub quantity: u32,
    #[serde(default)]
    pub variant: Option<String>,
}

/// Supplies the authenticated user for a request, if any
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn authenticate(&self, bearer_token: &str) -> Option<String>;
}

/// Session-token identity provider backed by an in-memory session table
pub struct SessionIdentityProvider {
    sessions: RwLock<HashMap<String, String>>,
}

impl SessionIdentityProvider {
    pub fn new() -> Self {
        Self { sessions: RwLock::new(HashMap::new()) }
    }

    /// Register a session token for a user (called by the login flow,
    /// which lives outside this service)
    pub async fn register_session(&self, token: &str, user_id: &str) {
        self.sessions.write().await.insert(token.to_string(), user_id.to_string());
    }
}

impl Default for SessionIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for SessionIdentityProvider {
    async fn authenticate(&self, bearer_token: &str) -> Option<String> {
        self.sessions.read().await.get(bearer_token).cloned()
    }
}

/// In-memory overwrite store for carts and wishlists
pub struct CartStore {
    carts: Arc<RwLock<HashMap<String, Vec<CartItem>>>>,
    wishlists: Arc<RwLock<HashMap<String, Vec<CartItem>>>>,
}

impl CartStore {
    pub fn new() -> Self {
        Self {
            carts: Arc::new(RwLock::new(HashMap::new())),
            wishlists: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Replace the user's cart wholesale
    pub async fn put_cart(&self, user_id: &str, items: Vec<CartItem>) -> AppResult<()> {
        debug!(user_id = %user_id, count = items.len(), "Overwriting cart");
        self.carts.write().await.insert(user_id.to_string(), items);
        Ok(())
    }

    /// Replace the user's wishlist wholesale
    pub async fn put_wishlist(&self, user_id: &str, items: Vec<CartItem>) -> AppResult<()> {
        debug!(user_id = %user_id, count = items.len(), "Overwriting wishlist");
        self.wishlists.write().await.insert(user_id.to_string(), items);
        Ok(())
    }

    pub async fn get_cart(&self, user_id: &str) -> Vec<CartItem> {
        self.carts.read().await.get(user_id).cloned().unwrap_or_default()
    }

    pub async fn get_wishlist(&self, user_id: &str) -> Vec<CartItem> {
        self.wishlists.read().await.get(user_id).cloned().unwrap_or_default()
    }
}

impl Default for CartStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, qty: u32) -> CartItem {
        CartItem { product_id: id.to_string(), quantity: qty, variant: None }
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let store = CartStore::new();
        store.put_cart("u1", vec![item("p1", 1), item("p2", 3)]).await.unwrap();
        store.put_cart("u1", vec![item("p3", 2)]).await.unwrap();

        let cart = store.get_cart("u1").await;
        assert_eq!(cart, vec![item("p3", 2)]);
    }

    #[tokio::test]
    async fn test_carts_and_wishlists_are_independent() {
        let store = CartStore::new();
        store.put_cart("u1", vec![item("p1", 1)]).await.unwrap();
        store.put_wishlist("u1", vec![item("p9", 1)]).await.unwrap();

        assert_eq!(store.get_cart("u1").await, vec![item("p1", 1)]);
        assert_eq!(store.get_wishlist("u1").await, vec![item("p9", 1)]);
    }

    #[tokio::test]
    async fn test_identity_provider() {
        let identity = SessionIdentityProvider::new();
        identity.register_session("sess-abc", "u42").await;

        assert_eq!(identity.authenticate("sess-abc").await.as_deref(), Some("u42"));
        assert_eq!(identity.authenticate("sess-unknown").await, None);
    }
}
