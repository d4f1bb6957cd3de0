//! Infrastructure layer - External concerns and adapters
//!
//! Adapters for the payment gateway, collaborator stores, and the search
//! cache.

pub mod cart_store;
pub mod gateway;
pub mod search_cache;

pub use cart_store::{CartItem, CartStore, IdentityProvider, SessionIdentityProvider};
pub use gateway::{GatewayError, HttpInvoiceGateway, InvoiceGateway};
pub use search_cache::{
    CacheDisposition, CatalogEntry, SearchBackend, SearchCache, SearchResult, StaticCatalogBackend,
};
