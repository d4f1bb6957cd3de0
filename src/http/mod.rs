//! HTTP layer - routes, handlers, and the server

pub mod handlers;
pub mod models;
pub mod routes;
pub mod server;

pub use server::ConfirmServer;
