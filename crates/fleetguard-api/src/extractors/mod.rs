//! Custom Axum extractors.

pub mod auth;
pub mod client;

pub use auth::{AuthPrincipal, bearer_token};
pub use client::{ClientMeta, client_address};
