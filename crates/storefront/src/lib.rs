//! Store Hub storefront library.
//!
//! Typed clients for the REST backend plus the client-side state services
//! built on them: session, user profile, catalog, cart and consent. Each
//! service owns its state in `tokio::sync::watch` containers and hands out
//! read-only receivers.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod catalog;
pub mod config;
pub mod consent;
pub mod error;
pub mod session;
pub mod state;
pub mod storage;
pub mod user;

#[cfg(test)]
mod testing;

pub use error::{Result, StorefrontError};
pub use state::Storefront;
