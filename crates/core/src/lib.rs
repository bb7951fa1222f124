//! Store Hub Core - Shared domain types.
//!
//! This crate provides the types shared by the Store Hub components:
//! - `storefront` - Resource clients and client-side state services
//! - `cli` - Command-line front end
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no async. The wire format of every type matches the REST
//! backend's JSON so the same structs are used for requests and responses.
//!
//! # Modules
//!
//! - [`types`] - Ids, products, carts, users, auth payloads, filters, prices

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
