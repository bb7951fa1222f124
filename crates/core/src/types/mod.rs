//! Core types for Store Hub.
//!
//! This module provides type-safe wrappers for the backend's resources.

pub mod auth;
pub mod cart;
pub mod filter;
pub mod id;
pub mod price;
pub mod product;
pub mod user;

pub use auth::{LoginRequest, LoginResponse, RegisterRequest, TokenClaims};
pub use cart::{Cart, CartItem, CartLine, NewCart, cart_amount, cart_total};
pub use filter::{ProductFilter, apply_filters};
pub use id::*;
pub use price::{CurrencyCode, Price};
pub use product::{NewProduct, Product, Rating};
pub use user::{Address, Geolocation, PersonName, Role, User};
