//! Remote resource clients for the REST backend.
//!
//! # Architecture
//!
//! - One trait per resource (`products`, `carts`, `users`, `auth`), one method
//!   per REST verb. State services are generic over these traits.
//! - [`ApiClient`] implements every trait over `reqwest` with JSON bodies.
//! - No local validation, no retries: the backend is the only judge of input.
//! - Every failure is normalized into [`ApiError`]: a fixed, operation-specific
//!   message plus the HTTP status (500 when there was no response). The
//!   backend's own error payload is logged and discarded.
//!
//! # Example
//!
//! ```rust,ignore
//! use store_hub_storefront::api::{ApiClient, ProductsApi};
//!
//! let client = ApiClient::new(&config.api, credentials)?;
//! let products = client.get_all().await?;
//! ```

mod client;

pub use client::ApiClient;

use std::future::Future;

use store_hub_core::{
    Cart, CartId, CartLine, LoginRequest, LoginResponse, NewProduct, Product, ProductId,
    RegisterRequest, User, UserId,
};
use thiserror::Error;

/// Uniform error for every remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (HTTP {code})")]
pub struct ApiError {
    /// Human-readable, operation-specific message.
    pub message: String,
    /// HTTP status, or 500 when no response was received.
    pub code: u16,
}

impl ApiError {
    /// Code used when the request never produced a response.
    pub const DEFAULT_CODE: u16 = 500;

    #[must_use]
    pub fn new(message: impl Into<String>, code: u16) -> Self {
        Self {
            message: message.into(),
            code,
        }
    }

    /// Error for a response with `status`, or a transport failure when `None`.
    #[must_use]
    pub fn from_status(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::new(message, status.unwrap_or(Self::DEFAULT_CODE))
    }

    /// Error for a request that never got a response.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::from_status(message, None)
    }

    /// Whether the backend rejected the bearer credential.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        self.code == 401
    }
}

/// Fixed failure messages, one per operation.
pub mod messages {
    pub const CREATE_PRODUCT: &str = "failed to create product";
    pub const GET_PRODUCT: &str = "failed to fetch product";
    pub const LOAD_PRODUCTS: &str = "failed to load products";
    pub const UPDATE_PRODUCT: &str = "failed to update product";
    pub const DELETE_PRODUCT: &str = "failed to delete product";

    pub const CREATE_CART: &str = "failed to create cart";
    pub const GET_CART: &str = "failed to load cart";
    pub const LOAD_CARTS: &str = "failed to load carts";
    pub const UPDATE_CART: &str = "failed to update cart";
    pub const DELETE_CART: &str = "failed to delete cart";

    pub const REGISTER: &str = "failed to create account";
    pub const GET_USER: &str = "failed to load user";
    pub const LOAD_USERS: &str = "failed to load users";

    pub const LOGIN: &str = "failed to authenticate";
}

/// `/products` resource.
pub trait ProductsApi: Send + Sync {
    fn create(&self, product: &NewProduct)
    -> impl Future<Output = Result<Product, ApiError>> + Send;

    fn get_by_id(&self, id: ProductId) -> impl Future<Output = Result<Product, ApiError>> + Send;

    fn get_all(&self) -> impl Future<Output = Result<Vec<Product>, ApiError>> + Send;

    /// Full replacement of the product's editable fields.
    fn update(
        &self,
        id: ProductId,
        product: &NewProduct,
    ) -> impl Future<Output = Result<Product, ApiError>> + Send;

    fn delete(&self, id: ProductId) -> impl Future<Output = Result<Product, ApiError>> + Send;
}

/// `/carts` resource.
pub trait CartsApi: Send + Sync {
    /// `POST /carts` with body `{userId, products}`.
    fn create(
        &self,
        user_id: UserId,
        products: Vec<CartLine>,
    ) -> impl Future<Output = Result<Cart, ApiError>> + Send;

    fn get_by_id(&self, id: CartId) -> impl Future<Output = Result<Cart, ApiError>> + Send;

    fn get_all(&self) -> impl Future<Output = Result<Vec<Cart>, ApiError>> + Send;

    /// Whole-resource replacement; the backend has no partial update.
    fn update(&self, id: CartId, cart: &Cart)
    -> impl Future<Output = Result<Cart, ApiError>> + Send;

    fn delete(&self, id: CartId) -> impl Future<Output = Result<(), ApiError>> + Send;
}

/// `/users` resource.
pub trait UsersApi: Send + Sync {
    /// Account registration.
    fn create(
        &self,
        request: &RegisterRequest,
    ) -> impl Future<Output = Result<User, ApiError>> + Send;

    fn get_by_id(&self, id: UserId) -> impl Future<Output = Result<User, ApiError>> + Send;

    fn get_all(&self) -> impl Future<Output = Result<Vec<User>, ApiError>> + Send;
}

/// `/auth` resource.
pub trait AuthApi: Send + Sync {
    fn login(
        &self,
        credentials: &LoginRequest,
    ) -> impl Future<Output = Result<LoginResponse, ApiError>> + Send;
}
