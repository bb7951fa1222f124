//! `reqwest` implementation of the resource traits.

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use store_hub_core::{
    Cart, CartId, CartLine, LoginRequest, LoginResponse, NewCart, NewProduct, Product, ProductId,
    RegisterRequest, User, UserId,
};
use tokio::sync::{broadcast, watch};
use tracing::{debug, instrument, warn};

use super::{ApiError, AuthApi, CartsApi, ProductsApi, UsersApi, messages};
use crate::config::ApiConfig;

/// Paths that never carry the bearer credential.
const PUBLIC_PATHS: &[&str] = &["/auth/login", "/products"];

/// Characters of an error body kept in logs.
const LOGGED_BODY_CHARS: usize = 500;

/// HTTP client for the REST backend.
///
/// Attaches `Authorization: Bearer <token>` from the session's credential
/// container to every non-public request, and reports 401 responses on
/// those requests through [`ApiClient::unauthorized_events`].
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    config: ApiConfig,
    credentials: watch::Receiver<Option<SecretString>>,
    unauthorized: broadcast::Sender<()>,
}

impl ApiClient {
    /// Create a client for `config`, reading bearer tokens from `credentials`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(
        config: &ApiConfig,
        credentials: watch::Receiver<Option<SecretString>>,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().build().map_err(|e| {
            tracing::error!(error = %e, "Failed to build HTTP client");
            ApiError::transport("failed to build HTTP client")
        })?;

        let (unauthorized, _) = broadcast::channel(8);

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                config: config.clone(),
                credentials,
                unauthorized,
            }),
        })
    }

    /// Notifications for every 401 received on an authenticated request.
    #[must_use]
    pub fn unauthorized_events(&self) -> broadcast::Receiver<()> {
        self.inner.unauthorized.subscribe()
    }

    /// The bearer token to send with a request to `path`, if any.
    fn bearer_for(&self, path: &str) -> Option<String> {
        if PUBLIC_PATHS.iter().any(|public| path.starts_with(public)) {
            return None;
        }
        self.inner
            .credentials
            .borrow()
            .as_ref()
            .map(|token| token.expose_secret().to_string())
            .filter(|token| !token.is_empty())
    }

    fn request(&self, method: Method, path: &str) -> (RequestBuilder, bool) {
        let builder = self
            .inner
            .client
            .request(method, self.inner.config.endpoint(path));

        match self.bearer_for(path) {
            Some(token) => (builder.bearer_auth(token), true),
            None => (builder, false),
        }
    }

    /// Send a request and map every failure to `failure`.
    async fn execute(
        &self,
        builder: RequestBuilder,
        authenticated: bool,
        failure: &'static str,
    ) -> Result<Response, ApiError> {
        let response = builder.send().await.map_err(|e| {
            tracing::error!(error = %e, code = ApiError::DEFAULT_CODE, "{failure}");
            ApiError::transport(failure)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if authenticated && status == StatusCode::UNAUTHORIZED {
            warn!("Backend rejected the bearer credential");
            // No subscribers simply means nobody is watching the session.
            let _ = self.inner.unauthorized.send(());
        }

        let body = response.text().await.unwrap_or_default();
        tracing::error!(
            status = %status,
            code = status.as_u16(),
            body = %body.chars().take(LOGGED_BODY_CHARS).collect::<String>(),
            "{failure}"
        );

        Err(ApiError::from_status(failure, Some(status.as_u16())))
    }

    async fn decode<T: DeserializeOwned>(
        response: Response,
        failure: &'static str,
    ) -> Result<T, ApiError> {
        let status = response.status();
        response.json::<T>().await.map_err(|e| {
            tracing::error!(error = %e, status = %status, "Failed to decode backend response");
            ApiError::transport(failure)
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        failure: &'static str,
    ) -> Result<T, ApiError> {
        let (builder, authenticated) = self.request(Method::GET, path);
        let response = self.execute(builder, authenticated, failure).await?;
        Self::decode(response, failure).await
    }

    async fn send_json<B, T>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        failure: &'static str,
    ) -> Result<T, ApiError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let (builder, authenticated) = self.request(method, path);
        let response = self
            .execute(builder.json(body), authenticated, failure)
            .await?;
        Self::decode(response, failure).await
    }

    async fn delete_resource(&self, path: &str, failure: &'static str) -> Result<Response, ApiError> {
        let (builder, authenticated) = self.request(Method::DELETE, path);
        self.execute(builder, authenticated, failure).await
    }
}

impl ProductsApi for ApiClient {
    #[instrument(skip(self, product), fields(title = %product.title))]
    async fn create(&self, product: &NewProduct) -> Result<Product, ApiError> {
        self.send_json(Method::POST, "/products", product, messages::CREATE_PRODUCT)
            .await
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, id: ProductId) -> Result<Product, ApiError> {
        self.get_json(&format!("/products/{id}"), messages::GET_PRODUCT)
            .await
    }

    #[instrument(skip(self))]
    async fn get_all(&self) -> Result<Vec<Product>, ApiError> {
        let products: Vec<Product> = self.get_json("/products", messages::LOAD_PRODUCTS).await?;
        debug!(count = products.len(), "Fetched products");
        Ok(products)
    }

    #[instrument(skip(self, product))]
    async fn update(&self, id: ProductId, product: &NewProduct) -> Result<Product, ApiError> {
        self.send_json(
            Method::PUT,
            &format!("/products/{id}"),
            product,
            messages::UPDATE_PRODUCT,
        )
        .await
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: ProductId) -> Result<Product, ApiError> {
        let response = self
            .delete_resource(&format!("/products/{id}"), messages::DELETE_PRODUCT)
            .await?;
        Self::decode(response, messages::DELETE_PRODUCT).await
    }
}

impl CartsApi for ApiClient {
    #[instrument(skip(self, products), fields(lines = products.len()))]
    async fn create(&self, user_id: UserId, products: Vec<CartLine>) -> Result<Cart, ApiError> {
        let body = NewCart { user_id, products };
        self.send_json(Method::POST, "/carts", &body, messages::CREATE_CART)
            .await
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, id: CartId) -> Result<Cart, ApiError> {
        self.get_json(&format!("/carts/{id}"), messages::GET_CART)
            .await
    }

    #[instrument(skip(self))]
    async fn get_all(&self) -> Result<Vec<Cart>, ApiError> {
        self.get_json("/carts", messages::LOAD_CARTS).await
    }

    #[instrument(skip(self, cart), fields(lines = cart.products.len()))]
    async fn update(&self, id: CartId, cart: &Cart) -> Result<Cart, ApiError> {
        self.send_json(Method::PUT, &format!("/carts/{id}"), cart, messages::UPDATE_CART)
            .await
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: CartId) -> Result<(), ApiError> {
        self.delete_resource(&format!("/carts/{id}"), messages::DELETE_CART)
            .await?;
        Ok(())
    }
}

impl UsersApi for ApiClient {
    #[instrument(skip(self, request), fields(username = %request.username))]
    async fn create(&self, request: &RegisterRequest) -> Result<User, ApiError> {
        self.send_json(Method::POST, "/users", request, messages::REGISTER)
            .await
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, id: UserId) -> Result<User, ApiError> {
        self.get_json(&format!("/users/{id}"), messages::GET_USER)
            .await
    }

    #[instrument(skip(self))]
    async fn get_all(&self) -> Result<Vec<User>, ApiError> {
        self.get_json("/users", messages::LOAD_USERS).await
    }
}

impl AuthApi for ApiClient {
    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    async fn login(&self, credentials: &LoginRequest) -> Result<LoginResponse, ApiError> {
        self.send_json(Method::POST, "/auth/login", credentials, messages::LOGIN)
            .await
    }
}
