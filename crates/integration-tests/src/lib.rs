//! Integration tests for Store Hub.
//!
//! The tests drive the real `reqwest` clients against [`FakeBackend`], an
//! in-process `axum` server that speaks the storefront's REST contract and
//! records every request it receives.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p store-hub-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `session` - Login, logout, persistence and bearer handling
//! - `catalog` - Product loading, caching and mutations
//! - `cart` - Cart synchronization and the login merge

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Path, Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use jsonwebtoken::{EncodingKey, Header};
use store_hub_core::{
    Cart, CartId, LoginRequest, LoginResponse, NewCart, NewProduct, Product, ProductId,
    RegisterRequest, User, UserId,
};
use store_hub_storefront::Storefront;
use store_hub_storefront::config::{ApiConfig, StorefrontConfig};
use store_hub_storefront::storage::MemoryStore;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const USERNAME: &str = "mor_2314";
pub const PASSWORD: &str = "83r5^_";

/// User with a server cart (cart id 2, one Backpack line of quantity 2).
pub const USER_WITH_CART: i32 = 2;

/// User without a server cart.
pub const USER_WITHOUT_CART: i32 = 5;

/// A request as seen by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub method: String,
    pub path: String,
    pub bearer: Option<String>,
}

impl RecordedCall {
    fn is(&self, method: &str, path: &str) -> bool {
        self.method == method && self.path == path
    }
}

/// A bearer token whose subject is `sub`.
#[must_use]
pub fn token_for(sub: i32) -> String {
    let claims = serde_json::json!({ "sub": sub, "user": USERNAME, "iat": 1_700_000_000 });
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"backend-secret"),
    )
    .expect("token encoding cannot fail for static claims")
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn seed_product(id: i32, title: &str, price: f64, category: &str, rate: f64) -> Product {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "title": title,
        "price": price,
        "description": format!("{title} for everyday use"),
        "category": category,
        "image": format!("https://fakestoreapi.com/img/{id}.jpg"),
        "rating": { "rate": rate, "count": 120 }
    }))
    .expect("valid product fixture")
}

fn seed_user(id: i32, username: &str) -> User {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "username": username,
        "email": format!("{username}@example.com"),
        "password": "hidden",
        "name": { "firstname": "john", "lastname": "doe" },
        "phone": "1-570-236-7033",
        // Ignored by the client: every profile is given the admin role.
        "roles": ["Customer"]
    }))
    .expect("valid user fixture")
}

/// Shared state of the fake backend.
pub struct BackendState {
    products: Mutex<Vec<Product>>,
    carts: Mutex<Vec<Cart>>,
    users: Mutex<Vec<User>>,
    calls: Mutex<Vec<RecordedCall>>,
    failing: AtomicBool,
    reject_bearer: AtomicBool,
    login_subject: AtomicI32,
    next_id: AtomicI32,
}

impl BackendState {
    fn seeded() -> Self {
        Self {
            products: Mutex::new(vec![
                seed_product(1, "Backpack", 109.95, "men's clothing", 3.9),
                seed_product(2, "Mens Casual T-Shirt", 22.3, "men's clothing", 4.1),
                seed_product(3, "Cotton Jacket", 55.99, "men's clothing", 4.7),
                seed_product(7, "White Gold Ring", 9.99, "jewelery", 3.0),
            ]),
            carts: Mutex::new(vec![Cart {
                id: CartId::new(USER_WITH_CART),
                user_id: UserId::new(USER_WITH_CART),
                products: vec![store_hub_core::CartLine::new(ProductId::new(1), 2)],
                date: "2020-03-02T00:00:00.000Z".to_string(),
            }]),
            users: Mutex::new(vec![
                seed_user(USER_WITH_CART, USERNAME),
                seed_user(USER_WITHOUT_CART, "kevinryan"),
            ]),
            calls: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            reject_bearer: AtomicBool::new(false),
            login_subject: AtomicI32::new(USER_WITH_CART),
            next_id: AtomicI32::new(100),
        }
    }

    fn next_id(&self) -> i32 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

/// Running fake backend. The server stops when this is dropped.
pub struct FakeBackend {
    addr: SocketAddr,
    state: Arc<BackendState>,
    server: JoinHandle<()>,
}

impl FakeBackend {
    /// Bind to an ephemeral local port and start serving.
    pub async fn start() -> Self {
        let state = Arc::new(BackendState::seeded());
        let app = router(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake backend");
        let addr = listener.local_addr().expect("bound listener has an address");

        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            state,
            server,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Configuration pointing at this backend.
    #[must_use]
    pub fn config(&self) -> StorefrontConfig {
        let api = ApiConfig::new(&self.base_url()).expect("local URL is valid");
        StorefrontConfig::new(api, std::env::temp_dir().join("store-hub-unused"))
    }

    /// A storefront with in-memory storage, background tasks started.
    #[must_use]
    pub fn storefront(&self) -> Storefront {
        let storefront = Storefront::with_store(self.config(), Arc::new(MemoryStore::new()))
            .expect("storefront builds against a local backend");
        drop(storefront.start_background_tasks());
        storefront
    }

    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.state.calls).clone()
    }

    /// Number of `method path` requests received.
    #[must_use]
    pub fn count(&self, method: &str, path: &str) -> usize {
        lock(&self.state.calls)
            .iter()
            .filter(|c| c.is(method, path))
            .count()
    }

    /// The last `method path` request received.
    #[must_use]
    pub fn last(&self, method: &str, path: &str) -> Option<RecordedCall> {
        lock(&self.state.calls)
            .iter()
            .rev()
            .find(|c| c.is(method, path))
            .cloned()
    }

    pub fn clear_calls(&self) {
        lock(&self.state.calls).clear();
    }

    /// Answer every request with 503.
    pub fn set_failing(&self, failing: bool) {
        self.state.failing.store(failing, Ordering::SeqCst);
    }

    /// Answer every request carrying a bearer token with 401.
    pub fn set_reject_bearer(&self, reject: bool) {
        self.state.reject_bearer.store(reject, Ordering::SeqCst);
    }

    /// Whose token a successful login returns.
    pub fn set_login_subject(&self, user_id: i32) {
        self.state.login_subject.store(user_id, Ordering::SeqCst);
    }

    #[must_use]
    pub fn cart(&self, id: i32) -> Option<Cart> {
        lock(&self.state.carts)
            .iter()
            .find(|c| c.id == CartId::new(id))
            .cloned()
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

type Shared = State<Arc<BackendState>>;
type Reply<T> = Result<Json<T>, StatusCode>;

fn router(state: Arc<BackendState>) -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/carts", get(list_carts).post(create_cart))
        .route(
            "/carts/{id}",
            get(get_cart).put(update_cart).delete(delete_cart),
        )
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}", get(get_user))
        .layer(middleware::from_fn_with_state(Arc::clone(&state), record))
        .with_state(state)
}

/// Record the request, then apply the failure toggles.
async fn record(State(state): Shared, request: Request, next: Next) -> Response {
    let bearer = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);

    lock(&state.calls).push(RecordedCall {
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
        bearer: bearer.clone(),
    });

    if state.failing.load(Ordering::SeqCst) {
        return (StatusCode::SERVICE_UNAVAILABLE, "backend unavailable").into_response();
    }
    if bearer.is_some() && state.reject_bearer.load(Ordering::SeqCst) {
        return (StatusCode::UNAUTHORIZED, "invalid token").into_response();
    }

    next.run(request).await
}

async fn login(State(state): Shared, Json(body): Json<LoginRequest>) -> Reply<LoginResponse> {
    if body.username != USERNAME || body.password != PASSWORD {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(Json(LoginResponse {
        token: token_for(state.login_subject.load(Ordering::SeqCst)),
    }))
}

async fn list_products(State(state): Shared) -> Json<Vec<Product>> {
    Json(lock(&state.products).clone())
}

async fn get_product(State(state): Shared, Path(id): Path<i32>) -> Reply<Product> {
    lock(&state.products)
        .iter()
        .find(|p| p.id == ProductId::new(id))
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

fn product_from(id: ProductId, body: NewProduct) -> Product {
    Product {
        id,
        title: body.title,
        price: body.price,
        description: body.description,
        category: body.category,
        image: body.image,
        rating: store_hub_core::Rating::default(),
    }
}

async fn create_product(State(state): Shared, Json(body): Json<NewProduct>) -> Json<Product> {
    let product = product_from(ProductId::new(state.next_id()), body);
    lock(&state.products).push(product.clone());
    Json(product)
}

async fn update_product(
    State(state): Shared,
    Path(id): Path<i32>,
    Json(body): Json<NewProduct>,
) -> Reply<Product> {
    let mut products = lock(&state.products);
    let existing = products
        .iter_mut()
        .find(|p| p.id == ProductId::new(id))
        .ok_or(StatusCode::NOT_FOUND)?;
    let rating = existing.rating;
    *existing = product_from(existing.id, body);
    existing.rating = rating;
    Ok(Json(existing.clone()))
}

async fn delete_product(State(state): Shared, Path(id): Path<i32>) -> Reply<Product> {
    let mut products = lock(&state.products);
    let index = products
        .iter()
        .position(|p| p.id == ProductId::new(id))
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(products.remove(index)))
}

async fn list_carts(State(state): Shared) -> Json<Vec<Cart>> {
    Json(lock(&state.carts).clone())
}

async fn get_cart(State(state): Shared, Path(id): Path<i32>) -> Reply<Cart> {
    lock(&state.carts)
        .iter()
        .find(|c| c.id == CartId::new(id))
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn create_cart(State(state): Shared, Json(body): Json<NewCart>) -> Json<Cart> {
    let cart = Cart {
        id: CartId::new(state.next_id()),
        user_id: body.user_id,
        products: body.products,
        date: "2024-01-01T00:00:00.000Z".to_string(),
    };
    lock(&state.carts).push(cart.clone());
    Json(cart)
}

async fn update_cart(
    State(state): Shared,
    Path(id): Path<i32>,
    Json(mut body): Json<Cart>,
) -> Reply<Cart> {
    let mut carts = lock(&state.carts);
    let existing = carts
        .iter_mut()
        .find(|c| c.id == CartId::new(id))
        .ok_or(StatusCode::NOT_FOUND)?;
    body.id = existing.id;
    *existing = body;
    Ok(Json(existing.clone()))
}

async fn delete_cart(State(state): Shared, Path(id): Path<i32>) -> Reply<Cart> {
    let mut carts = lock(&state.carts);
    let index = carts
        .iter()
        .position(|c| c.id == CartId::new(id))
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(carts.remove(index)))
}

async fn list_users(State(state): Shared) -> Json<Vec<User>> {
    Json(lock(&state.users).clone())
}

async fn get_user(State(state): Shared, Path(id): Path<i32>) -> Reply<User> {
    lock(&state.users)
        .iter()
        .find(|u| u.id == UserId::new(id))
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn create_user(State(state): Shared, Json(body): Json<RegisterRequest>) -> Reply<User> {
    if body.username.is_empty() || body.password.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let user = seed_user(state.next_id(), &body.username);
    lock(&state.users).push(user.clone());
    Ok(Json(user))
}
