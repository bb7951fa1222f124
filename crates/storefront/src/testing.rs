//! In-memory backend used by unit tests.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use jsonwebtoken::{EncodingKey, Header};
use rust_decimal::Decimal;
use store_hub_core::{
    Cart, CartId, CartLine, LoginRequest, LoginResponse, NewProduct, Product, ProductId, Rating,
    RegisterRequest, User, UserId,
};

use crate::api::{ApiError, AuthApi, CartsApi, ProductsApi, UsersApi};

pub const USERNAME: &str = "mor_2314";
pub const PASSWORD: &str = "83r5^_";

/// Status returned by every call while failing.
pub const FAILURE_CODE: u16 = 503;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn product(id: i32, title: &str, cents: i64) -> Product {
    Product {
        id: ProductId::new(id),
        title: title.to_string(),
        price: Decimal::new(cents, 2),
        description: format!("{title} description"),
        category: "electronics".to_string(),
        image: format!("https://img.example/{id}.jpg"),
        rating: Rating {
            rate: 4.0,
            count: 10,
        },
    }
}

pub fn user(id: i32) -> User {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "username": USERNAME,
        "email": "morrison@gmail.com",
        "name": { "firstname": "david", "lastname": "morrison" },
    }))
    .unwrap_or_else(|e| panic!("invalid user fixture: {e}"))
}

/// A signed bearer token whose subject is `sub`.
pub fn token_for(sub: i32) -> String {
    let claims = serde_json::json!({ "sub": sub, "user": USERNAME, "iat": 1_700_000_000 });
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"backend-secret"),
    )
    .unwrap_or_else(|e| panic!("failed to mint token: {e}"))
}

/// Records every call and answers from in-memory collections.
pub struct FakeBackend {
    products: Mutex<Vec<Product>>,
    carts: Mutex<Vec<Cart>>,
    users: Mutex<Vec<User>>,
    calls: Mutex<Vec<String>>,
    failing: AtomicBool,
    next_id: AtomicI32,
    login_subject: i32,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            products: Mutex::new(vec![
                product(1, "Backpack", 10995),
                product(2, "T-Shirt", 2230),
                product(3, "Jacket", 5599),
                product(7, "Ring", 999),
            ]),
            carts: Mutex::new(Vec::new()),
            users: Mutex::new(vec![user(2)]),
            calls: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            next_id: AtomicI32::new(100),
            login_subject: 2,
        }
    }

    pub fn with_cart(self, cart: Cart) -> Self {
        lock(&self.carts).push(cart);
        self
    }

    /// Make every subsequent call fail with [`FAILURE_CODE`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn calls_matching(&self, prefix: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    pub fn stored_cart(&self, id: CartId) -> Option<Cart> {
        lock(&self.carts).iter().find(|c| c.id == id).cloned()
    }

    fn record(&self, call: String, message: &str) -> Result<(), ApiError> {
        lock(&self.calls).push(call);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ApiError::new(message, FAILURE_CODE));
        }
        Ok(())
    }

    fn next_id(&self) -> i32 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

impl ProductsApi for FakeBackend {
    async fn create(&self, product: &NewProduct) -> Result<Product, ApiError> {
        self.record("POST /products".to_string(), "failed to create product")?;
        let created = Product {
            id: ProductId::new(self.next_id()),
            title: product.title.clone(),
            price: product.price,
            description: product.description.clone(),
            category: product.category.clone(),
            image: product.image.clone(),
            rating: Rating::default(),
        };
        lock(&self.products).push(created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: ProductId) -> Result<Product, ApiError> {
        self.record(format!("GET /products/{id}"), "failed to fetch product")?;
        lock(&self.products)
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| ApiError::new("failed to fetch product", 404))
    }

    async fn get_all(&self) -> Result<Vec<Product>, ApiError> {
        self.record("GET /products".to_string(), "failed to load products")?;
        Ok(lock(&self.products).clone())
    }

    async fn update(&self, id: ProductId, product: &NewProduct) -> Result<Product, ApiError> {
        self.record(format!("PUT /products/{id}"), "failed to update product")?;
        let mut products = lock(&self.products);
        let existing = products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| ApiError::new("failed to update product", 404))?;
        existing.title.clone_from(&product.title);
        existing.price = product.price;
        existing.description.clone_from(&product.description);
        existing.category.clone_from(&product.category);
        existing.image.clone_from(&product.image);
        Ok(existing.clone())
    }

    async fn delete(&self, id: ProductId) -> Result<Product, ApiError> {
        self.record(format!("DELETE /products/{id}"), "failed to delete product")?;
        let mut products = lock(&self.products);
        let index = products
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| ApiError::new("failed to delete product", 404))?;
        Ok(products.remove(index))
    }
}

impl CartsApi for FakeBackend {
    async fn create(&self, user_id: UserId, products: Vec<CartLine>) -> Result<Cart, ApiError> {
        self.record("POST /carts".to_string(), "failed to create cart")?;
        let cart = Cart {
            id: CartId::new(self.next_id()),
            user_id,
            products,
            date: "2024-01-01T00:00:00.000Z".to_string(),
        };
        lock(&self.carts).push(cart.clone());
        Ok(cart)
    }

    async fn get_by_id(&self, id: CartId) -> Result<Cart, ApiError> {
        self.record(format!("GET /carts/{id}"), "failed to load cart")?;
        self.stored_cart(id)
            .ok_or_else(|| ApiError::new("failed to load cart", 404))
    }

    async fn get_all(&self) -> Result<Vec<Cart>, ApiError> {
        self.record("GET /carts".to_string(), "failed to load carts")?;
        Ok(lock(&self.carts).clone())
    }

    async fn update(&self, id: CartId, cart: &Cart) -> Result<Cart, ApiError> {
        self.record(format!("PUT /carts/{id}"), "failed to update cart")?;
        let mut carts = lock(&self.carts);
        carts.retain(|c| c.id != id);
        carts.push(cart.clone());
        Ok(cart.clone())
    }

    async fn delete(&self, id: CartId) -> Result<(), ApiError> {
        self.record(format!("DELETE /carts/{id}"), "failed to delete cart")?;
        lock(&self.carts).retain(|c| c.id != id);
        Ok(())
    }
}

impl UsersApi for FakeBackend {
    async fn create(&self, request: &RegisterRequest) -> Result<User, ApiError> {
        self.record("POST /users".to_string(), "failed to create account")?;
        let mut created = user(self.next_id());
        created.username.clone_from(&request.username);
        created.email.clone_from(&request.email);
        lock(&self.users).push(created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: UserId) -> Result<User, ApiError> {
        self.record(format!("GET /users/{id}"), "failed to load user")?;
        lock(&self.users)
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or_else(|| ApiError::new("failed to load user", 404))
    }

    async fn get_all(&self) -> Result<Vec<User>, ApiError> {
        self.record("GET /users".to_string(), "failed to load users")?;
        Ok(lock(&self.users).clone())
    }
}

impl AuthApi for FakeBackend {
    async fn login(&self, credentials: &LoginRequest) -> Result<LoginResponse, ApiError> {
        self.record("POST /auth/login".to_string(), "failed to authenticate")?;
        if credentials.username == USERNAME && credentials.password == PASSWORD {
            Ok(LoginResponse {
                token: token_for(self.login_subject),
            })
        } else {
            Err(ApiError::new("failed to authenticate", 401))
        }
    }
}
