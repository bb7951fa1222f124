//! Product catalog state.
//!
//! Holds the published product list, a loading flag and the last error
//! message. Reads go through a `moka` cache that serves repeat calls until it
//! is invalidated (every successful mutation does that) or the configured
//! TTL expires.
//!
//! Failures never reach the caller as errors: they are recorded in
//! [`Catalog::error`] and the call resolves to a safe default.

mod cache;

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use store_hub_core::{NewProduct, Product, ProductFilter, ProductId};
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use crate::api::{ApiError, ProductsApi};
use cache::{CacheKey, CacheValue};

/// Catalog service.
pub struct Catalog<P> {
    products_api: Arc<P>,
    cache: Cache<CacheKey, CacheValue>,
    products: watch::Sender<Vec<Product>>,
    loading: watch::Sender<bool>,
    error: watch::Sender<Option<String>>,
}

impl<P: ProductsApi> Catalog<P> {
    /// Create an empty catalog whose cached reads live for `ttl`.
    #[must_use]
    pub fn new(products_api: Arc<P>, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(ttl)
            .build();

        Self {
            products_api,
            cache,
            products: watch::Sender::new(Vec::new()),
            loading: watch::Sender::new(false),
            error: watch::Sender::new(None),
        }
    }

    // =========================================================================
    // Cached reads
    // =========================================================================

    /// The full catalog, fetched at most once per cache lifetime.
    ///
    /// # Errors
    ///
    /// Returns the normalized backend error on a cache miss that fails.
    pub async fn get_all_cached(&self) -> Result<Arc<Vec<Product>>, ApiError> {
        if let Some(CacheValue::Products(products)) = self.cache.get(&CacheKey::Products).await {
            debug!("Cache hit for products");
            return Ok(products);
        }

        let products = Arc::new(self.products_api.get_all().await?);
        self.cache
            .insert(CacheKey::Products, CacheValue::Products(Arc::clone(&products)))
            .await;
        Ok(products)
    }

    /// A single product.
    ///
    /// # Errors
    ///
    /// Returns the normalized backend error on a cache miss that fails.
    #[instrument(skip(self))]
    pub async fn get_product(&self, id: ProductId) -> Result<Product, ApiError> {
        let key = CacheKey::Product(id);
        if let Some(CacheValue::Product(product)) = self.cache.get(&key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let product = self.products_api.get_by_id(id).await?;
        self.cache
            .insert(key, CacheValue::Product(Box::new(product.clone())))
            .await;
        Ok(product)
    }

    /// Resolve `ids` against the catalog, in the order given.
    ///
    /// Unknown ids are skipped. An empty input never touches the backend.
    ///
    /// # Errors
    ///
    /// Returns the normalized backend error if the catalog cannot be loaded.
    pub async fn get_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, ApiError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let catalog = self.get_all_cached().await?;
        Ok(ids
            .iter()
            .filter_map(|id| catalog.iter().find(|p| p.id == *id).cloned())
            .collect())
    }

    /// Invalidate every cached read.
    pub async fn clear_cache(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }

    // =========================================================================
    // Published state
    // =========================================================================

    /// Load and publish the catalog.
    ///
    /// On failure the published list is left as it was, the error message is
    /// recorded, and an empty list is returned.
    #[instrument(skip(self))]
    pub async fn load_products(&self) -> Vec<Product> {
        self.begin();
        let result = self.get_all_cached().await;
        self.loading.send_replace(false);

        match result {
            Ok(products) => {
                let products = products.as_ref().clone();
                self.products.send_replace(products.clone());
                products
            }
            Err(e) => {
                self.fail(&e);
                Vec::new()
            }
        }
    }

    /// Drop cached reads and load the catalog again.
    pub async fn refresh_products(&self) -> Vec<Product> {
        self.clear_cache().await;
        self.load_products().await
    }

    /// Create a product and append it to the published list.
    #[instrument(skip(self, product), fields(title = %product.title))]
    pub async fn add_product(&self, product: &NewProduct) -> Option<Product> {
        self.begin();
        let result = self.products_api.create(product).await;
        self.loading.send_replace(false);

        match result {
            Ok(created) => {
                self.clear_cache().await;
                self.products.send_modify(|list| list.push(created.clone()));
                Some(created)
            }
            Err(e) => {
                self.fail(&e);
                None
            }
        }
    }

    /// Replace a product and swap it into the published list.
    #[instrument(skip(self, product))]
    pub async fn update_product(&self, id: ProductId, product: &NewProduct) -> Option<Product> {
        self.begin();
        let result = self.products_api.update(id, product).await;
        self.loading.send_replace(false);

        match result {
            Ok(updated) => {
                self.clear_cache().await;
                self.products.send_modify(|list| {
                    for existing in list.iter_mut().filter(|p| p.id == id) {
                        existing.clone_from(&updated);
                    }
                });
                Some(updated)
            }
            Err(e) => {
                self.fail(&e);
                None
            }
        }
    }

    /// Delete a product and filter it out of the published list.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: ProductId) -> bool {
        self.begin();
        let result = self.products_api.delete(id).await;
        self.loading.send_replace(false);

        match result {
            Ok(_) => {
                self.clear_cache().await;
                self.products.send_modify(|list| list.retain(|p| p.id != id));
                true
            }
            Err(e) => {
                self.fail(&e);
                false
            }
        }
    }
}

impl<P> Catalog<P> {
    fn begin(&self) {
        self.loading.send_replace(true);
        self.error.send_replace(None);
    }

    fn fail(&self, error: &ApiError) {
        warn!(code = error.code, "{}", error.message);
        self.error.send_replace(Some(error.message.clone()));
    }

    /// Filter the published list.
    #[must_use]
    pub fn apply_filters(&self, filter: &ProductFilter) -> Vec<Product> {
        store_hub_core::apply_filters(&self.products.borrow(), filter)
    }

    #[must_use]
    pub fn products(&self) -> Vec<Product> {
        self.products.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Vec<Product>> {
        self.products.subscribe()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    /// Message of the last failed operation.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.error.borrow().clone()
    }

    pub fn clear_error(&self) {
        self.error.send_replace(None);
    }
}
