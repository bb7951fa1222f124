//! Cart synchronization state.
//!
//! Keeps the local item list and, for a signed-in user, the resident copy of
//! their server cart. The backend only supports whole-cart replacement, so
//! every remote mutation clones the resident cart, edits the clone and sends
//! it back in full.
//!
//! Local changes to quantities are applied before the remote write and are
//! not rolled back if it fails; local and server state may diverge until the
//! next reload.

use std::sync::Arc;

use store_hub_core::{
    Cart, CartId, CartItem, CartLine, Price, Product, ProductId, UserId, cart_amount, cart_total,
};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use crate::api::{ApiError, CartsApi, ProductsApi};
use crate::catalog::Catalog;
use crate::error::add_breadcrumb;

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// A cart call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The catalog needed to resolve cart lines could not be loaded.
    #[error("catalog unavailable: {0}")]
    Catalog(#[source] ApiError),
}

/// Which of the four cart states the service is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartPhase {
    /// Signed out, nothing in the transient cart.
    AnonymousEmpty,
    /// Signed out, transient cart has lines.
    AnonymousNonEmpty,
    /// Signed in, no server cart resident yet.
    NoServerCart,
    /// Signed in with a resident server cart.
    ServerCart,
}

/// Cart service.
pub struct CartState<C> {
    carts: Arc<C>,
    user_id: watch::Receiver<Option<UserId>>,
    items: watch::Sender<Vec<CartItem>>,
    cart: watch::Sender<Option<Cart>>,
}

impl<C: CartsApi> CartState<C> {
    /// Create an empty cart that reads the signed-in user from `user_id`.
    #[must_use]
    pub fn new(carts: Arc<C>, user_id: watch::Receiver<Option<UserId>>) -> Self {
        Self {
            carts,
            user_id,
            items: watch::Sender::new(Vec::new()),
            cart: watch::Sender::new(None),
        }
    }

    /// Add one unit of `product`.
    ///
    /// Signed out, this only touches the transient cart and returns a
    /// synthetic cart with the `0` sentinel ids holding a single line of
    /// quantity 1. Signed in, the server cart is created or replaced.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Api`] if the remote write fails.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn add_item(&self, product: &Product) -> Result<Cart, CartError> {
        let product_id = product.id.to_string();
        add_breadcrumb("cart", "Added item", Some(&[("product_id", product_id.as_str())]));

        let Some(user_id) = self.user_id() else {
            self.upsert_item(product, None);
            return Ok(Cart::transient(vec![CartLine::new(product.id, 1)]));
        };

        let resident = self.cart.borrow().clone();
        match resident {
            None => {
                let created = self
                    .carts
                    .create(user_id, vec![CartLine::new(product.id, 1)])
                    .await?;
                debug!(cart_id = %created.id, "Created server cart");
                self.cart.send_replace(Some(created.clone()));
                self.items
                    .send_replace(vec![CartItem::new(product.clone(), 1)]);
                Ok(created)
            }
            Some(mut next) => {
                next.adjust_line(product.id, 1);
                let saved = self.carts.update(next.id, &next).await?;
                let quantity = saved.line(product.id).map(|l| l.quantity);
                self.cart.send_replace(Some(saved.clone()));
                self.upsert_item(product, quantity);
                Ok(saved)
            }
        }
    }

    /// Add one to an existing line.
    ///
    /// Returns `Ok(None)` when there is no such line. Otherwise returns the
    /// saved server cart, or the transient cart when signed out.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Api`] if the remote write fails. The local
    /// quantity stays incremented.
    #[instrument(skip(self))]
    pub async fn increment_quantity(
        &self,
        product_id: ProductId,
    ) -> Result<Option<Cart>, CartError> {
        let changed = self.items.send_if_modified(|items| {
            items
                .iter_mut()
                .find(|i| i.product.id == product_id)
                .map(|item| item.quantity += 1)
                .is_some()
        });
        if !changed {
            return Ok(None);
        }
        self.persist_delta(product_id, 1).await.map(Some)
    }

    /// Take one from an existing line.
    ///
    /// Never drops a line below quantity 1: that is a no-op returning
    /// `Ok(None)` without any remote call. Use [`Self::remove_item`] instead.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Api`] if the remote write fails. The local
    /// quantity stays decremented.
    #[instrument(skip(self))]
    pub async fn decrement_quantity(
        &self,
        product_id: ProductId,
    ) -> Result<Option<Cart>, CartError> {
        let changed = self.items.send_if_modified(|items| {
            items
                .iter_mut()
                .find(|i| i.product.id == product_id && i.quantity > 1)
                .map(|item| item.quantity -= 1)
                .is_some()
        });
        if !changed {
            return Ok(None);
        }
        self.persist_delta(product_id, -1).await.map(Some)
    }

    /// Drop the line for `product_id`.
    ///
    /// The local list is always updated. Returns the saved cart when a
    /// server cart is resident, `Ok(None)` otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Api`] if the remote write fails.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, product_id: ProductId) -> Result<Option<Cart>, CartError> {
        self.items
            .send_modify(|items| items.retain(|i| i.product.id != product_id));

        let Some(mut next) = self.resident() else {
            return Ok(None);
        };

        next.remove_line(product_id);
        let saved = self.carts.update(next.id, &next).await?;
        self.cart.send_replace(Some(saved.clone()));
        Ok(Some(saved))
    }

    /// Fetch the signed-in user's cart and make it resident.
    ///
    /// The backend keys a user's cart by the user id.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Api`] if the fetch fails.
    #[instrument(skip(self))]
    pub async fn load_cart_by_id(&self, user_id: UserId) -> Result<Cart, CartError> {
        let cart = self.carts.get_by_id(CartId::new(user_id.as_i32())).await?;
        debug!(lines = cart.products.len(), "Loaded server cart");
        self.cart.send_replace(Some(cart.clone()));
        Ok(cart)
    }

    /// Load the user's server cart and fold the transient items into it.
    ///
    /// Server lines come first, resolved against the catalog; lines for
    /// unknown products are skipped. Transient items are appended only when
    /// their product is not already present, so a collision keeps the
    /// server quantity.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Api`] if the cart cannot be fetched and
    /// [`CartError::Catalog`] if the catalog cannot be loaded. The local
    /// item list is untouched in both cases.
    #[instrument(skip(self, catalog))]
    pub async fn merge_on_login<P: ProductsApi>(
        &self,
        user_id: UserId,
        catalog: &Catalog<P>,
    ) -> Result<Vec<CartItem>, CartError> {
        let cart = self.load_cart_by_id(user_id).await?;
        let products = catalog.get_all_cached().await.map_err(CartError::Catalog)?;

        let mut merged: Vec<CartItem> = cart
            .products
            .iter()
            .filter_map(|line| {
                let product = products.iter().find(|p| p.id == line.product_id);
                if product.is_none() {
                    warn!(product_id = %line.product_id, "Cart line references unknown product");
                }
                product.map(|p| CartItem::new(p.clone(), line.quantity.max(1)))
            })
            .collect();

        let transient = self.items.borrow().clone();
        for item in transient {
            if merged.iter().all(|m| m.product.id != item.product.id) {
                merged.push(item);
            }
        }

        self.items.send_replace(merged.clone());
        Ok(merged)
    }

    /// Mirror a local quantity change on the server.
    async fn persist_delta(&self, product_id: ProductId, delta: i32) -> Result<Cart, CartError> {
        let Some(mut next) = self.resident() else {
            return Ok(Cart::transient(self.lines()));
        };

        next.adjust_line(product_id, delta);
        let saved = self.carts.update(next.id, &next).await?;
        self.cart.send_replace(Some(saved.clone()));
        Ok(saved)
    }
}

impl<C> CartState<C> {
    fn user_id(&self) -> Option<UserId> {
        *self.user_id.borrow()
    }

    /// The resident cart, if a user is signed in.
    ///
    /// A cart left over from a user who has since been signed out is
    /// forgotten here, so it can never be written to again.
    fn resident(&self) -> Option<Cart> {
        if self.user_id().is_some() {
            return self.cart.borrow().clone();
        }
        if self.cart.send_if_modified(|cart| cart.take().is_some()) {
            debug!("Signed out, dropping resident cart");
        }
        None
    }

    fn lines(&self) -> Vec<CartLine> {
        self.items.borrow().iter().map(CartItem::to_line).collect()
    }

    /// Insert `product` or bump its line, optionally forcing the quantity.
    fn upsert_item(&self, product: &Product, quantity: Option<u32>) {
        self.items.send_modify(|items| {
            match items.iter_mut().find(|i| i.product.id == product.id) {
                Some(item) => item.quantity = quantity.unwrap_or(item.quantity + 1),
                None => items.push(CartItem::new(product.clone(), quantity.unwrap_or(1))),
            }
        });
    }

    /// Empty the local list and forget the resident cart.
    ///
    /// The server cart is left as it is.
    pub fn clear_cart(&self) {
        self.items.send_replace(Vec::new());
        self.cart.send_replace(None);
    }

    /// Replace the local item list.
    pub fn set_cart_items(&self, items: Vec<CartItem>) {
        self.items.send_replace(items);
    }

    /// The current cart state, derived from the user and the resident cart.
    #[must_use]
    pub fn phase(&self) -> CartPhase {
        match (self.user_id(), self.cart.borrow().is_some()) {
            (Some(_), true) => CartPhase::ServerCart,
            (Some(_), false) => CartPhase::NoServerCart,
            (None, _) if self.items.borrow().is_empty() => CartPhase::AnonymousEmpty,
            (None, _) => CartPhase::AnonymousNonEmpty,
        }
    }

    /// Local item list.
    #[must_use]
    pub fn items(&self) -> Vec<CartItem> {
        self.items.borrow().clone()
    }

    /// The resident server cart.
    #[must_use]
    pub fn cart(&self) -> Option<Cart> {
        self.cart.borrow().clone()
    }

    /// Subscribe to changes of the local item list.
    #[must_use]
    pub fn subscribe_items(&self) -> watch::Receiver<Vec<CartItem>> {
        self.items.subscribe()
    }

    /// Subscribe to changes of the resident server cart.
    #[must_use]
    pub fn subscribe_cart(&self) -> watch::Receiver<Option<Cart>> {
        self.cart.subscribe()
    }

    /// Sum of price times quantity over all lines.
    #[must_use]
    pub fn total(&self) -> Price {
        cart_total(&self.items.borrow())
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn amount(&self) -> usize {
        cart_amount(&self.items.borrow())
    }
}
