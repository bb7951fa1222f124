//! Cart types.
//!
//! [`Cart`] mirrors the server resource: the backend only supports whole
//! replacement, so every mutation rewrites the full `products` list.
//! [`CartItem`] is the client-side view joining a line with its product.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{CartId, ProductId, UserId};
use super::price::Price;
use super::product::Product;

/// A cart resource (`/carts/{id}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    #[serde(default)]
    pub products: Vec<CartLine>,
    /// ISO-8601 creation date.
    #[serde(default)]
    pub date: String,
}

impl Cart {
    /// A cart that only exists locally, owned by nobody.
    ///
    /// Uses the `0` sentinel for both the cart and the owner.
    #[must_use]
    pub fn transient(products: Vec<CartLine>) -> Self {
        Self {
            id: CartId::ANONYMOUS,
            user_id: UserId::ANONYMOUS,
            products,
            date: Utc::now().to_rfc3339(),
        }
    }

    /// Whether the cart was never persisted.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        self.id.is_anonymous()
    }

    /// The line for `product_id`, if any.
    #[must_use]
    pub fn line(&self, product_id: ProductId) -> Option<&CartLine> {
        self.products.iter().find(|l| l.product_id == product_id)
    }

    /// Apply `delta` to the matching line's quantity, appending a new line
    /// when none matches and `delta` is positive.
    ///
    /// Returns `false` when nothing changed. Quantities never drop below 1.
    pub fn adjust_line(&mut self, product_id: ProductId, delta: i32) -> bool {
        if let Some(line) = self.products.iter_mut().find(|l| l.product_id == product_id) {
            let next = i64::from(line.quantity) + i64::from(delta);
            return match u32::try_from(next) {
                Ok(quantity) if quantity >= 1 => {
                    line.quantity = quantity;
                    true
                }
                _ => false,
            };
        }

        match u32::try_from(delta) {
            Ok(quantity) if quantity >= 1 => {
                self.products.push(CartLine::new(product_id, quantity));
                true
            }
            _ => false,
        }
    }

    /// Drop the line for `product_id`. Returns whether a line was removed.
    pub fn remove_line(&mut self, product_id: ProductId) -> bool {
        let before = self.products.len();
        self.products.retain(|l| l.product_id != product_id);
        self.products.len() != before
    }
}

/// One product line in a cart. `quantity` is always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl CartLine {
    #[must_use]
    pub const fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Body of `POST /carts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCart {
    pub user_id: UserId,
    pub products: Vec<CartLine>,
}

/// A cart line resolved against the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct CartItem {
    pub product: Product,
    pub quantity: u32,
}

impl CartItem {
    #[must_use]
    pub const fn new(product: Product, quantity: u32) -> Self {
        Self { product, quantity }
    }

    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.product.price * Decimal::from(self.quantity)
    }

    /// The persisted shape of this item.
    #[must_use]
    pub const fn to_line(&self) -> CartLine {
        CartLine::new(self.product.id, self.quantity)
    }
}

/// Sum of every item's line total.
#[must_use]
pub fn cart_total(items: &[CartItem]) -> Price {
    Price::usd(items.iter().map(CartItem::line_total).sum())
}

/// Number of distinct lines (what the cart badge shows).
#[must_use]
pub const fn cart_amount(items: &[CartItem]) -> usize {
    items.len()
}
