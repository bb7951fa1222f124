//! Catalog product types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::Price;

/// A catalog product as returned by `GET /products`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    /// Image URI.
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub rating: Rating,
}

impl Product {
    /// Unit price for display.
    #[must_use]
    pub const fn unit_price(&self) -> Price {
        Price::usd(self.price)
    }

    /// The create/update body carrying this product's editable fields.
    #[must_use]
    pub fn to_new_product(&self) -> NewProduct {
        NewProduct {
            title: self.title.clone(),
            price: self.price,
            description: self.description.clone(),
            category: self.category.clone(),
            image: self.image.clone(),
        }
    }
}

/// Aggregate customer rating.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rating {
    /// Average rate, 0 to 5.
    pub rate: f64,
    /// Number of ratings.
    pub count: u32,
}

/// Body of `POST /products` and `PUT /products/{id}`.
///
/// The backend assigns the id and computes the rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub title: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub description: String,
    pub category: String,
    pub image: String,
}
